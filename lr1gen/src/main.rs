// Copyright 2021 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

use clap::crate_authors;
use structopt::StructOpt;

use std::{
    fs,
    io::{self, prelude::*},
    path::PathBuf,
    process::exit,
};

mod emit;
mod front;
mod grammar;
mod production;
#[cfg(test)]
mod scenarios_test;
mod symbol;
mod table;

use front::FrontError;
use grammar::RulesError;
use table::Lr1Table;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "lr1gen",
    about = "LR(1) parser table generator",
    author = crate_authors!(),
)]
struct CLOptions {
    /// Parser type to generate (only "lr1" is implemented; any other value
    /// is accepted for diagnostics but never produces output).
    #[structopt(short = "t", long = "type", default_value = "lr1")]
    parser_type: String,
    /// Write the generated parser source here instead of stdout.
    #[structopt(short, long, parse(from_os_str))]
    output: Option<PathBuf>,
    /// The grammar source file to read.
    #[structopt(parse(from_os_str))]
    specification: PathBuf,
}

fn report(label: &str, message: impl std::fmt::Display) {
    let _ = writeln!(io::stderr(), "{}: {}", label, message);
}

fn main() {
    let options = CLOptions::from_args();
    let label = options.specification.to_string_lossy().to_string();

    if options.parser_type != "lr1" {
        report(
            &label,
            format_args!(
                "parser type \"{}\" is diagnostics-only; only \"lr1\" is implemented",
                options.parser_type
            ),
        );
        exit(1);
    }

    let text = match fs::read_to_string(&options.specification) {
        Ok(text) => text,
        Err(error) => {
            report(&label, format_args!("cannot read grammar file: {}", error));
            exit(1);
        }
    };

    let grammar = match front::read_grammar(&text, &label) {
        Ok(grammar) => grammar,
        Err(FrontError::Syntax(error)) => {
            eprintln!("{}", error);
            exit(1);
        }
        Err(FrontError::Rules(RulesError(message))) => {
            report(&label, message);
            exit(1);
        }
    };

    let built = Lr1Table::build(&grammar);
    if !built.conflicts().is_empty() {
        for conflict in built.conflicts() {
            let representative: Vec<&str> = conflict
                .representative
                .iter()
                .map(|&t| grammar.symbol_table().terminal_name(t))
                .collect();
            report(
                &label,
                format_args!("{} (e.g. on input: {})", conflict, representative.join(" ")),
            );
        }
        exit(1);
    }

    let result = match &options.output {
        Some(path) => fs::File::create(path).and_then(|mut file| emit::write_parser_code(&grammar, &built, &mut file)),
        None => emit::write_parser_code(&grammar, &built, &mut io::stdout()),
    };
    if let Err(error) = result {
        report(&label, format_args!("failed to write output: {}", error));
        exit(1);
    }
}
