// Copyright 2021 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

//! Serializes an analyzed [`Grammar`] and its [`Lr1Table`] into Rust source
//! for a parser that links against `lr1_runtime`. This is deliberately the
//! thinnest part of the system: every function here is a mechanical
//! substitution of table contents into literal Rust syntax, one function
//! per emitted section, built with raw `write!`/`writeln!` calls rather
//! than a templating crate.

use crate::grammar::Grammar;
use crate::symbol::{NonTerminal, Symbol, SymbolTable, Terminal};
use crate::table::Lr1Table;
use std::io::{self, Write};

/// A name collision-free, syntactically valid Rust identifier for a
/// terminal/nonterminal enum variant. Grammar symbols are opaque strings
/// and may be punctuation literals like `"+"` or `"("`, so each variant
/// is prefixed with its symbol index and every non-identifier byte is
/// escaped to its hex code point; the original text is preserved in a
/// doc comment and in the `Display` impl.
fn variant_ident(prefix: &str, index: u32, name: &str) -> String {
    let mut escaped = String::new();
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            escaped.push(c);
        } else {
            escaped.push_str(&format!("_{:x}", c as u32));
        }
    }
    format!("{}{}_{}", prefix, index, escaped)
}

fn terminal_variant(symbol_table: &SymbolTable, terminal: Terminal, index: u32) -> String {
    variant_ident("T", index, symbol_table.terminal_name(terminal))
}

fn non_terminal_variant(symbol_table: &SymbolTable, non_terminal: NonTerminal, index: u32) -> String {
    variant_ident("N", index, symbol_table.non_terminal_name(non_terminal))
}

/// Write a complete, self-contained Rust source file implementing the
/// parser for `grammar`/`table`: the terminal/nonterminal enums, the
/// `lazy_static!`-compiled action/goto tables, the halting state, the
/// transparent-nonterminal set, and a thin `impl lr1_runtime::Tables<...>`
/// over them.
pub fn write_parser_code<W: Write>(grammar: &Grammar, table: &Lr1Table, wtr: &mut W) -> io::Result<()> {
    writeln!(wtr, "// generated by lr1gen. Do not edit by hand.\n")?;
    writeln!(wtr, "use std::collections::{{BTreeSet, HashMap}};\n")?;

    let symbol_table = grammar.symbol_table();
    let terminals: Vec<Terminal> = symbol_table.terminals().collect();
    let non_terminals: Vec<NonTerminal> = symbol_table.non_terminals().collect();
    let terminal_name = |t: Terminal| -> String {
        let index = terminals.iter().position(|&x| x == t).expect("terminal is in its own table");
        terminal_variant(symbol_table, t, index as u32)
    };
    let non_terminal_name = |n: NonTerminal| -> String {
        let index = non_terminals.iter().position(|&x| x == n).expect("nonterminal is in its own table");
        non_terminal_variant(symbol_table, n, index as u32)
    };

    write_terminal_enum(symbol_table, &terminals, wtr)?;
    write_non_terminal_enum(symbol_table, &non_terminals, wtr)?;
    write_tables(grammar, table, &terminal_name, &non_terminal_name, wtr)?;
    write_tables_impl(grammar, &terminal_name, wtr)?;
    Ok(())
}

fn write_terminal_enum<W: Write>(
    symbol_table: &SymbolTable,
    terminals: &[Terminal],
    wtr: &mut W,
) -> io::Result<()> {
    writeln!(wtr, "#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]")?;
    writeln!(wtr, "pub enum AATerminal {{")?;
    for (index, &t) in terminals.iter().enumerate() {
        let name = symbol_table.terminal_name(t);
        writeln!(wtr, "    /// {:?}", name)?;
        writeln!(wtr, "    {},", terminal_variant(symbol_table, t, index as u32))?;
    }
    writeln!(wtr, "}}\n")?;

    writeln!(wtr, "impl std::fmt::Display for AATerminal {{")?;
    writeln!(wtr, "    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {{")?;
    writeln!(wtr, "        match self {{")?;
    for (index, &t) in terminals.iter().enumerate() {
        let name = symbol_table.terminal_name(t);
        writeln!(
            wtr,
            "            AATerminal::{} => write!(f, {:?}),",
            terminal_variant(symbol_table, t, index as u32),
            name
        )?;
    }
    writeln!(wtr, "        }}")?;
    writeln!(wtr, "    }}")?;
    writeln!(wtr, "}}\n")?;
    Ok(())
}

fn write_non_terminal_enum<W: Write>(
    symbol_table: &SymbolTable,
    non_terminals: &[NonTerminal],
    wtr: &mut W,
) -> io::Result<()> {
    writeln!(wtr, "#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]")?;
    writeln!(wtr, "pub enum AANonTerminal {{")?;
    for (index, &n) in non_terminals.iter().enumerate() {
        let name = symbol_table.non_terminal_name(n);
        writeln!(wtr, "    /// {:?}", name)?;
        writeln!(wtr, "    {},", non_terminal_variant(symbol_table, n, index as u32))?;
    }
    writeln!(wtr, "}}\n")?;

    writeln!(wtr, "impl std::fmt::Display for AANonTerminal {{")?;
    writeln!(wtr, "    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {{")?;
    writeln!(wtr, "        match self {{")?;
    for (index, &n) in non_terminals.iter().enumerate() {
        let name = symbol_table.non_terminal_name(n);
        writeln!(
            wtr,
            "            AANonTerminal::{} => write!(f, {:?}),",
            non_terminal_variant(symbol_table, n, index as u32),
            name
        )?;
    }
    writeln!(wtr, "        }}")?;
    writeln!(wtr, "    }}")?;
    writeln!(wtr, "}}\n")?;
    Ok(())
}

fn write_tables<W: Write>(
    grammar: &Grammar,
    table: &Lr1Table,
    terminal_name: &impl Fn(Terminal) -> String,
    non_terminal_name: &impl Fn(NonTerminal) -> String,
    wtr: &mut W,
) -> io::Result<()> {
    writeln!(wtr, "lazy_static::lazy_static! {{")?;

    writeln!(wtr, "    static ref AASHIFT: HashMap<(u32, AATerminal), u32> = {{")?;
    writeln!(wtr, "        let mut m = HashMap::new();")?;
    for (&(state, terminal), &next) in table.shifts() {
        writeln!(
            wtr,
            "        m.insert(({}, AATerminal::{}), {});",
            state,
            terminal_name(terminal),
            next
        )?;
    }
    writeln!(wtr, "        m")?;
    writeln!(wtr, "    }};\n")?;

    writeln!(
        wtr,
        "    static ref AAREDUCE: HashMap<(u32, AATerminal), (AANonTerminal, usize)> = {{"
    )?;
    writeln!(wtr, "        let mut m = HashMap::new();")?;
    for ((state, terminal), (head, len)) in table.reduces() {
        writeln!(
            wtr,
            "        m.insert(({}, AATerminal::{}), (AANonTerminal::{}, {}));",
            state,
            terminal_name(terminal),
            non_terminal_name(head),
            len
        )?;
    }
    writeln!(wtr, "        m")?;
    writeln!(wtr, "    }};\n")?;

    writeln!(wtr, "    static ref AAGOTO: HashMap<(u32, AANonTerminal), u32> = {{")?;
    writeln!(wtr, "        let mut m = HashMap::new();")?;
    for (&(state, non_terminal), &next) in table.gotos() {
        writeln!(
            wtr,
            "        m.insert(({}, AANonTerminal::{}), {});",
            state,
            non_terminal_name(non_terminal),
            next
        )?;
    }
    writeln!(wtr, "        m")?;
    writeln!(wtr, "    }};\n")?;

    writeln!(wtr, "    static ref AAEXPECTED: HashMap<u32, BTreeSet<AATerminal>> = {{")?;
    writeln!(wtr, "        let mut m: HashMap<u32, BTreeSet<AATerminal>> = HashMap::new();")?;
    for state in 0..table.state_count() as u32 {
        let expected = table.expected_tokens(state);
        if expected.is_empty() {
            continue;
        }
        writeln!(wtr, "        m.insert({}, {{", state)?;
        writeln!(wtr, "            let mut s = BTreeSet::new();")?;
        for &t in &expected {
            writeln!(wtr, "            s.insert(AATerminal::{});", terminal_name(t))?;
        }
        writeln!(wtr, "            s")?;
        writeln!(wtr, "        }});")?;
    }
    writeln!(wtr, "        m")?;
    writeln!(wtr, "    }};\n")?;

    writeln!(wtr, "    static ref AATRANSPARENT: BTreeSet<AANonTerminal> = {{")?;
    writeln!(wtr, "        let mut s = BTreeSet::new();")?;
    for &n in grammar.symbol_table().transparent_non_terminals() {
        writeln!(wtr, "        s.insert(AANonTerminal::{});", non_terminal_name(n))?;
    }
    writeln!(wtr, "        s")?;
    writeln!(wtr, "    }};\n")?;

    writeln!(wtr, "}}\n")?;

    writeln!(wtr, "pub const AAHALTING_STATE: u32 = {};\n", table.halting_state())?;
    Ok(())
}

fn write_tables_impl<W: Write>(
    grammar: &Grammar,
    terminal_name: &impl Fn(Terminal) -> String,
    wtr: &mut W,
) -> io::Result<()> {
    writeln!(wtr, "#[derive(Debug, Clone, Copy, Default)]")?;
    writeln!(wtr, "pub struct GeneratedTables;\n")?;
    writeln!(wtr, "impl lr1_runtime::Tables<AATerminal, AANonTerminal> for GeneratedTables {{")?;
    writeln!(wtr, "    fn shift(&self, state: u32, terminal: AATerminal) -> Option<u32> {{")?;
    writeln!(wtr, "        AASHIFT.get(&(state, terminal)).copied()")?;
    writeln!(wtr, "    }}\n")?;
    writeln!(
        wtr,
        "    fn reduce(&self, state: u32, terminal: AATerminal) -> Option<(AANonTerminal, usize)> {{"
    )?;
    writeln!(wtr, "        AAREDUCE.get(&(state, terminal)).copied()")?;
    writeln!(wtr, "    }}\n")?;
    writeln!(
        wtr,
        "    fn goto(&self, state: u32, non_terminal: AANonTerminal) -> Option<u32> {{"
    )?;
    writeln!(wtr, "        AAGOTO.get(&(state, non_terminal)).copied()")?;
    writeln!(wtr, "    }}\n")?;
    writeln!(wtr, "    fn halting_state(&self) -> u32 {{")?;
    writeln!(wtr, "        AAHALTING_STATE")?;
    writeln!(wtr, "    }}\n")?;
    writeln!(wtr, "    fn expected_tokens(&self, state: u32) -> BTreeSet<AATerminal> {{")?;
    writeln!(wtr, "        AAEXPECTED.get(&state).cloned().unwrap_or_default()")?;
    writeln!(wtr, "    }}\n")?;
    writeln!(
        wtr,
        "    fn is_transparent(&self, non_terminal: AANonTerminal) -> bool {{"
    )?;
    writeln!(wtr, "        AATRANSPARENT.contains(&non_terminal)")?;
    writeln!(wtr, "    }}\n")?;
    writeln!(wtr, "    fn eof(&self) -> AATerminal {{")?;
    writeln!(wtr, "        AATerminal::{}", terminal_name(grammar.eof()))?;
    writeln!(wtr, "    }}\n")?;
    writeln!(wtr, "    fn terminals(&self) -> Vec<AATerminal> {{")?;
    writeln!(wtr, "        vec![")?;
    for t in grammar.symbol_table().terminals() {
        writeln!(wtr, "            AATerminal::{},", terminal_name(t))?;
    }
    writeln!(wtr, "        ]")?;
    writeln!(wtr, "    }}")?;
    writeln!(wtr, "}}")?;
    Ok(())
}
