// Copyright 2021 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

//! End-to-end scenarios: grammar source text, through the front end and
//! table builder, driven by `lr1_runtime::Parser` exactly as emitted code
//! would drive it. These complement the unit tests embedded in
//! `grammar.rs`/`table.rs`/`front.rs`, which each exercise one subsystem
//! in isolation.

use crate::front::read_grammar;
use crate::grammar::Grammar;
use crate::symbol::{NonTerminal, Terminal};
use crate::table::Lr1Table;
use lr1_runtime::{ParseOutcome, ParseTree, Parser, TerminalToken, Tables};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Tok(Terminal);

impl TerminalToken<Terminal> for Tok {
    fn terminal(&self) -> Terminal {
        self.0
    }
}

impl From<Terminal> for Tok {
    fn from(t: Terminal) -> Self {
        Tok(t)
    }
}

struct Adapter<'a> {
    grammar: &'a Grammar,
    table: &'a Lr1Table,
}

impl<'a> Tables<Terminal, NonTerminal> for Adapter<'a> {
    fn shift(&self, state: u32, terminal: Terminal) -> Option<u32> {
        self.table.shift(state, terminal)
    }
    fn reduce(&self, state: u32, terminal: Terminal) -> Option<(NonTerminal, usize)> {
        self.table.reduce(state, terminal)
    }
    fn goto(&self, state: u32, non_terminal: NonTerminal) -> Option<u32> {
        self.table.goto_state(state, non_terminal)
    }
    fn halting_state(&self) -> u32 {
        self.table.halting_state()
    }
    fn expected_tokens(&self, state: u32) -> BTreeSet<Terminal> {
        self.table.expected_tokens(state)
    }
    fn is_transparent(&self, non_terminal: NonTerminal) -> bool {
        self.grammar.symbol_table().is_transparent(non_terminal)
    }
    fn eof(&self) -> Terminal {
        self.grammar.eof()
    }
    fn terminals(&self) -> Vec<Terminal> {
        self.grammar.symbol_table().terminals().collect()
    }
}

fn build(source: &str) -> (Grammar, Lr1Table) {
    let grammar = read_grammar(source, "test").expect("grammar reads");
    let table = Lr1Table::build(&grammar);
    assert!(table.conflicts().is_empty(), "unexpected conflicts: {:?}", table.conflicts());
    (grammar, table)
}

fn tok(grammar: &Grammar, name: &str) -> Tok {
    Tok(grammar.symbol_table().get_terminal(name).expect("terminal is declared"))
}

fn run(grammar: &Grammar, table: &Lr1Table, input: Vec<Tok>) -> (ParseOutcome<Tok, NonTerminal>, Vec<lr1_runtime::ParseError<Tok, Terminal>>) {
    let parser = Parser::new(Adapter { grammar, table }, None, 4, 4);
    parser.parse_tree(input, Tok(grammar.eof()))
}

fn expect_tree(outcome: ParseOutcome<Tok, NonTerminal>) -> ParseTree<Tok, NonTerminal> {
    match outcome {
        ParseOutcome::Parsed(tree) => tree,
        ParseOutcome::Aborted => panic!("expected a successful parse"),
    }
}

/// Scenario A: arithmetic grammar, `num + num * num`.
#[test]
fn scenario_a_arithmetic_precedence() {
    let (grammar, table) = build(
        "expr : expr '+' term | term ;\n\
         term : term '*' factor | factor ;\n\
         factor : 'num' | '(' expr ')' ;\n",
    );
    let input = vec![
        tok(&grammar, "num"),
        tok(&grammar, "+"),
        tok(&grammar, "num"),
        tok(&grammar, "*"),
        tok(&grammar, "num"),
    ];
    let (outcome, errors) = run(&grammar, &table, input);
    assert!(errors.is_empty());
    let tree = expect_tree(outcome);
    let expr = grammar.symbol_table().get_non_terminal("expr").unwrap();
    let term = grammar.symbol_table().get_non_terminal("term").unwrap();
    match tree {
        ParseTree::Inner(head, children) => {
            assert_eq!(head, expr);
            assert_eq!(children.len(), 3, "expr -> expr '+' term");
            match &children[0] {
                ParseTree::Inner(left_head, left_children) => {
                    assert_eq!(*left_head, expr);
                    assert_eq!(left_children.len(), 1, "expr -> term");
                    match &left_children[0] {
                        ParseTree::Inner(inner_head, inner_children) => {
                            assert_eq!(*inner_head, term);
                            assert_eq!(inner_children.len(), 1, "term -> factor -> num");
                        }
                        ParseTree::Leaf(_) => panic!("expected a term node"),
                    }
                }
                ParseTree::Leaf(_) => panic!("expected an expr node"),
            }
            match &children[2] {
                ParseTree::Inner(right_head, right_children) => {
                    assert_eq!(*right_head, term);
                    assert_eq!(right_children.len(), 3, "term -> term '*' factor");
                }
                ParseTree::Leaf(_) => panic!("expected a term node"),
            }
        }
        ParseTree::Leaf(_) => panic!("expected an inner node"),
    }
}

/// Scenario B: an empty production. `nullable` must contain `list`, and
/// parsing the empty token stream must yield a childless `list` node.
#[test]
fn scenario_b_empty_production() {
    let (grammar, table) = build("list : ;\nlist : list 'item' ;\n");
    let list = grammar.symbol_table().get_non_terminal("list").unwrap();
    assert!(grammar.is_nullable(crate::symbol::Symbol::NonTerminal(list)));

    let (outcome, errors) = run(&grammar, &table, vec![]);
    assert!(errors.is_empty());
    match expect_tree(outcome) {
        ParseTree::Inner(head, children) => {
            assert_eq!(head, list);
            assert!(children.is_empty());
        }
        ParseTree::Leaf(_) => panic!("expected a list node"),
    }
}

/// Scenario D: a single stray trailing `')'` is repaired by deletion.
#[test]
fn scenario_d_recovery_by_deletion() {
    let (grammar, table) = build("S : '(' S ')' | 'x' ;\n");
    let input = vec![
        tok(&grammar, "("),
        tok(&grammar, "x"),
        tok(&grammar, ")"),
        tok(&grammar, ")"),
    ];
    let (outcome, errors) = run(&grammar, &table, input);
    assert_eq!(errors.len(), 1);
    let tree = expect_tree(outcome);
    let frontier: Vec<&str> = tree
        .frontier()
        .into_iter()
        .map(|t| grammar.symbol_table().terminal_name(t.0))
        .collect();
    assert_eq!(frontier, vec!["(", "x", ")"]);
}

/// Scenario E: a bogus `'y'` (declared, but not derivable from `S`) is
/// repaired by substituting it with `'x'`.
#[test]
fn scenario_e_recovery_by_substitution() {
    // `unused` exists solely so that `'y'` is interned as a declared
    // terminal; it is unreachable from `S` and is stripped by cleanup,
    // leaving `'y'` declared but never legal in any valid derivation.
    let (grammar, table) = build("S : '(' S ')' | 'x' ;\nunused : 'y' ;\n");
    let input = vec![tok(&grammar, "("), tok(&grammar, "y"), tok(&grammar, ")")];
    let (outcome, errors) = run(&grammar, &table, input);
    assert_eq!(errors.len(), 1);
    let tree = expect_tree(outcome);
    let frontier: Vec<&str> = tree
        .frontier()
        .into_iter()
        .map(|t| grammar.symbol_table().terminal_name(t.0))
        .collect();
    assert_eq!(frontier, vec!["(", "x", ")"]);
}

/// Scenario F: transparent-nonterminal splicing for a `*`-desugared list.
#[test]
fn scenario_f_transparent_splicing() {
    let (grammar, table) = build("list : _items ;\n_items : | _items 'x' ;\n");
    let list = grammar.symbol_table().get_non_terminal("list").unwrap();
    let x = tok(&grammar, "x");
    let input = vec![x.clone(), x.clone(), x];
    let (outcome, errors) = run(&grammar, &table, input);
    assert!(errors.is_empty());
    match expect_tree(outcome) {
        ParseTree::Inner(head, children) => {
            assert_eq!(head, list);
            assert_eq!(children.len(), 3, "the transparent _items node is spliced away");
            for child in &children {
                assert!(matches!(child, ParseTree::Leaf(_)));
            }
        }
        ParseTree::Leaf(_) => panic!("expected a list node"),
    }
}
