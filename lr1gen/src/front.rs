// Copyright 2021 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

//! Hand-rolled recursive-descent reader for the grammar source language.
//! Reading grammar files is not where the interesting LR(1) design
//! happens, so unlike the table builder this is a plain recursive-descent
//! reader over `lexan` tokens rather than a bootstrapped LR(1) parser of
//! itself. It recognizes:
//!
//! ```text
//! grammar : rule* ;
//! rule    : token ':' rhs ';' ;
//! rhs     : list | rhs '|' list ;
//! list    : item* ;
//! item    : tos | tos '+' | tos '*' ;
//! tos     : token | string ;
//! ```
//!
//! extended with a leading `!` conflict-override marker on any item, and
//! with `*`/`+` desugaring into fresh transparent nonterminals.

use crate::grammar::{Grammar, RulesError};
use crate::production::{Rule, RuleItem};
use crate::symbol::{NonTerminal, Symbol, SymbolTable};
use lexan::{LexicalAnalyzer, Location, TokenStream};
use std::collections::BTreeMap;
use std::fmt;
use std::iter::Peekable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tk {
    Ident,
    TerminalLit,
    Colon,
    Semi,
    Pipe,
    Star,
    Plus,
    Bang,
}

fn lexicon() -> LexicalAnalyzer<Tk> {
    LexicalAnalyzer::new(
        &[
            (Tk::Colon, ":"),
            (Tk::Semi, ";"),
            (Tk::Pipe, "|"),
            (Tk::Star, "*"),
            (Tk::Plus, "+"),
            (Tk::Bang, "!"),
        ],
        &[
            (Tk::Ident, r"[A-Za-z_][A-Za-z0-9_]*"),
            (Tk::TerminalLit, r#"('[^']*')|("[^"]*")"#),
        ],
        &[r"\s+"],
    )
}

/// A syntax error in a grammar source file, already formatted with its
/// location (`file:line:col: message`).
#[derive(Debug)]
pub struct SyntaxError(pub String);

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for SyntaxError {}

/// Either a syntax error in the grammar source, or a semantic error
/// discovered while analyzing the rule set it describes.
#[derive(Debug)]
pub enum FrontError {
    Syntax(SyntaxError),
    Rules(RulesError),
}

impl fmt::Display for FrontError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FrontError::Syntax(e) => write!(f, "{}", e),
            FrontError::Rules(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for FrontError {}

impl From<SyntaxError> for FrontError {
    fn from(e: SyntaxError) -> Self {
        FrontError::Syntax(e)
    }
}

impl From<RulesError> for FrontError {
    fn from(e: RulesError) -> Self {
        FrontError::Rules(e)
    }
}

struct RawItem {
    name: String,
    is_terminal: bool,
    repeat: Option<Tk>,
    override_conflict: bool,
}

struct RawRule {
    head: String,
    location: Location,
    alternatives: Vec<Vec<RawItem>>,
}

struct Reader<'a> {
    tokens: Peekable<TokenStream<'a, Tk>>,
    label: String,
}

impl<'a> Reader<'a> {
    fn new(lexicon: &'a LexicalAnalyzer<Tk>, text: &'a str, label: &str) -> Self {
        Self {
            tokens: lexicon.token_stream(text, label).peekable(),
            label: label.to_string(),
        }
    }

    fn error(&self, location: &Location, message: impl fmt::Display) -> SyntaxError {
        SyntaxError(format!("{}: {}", location, message))
    }

    fn peek(&mut self) -> Result<Option<(Tk, &str)>, SyntaxError> {
        match self.tokens.peek() {
            None => Ok(None),
            Some(Ok(token)) => Ok(Some((*token.tag(), token.lexeme()))),
            Some(Err(_)) => {
                // Re-pull to obtain an owned error (lexan errors borrow the
                // token stream, which is already borrowed by `peek`).
                let error = self.tokens.next().unwrap().unwrap_err();
                Err(self.lex_error(error))
            }
        }
    }

    fn lex_error(&self, error: lexan::Error<Tk>) -> SyntaxError {
        match error {
            lexan::Error::UnexpectedText(text, location) => {
                self.error(&location, format!("unexpected text \"{}\"", text))
            }
            lexan::Error::AmbiguousMatches(_, text, location) => {
                self.error(&location, format!("ambiguous match for \"{}\"", text))
            }
            lexan::Error::AdvancedWhenEmpty(location) => {
                self.error(&location, "advanced past end of input")
            }
        }
    }

    fn bump(&mut self) -> Result<(Tk, String, Location), SyntaxError> {
        match self.tokens.next() {
            None => Err(SyntaxError(format!("{}: unexpected end of input", self.label))),
            Some(Ok(token)) => Ok((*token.tag(), token.lexeme().to_string(), token.location().clone())),
            Some(Err(error)) => Err(self.lex_error(error)),
        }
    }

    fn expect(&mut self, tag: Tk, what: &str) -> Result<(String, Location), SyntaxError> {
        let (found, text, location) = self.bump()?;
        if found == tag {
            Ok((text, location))
        } else {
            Err(self.error(&location, format!("expected {}, found \"{}\"", what, text)))
        }
    }

    fn parse_grammar(&mut self) -> Result<Vec<RawRule>, SyntaxError> {
        let mut rules = Vec::new();
        while self.peek()?.is_some() {
            rules.push(self.parse_rule()?);
        }
        Ok(rules)
    }

    fn parse_rule(&mut self) -> Result<RawRule, SyntaxError> {
        let (head, location) = self.expect(Tk::Ident, "a nonterminal name")?;
        self.expect(Tk::Colon, "':'")?;
        let mut alternatives = vec![self.parse_list()?];
        while matches!(self.peek()?, Some((Tk::Pipe, _))) {
            self.bump()?;
            alternatives.push(self.parse_list()?);
        }
        self.expect(Tk::Semi, "';'")?;
        Ok(RawRule {
            head,
            location,
            alternatives,
        })
    }

    fn parse_list(&mut self) -> Result<Vec<RawItem>, SyntaxError> {
        let mut items = Vec::new();
        loop {
            match self.peek()? {
                Some((Tk::Ident, _)) | Some((Tk::TerminalLit, _)) | Some((Tk::Bang, _)) => {
                    items.push(self.parse_item()?);
                }
                _ => break,
            }
        }
        Ok(items)
    }

    fn parse_item(&mut self) -> Result<RawItem, SyntaxError> {
        let override_conflict = if matches!(self.peek()?, Some((Tk::Bang, _))) {
            self.bump()?;
            true
        } else {
            false
        };
        let (tag, text, location) = self.bump()?;
        let (name, is_terminal) = match tag {
            Tk::Ident => (text, false),
            Tk::TerminalLit => (text[1..text.len() - 1].to_string(), true),
            _ => {
                return Err(self.error(&location, format!("expected an item, found \"{}\"", text)));
            }
        };
        let repeat = match self.peek()? {
            Some((Tk::Star, _)) => {
                self.bump()?;
                Some(Tk::Star)
            }
            Some((Tk::Plus, _)) => {
                self.bump()?;
                Some(Tk::Plus)
            }
            _ => None,
        };
        Ok(RawItem {
            name,
            is_terminal,
            repeat,
            override_conflict,
        })
    }
}

/// A fresh transparent nonterminal standing in for `X*` or `X+`, created
/// on first use and cached so repeated occurrences of the same repeated
/// symbol share one desugared definition.
struct Desugarer {
    star_cache: BTreeMap<Symbol, NonTerminal>,
    plus_cache: BTreeMap<Symbol, NonTerminal>,
}

impl Desugarer {
    fn new() -> Self {
        Self {
            star_cache: BTreeMap::new(),
            plus_cache: BTreeMap::new(),
        }
    }

    /// `X+`: `X+ -> X | X+ -> X+ X`.
    fn plus_of(
        &mut self,
        table: &mut SymbolTable,
        rules: &mut BTreeMap<u32, Rule>,
        next_index: &mut u32,
        symbol: Symbol,
    ) -> NonTerminal {
        if let Some(&nt) = self.plus_cache.get(&symbol) {
            return nt;
        }
        let name = format!("_{}+", table.symbol_name(symbol));
        let nt = table.intern_non_terminal(&name).expect("fresh desugared name");
        table.mark_transparent(nt);
        self.plus_cache.insert(symbol, nt);

        let base_index = *next_index;
        *next_index += 1;
        rules.insert(
            base_index,
            Rule::new(base_index, nt, vec![symbol.into()]),
        );
        let rec_index = *next_index;
        *next_index += 1;
        rules.insert(
            rec_index,
            Rule::new(rec_index, nt, vec![Symbol::NonTerminal(nt).into(), symbol.into()]),
        );
        nt
    }

    /// `X*`: `X* -> <empty> | X* -> X* X`.
    fn star_of(
        &mut self,
        table: &mut SymbolTable,
        rules: &mut BTreeMap<u32, Rule>,
        next_index: &mut u32,
        symbol: Symbol,
    ) -> NonTerminal {
        if let Some(&nt) = self.star_cache.get(&symbol) {
            return nt;
        }
        let name = format!("_{}*", table.symbol_name(symbol));
        let nt = table.intern_non_terminal(&name).expect("fresh desugared name");
        table.mark_transparent(nt);
        self.star_cache.insert(symbol, nt);

        let empty_index = *next_index;
        *next_index += 1;
        rules.insert(empty_index, Rule::new(empty_index, nt, vec![]));
        let rec_index = *next_index;
        *next_index += 1;
        rules.insert(
            rec_index,
            Rule::new(rec_index, nt, vec![Symbol::NonTerminal(nt).into(), symbol.into()]),
        );
        nt
    }
}

/// Read a grammar source file and build its analyzed [`Grammar`]. The
/// start symbol is the head of the first rule.
pub fn read_grammar(text: &str, label: &str) -> Result<Grammar, FrontError> {
    let lexicon = lexicon();
    let mut reader = Reader::new(&lexicon, text, label);
    let raw_rules = reader.parse_grammar()?;
    if raw_rules.is_empty() {
        return Err(SyntaxError(format!("{}: empty grammar", label)).into());
    }

    let mut table = SymbolTable::new();
    for raw in &raw_rules {
        table
            .intern_non_terminal(&raw.head)
            .expect("nonterminal names always succeed");
    }
    // Pre-declare every terminal so that item order within a rule body
    // never affects which symbols exist.
    for raw in &raw_rules {
        for alt in &raw.alternatives {
            for item in alt {
                if item.is_terminal && table.get_terminal(&item.name).is_none() {
                    table
                        .intern_terminal(&item.name)
                        .expect("terminal names always succeed");
                }
            }
        }
    }

    let start = table
        .get_non_terminal(&raw_rules[0].head)
        .expect("start's head was just interned");

    let mut rules: BTreeMap<u32, Rule> = BTreeMap::new();
    let mut next_index: u32 = 0;
    let mut desugarer = Desugarer::new();

    for raw in &raw_rules {
        let head = table
            .get_non_terminal(&raw.head)
            .expect("head was interned above");
        for alt in &raw.alternatives {
            let mut body = Vec::with_capacity(alt.len());
            for item in alt {
                let symbol = if item.is_terminal {
                    Symbol::Terminal(
                        table
                            .get_terminal(&item.name)
                            .expect("terminal was pre-declared above"),
                    )
                } else {
                    match table.get_non_terminal(&item.name) {
                        Some(nt) => Symbol::NonTerminal(nt),
                        None => {
                            return Err(RulesError(format!(
                                "{}: nonterminal \"{}\" is never defined",
                                raw.location, item.name
                            ))
                            .into());
                        }
                    }
                };
                let resolved = match item.repeat {
                    None => symbol,
                    Some(Tk::Plus) => Symbol::NonTerminal(desugarer.plus_of(
                        &mut table,
                        &mut rules,
                        &mut next_index,
                        symbol,
                    )),
                    Some(Tk::Star) => Symbol::NonTerminal(desugarer.star_of(
                        &mut table,
                        &mut rules,
                        &mut next_index,
                        symbol,
                    )),
                    Some(_) => unreachable!("parse_item only ever sets Star or Plus"),
                };
                let mut rule_item = RuleItem::from(resolved);
                rule_item.override_conflict = item.override_conflict;
                body.push(rule_item);
            }
            let index = next_index;
            next_index += 1;
            rules.insert(index, Rule::new(index, head, body));
        }
    }

    Grammar::new(table, rules, start, true).map_err(FrontError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_the_arithmetic_grammar() {
        let grammar = read_grammar(
            "expr : expr '+' term | term ;\n\
             term : term '*' factor | factor ;\n\
             factor : 'num' | '(' expr ')' ;\n",
            "test",
        )
        .unwrap();
        let table = grammar.symbol_table();
        assert!(table.get_terminal("num").is_some());
        assert!(table.get_non_terminal("factor").is_some());
        assert_eq!(
            table.non_terminal_name(grammar.original_start()),
            "expr"
        );
    }

    #[test]
    fn desugars_plus_into_a_transparent_nonterminal() {
        let grammar = read_grammar("list : 'item'+ ;\n", "test").unwrap();
        let table = grammar.symbol_table();
        let plus_nt = table.get_non_terminal("_item+").unwrap();
        assert!(table.is_transparent(plus_nt));
    }

    #[test]
    fn override_hint_is_recorded_on_the_rule() {
        let grammar = read_grammar(
            "stmt : 'if' stmt | 'if' stmt !'else' stmt | 'other' ;\n",
            "test",
        )
        .unwrap();
        let tagged = grammar
            .rules()
            .find(|r| r.is_override_tagged())
            .expect("one rule carries the override hint");
        assert!(tagged.body().iter().any(|item| item.override_conflict));
    }

    #[test]
    fn rejects_malformed_input() {
        let err = read_grammar("expr : 'x' \n", "test");
        assert!(err.is_err());
    }

    #[test]
    fn undefined_nonterminal_is_reported() {
        let err = read_grammar("expr : missing ;\n", "test");
        assert!(matches!(err, Err(FrontError::Rules(_))));
    }
}
