// Copyright 2021 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

//! Symbol interning: terminals and nonterminals are opaque `u32`-keyed
//! handles, minted once per grammar instance along with the two reserved
//! sentinels every grammar carries (`EOF` and the augmented start `S'`).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Terminal(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NonTerminal(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Symbol {
    Terminal(Terminal),
    NonTerminal(NonTerminal),
}

impl Symbol {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Symbol::Terminal(_))
    }

    pub fn is_non_terminal(&self) -> bool {
        matches!(self, Symbol::NonTerminal(_))
    }

    pub fn as_terminal(&self) -> Option<Terminal> {
        match self {
            Symbol::Terminal(t) => Some(*t),
            Symbol::NonTerminal(_) => None,
        }
    }

    pub fn as_non_terminal(&self) -> Option<NonTerminal> {
        match self {
            Symbol::NonTerminal(n) => Some(*n),
            Symbol::Terminal(_) => None,
        }
    }
}

impl From<Terminal> for Symbol {
    fn from(t: Terminal) -> Self {
        Symbol::Terminal(t)
    }
}

impl From<NonTerminal> for Symbol {
    fn from(n: NonTerminal) -> Self {
        Symbol::NonTerminal(n)
    }
}

#[derive(Debug)]
pub enum Error {
    DuplicateTerminal(String),
    DuplicateNonTerminal(String),
    UndefinedNonTerminal(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::DuplicateTerminal(name) => write!(f, "terminal \"{}\" already defined", name),
            Error::DuplicateNonTerminal(name) => {
                write!(f, "nonterminal \"{}\" already defined", name)
            }
            Error::UndefinedNonTerminal(name) => write!(f, "nonterminal \"{}\" undefined", name),
        }
    }
}

/// Owns the interning maps for one grammar instance, including the
/// reserved `EOF` terminal and `S'` augmented-start nonterminal, which are
/// minted eagerly so that no user-declared symbol can ever collide with
/// them (any later attempt to redeclare a terminal/nonterminal named
/// `"EOF"`/`"S'"` fails with the ordinary duplicate-definition error).
#[derive(Debug)]
pub struct SymbolTable {
    terminal_names: Vec<String>,
    terminal_by_name: BTreeMap<String, Terminal>,
    non_terminal_names: Vec<String>,
    non_terminal_by_name: BTreeMap<String, NonTerminal>,
    transparent: BTreeSet<NonTerminal>,
    eof: Terminal,
    augmented_start: NonTerminal,
}

impl Default for SymbolTable {
    fn default() -> Self {
        let mut table = Self {
            terminal_names: Vec::new(),
            terminal_by_name: BTreeMap::new(),
            non_terminal_names: Vec::new(),
            non_terminal_by_name: BTreeMap::new(),
            transparent: BTreeSet::new(),
            eof: Terminal(0),
            augmented_start: NonTerminal(0),
        };
        table.eof = table
            .intern_terminal("EOF")
            .expect("EOF is the first terminal interned");
        table.augmented_start = table
            .intern_non_terminal("S'")
            .expect("S' is the first nonterminal interned");
        table
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eof(&self) -> Terminal {
        self.eof
    }

    pub fn augmented_start(&self) -> NonTerminal {
        self.augmented_start
    }

    pub fn intern_terminal(&mut self, name: &str) -> Result<Terminal, Error> {
        if self.terminal_by_name.contains_key(name) {
            return Err(Error::DuplicateTerminal(name.to_string()));
        }
        let terminal = Terminal(self.terminal_names.len() as u32);
        self.terminal_names.push(name.to_string());
        self.terminal_by_name.insert(name.to_string(), terminal);
        Ok(terminal)
    }

    /// Intern a nonterminal, minting it on first use. Names beginning with
    /// `_` are automatically marked transparent.
    pub fn intern_non_terminal(&mut self, name: &str) -> Result<NonTerminal, Error> {
        if let Some(nt) = self.non_terminal_by_name.get(name) {
            return Ok(*nt);
        }
        let non_terminal = NonTerminal(self.non_terminal_names.len() as u32);
        self.non_terminal_names.push(name.to_string());
        self.non_terminal_by_name
            .insert(name.to_string(), non_terminal);
        if name.starts_with('_') {
            self.transparent.insert(non_terminal);
        }
        Ok(non_terminal)
    }

    pub fn get_terminal(&self, name: &str) -> Option<Terminal> {
        self.terminal_by_name.get(name).copied()
    }

    pub fn get_non_terminal(&self, name: &str) -> Option<NonTerminal> {
        self.non_terminal_by_name.get(name).copied()
    }

    pub fn mark_transparent(&mut self, non_terminal: NonTerminal) {
        self.transparent.insert(non_terminal);
    }

    pub fn is_transparent(&self, non_terminal: NonTerminal) -> bool {
        self.transparent.contains(&non_terminal)
    }

    pub fn transparent_non_terminals(&self) -> impl Iterator<Item = &NonTerminal> {
        self.transparent.iter()
    }

    pub fn terminal_name(&self, terminal: Terminal) -> &str {
        &self.terminal_names[terminal.0 as usize]
    }

    pub fn non_terminal_name(&self, non_terminal: NonTerminal) -> &str {
        &self.non_terminal_names[non_terminal.0 as usize]
    }

    pub fn symbol_name(&self, symbol: Symbol) -> &str {
        match symbol {
            Symbol::Terminal(t) => self.terminal_name(t),
            Symbol::NonTerminal(n) => self.non_terminal_name(n),
        }
    }

    pub fn terminals(&self) -> impl Iterator<Item = Terminal> + '_ {
        (0..self.terminal_names.len() as u32).map(Terminal)
    }

    pub fn non_terminals(&self) -> impl Iterator<Item = NonTerminal> + '_ {
        (0..self.non_terminal_names.len() as u32).map(NonTerminal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_are_distinct_from_user_symbols() {
        let mut table = SymbolTable::new();
        let x = table.intern_terminal("x").unwrap();
        assert_ne!(x, table.eof());
        let s = table.intern_non_terminal("start").unwrap();
        assert_ne!(s, table.augmented_start());
    }

    #[test]
    fn redeclaring_eof_fails() {
        let mut table = SymbolTable::new();
        assert!(matches!(
            table.intern_terminal("EOF"),
            Err(Error::DuplicateTerminal(_))
        ));
    }

    #[test]
    fn underscore_prefixed_non_terminals_are_transparent() {
        let mut table = SymbolTable::new();
        let items = table.intern_non_terminal("_items").unwrap();
        assert!(table.is_transparent(items));
        let list = table.intern_non_terminal("list").unwrap();
        assert!(!table.is_transparent(list));
    }
}
