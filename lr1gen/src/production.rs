// Copyright 2021 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

//! Production rules: `(head, body)` tuples with a stable integer index.
//! The augmented rule `S' -> start EOF` is given the reserved index
//! [`AUGMENTED_RULE`] rather than a slot among the user's rules.

use crate::symbol::{NonTerminal, Symbol};
use std::fmt;

/// Reserved index of the augmented rule `S' -> start EOF`. `u32::MAX` is
/// used since rule indices are otherwise a dense, zero-based `u32` range
/// assigned in declaration order.
pub const AUGMENTED_RULE: u32 = u32::MAX;

/// One item of a production's right-hand side: a symbol, optionally
/// marked with a leading `!` conflict-override hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleItem {
    pub symbol: Symbol,
    pub override_conflict: bool,
}

impl RuleItem {
    pub fn new(symbol: Symbol, override_conflict: bool) -> Self {
        Self {
            symbol,
            override_conflict,
        }
    }
}

impl From<Symbol> for RuleItem {
    fn from(symbol: Symbol) -> Self {
        Self::new(symbol, false)
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    index: u32,
    head: NonTerminal,
    body: Vec<RuleItem>,
}

impl Rule {
    pub fn new(index: u32, head: NonTerminal, body: Vec<RuleItem>) -> Self {
        Self { index, head, body }
    }

    pub fn augmented(index: u32, start: NonTerminal, original_start: Symbol, eof: Symbol) -> Self {
        Self::new(
            index,
            start,
            vec![RuleItem::from(original_start), RuleItem::from(eof)],
        )
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn head(&self) -> NonTerminal {
        self.head
    }

    pub fn body(&self) -> &[RuleItem] {
        &self.body
    }

    pub fn body_symbols(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.body.iter().map(|item| item.symbol)
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// `true` iff any item in the body carries the `!` conflict-override
    /// hint. A rule tagged this way has its conflicts suppressed from
    /// diagnostics once every other rule contributing to the same
    /// conflict is also tagged.
    pub fn is_override_tagged(&self) -> bool {
        self.body.iter().any(|item| item.override_conflict)
    }

    /// The symbol at 1-based dot position `dot` (`dot == 1` means "before
    /// the first body symbol"), or `None` when the dot has advanced past
    /// the end of the body.
    pub fn symbol_at(&self, dot: u32) -> Option<Symbol> {
        self.body.get(dot as usize - 1).map(|item| item.symbol)
    }

    pub fn tail_from(&self, dot: u32) -> impl Iterator<Item = Symbol> + '_ {
        self.body[(dot as usize).min(self.body.len())..]
            .iter()
            .map(|item| item.symbol)
    }
}

pub fn format_rule(rule: &Rule, symbol_name: impl Fn(Symbol) -> String) -> String {
    let mut s = format!("{}:", symbol_name(Symbol::NonTerminal(rule.head)));
    if rule.is_empty() {
        s.push_str(" <empty>");
    } else {
        for item in rule.body.iter() {
            s.push(' ');
            if item.override_conflict {
                s.push('!');
            }
            s.push_str(&symbol_name(item.symbol));
        }
    }
    s
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "rule#{}", self.index)
    }
}
