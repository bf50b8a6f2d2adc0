// Copyright 2021 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

//! Grammar cleanup (productivity, then reachability) and the derived
//! nullable/FIRST/FOLLOW/shortcut tables, computed as simple-loop
//! fixpoints over the rule set.

use crate::production::{Rule, RuleItem, AUGMENTED_RULE};
use crate::symbol::{NonTerminal, Symbol, SymbolTable, Terminal};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A fatal problem with a rule set, discovered during grammar
/// construction. Always fatal: reported and the run exits.
#[derive(Debug)]
pub struct RulesError(pub String);

impl fmt::Display for RulesError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for RulesError {}

/// An analyzed, augmented grammar: the rule set plus its derived
/// nullable/FIRST/FOLLOW/shortcut tables.
pub struct Grammar {
    symbol_table: SymbolTable,
    rules: BTreeMap<u32, Rule>,
    augmented_rule: Rule,
    rules_by_head: BTreeMap<NonTerminal, Vec<(u32, usize)>>,
    start: NonTerminal,
    original_start: NonTerminal,
    nullable: BTreeSet<Symbol>,
    first: BTreeMap<Symbol, BTreeSet<Terminal>>,
    follow: BTreeMap<Symbol, BTreeSet<Terminal>>,
    shortcuts: BTreeMap<Symbol, Vec<Terminal>>,
}

impl Grammar {
    /// Build an analyzed grammar from a rule set. When `cleanup` is
    /// `true` (the normal case), non-productive and unreachable rules are
    /// silently removed before augmentation; some diagnostic tools want
    /// the raw grammar instead, hence the flag.
    pub fn new(
        symbol_table: SymbolTable,
        mut rules: BTreeMap<u32, Rule>,
        start: NonTerminal,
        cleanup: bool,
    ) -> Result<Self, RulesError> {
        if cleanup {
            let productive = Self::productive_set(&rules);
            if !productive.contains(&start) {
                return Err(RulesError(
                    "start symbol does not derive terminals".to_string(),
                ));
            }
            rules.retain(|_, rule| {
                productive.contains(&rule.head())
                    && rule.body_symbols().all(|s| match s {
                        Symbol::Terminal(_) => true,
                        Symbol::NonTerminal(nt) => productive.contains(&nt),
                    })
            });

            let reachable = Self::reachable_set(start, &rules);
            rules.retain(|_, rule| reachable.contains(&rule.head()));
        }

        let eof = symbol_table.eof();
        let augmented_start = symbol_table.augmented_start();
        let augmented_rule = Rule::augmented(
            AUGMENTED_RULE,
            augmented_start,
            Symbol::NonTerminal(start),
            Symbol::Terminal(eof),
        );

        let mut rules_by_head: BTreeMap<NonTerminal, Vec<(u32, usize)>> = BTreeMap::new();
        for rule in rules.values().chain(std::iter::once(&augmented_rule)) {
            rules_by_head
                .entry(rule.head())
                .or_default()
                .push((rule.index(), rule.len()));
        }

        let mut grammar = Self {
            symbol_table,
            rules,
            augmented_rule,
            rules_by_head,
            start: augmented_start,
            original_start: start,
            nullable: BTreeSet::new(),
            first: BTreeMap::new(),
            follow: BTreeMap::new(),
            shortcuts: BTreeMap::new(),
        };
        grammar.nullable = grammar.compute_nullable();
        grammar.first = grammar.compute_first();
        grammar.follow = grammar.compute_follow();
        grammar.shortcuts = grammar.compute_shortcuts();
        Ok(grammar)
    }

    fn productive_set(rules: &BTreeMap<u32, Rule>) -> BTreeSet<NonTerminal> {
        let mut productive: BTreeSet<NonTerminal> = BTreeSet::new();
        for rule in rules.values() {
            if rule.is_empty() || rule.body_symbols().all(|s| s.is_terminal()) {
                productive.insert(rule.head());
            }
        }
        loop {
            let mut added = false;
            for rule in rules.values() {
                if productive.contains(&rule.head()) {
                    continue;
                }
                let all_known = rule.body_symbols().all(|s| match s {
                    Symbol::Terminal(_) => true,
                    Symbol::NonTerminal(nt) => productive.contains(&nt),
                });
                if all_known {
                    productive.insert(rule.head());
                    added = true;
                }
            }
            if !added {
                break;
            }
        }
        productive
    }

    fn reachable_set(start: NonTerminal, rules: &BTreeMap<u32, Rule>) -> BTreeSet<NonTerminal> {
        let mut reachable = BTreeSet::new();
        reachable.insert(start);
        loop {
            let mut added = false;
            for rule in rules.values() {
                if !reachable.contains(&rule.head()) {
                    continue;
                }
                for sym in rule.body_symbols() {
                    if let Symbol::NonTerminal(nt) = sym {
                        if reachable.insert(nt) {
                            added = true;
                        }
                    }
                }
            }
            if !added {
                break;
            }
        }
        reachable
    }

    fn all_rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values().chain(std::iter::once(&self.augmented_rule))
    }

    fn compute_nullable(&self) -> BTreeSet<Symbol> {
        let mut nullable = BTreeSet::new();
        loop {
            let mut added = false;
            for rule in self.all_rules() {
                let head = Symbol::NonTerminal(rule.head());
                if nullable.contains(&head) {
                    continue;
                }
                if rule.body_symbols().all(|s| nullable.contains(&s)) {
                    nullable.insert(head);
                    added = true;
                }
            }
            if !added {
                break;
            }
        }
        nullable
    }

    fn compute_first(&self) -> BTreeMap<Symbol, BTreeSet<Terminal>> {
        let mut first: BTreeMap<Symbol, BTreeSet<Terminal>> = BTreeMap::new();
        for t in self.symbol_table.terminals() {
            let mut set = BTreeSet::new();
            set.insert(t);
            first.insert(Symbol::Terminal(t), set);
        }
        for nt in self.symbol_table.non_terminals() {
            first.insert(Symbol::NonTerminal(nt), BTreeSet::new());
        }
        loop {
            let mut added = false;
            for rule in self.all_rules() {
                let head = Symbol::NonTerminal(rule.head());
                let mut addition = BTreeSet::new();
                for sym in rule.body_symbols() {
                    addition.extend(first.get(&sym).cloned().unwrap_or_default());
                    if !self.nullable.contains(&sym) {
                        break;
                    }
                }
                let entry = first.entry(head).or_default();
                let before = entry.len();
                entry.extend(addition);
                if entry.len() > before {
                    added = true;
                }
            }
            if !added {
                break;
            }
        }
        first
    }

    fn compute_follow(&self) -> BTreeMap<Symbol, BTreeSet<Terminal>> {
        let mut follow: BTreeMap<Symbol, BTreeSet<Terminal>> = BTreeMap::new();
        for nt in self.symbol_table.non_terminals() {
            follow.insert(Symbol::NonTerminal(nt), BTreeSet::new());
        }
        loop {
            let mut added = false;
            for rule in self.all_rules() {
                let body: Vec<Symbol> = rule.body_symbols().collect();
                for (i, &sym) in body.iter().enumerate() {
                    let Symbol::NonTerminal(_) = sym else { continue };
                    let tail = &body[i + 1..];
                    let mut addition = self.first_of_word(tail);
                    if tail.iter().all(|s| self.nullable.contains(s)) {
                        addition.extend(follow.get(&Symbol::NonTerminal(rule.head())).cloned().unwrap_or_default());
                    }
                    let entry = follow.entry(sym).or_default();
                    let before = entry.len();
                    entry.extend(addition);
                    if entry.len() > before {
                        added = true;
                    }
                }
            }
            if !added {
                break;
            }
        }
        follow
    }

    fn compute_shortcuts(&self) -> BTreeMap<Symbol, Vec<Terminal>> {
        let mut res: BTreeMap<Symbol, Vec<Terminal>> = BTreeMap::new();
        for t in self.symbol_table.terminals() {
            res.insert(Symbol::Terminal(t), vec![t]);
        }
        let mut todo: Vec<NonTerminal> = vec![];
        for nt in self.symbol_table.non_terminals() {
            if self.nullable.contains(&Symbol::NonTerminal(nt)) {
                res.insert(Symbol::NonTerminal(nt), vec![]);
            } else {
                todo.push(nt);
            }
        }
        loop {
            let mut still_todo = vec![];
            let mut progressed = false;
            for nt in todo {
                let mut best: Option<Vec<Terminal>> = None;
                for &(rule_index, _) in self.rules_by_head.get(&nt).map(Vec::as_slice).unwrap_or(&[]) {
                    let rule = self.rule(rule_index);
                    if rule.body_symbols().all(|s| res.contains_key(&s)) {
                        let mut word = vec![];
                        for s in rule.body_symbols() {
                            word.extend(res[&s].iter().cloned());
                        }
                        if best.as_ref().map_or(true, |b| word.len() < b.len()) {
                            best = Some(word);
                        }
                    }
                }
                match best {
                    Some(word) => {
                        res.insert(Symbol::NonTerminal(nt), word);
                        progressed = true;
                    }
                    None => still_todo.push(nt),
                }
            }
            todo = still_todo;
            if todo.is_empty() || !progressed {
                break;
            }
        }
        res
    }

    /// FIRST of a word (successive union, stopping at the first
    /// non-nullable symbol).
    pub fn first_of_word(&self, word: &[Symbol]) -> BTreeSet<Terminal> {
        let mut result = BTreeSet::new();
        for &sym in word {
            result.extend(self.first.get(&sym).cloned().unwrap_or_default());
            if !self.nullable.contains(&sym) {
                break;
            }
        }
        result
    }

    /// FIRST of `word . lookahead`: falls through to `lookahead` when
    /// every symbol of `word` is nullable (used by item-set closure).
    pub fn first_of_word_then(&self, word: &[Symbol], lookahead: Terminal) -> BTreeSet<Terminal> {
        let mut result = self.first_of_word(word);
        if word.iter().all(|s| self.nullable.contains(s)) {
            result.insert(lookahead);
        }
        result
    }

    pub fn symbol_table(&self) -> &SymbolTable {
        &self.symbol_table
    }

    pub fn start(&self) -> NonTerminal {
        self.start
    }

    pub fn original_start(&self) -> NonTerminal {
        self.original_start
    }

    pub fn eof(&self) -> Terminal {
        self.symbol_table.eof()
    }

    pub fn augmented_rule(&self) -> &Rule {
        &self.augmented_rule
    }

    pub fn rule(&self, index: u32) -> &Rule {
        if index == AUGMENTED_RULE {
            &self.augmented_rule
        } else {
            self.rules.get(&index).expect("rule index out of range")
        }
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values()
    }

    pub fn rules_by_head(&self, head: NonTerminal) -> &[(u32, usize)] {
        self.rules_by_head.get(&head).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_nullable(&self, symbol: Symbol) -> bool {
        self.nullable.contains(&symbol)
    }

    pub fn first(&self, symbol: Symbol) -> &BTreeSet<Terminal> {
        static EMPTY: BTreeSet<Terminal> = BTreeSet::new();
        self.first.get(&symbol).unwrap_or(&EMPTY)
    }

    pub fn follow(&self, symbol: Symbol) -> &BTreeSet<Terminal> {
        static EMPTY: BTreeSet<Terminal> = BTreeSet::new();
        self.follow.get(&symbol).unwrap_or(&EMPTY)
    }

    pub fn shortcut(&self, symbol: Symbol) -> &[Terminal] {
        self.shortcuts.get(&symbol).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Builder-facing helper used by the grammar-source front end (`front.rs`)
/// to assemble rule bodies before handing them to [`Grammar::new`].
pub fn rule_item(symbol: Symbol, override_conflict: bool) -> RuleItem {
    RuleItem::new(symbol, override_conflict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::production::Rule;

    fn build(
        rules: Vec<(&str, Vec<&str>)>,
        start: &str,
    ) -> Result<Grammar, RulesError> {
        let mut table = SymbolTable::new();
        // First pass: declare every nonterminal head and terminal body item.
        for (head, body) in &rules {
            table.intern_non_terminal(head).unwrap();
            for item in body {
                if item.starts_with('\'') {
                    let name = item.trim_matches('\'');
                    if table.get_terminal(name).is_none() {
                        table.intern_terminal(name).unwrap();
                    }
                } else {
                    table.intern_non_terminal(item).unwrap();
                }
            }
        }
        let mut built = BTreeMap::new();
        for (index, (head, body)) in rules.into_iter().enumerate() {
            let head_nt = table.intern_non_terminal(head).unwrap();
            let items: Vec<RuleItem> = body
                .into_iter()
                .map(|item| {
                    let symbol = if item.starts_with('\'') {
                        Symbol::Terminal(table.get_terminal(item.trim_matches('\'')).unwrap())
                    } else {
                        Symbol::NonTerminal(table.intern_non_terminal(item).unwrap())
                    };
                    RuleItem::from(symbol)
                })
                .collect();
            built.insert(index as u32, Rule::new(index as u32, head_nt, items));
        }
        let start_nt = table.get_non_terminal(start).unwrap();
        Grammar::new(table, built, start_nt, true)
    }

    #[test]
    fn arithmetic_grammar_analyzes() {
        let grammar = build(
            vec![
                ("expr", vec!["expr", "'+'", "term"]),
                ("expr", vec!["term"]),
                ("term", vec!["term", "'*'", "factor"]),
                ("term", vec!["factor"]),
                ("factor", vec!["'num'"]),
                ("factor", vec!["'('", "expr", "')'"]),
            ],
            "expr",
        )
        .unwrap();
        let num = grammar.symbol_table().get_terminal("num").unwrap();
        let factor = grammar.symbol_table().get_non_terminal("factor").unwrap();
        assert!(grammar.first(Symbol::NonTerminal(factor)).contains(&num));
        assert!(!grammar.is_nullable(Symbol::NonTerminal(factor)));
    }

    #[test]
    fn empty_production_is_nullable() {
        let mut table = SymbolTable::new();
        let list = table.intern_non_terminal("list").unwrap();
        let item = table.intern_terminal("item").unwrap();
        let mut rules = BTreeMap::new();
        rules.insert(0, Rule::new(0, list, vec![]));
        rules.insert(
            1,
            Rule::new(
                1,
                list,
                vec![
                    RuleItem::from(Symbol::NonTerminal(list)),
                    RuleItem::from(Symbol::Terminal(item)),
                ],
            ),
        );
        let grammar = Grammar::new(table, rules, list, true).unwrap();
        assert!(grammar.is_nullable(Symbol::NonTerminal(list)));
    }

    #[test]
    fn non_productive_start_fails() {
        let mut table = SymbolTable::new();
        let start = table.intern_non_terminal("start").unwrap();
        let unreachable_terminal = table.intern_terminal("x").unwrap();
        // start's only rule recurses on itself with no terminal base case.
        let mut rules = BTreeMap::new();
        rules.insert(
            0,
            Rule::new(
                0,
                start,
                vec![RuleItem::from(Symbol::NonTerminal(start))],
            ),
        );
        let _ = unreachable_terminal;
        assert!(Grammar::new(table, rules, start, true).is_err());
    }

    #[test]
    fn shortcuts_pick_shortest_alternative() {
        let grammar = build(
            vec![
                ("expr", vec!["'num'"]),
                ("expr", vec!["'('", "expr", "')'"]),
            ],
            "expr",
        )
        .unwrap();
        let expr = grammar.symbol_table().get_non_terminal("expr").unwrap();
        let num = grammar.symbol_table().get_terminal("num").unwrap();
        assert_eq!(grammar.shortcut(Symbol::NonTerminal(expr)), &[num]);
    }
}
