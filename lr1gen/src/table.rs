// Copyright 2021 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

//! LR(1) item-set closure, GOTO, canonical collection enumeration, and
//! conflict detection/reporting. Canonical states are discovered
//! breadth-first with a `(state, symbol)` goto cache, and the halting
//! state is the shift target recorded the one time `EOF` is ever
//! shifted.

use crate::grammar::Grammar;
use crate::production::AUGMENTED_RULE;
use crate::symbol::{NonTerminal, Symbol, Terminal};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

/// `(rule_index, dot_position, lookahead_terminal)`; `dot_position` uses
/// the same 1-based convention as `symbol_at`/`tail_from` on [`Rule`],
/// so `dot == body_len + 1` marks a complete item.
///
/// [`Rule`]: crate::production::Rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Item {
    pub rule: u32,
    pub dot: u32,
    pub lookahead: Terminal,
}

type ItemSet = BTreeSet<Item>;

/// One contributing grammar position of a conflicting action: `(rule,
/// dot)`, with the lookahead and originating state stripped out, since
/// that is the conflict's dedup identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ItemPosition {
    pub rule: u32,
    pub dot: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Action {
    Shift(ItemPosition),
    Reduce(ItemPosition),
}

/// A reported shift/reduce or reduce/reduce conflict, with the shortest
/// known illustrative token string.
#[derive(Debug, Clone)]
pub struct Conflict {
    pub state: u32,
    pub lookahead: Terminal,
    pub actions: BTreeSet<Action>,
    pub representative: Vec<Terminal>,
}

impl Conflict {
    pub fn is_reduce_reduce(&self) -> bool {
        self.actions.iter().all(|a| matches!(a, Action::Reduce(_)))
    }

    fn dedup_key(&self) -> BTreeSet<ItemPosition> {
        self.actions
            .iter()
            .map(|a| match a {
                Action::Shift(p) | Action::Reduce(p) => *p,
            })
            .collect()
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = if self.is_reduce_reduce() {
            "reduce/reduce"
        } else {
            "shift/reduce"
        };
        write!(
            f,
            "{} conflict in state {} on lookahead {:?} ({} contributing actions)",
            kind,
            self.state,
            self.lookahead,
            self.actions.len()
        )
    }
}

/// The built action/goto tables plus every (deduplicated) conflict found
/// while building them. Construction never fails fast on a conflict: it
/// finishes the whole collection so every conflict can be reported.
pub struct Lr1Table {
    shift: BTreeMap<(u32, Terminal), u32>,
    reduce: BTreeMap<(u32, Terminal), (NonTerminal, usize, u32)>,
    goto: BTreeMap<(u32, NonTerminal), u32>,
    halting_state: u32,
    states: Vec<ItemSet>,
    conflicts: Vec<Conflict>,
}

impl Lr1Table {
    pub fn build(grammar: &Grammar) -> Self {
        let mut states: Vec<ItemSet> = Vec::new();
        let mut index_of: BTreeMap<ItemSet, u32> = BTreeMap::new();
        let mut queue: VecDeque<u32> = VecDeque::new();
        let mut shift: BTreeMap<(u32, Terminal), u32> = BTreeMap::new();
        let mut goto: BTreeMap<(u32, NonTerminal), u32> = BTreeMap::new();
        let mut goto_cache: BTreeMap<(u32, Symbol), u32> = BTreeMap::new();
        let mut halting_state = None;

        let start_kernel: ItemSet = std::iter::once(Item {
            rule: AUGMENTED_RULE,
            dot: 1,
            lookahead: grammar.eof(),
        })
        .collect();
        let start_state = Self::closure(grammar, start_kernel);
        states.push(start_state.clone());
        index_of.insert(start_state, 0);
        queue.push_back(0);

        while let Some(i) = queue.pop_front() {
            let item_set = states[i as usize].clone();
            let mut seen: BTreeSet<Symbol> = BTreeSet::new();
            let mut symbols_in_order: Vec<Symbol> = Vec::new();
            for item in &item_set {
                if let Some(sym) = grammar.rule(item.rule).symbol_at(item.dot) {
                    if seen.insert(sym) {
                        symbols_in_order.push(sym);
                    }
                }
            }
            for sym in symbols_in_order {
                let j = *goto_cache.entry((i, sym)).or_insert_with(|| {
                    let goto_set = Self::goto(grammar, &item_set, sym);
                    if let Some(&existing) = index_of.get(&goto_set) {
                        existing
                    } else {
                        let new_id = states.len() as u32;
                        states.push(goto_set.clone());
                        index_of.insert(goto_set, new_id);
                        queue.push_back(new_id);
                        new_id
                    }
                });
                match sym {
                    Symbol::Terminal(t) => {
                        shift.insert((i, t), j);
                        if t == grammar.eof() {
                            halting_state = Some(j);
                        }
                    }
                    Symbol::NonTerminal(n) => {
                        goto.insert((i, n), j);
                    }
                }
            }
        }

        // Tracks the contributing rule index alongside the action so that
        // reduce/reduce ties can be broken in favor of the lower (first
        // defined) rule without a reverse lookup.
        let mut reduce: BTreeMap<(u32, Terminal), (NonTerminal, usize, u32)> = BTreeMap::new();
        let mut conflicts: BTreeMap<BTreeSet<ItemPosition>, Conflict> = BTreeMap::new();
        for (i, item_set) in states.iter().enumerate() {
            let i = i as u32;
            for item in item_set {
                let rule = grammar.rule(item.rule);
                if item.dot as usize != rule.len() + 1 {
                    continue;
                }
                let reduce_position = ItemPosition {
                    rule: item.rule,
                    dot: item.dot,
                };
                let key = (i, item.lookahead);
                let mut actions: BTreeSet<Action> = BTreeSet::new();
                actions.insert(Action::Reduce(reduce_position));

                let shift_conflict = shift.contains_key(&key);
                if shift_conflict {
                    for other in item_set {
                        if grammar.rule(other.rule).symbol_at(other.dot) == Some(Symbol::Terminal(item.lookahead)) {
                            actions.insert(Action::Shift(ItemPosition {
                                rule: other.rule,
                                dot: other.dot,
                            }));
                        }
                    }
                }
                let reduce_reduce_conflict = match reduce.get(&key) {
                    Some(existing) => (existing.0, existing.1) != (rule.head(), rule.len()),
                    None => false,
                };
                if reduce_reduce_conflict {
                    for other in item_set {
                        let other_rule = grammar.rule(other.rule);
                        if other.lookahead == item.lookahead
                            && other.dot as usize == other_rule.len() + 1
                        {
                            actions.insert(Action::Reduce(ItemPosition {
                                rule: other.rule,
                                dot: other.dot,
                            }));
                        }
                    }
                }

                if shift_conflict || reduce_reduce_conflict {
                    let overridden = Self::all_override_tagged(grammar, &actions);
                    if !overridden {
                        let representative = Self::representative(grammar, item_set, item.lookahead);
                        let conflict = Conflict {
                            state: i,
                            lookahead: item.lookahead,
                            actions: actions.clone(),
                            representative: representative.clone(),
                        };
                        let dedup_key = conflict.dedup_key();
                        conflicts
                            .entry(dedup_key)
                            .and_modify(|existing| {
                                if representative.len() < existing.representative.len() {
                                    *existing = conflict.clone();
                                }
                            })
                            .or_insert(conflict);
                    }
                }

                // Resolution policy regardless of override status: shift
                // wins over reduce; reduce/reduce ties go to the lower
                // (first-defined) rule index. This keeps the emitted
                // tables deterministic even when the conflict is also
                // reported as an error.
                if !shift_conflict {
                    match reduce.get(&key) {
                        Some(existing) if reduce_reduce_conflict => {
                            if item.rule < existing.2 {
                                reduce.insert(key, (rule.head(), rule.len(), item.rule));
                            }
                        }
                        Some(_) => {}
                        None => {
                            reduce.insert(key, (rule.head(), rule.len(), item.rule));
                        }
                    }
                }
            }
        }

        let mut conflicts: Vec<Conflict> = conflicts.into_values().collect();
        conflicts.sort_by(|a, b| a.state.cmp(&b.state).then(a.lookahead.cmp(&b.lookahead)));

        Lr1Table {
            shift,
            reduce,
            goto,
            halting_state: halting_state.expect("EOF is always eventually shifted from state 0"),
            states,
            conflicts,
        }
    }

    fn all_override_tagged(grammar: &Grammar, actions: &BTreeSet<Action>) -> bool {
        actions.iter().all(|a| match a {
            Action::Shift(p) | Action::Reduce(p) => grammar.rule(p.rule).is_override_tagged(),
        })
    }

    /// A shortest terminal string driving the parser into `state` with
    /// `lookahead`: for each kernel item, the symbols already consumed
    /// (`body[0..dot-1]`) are expanded via shortcuts and
    /// concatenated, then `lookahead` is appended; the shortest result
    /// across all items in the state wins.
    fn representative(grammar: &Grammar, item_set: &ItemSet, lookahead: Terminal) -> Vec<Terminal> {
        let mut best: Option<Vec<Terminal>> = None;
        for item in item_set {
            let rule = grammar.rule(item.rule);
            let mut word = Vec::new();
            for dot in 1..item.dot {
                if let Some(sym) = rule.symbol_at(dot) {
                    word.extend(grammar.shortcut(sym).iter().cloned());
                }
            }
            word.push(lookahead);
            if best.as_ref().map_or(true, |b| word.len() < b.len()) {
                best = Some(word);
            }
        }
        best.unwrap_or_else(|| vec![lookahead])
    }

    fn closure(grammar: &Grammar, items: ItemSet) -> ItemSet {
        let mut set = items;
        let mut frontier: Vec<Item> = set.iter().cloned().collect();
        while !frontier.is_empty() {
            let mut next_frontier = Vec::new();
            for item in &frontier {
                let rule = grammar.rule(item.rule);
                if let Some(Symbol::NonTerminal(b)) = rule.symbol_at(item.dot) {
                    let tail: Vec<Symbol> = rule.tail_from(item.dot).collect();
                    let lookaheads = grammar.first_of_word_then(&tail, item.lookahead);
                    for &(rule_index, _) in grammar.rules_by_head(b) {
                        for &la in &lookaheads {
                            let candidate = Item {
                                rule: rule_index,
                                dot: 1,
                                lookahead: la,
                            };
                            if set.insert(candidate) {
                                next_frontier.push(candidate);
                            }
                        }
                    }
                }
            }
            frontier = next_frontier;
        }
        set
    }

    fn goto(grammar: &Grammar, items: &ItemSet, symbol: Symbol) -> ItemSet {
        let mut kernel = BTreeSet::new();
        for item in items {
            let rule = grammar.rule(item.rule);
            if rule.symbol_at(item.dot) == Some(symbol) {
                kernel.insert(Item {
                    rule: item.rule,
                    dot: item.dot + 1,
                    lookahead: item.lookahead,
                });
            }
        }
        Self::closure(grammar, kernel)
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn halting_state(&self) -> u32 {
        self.halting_state
    }

    pub fn shift(&self, state: u32, terminal: Terminal) -> Option<u32> {
        self.shift.get(&(state, terminal)).copied()
    }

    pub fn reduce(&self, state: u32, terminal: Terminal) -> Option<(NonTerminal, usize)> {
        self.reduce
            .get(&(state, terminal))
            .map(|&(head, len, _)| (head, len))
    }

    pub fn goto_state(&self, state: u32, non_terminal: NonTerminal) -> Option<u32> {
        self.goto.get(&(state, non_terminal)).copied()
    }

    pub fn shifts(&self) -> impl Iterator<Item = (&(u32, Terminal), &u32)> {
        self.shift.iter()
    }

    pub fn reduces(&self) -> impl Iterator<Item = ((u32, Terminal), (NonTerminal, usize))> + '_ {
        self.reduce
            .iter()
            .map(|(&key, &(head, len, _))| (key, (head, len)))
    }

    pub fn gotos(&self) -> impl Iterator<Item = (&(u32, NonTerminal), &u32)> {
        self.goto.iter()
    }

    pub fn expected_tokens(&self, state: u32) -> BTreeSet<Terminal> {
        let mut set = BTreeSet::new();
        for (&(s, t), _) in self.shift.iter() {
            if s == state {
                set.insert(t);
            }
        }
        for (&(s, t), _) in self.reduce.iter() {
            if s == state {
                set.insert(t);
            }
        }
        set
    }

    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Grammar;
    use crate::production::{Rule, RuleItem};
    use crate::symbol::{Symbol, SymbolTable};
    use std::collections::BTreeMap as Map;

    fn arithmetic() -> Grammar {
        let mut table = SymbolTable::new();
        let expr = table.intern_non_terminal("expr").unwrap();
        let term = table.intern_non_terminal("term").unwrap();
        let factor = table.intern_non_terminal("factor").unwrap();
        let plus = table.intern_terminal("+").unwrap();
        let star = table.intern_terminal("*").unwrap();
        let lparen = table.intern_terminal("(").unwrap();
        let rparen = table.intern_terminal(")").unwrap();
        let num = table.intern_terminal("num").unwrap();

        let mut rules = Map::new();
        rules.insert(
            0,
            Rule::new(
                0,
                expr,
                vec![
                    RuleItem::from(Symbol::NonTerminal(expr)),
                    RuleItem::from(Symbol::Terminal(plus)),
                    RuleItem::from(Symbol::NonTerminal(term)),
                ],
            ),
        );
        rules.insert(1, Rule::new(1, expr, vec![RuleItem::from(Symbol::NonTerminal(term))]));
        rules.insert(
            2,
            Rule::new(
                2,
                term,
                vec![
                    RuleItem::from(Symbol::NonTerminal(term)),
                    RuleItem::from(Symbol::Terminal(star)),
                    RuleItem::from(Symbol::NonTerminal(factor)),
                ],
            ),
        );
        rules.insert(3, Rule::new(3, term, vec![RuleItem::from(Symbol::NonTerminal(factor))]));
        rules.insert(4, Rule::new(4, factor, vec![RuleItem::from(Symbol::Terminal(num))]));
        rules.insert(
            5,
            Rule::new(
                5,
                factor,
                vec![
                    RuleItem::from(Symbol::Terminal(lparen)),
                    RuleItem::from(Symbol::NonTerminal(expr)),
                    RuleItem::from(Symbol::Terminal(rparen)),
                ],
            ),
        );
        Grammar::new(table, rules, expr, true).unwrap()
    }

    #[test]
    fn no_conflicts_on_unambiguous_grammar() {
        let grammar = arithmetic();
        let table = Lr1Table::build(&grammar);
        assert!(table.conflicts().is_empty());
        assert!(table.state_count() > 1);
    }

    #[test]
    fn dangling_else_reports_exactly_one_shift_reduce_conflict() {
        let mut table = SymbolTable::new();
        let stmt = table.intern_non_terminal("stmt").unwrap();
        let kw_if = table.intern_terminal("if").unwrap();
        let kw_expr = table.intern_terminal("expr").unwrap();
        let kw_else = table.intern_terminal("else").unwrap();
        let kw_other = table.intern_terminal("other").unwrap();

        let mut rules = Map::new();
        rules.insert(
            0,
            Rule::new(
                0,
                stmt,
                vec![
                    RuleItem::from(Symbol::Terminal(kw_if)),
                    RuleItem::from(Symbol::Terminal(kw_expr)),
                    RuleItem::from(Symbol::NonTerminal(stmt)),
                ],
            ),
        );
        rules.insert(
            1,
            Rule::new(
                1,
                stmt,
                vec![
                    RuleItem::from(Symbol::Terminal(kw_if)),
                    RuleItem::from(Symbol::Terminal(kw_expr)),
                    RuleItem::from(Symbol::NonTerminal(stmt)),
                    RuleItem::from(Symbol::Terminal(kw_else)),
                    RuleItem::from(Symbol::NonTerminal(stmt)),
                ],
            ),
        );
        rules.insert(2, Rule::new(2, stmt, vec![RuleItem::from(Symbol::Terminal(kw_other))]));

        let grammar = Grammar::new(table, rules, stmt, true).unwrap();
        let built = Lr1Table::build(&grammar);
        assert_eq!(built.conflicts().len(), 1);
        let conflict = &built.conflicts()[0];
        assert!(!conflict.is_reduce_reduce());
        assert_eq!(conflict.representative.last(), Some(&kw_else));
    }
}
