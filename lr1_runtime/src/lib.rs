// Copyright 2021 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

//! The runtime half of an `lr1gen`-emitted parser: a generic shift/reduce
//! driver, tree assembly with transparent-node splicing, and the
//! bounded-lookahead error recovery search. Emitted code supplies only the
//! tables (via [`Tables`]); everything that drives them lives here once.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;

/// A caller-supplied token's terminal tag.
pub trait TerminalToken<T> {
    fn terminal(&self) -> T;
}

/// The immutable, emitted action/goto tables a generated parser links
/// against. `T` is the terminal tag type, `N` the nonterminal tag type.
pub trait Tables<T, N> {
    /// `shift[(state, terminal)]`.
    fn shift(&self, state: u32, terminal: T) -> Option<u32>;
    /// `reduce[(state, terminal)]`, yielding the rule's head and body length.
    fn reduce(&self, state: u32, terminal: T) -> Option<(N, usize)>;
    /// `goto[(state, non_terminal)]`.
    fn goto(&self, state: u32, non_terminal: N) -> Option<u32>;
    /// The unique state reached after shifting EOF through the augmented rule.
    fn halting_state(&self) -> u32;
    /// Every terminal for which `shift` or `reduce` is defined at `state`.
    fn expected_tokens(&self, state: u32) -> BTreeSet<T>;
    /// Whether `non_terminal`'s inner nodes should be spliced into their
    /// parent rather than retained (synthetic `*`/`+` nonterminals).
    fn is_transparent(&self, non_terminal: N) -> bool;
    /// The reserved end-of-input terminal.
    fn eof(&self) -> T;
    /// Every terminal the grammar declares, for the error recovery search.
    fn terminals(&self) -> Vec<T>;
}

/// A parsed subtree: either a shifted leaf token or a reduced inner node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseTree<Tok, N> {
    Leaf(Tok),
    Inner(N, Vec<ParseTree<Tok, N>>),
}

impl<Tok, N> ParseTree<Tok, N> {
    /// The terminal leaves of this subtree, in left-to-right order.
    pub fn frontier(&self) -> Vec<&Tok> {
        let mut out = vec![];
        self.collect_frontier(&mut out);
        out
    }

    fn collect_frontier<'a>(&'a self, out: &mut Vec<&'a Tok>) {
        match self {
            ParseTree::Leaf(tok) => out.push(tok),
            ParseTree::Inner(_, children) => {
                for child in children {
                    child.collect_frontier(out);
                }
            }
        }
    }
}

/// One recorded, and eventually recovered-from, parse error.
#[derive(Debug, Clone)]
pub struct ParseError<Tok, T> {
    pub stack_frontier: Vec<Tok>,
    pub offending_token: Tok,
    pub expected: BTreeSet<T>,
}

impl<Tok: fmt::Debug, T: fmt::Debug> fmt::Display for ParseError<Tok, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "unexpected {:?}, expected one of {:?}",
            self.offending_token, self.expected
        )
    }
}

/// Outcome of a [`Parser::parse_tree`] call.
#[derive(Debug)]
pub enum ParseOutcome<Tok, N> {
    /// Parsing finished (possibly after recovering from some errors).
    Parsed(ParseTree<Tok, N>),
    /// Error recovery exhausted `max_err` or could not find a repair that
    /// improved on doing nothing; no tree is available.
    Aborted,
}

/// A single-threaded, deterministic pushdown automaton driver generic over
/// an emitted grammar's [`Tables`].
pub struct Parser<Tbl> {
    tables: Tbl,
    max_err: Option<usize>,
    errcorr_pre: usize,
    errcorr_post: usize,
}

impl<Tbl> Parser<Tbl> {
    pub fn new(tables: Tbl, max_err: Option<usize>, errcorr_pre: usize, errcorr_post: usize) -> Self {
        Self {
            tables,
            max_err,
            errcorr_pre,
            errcorr_post,
        }
    }

    pub fn tables(&self) -> &Tbl {
        &self.tables
    }
}

impl<Tbl> Parser<Tbl> {
    /// Run the driver to completion, returning the parse tree (if any) and
    /// every error encountered and (where possible) recovered from.
    pub fn parse_tree<Tok, T, N>(
        &self,
        input: impl IntoIterator<Item = Tok>,
        eof: Tok,
    ) -> (ParseOutcome<Tok, N>, Vec<ParseError<Tok, T>>)
    where
        Tok: Clone + TerminalToken<T> + From<T>,
        T: Copy + Eq + Ord + fmt::Debug,
        N: Copy + Eq + fmt::Debug,
        Tbl: Tables<T, N>,
    {
        let mut queue: VecDeque<Tok> = input.into_iter().collect();
        queue.push_back(eof);
        let mut errors = Vec::new();
        let mut stack: Vec<(u32, ParseTree<Tok, N>)> = Vec::new();
        let mut state = 0u32;

        loop {
            match self.drive(&mut stack, &mut state, &mut queue) {
                DriveOutcome::Halted => {
                    // The stack is `[start_symbol_node, Leaf(EOF)]` at this
                    // point (EOF was just shifted to reach the halting
                    // state): the parse tree is the bottom element, not the
                    // trailing EOF leaf on top.
                    let tree = stack
                        .into_iter()
                        .next()
                        .map(|(_, tree)| tree)
                        .expect("halting state reached with an empty stack");
                    return (ParseOutcome::Parsed(tree), errors);
                }
                DriveOutcome::Exhausted => {
                    // The token queue ran dry without reaching the halting
                    // state; treat this the same as a stall on EOF.
                    let offending = queue.pop_front().unwrap_or_else(|| Tok::from(self.tables.eof()));
                    if !self.record_error(&stack, offending.clone(), state, &mut errors) {
                        return (ParseOutcome::Aborted, errors);
                    }
                    if !self.recover(&mut stack, &mut state, &mut queue, offending) {
                        return (ParseOutcome::Aborted, errors);
                    }
                }
                DriveOutcome::Stalled(offending) => {
                    if !self.record_error(&stack, offending.clone(), state, &mut errors) {
                        return (ParseOutcome::Aborted, errors);
                    }
                    if !self.recover(&mut stack, &mut state, &mut queue, offending) {
                        return (ParseOutcome::Aborted, errors);
                    }
                }
            }
        }
    }

    fn record_error<Tok, T, N>(
        &self,
        stack: &[(u32, ParseTree<Tok, N>)],
        offending: Tok,
        state: u32,
        errors: &mut Vec<ParseError<Tok, T>>,
    ) -> bool
    where
        Tok: Clone,
        T: Copy + Eq + Ord + fmt::Debug,
        N: Copy,
        Tbl: Tables<T, N>,
    {
        let stack_frontier = stack
            .iter()
            .flat_map(|(_, tree)| tree.frontier())
            .cloned()
            .collect();
        errors.push(ParseError {
            stack_frontier,
            offending_token: offending,
            expected: self.tables.expected_tokens(state),
        });
        if let Some(max_err) = self.max_err {
            errors.len() < max_err
        } else {
            true
        }
    }

    /// Drive the automaton until it halts, stalls, or runs out of input.
    fn drive<Tok, T, N>(
        &self,
        stack: &mut Vec<(u32, ParseTree<Tok, N>)>,
        state: &mut u32,
        queue: &mut VecDeque<Tok>,
    ) -> DriveOutcome<Tok>
    where
        Tok: Clone + TerminalToken<T>,
        T: Copy + Eq,
        N: Copy,
        Tbl: Tables<T, N>,
    {
        loop {
            if *state == self.tables.halting_state() {
                return DriveOutcome::Halted;
            }
            let lookahead = match queue.front() {
                Some(tok) => tok.clone(),
                None => return DriveOutcome::Exhausted,
            };
            let terminal = lookahead.terminal();
            if let Some((head, body_len)) = self.tables.reduce(*state, terminal) {
                let split_at = stack.len() - body_len;
                let mut children = Vec::with_capacity(body_len);
                for (_, child) in stack.drain(split_at..) {
                    match child {
                        ParseTree::Inner(n, grandchildren) if self.tables.is_transparent(n) => {
                            children.extend(grandchildren);
                        }
                        other => children.push(other),
                    }
                }
                let pre_pop_state = stack.last().map(|(s, _)| *s).unwrap_or(0);
                let new_state = self
                    .tables
                    .goto(pre_pop_state, head)
                    .expect("goto table has no entry for a just-reduced head");
                stack.push((new_state, ParseTree::Inner(head, children)));
                *state = new_state;
            } else if let Some(next) = self.tables.shift(*state, terminal) {
                let tok = queue.pop_front().expect("lookahead was peeked above");
                stack.push((next, ParseTree::Leaf(tok)));
                *state = next;
            } else {
                queue.pop_front();
                return DriveOutcome::Stalled(lookahead);
            }
        }
    }

    /// Attempt to resynchronize after a stall, per the window/repair search.
    /// Returns `false` if recovery should abort the whole parse.
    fn recover<Tok, T, N>(
        &self,
        stack: &mut Vec<(u32, ParseTree<Tok, N>)>,
        state: &mut u32,
        queue: &mut VecDeque<Tok>,
        offending: Tok,
    ) -> bool
    where
        Tok: Clone + TerminalToken<T> + From<T>,
        T: Copy + Eq + Ord,
        N: Copy,
        Tbl: Tables<T, N>,
    {
        let all_leaves: Vec<Tok> = stack
            .iter()
            .flat_map(|(_, tree)| tree.frontier())
            .cloned()
            .collect();
        let m = self.errcorr_pre.min(all_leaves.len());
        let split_at = all_leaves.len() - m;
        let (replay_prefix, window_leaves) = all_leaves.split_at(split_at);

        // Rebuild the pre-window stack by replaying everything before the
        // window from scratch; determinism guarantees this reproduces the
        // exact parser state that existed before the window's tokens were
        // shifted in.
        let mut replay_stack: Vec<(u32, ParseTree<Tok, N>)> = Vec::new();
        let mut replay_state = 0u32;
        let mut replay_queue: VecDeque<Tok> = replay_prefix.iter().cloned().collect();
        match self.drive(&mut replay_stack, &mut replay_state, &mut replay_queue) {
            DriveOutcome::Exhausted => {}
            _ => unreachable!("replaying an already-consumed prefix cannot halt or stall"),
        }

        let mut window: Vec<Tok> = window_leaves.to_vec();
        window.push(offending);
        let m_bound = window.len();
        for _ in 0..self.errcorr_post {
            if let Some(tok) = queue.pop_front() {
                window.push(tok);
            } else {
                break;
            }
        }

        let baseline_unconsumed = window.len() - m_bound + 1;
        let replay_state_stack: Vec<u32> = replay_stack.iter().map(|(s, _)| *s).collect();
        let window_terminals: Vec<T> = window.iter().map(|t| t.terminal()).collect();

        let mut best_unconsumed = baseline_unconsumed;
        let mut best_window: Option<Vec<Tok>> = None;
        'search: for i in (0..m_bound).rev() {
            for t in self.tables.terminals() {
                let mut candidate_toks = window.clone();
                candidate_toks.insert(i, Tok::from(t));
                let mut candidate_terms = window_terminals.clone();
                candidate_terms.insert(i, t);
                if self.consider(
                    &replay_state_stack,
                    replay_state,
                    &candidate_terms,
                    &mut best_unconsumed,
                    &mut best_window,
                    candidate_toks,
                ) {
                    break 'search;
                }
            }
            if window_terminals[i] != self.tables.eof() {
                for t in self.tables.terminals() {
                    if t == window_terminals[i] {
                        continue;
                    }
                    let mut candidate_toks = window.clone();
                    candidate_toks[i] = Tok::from(t);
                    let mut candidate_terms = window_terminals.clone();
                    candidate_terms[i] = t;
                    if self.consider(
                        &replay_state_stack,
                        replay_state,
                        &candidate_terms,
                        &mut best_unconsumed,
                        &mut best_window,
                        candidate_toks,
                    ) {
                        break 'search;
                    }
                }
            }
            let mut candidate_toks = window.clone();
            candidate_toks.remove(i);
            let mut candidate_terms = window_terminals.clone();
            candidate_terms.remove(i);
            if self.consider(
                &replay_state_stack,
                replay_state,
                &candidate_terms,
                &mut best_unconsumed,
                &mut best_window,
                candidate_toks,
            ) {
                break 'search;
            }
        }

        match best_window {
            Some(repaired) if best_unconsumed < baseline_unconsumed => {
                for tok in repaired.into_iter().rev() {
                    queue.push_front(tok);
                }
                *stack = replay_stack;
                *state = replay_state;
                true
            }
            _ => false,
        }
    }

    /// Score one repair candidate against the running best; returns `true`
    /// if the candidate fully consumed the window (short-circuit).
    fn consider<Tok, T, N>(
        &self,
        state_stack: &[u32],
        state: u32,
        candidate: &[T],
        best_unconsumed: &mut usize,
        best_window: &mut Option<Vec<Tok>>,
        candidate_toks: Vec<Tok>,
    ) -> bool
    where
        T: Copy + Eq,
        N: Copy,
        Tbl: Tables<T, N>,
    {
        let advanced = self.try_parse(state_stack, state, candidate);
        let unconsumed = candidate.len() - advanced;
        if unconsumed < *best_unconsumed {
            *best_unconsumed = unconsumed;
            *best_window = Some(candidate_toks);
            if unconsumed == 0 {
                return true;
            }
        }
        false
    }

    /// A non-tree-building trial parse: how many leading terminals of
    /// `terminals` can be consumed from `(state_stack, state)` before the
    /// automaton stalls.
    fn try_parse<T, N>(&self, state_stack: &[u32], mut state: u32, terminals: &[T]) -> usize
    where
        T: Copy + Eq,
        N: Copy,
        Tbl: Tables<T, N>,
    {
        let mut stack: Vec<u32> = state_stack.to_vec();
        let mut pos = 0;
        loop {
            if state == self.tables.halting_state() {
                return pos;
            }
            if pos >= terminals.len() {
                return pos;
            }
            let t = terminals[pos];
            if let Some((head, body_len)) = self.tables.reduce(state, t) {
                let split_at = stack.len().saturating_sub(body_len);
                stack.truncate(split_at);
                let top = *stack.last().unwrap_or(&0);
                match self.tables.goto(top, head) {
                    Some(next) => {
                        stack.push(next);
                        state = next;
                    }
                    None => return pos,
                }
            } else if let Some(next) = self.tables.shift(state, t) {
                stack.push(next);
                state = next;
                pos += 1;
            } else {
                return pos;
            }
        }
    }
}

enum DriveOutcome<Tok> {
    Halted,
    Exhausted,
    Stalled(Tok),
}
