//! The GLR parse engine.
//!
//! One session drives one parse or reparse. The engine keeps a set of live
//! heads over a shared frame arena; each scheduling round advances the head
//! at the smallest byte position by one token (lex, then a run of reduces
//! ending in a shift, an accept, or a block). Conflicting table entries fork
//! new heads that re-enter scheduling at the same position; heads that
//! converge on the same state and position merge, keeping the preferred one.
//!
//! When every live head is blocked, control passes to the recovery unit
//! (`recovery.rs`) rather than failing: parsing always ends with at least
//! one finished head, and the best one's subtree becomes the tree root.

use std::sync::atomic::{AtomicBool, Ordering};

use rustc_hash::FxHashMap;
use tracing::trace;

use super::ParseOptions;
use super::reuse::ReuseCursor;
use super::stack::{Head, StackArena};
use crate::base::{Length, Point};
use crate::error::ParseCancelled;
use crate::grammar::{Action, ParseTable, StateId, SymbolKind, TokenSet};
use crate::lexer::{ExternalScanner, LexedToken, Lexer};
use crate::tree::subtree::Subtree;

/// Forking beyond this many concurrent heads drops the worst candidates.
pub(crate) const MAX_HEADS: usize = 24;
/// A sane grammar reduces a bounded number of times per token; beyond this
/// the head is treated as stuck and handed to recovery.
const MAX_REDUCTIONS_PER_TOKEN: usize = 1024;

/// The lex result at one (position, state): leading extra nodes, then the
/// padding and token that follow them.
#[derive(Clone)]
pub(crate) struct TokenGroup {
    pub extras: Vec<Subtree>,
    pub padding: Length,
    pub token: LexedToken,
}

/// A head that found no admissible action for its current token.
pub(crate) struct Blocked {
    pub head: Head,
    pub token: LexedToken,
    pub padding: Length,
}

/// A head that reached the accept action.
pub(crate) struct Finished {
    pub root: Subtree,
    pub error_cost: u32,
    pub order: u32,
}

pub(crate) struct ParseSession<'s> {
    pub table: &'s ParseTable,
    pub lexer: Lexer<'s>,
    /// Per-state admissible token sets (action keys plus extras).
    pub admissible: &'s [TokenSet],
    /// Every terminal, for recovery-mode lexing.
    pub all_terminals: &'s TokenSet,
    pub options: &'s ParseOptions,
    pub cancel: Option<&'s AtomicBool>,
    pub external: Option<&'s mut (dyn ExternalScanner + 'static)>,
    pub reuse: Option<ReuseCursor<'s>>,
    pub arena: StackArena,
    pub heads: Vec<Head>,
    pub blocked: Vec<Blocked>,
    pub finished: Vec<Finished>,
    token_cache: FxHashMap<(u32, StateId), TokenGroup>,
    next_order: u32,
}

enum StepOutcome {
    /// Head consumed one token and rejoined the live set.
    Advanced,
    /// Head had no admissible action and moved to the blocked set.
    Blocked,
    /// Head accepted and moved to the finished set.
    Finished,
}

impl<'s> ParseSession<'s> {
    pub fn new(
        table: &'s ParseTable,
        lexer: Lexer<'s>,
        admissible: &'s [TokenSet],
        all_terminals: &'s TokenSet,
        options: &'s ParseOptions,
        cancel: Option<&'s AtomicBool>,
        external: Option<&'s mut (dyn ExternalScanner + 'static)>,
        reuse: Option<ReuseCursor<'s>>,
    ) -> Self {
        Self {
            table,
            lexer,
            admissible,
            all_terminals,
            options,
            cancel,
            external,
            reuse,
            arena: StackArena::default(),
            heads: Vec::new(),
            blocked: Vec::new(),
            finished: Vec::new(),
            token_cache: FxHashMap::default(),
            next_order: 0,
        }
    }

    pub(crate) fn next_order(&mut self) -> u32 {
        self.next_order += 1;
        self.next_order
    }

    /// Run the parse to completion; the returned subtree is the tree root.
    pub fn run(mut self) -> Result<Subtree, ParseCancelled> {
        let start_state = self.table.start_state();
        let bottom = self.arena.push(None, start_state, None);
        self.heads.push(Head {
            top: bottom,
            state: start_state,
            position: Length::ZERO,
            error_cost: 0,
            order: 0,
        });

        loop {
            if let Some(flag) = self.cancel {
                if flag.load(Ordering::Relaxed) {
                    let consumed = self
                        .heads
                        .iter()
                        .map(|h| h.position.bytes)
                        .max()
                        .unwrap_or_default();
                    return Err(ParseCancelled { consumed });
                }
            }

            if self.heads.is_empty() {
                if self.blocked.is_empty() {
                    break;
                }
                if self.finished.is_empty() {
                    super::recovery::recover(&mut self);
                    continue;
                }
                // Another stack already accepted; the blocked ones lose.
                self.blocked.clear();
                break;
            }

            let idx = self
                .heads
                .iter()
                .enumerate()
                .min_by_key(|(_, h)| (u32::from(h.position.bytes), h.order))
                .map(|(i, _)| i)
                .unwrap_or(0);
            self.step(idx);
            self.merge_heads();
        }

        let best = self
            .finished
            .iter()
            .enumerate()
            .min_by_key(|(_, f)| (f.error_cost, f.order))
            .map(|(i, _)| i);
        match best {
            Some(i) => Ok(self.finished.swap_remove(i).root),
            // Unreachable with a validated table; produce an empty root
            // rather than panicking.
            None => Ok(Subtree::internal(
                self.table.start_symbol(),
                None,
                Vec::new(),
                start_state,
            )),
        }
    }

    // =========================================================================
    // Scheduling and stepping
    // =========================================================================

    /// Advance one head by one token.
    fn step(&mut self, idx: usize) {
        let mut head = self.heads.swap_remove(idx);

        // Whole-subtree reuse is only sound while parsing is deterministic.
        if self.heads.is_empty() && self.blocked.is_empty() {
            self.splice_reusable(&mut head);
        }

        let group = self.token_group(head.position, head.state);
        for extra in &group.extras {
            head.top = self.arena.push(Some(head.top), head.state, Some(extra.clone()));
            head.position += extra.total();
        }

        match self.consume_token(&mut head, &group, true) {
            StepOutcome::Advanced => self.heads.push(head),
            StepOutcome::Blocked => self.blocked.push(Blocked {
                head,
                token: group.token,
                padding: group.padding,
            }),
            StepOutcome::Finished => {}
        }
    }

    /// Run the reduce loop for one token until it is shifted, accepted, or
    /// no action applies. With `fork` set, secondary actions spawn heads.
    fn consume_token(&mut self, head: &mut Head, group: &TokenGroup, fork: bool) -> StepOutcome {
        let token = group.token;
        for _ in 0..MAX_REDUCTIONS_PER_TOKEN {
            let actions = self.table.state(head.state).actions_for(token.symbol);
            let Some(&first) = actions.first() else {
                return StepOutcome::Blocked;
            };

            if fork && actions.len() > 1 {
                let rest: Vec<Action> = actions[1..].to_vec();
                for action in rest {
                    self.fork(head, action, group);
                }
            }

            match first {
                Action::Shift { state } => {
                    let leaf = self.make_leaf(head, group);
                    head.top = self.arena.push(Some(head.top), state, Some(leaf));
                    head.position += group.padding + token.size();
                    head.state = state;
                    return StepOutcome::Advanced;
                }
                Action::Reduce { production } => {
                    if !self.reduce(head, production) {
                        return StepOutcome::Blocked;
                    }
                }
                Action::Accept => {
                    let root = self.assemble_root(head);
                    self.finished.push(Finished {
                        root,
                        error_cost: head.error_cost,
                        order: head.order,
                    });
                    return StepOutcome::Finished;
                }
            }
        }
        trace!(state = head.state, "reduction loop bound exceeded");
        StepOutcome::Blocked
    }

    /// Spawn a head applying `action`, sharing the current stack prefix.
    fn fork(&mut self, head: &Head, action: Action, group: &TokenGroup) {
        if self.heads.len() + self.blocked.len() >= MAX_HEADS {
            trace!(state = head.state, "head limit reached, dropping fork");
            return;
        }
        let mut forked = head.clone();
        forked.order = self.next_order();
        trace!(
            state = forked.state,
            position = u32::from(forked.position.bytes),
            "forking on conflict"
        );
        match action {
            Action::Shift { state } => {
                let leaf = self.make_leaf(&forked, group);
                forked.top = self.arena.push(Some(forked.top), state, Some(leaf));
                forked.position += group.padding + group.token.size();
                forked.state = state;
                self.heads.push(forked);
            }
            Action::Reduce { production } => {
                // The fork stays at the same position and re-enters
                // scheduling to finish its own reduce chain.
                if self.reduce(&mut forked, production) {
                    self.heads.push(forked);
                }
            }
            Action::Accept => {
                let root = self.assemble_root(&forked);
                self.finished.push(Finished {
                    root,
                    error_cost: forked.error_cost,
                    order: forked.order,
                });
            }
        }
    }

    /// Build (or reuse) the leaf for the group's token.
    fn make_leaf(&mut self, head: &Head, group: &TokenGroup) -> Subtree {
        let token = group.token;
        if let Some(cursor) = &self.reuse {
            if let Some(old) = cursor.leaf_at(head.position, head.state) {
                let data = old.data();
                if data.symbol == token.symbol
                    && data.padding == group.padding
                    && data.size == token.size()
                    && data.lookahead_bytes == token.lookahead_bytes
                    && !data.is_extra
                {
                    trace!(
                        position = u32::from(head.position.bytes),
                        symbol = %self.table.symbol_name(token.symbol),
                        "reusing verified leaf"
                    );
                    return old;
                }
            }
        }
        Subtree::leaf(
            token.symbol,
            group.padding,
            token.size(),
            token.lookahead_bytes,
            head.state,
        )
    }

    // =========================================================================
    // Reductions and root assembly
    // =========================================================================

    /// Pop one production's worth of subtrees, build the node, follow the
    /// goto. Returns false when the table and stack disagree (only possible
    /// with a foreign table that passed validation but lies about its
    /// automaton; the head is then abandoned to recovery).
    pub(crate) fn reduce(&mut self, head: &mut Head, production_id: u16) -> bool {
        let production = self.table.production(production_id);
        let count = production.rhs.len();
        let lhs = production.lhs;
        let fields = production.fields.clone();
        let aliases = production.aliases.clone();

        let mut popped: Vec<Subtree> = Vec::new();
        let mut non_extra = 0usize;
        let mut top = head.top;
        while non_extra < count {
            let frame = self.arena.frame(top);
            let Some(subtree) = &frame.subtree else {
                return false;
            };
            if !subtree.data().is_extra && !subtree.data().is_error {
                non_extra += 1;
            }
            popped.push(subtree.clone());
            let Some(parent) = frame.parent else {
                return false;
            };
            top = parent;
        }
        popped.reverse();

        let base_state = self.arena.frame(top).state;
        let mut children: Vec<Subtree> = Vec::with_capacity(popped.len());
        let mut slot = 0usize;
        for subtree in popped {
            let data = subtree.data();
            if data.is_extra || data.is_error {
                children.push(subtree);
                continue;
            }
            let field = fields.get(slot).copied().flatten();
            let alias = aliases.get(slot).copied().flatten();
            slot += 1;
            if self.table.symbol_is_hidden(subtree.symbol()) && data.production.is_some() {
                // Hidden rules dissolve: their children take their place,
                // inheriting this slot's annotations unless they carry
                // their own.
                for grandchild in subtree.children() {
                    let grand = grandchild.data();
                    if grand.is_extra || grand.is_error {
                        children.push(grandchild.clone());
                    } else {
                        children.push(grandchild.with_annotations(
                            grand.field.or(field),
                            grand.alias.or(alias),
                        ));
                    }
                }
            } else {
                children.push(subtree.with_annotations(field, alias));
            }
        }

        let node = Subtree::internal(lhs, Some(production_id), children, base_state);
        let Some(goto) = self.table.state(base_state).goto(lhs) else {
            return false;
        };
        trace!(
            production = production_id,
            lhs = %self.table.symbol_name(lhs),
            goto,
            "reduce"
        );
        head.top = self.arena.push(Some(top), goto, Some(node));
        head.state = goto;
        true
    }

    /// Collect the accepted stack into the root subtree. Leading or
    /// trailing extras and error nodes fold into the start node.
    pub(crate) fn assemble_root(&self, head: &Head) -> Subtree {
        let mut subtrees = self.arena.collect(head.top);
        if subtrees.len() == 1 {
            return subtrees.remove(0);
        }
        let core = subtrees.iter().position(|s| {
            !s.data().is_extra && !s.data().is_error && s.symbol() == self.table.start_symbol()
        });
        if let Some(idx) = core {
            let node = &subtrees[idx];
            if node.data().production.is_some() {
                let mut children: Vec<Subtree> = Vec::new();
                children.extend(subtrees[..idx].iter().cloned());
                children.extend(node.children().iter().cloned());
                children.extend(subtrees[idx + 1..].iter().cloned());
                return Subtree::internal(
                    node.symbol(),
                    node.data().production,
                    children,
                    node.entry_state(),
                );
            }
        }
        Subtree::internal(
            self.table.start_symbol(),
            None,
            subtrees,
            self.table.start_state(),
        )
    }

    // =========================================================================
    // Incremental reuse
    // =========================================================================

    /// Splice as many clean previous-tree subtrees as fit at the head's
    /// position.
    fn splice_reusable(&mut self, head: &mut Head) {
        loop {
            let Some(cursor) = &self.reuse else { return };
            let Some(subtree) = cursor.reusable_nonterminal(head.position, head.state, self.table)
            else {
                return;
            };
            let Some(goto) = self.table.state(head.state).goto(subtree.symbol()) else {
                return;
            };
            trace!(
                position = u32::from(head.position.bytes),
                symbol = %self.table.symbol_name(subtree.symbol()),
                bytes = u32::from(subtree.total().bytes),
                "splicing reused subtree"
            );
            head.position += subtree.total();
            head.top = self.arena.push(Some(head.top), goto, Some(subtree));
            head.state = goto;
        }
    }

    // =========================================================================
    // Lexing
    // =========================================================================

    /// Lex at (position, state): leading extras, then the next real token.
    /// Cached, since converging heads re-lex the same positions.
    pub(crate) fn token_group(&mut self, position: Length, state: StateId) -> TokenGroup {
        let key = (u32::from(position.bytes), state);
        if let Some(group) = self.token_cache.get(&key) {
            return group.clone();
        }

        let mut extras: Vec<Subtree> = Vec::new();
        let mut pending = Length::ZERO;
        let mut span_start = position;
        let mut lex_pos = position;
        let group = loop {
            let token = self.lex_one(lex_pos, state);
            let has_action = !self
                .table
                .state(state)
                .actions_for(token.symbol)
                .is_empty();
            if has_action || !self.table.is_extra(token.symbol) {
                break TokenGroup {
                    extras,
                    padding: pending,
                    token,
                };
            }
            if self.table.symbol_is_named(token.symbol) {
                let leaf = self.make_extra_leaf(span_start, pending, token, state);
                extras.push(leaf);
                lex_pos += token.size();
                span_start = lex_pos;
                pending = Length::ZERO;
            } else {
                pending += token.size();
                lex_pos += token.size();
            }
        };
        self.token_cache.insert(key, group.clone());
        group
    }

    fn make_extra_leaf(
        &self,
        span_start: Length,
        padding: Length,
        token: LexedToken,
        state: StateId,
    ) -> Subtree {
        if let Some(cursor) = &self.reuse {
            if let Some(old) = cursor.leaf_at(span_start, state) {
                let data = old.data();
                if data.symbol == token.symbol
                    && data.padding == padding
                    && data.size == token.size()
                    && data.lookahead_bytes == token.lookahead_bytes
                    && data.is_extra
                {
                    return old;
                }
            }
        }
        Subtree::leaf(
            token.symbol,
            padding,
            token.size(),
            token.lookahead_bytes,
            state,
        )
        .into_extra()
    }

    /// One raw lex: the external scanner first (when any of its tokens are
    /// admissible here), then the regex lexer.
    fn lex_one(&mut self, position: Length, state: StateId) -> LexedToken {
        let admissible = &self.admissible[state as usize];
        if let Some(scanner) = self.external.as_deref_mut() {
            let any_external = self
                .table
                .externals()
                .iter()
                .any(|sym| admissible.contains(*sym));
            if any_external {
                if let Some(ext) = scanner.scan(self.lexer.text(), position.bytes, admissible) {
                    let start = u32::from(position.bytes) as usize;
                    let end = start + u32::from(ext.length) as usize;
                    let ok = admissible.contains(ext.symbol)
                        && self.table.symbol_kind(ext.symbol) == Some(SymbolKind::External)
                        && end <= self.lexer.text().len()
                        && self.lexer.text().is_char_boundary(end);
                    if ok {
                        let matched = &self.lexer.text()[start..end];
                        return LexedToken {
                            symbol: ext.symbol,
                            length: ext.length,
                            point: Point::of_text(matched),
                            lookahead_bytes: ext.lookahead_bytes,
                        };
                    }
                }
            }
        }
        self.lexer.lex(position.bytes, admissible)
    }

    /// Lex with every terminal admissible; recovery uses this to find a
    /// token it can resume on.
    pub(crate) fn lex_any(&mut self, position: Length) -> LexedToken {
        self.lexer.lex(position.bytes, self.all_terminals)
    }

    /// Merge heads that converged on the same state and position, keeping
    /// the preferred one.
    fn merge_heads(&mut self) {
        let mut i = 0;
        while i < self.heads.len() {
            let mut j = i + 1;
            while j < self.heads.len() {
                let same = self.heads[i].state == self.heads[j].state
                    && self.heads[i].position.bytes == self.heads[j].position.bytes;
                if same {
                    let keep_j = self.heads[j].better_than(&self.heads[i]);
                    trace!(
                        state = self.heads[i].state,
                        position = u32::from(self.heads[i].position.bytes),
                        "merging converged stacks"
                    );
                    if keep_j {
                        self.heads.swap(i, j);
                    }
                    self.heads.swap_remove(j);
                } else {
                    j += 1;
                }
            }
            i += 1;
        }
    }

    /// Dry-run a head forward up to `bound` tokens without forking or
    /// recovery; used to score repair candidates. Returns the number of
    /// tokens consumed, or `bound + 1` if the head accepts.
    pub(crate) fn dry_run(&mut self, mut head: Head, bound: usize) -> usize {
        let mut consumed = 0;
        while consumed < bound {
            let group = self.token_group(head.position, head.state);
            for extra in &group.extras {
                head.top = self.arena.push(Some(head.top), head.state, Some(extra.clone()));
                head.position += extra.total();
            }
            match self.consume_token(&mut head, &group, false) {
                StepOutcome::Advanced => consumed += 1,
                StepOutcome::Blocked => return consumed,
                StepOutcome::Finished => {
                    // Pull the probe's accept back out of the finished set.
                    self.finished.pop();
                    return bound + 1;
                }
            }
        }
        consumed
    }
}
