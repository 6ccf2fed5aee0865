//! The error recovery unit.
//!
//! Entered only when every live stack is blocked. The strategy, in order:
//!
//! 1. **Single-token repair.** Either insert a zero-width missing leaf for a
//!    terminal the state could shift, or wrap the offending token in an
//!    error node and skip it. Each candidate is scored by dry-running the
//!    parse a bounded number of tokens ahead (`max_recovery_lookahead`); a
//!    repair that parses the whole window (or accepts) is committed. Ties
//!    prefer insertion, then declaration order.
//! 2. **Panic mode.** Absorb tokens into one growing error node until a
//!    token with an admissible action appears, then resume.
//! 3. **Forced closure.** At end of input, reduce and insert missing leaves
//!    until the root accepts; if that stalls, the whole stack is wrapped in
//!    an error node under the start symbol.
//!
//! Recovery never fails the parse: some head always reaches the finished
//! set, and every synthesized region is flagged on the tree itself.

use tracing::{debug, trace};

use super::engine::{Blocked, Finished, ParseSession};
use super::stack::Head;
use crate::base::Length;
use crate::grammar::Action;
use crate::lexer::LexedToken;
use crate::tree::subtree::{COST_MISSING, Subtree};

/// Hard bound on forced-closure iterations; hitting it means the table
/// cannot close from here and the stack is wrapped wholesale.
const MAX_CLOSE_STEPS: usize = 256;

pub(crate) fn recover(session: &mut ParseSession<'_>) {
    // The most promising blocked head: fewest errors so far, then furthest
    // along, then earliest fork.
    let best = session
        .blocked
        .iter()
        .enumerate()
        .min_by_key(|(_, b)| {
            (
                b.head.error_cost,
                std::cmp::Reverse(u32::from(b.head.position.bytes)),
                b.head.order,
            )
        })
        .map(|(i, _)| i);
    let Some(best) = best else { return };
    let Blocked {
        head,
        token,
        padding,
    } = session.blocked.swap_remove(best);
    session.blocked.clear();

    debug!(
        position = u32::from(head.position.bytes),
        state = head.state,
        symbol = %session.table.symbol_name(token.symbol),
        "entering error recovery"
    );

    if let Some(repaired) = try_repair(session, &head, token, padding) {
        session.heads.push(repaired);
        return;
    }
    panic_mode(session, head, token, padding);
}

/// Try single-token insertion and deletion repairs, committing the best one
/// that survives the lookahead window.
fn try_repair(
    session: &mut ParseSession<'_>,
    head: &Head,
    token: LexedToken,
    padding: Length,
) -> Option<Head> {
    let bound = session.options.max_recovery_lookahead;
    let mut best: Option<(usize, Head)> = None;

    // Insertions first so they win ties.
    let shiftable: Vec<_> = session
        .table
        .state(head.state)
        .action_entries()
        .filter_map(|(symbol, actions)| {
            actions.iter().find_map(|a| match a {
                Action::Shift { state } => Some((symbol, *state)),
                _ => None,
            })
        })
        .collect();
    for (symbol, target) in shiftable {
        let mut candidate = head.clone();
        candidate.order = session.next_order();
        let missing = Subtree::missing(symbol, candidate.state);
        candidate.top = session
            .arena
            .push(Some(candidate.top), target, Some(missing));
        candidate.state = target;
        candidate.error_cost += COST_MISSING;
        let score = session.dry_run(candidate.clone(), bound);
        trace!(
            insert = %session.table.symbol_name(symbol),
            score,
            "scored insertion repair"
        );
        if best.as_ref().is_none_or(|(s, _)| score > *s) {
            best = Some((score, candidate));
        }
    }

    // Deletion: wrap the offending token and skip it.
    if !token.is_end() {
        let mut candidate = head.clone();
        candidate.order = session.next_order();
        let skipped = skipped_leaf(session, &candidate, token, padding);
        let error = Subtree::error(vec![skipped], candidate.state);
        candidate.error_cost += error.error_cost();
        candidate.position += error.total();
        candidate.top = session
            .arena
            .push(Some(candidate.top), candidate.state, Some(error));
        let score = session.dry_run(candidate.clone(), bound);
        trace!(score, "scored deletion repair");
        if best.as_ref().is_none_or(|(s, _)| score > *s) {
            best = Some((score, candidate));
        }
    }

    // A committed repair must make real progress (at least one consumed
    // token, or an accept), or recovery could stall inserting missing
    // leaves forever.
    match best {
        Some((score, candidate)) if score >= bound.max(1) => {
            debug!(score, "committing single-token repair");
            Some(candidate)
        }
        _ => None,
    }
}

/// The leaf for a token recovery decided to skip. A zero-width error token
/// (lex failure) absorbs one character so recovery always makes progress.
fn skipped_leaf(
    session: &ParseSession<'_>,
    head: &Head,
    token: LexedToken,
    padding: Length,
) -> Subtree {
    if token.is_error() && token.size().is_zero() {
        let start = u32::from((head.position + padding).bytes) as usize;
        let text = session.lexer.text();
        let char_len = text[start..].chars().next().map(char::len_utf8).unwrap_or(0);
        let size = Length::of_text(&text[start..start + char_len]);
        return Subtree::leaf(token.symbol, padding, size, 0, head.state);
    }
    Subtree::leaf(
        token.symbol,
        padding,
        token.size(),
        token.lookahead_bytes,
        head.state,
    )
}

/// Absorb tokens into one error node until something parses again.
fn panic_mode(
    session: &mut ParseSession<'_>,
    mut head: Head,
    mut token: LexedToken,
    mut padding: Length,
) {
    let mut skipped: Vec<Subtree> = Vec::new();
    loop {
        if token.is_end() {
            if !skipped.is_empty() {
                let error = Subtree::error(skipped, head.state);
                head.error_cost += error.error_cost();
                head.position += error.total();
                head.top = session
                    .arena
                    .push(Some(head.top), head.state, Some(error));
            }
            force_close(session, head);
            return;
        }

        let leaf = skipped_leaf(session, &head, token, padding);
        head.position += leaf.total();
        skipped.push(leaf);

        // Look for a token the current state can act on. Lexing with every
        // terminal admissible cannot disagree with a later state-restricted
        // lex of the same winner.
        let next = session.lex_any(head.position);
        if next.is_end() {
            token = next;
            padding = Length::ZERO;
            continue;
        }
        if !session
            .table
            .state(head.state)
            .actions_for(next.symbol)
            .is_empty()
        {
            let error = Subtree::error(std::mem::take(&mut skipped), head.state);
            debug!(
                resumed_at = u32::from(head.position.bytes),
                absorbed = error.children().len(),
                "resuming after error region"
            );
            head.error_cost += error.error_cost();
            head.top = session
                .arena
                .push(Some(head.top), head.state, Some(error));
            session.heads.push(head);
            return;
        }
        token = next;
        padding = Length::ZERO;
    }
}

/// Close the root at end of input by reducing and inserting missing leaves.
fn force_close(session: &mut ParseSession<'_>, mut head: Head) {
    for _ in 0..MAX_CLOSE_STEPS {
        let actions: Vec<Action> = session
            .table
            .state(head.state)
            .actions_for(crate::grammar::SymbolId::END)
            .to_vec();
        if actions.iter().any(|a| matches!(a, Action::Accept)) {
            let root = session.assemble_root(&head);
            let error_cost = head.error_cost;
            let order = head.order;
            session.finished.push(Finished {
                root,
                error_cost,
                order,
            });
            return;
        }
        if let Some(Action::Reduce { production }) = actions
            .iter()
            .find(|a| matches!(a, Action::Reduce { .. }))
            .copied()
        {
            if session.reduce(&mut head, production) {
                continue;
            }
            break;
        }
        // Nothing works on end-of-input; pretend the first shiftable
        // terminal was present.
        let insert = session
            .table
            .state(head.state)
            .action_entries()
            .find_map(|(symbol, actions)| {
                actions.iter().find_map(|a| match a {
                    Action::Shift { state } => Some((symbol, *state)),
                    _ => None,
                })
            });
        let Some((symbol, target)) = insert else { break };
        trace!(
            insert = %session.table.symbol_name(symbol),
            "inserting missing leaf to close the root"
        );
        let missing = Subtree::missing(symbol, head.state);
        head.error_cost += COST_MISSING;
        head.top = session.arena.push(Some(head.top), target, Some(missing));
        head.state = target;
    }

    // Could not close: the whole stack becomes one error region.
    debug!("wrapping unfinished stack in an error node");
    let subtrees = session.arena.collect(head.top);
    let error = Subtree::error(subtrees, session.table.start_state());
    let error_cost = head.error_cost + error.error_cost();
    let root = Subtree::internal(
        session.table.start_symbol(),
        None,
        vec![error],
        session.table.start_state(),
    );
    session.finished.push(Finished {
        root,
        error_cost,
        order: head.order,
    });
}
