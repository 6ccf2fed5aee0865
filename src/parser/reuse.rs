//! Locating reusable subtrees during an incremental reparse.
//!
//! The cursor walks the *edited* previous tree (extents already mapped to
//! new-text coordinates by `Tree::with_edit`) looking for subtrees that
//! start exactly at the engine's current position. In new-text coordinates
//! the region the edit may have influenced is `start_byte..new_end_byte`,
//! widened on the left by each subtree's recorded lexer lookahead.
//!
//! Two flavors of reuse:
//!
//! - whole-subtree splice: a clean, error-free nonterminal whose recorded
//!   entry state matches the live stack state is pushed without re-lexing
//!   its contents;
//! - verified leaf reuse: a leaf at the right position and entry state is
//!   compared against the freshly lexed token, and when identical the
//!   original allocation is spliced so node identity survives the edit.

use crate::base::Length;
use crate::grammar::{ParseTable, StateId, SymbolId, SymbolKind};
use crate::tree::InputEdit;
use crate::tree::subtree::Subtree;

pub(crate) struct ReuseCursor<'t> {
    root: &'t Subtree,
    /// Start of the replaced range (same in old and new coordinates).
    dirty_start: u64,
    /// End of the replacement, in new-text coordinates.
    dirty_end: u64,
}

impl<'t> ReuseCursor<'t> {
    pub fn new(root: &'t Subtree, edit: &InputEdit) -> Self {
        Self {
            root,
            dirty_start: u64::from(u32::from(edit.start_byte)),
            dirty_end: u64::from(u32::from(edit.new_end_byte)),
        }
    }

    /// True if nothing in `span_start..span_end + lookahead` overlaps the
    /// edited range.
    fn is_clean(&self, span_start: u64, span_end: u64, lookahead: u32) -> bool {
        span_end + u64::from(lookahead) <= self.dirty_start || span_start >= self.dirty_end
    }

    /// A clean nonterminal starting exactly at `position` that the parser,
    /// sitting in `state`, could have produced itself.
    pub fn reusable_nonterminal(
        &self,
        position: Length,
        state: StateId,
        table: &ParseTable,
    ) -> Option<Subtree> {
        let mut node = self.root;
        let mut abs = Length::ZERO;
        loop {
            let start = u64::from(u32::from(abs.bytes));
            let end = u64::from(u32::from((abs + node.total()).bytes));
            if abs.bytes == position.bytes {
                let data = node.data();
                let usable = self.is_clean(start, end, data.lookahead_bytes)
                    && data.error_cost == 0
                    && data.production.is_some()
                    && !data.is_extra
                    && data.entry_state == state
                    && !node.total().is_zero()
                    && table.symbol_kind(data.symbol) == Some(SymbolKind::NonTerminal);
                if usable {
                    return Some(node.clone());
                }
            }
            node = descend(node, &mut abs, position)?;
        }
    }

    /// A leaf starting exactly at `position` with the given entry state,
    /// for verified reuse. The caller compares it against the fresh lex
    /// result before splicing, so no cleanliness check is needed here.
    pub fn leaf_at(&self, position: Length, state: StateId) -> Option<Subtree> {
        let mut node = self.root;
        let mut abs = Length::ZERO;
        loop {
            if node.is_leaf() {
                let data = node.data();
                let usable = abs.bytes == position.bytes
                    && !data.is_missing
                    && data.symbol != SymbolId::ERROR
                    && data.entry_state == state
                    && !node.total().is_zero();
                return usable.then(|| node.clone());
            }
            node = descend(node, &mut abs, position)?;
        }
    }
}

/// Step into the child whose span contains `position`, advancing `abs` to
/// that child's start.
fn descend<'t>(node: &'t Subtree, abs: &mut Length, position: Length) -> Option<&'t Subtree> {
    for child in node.children() {
        let end = *abs + child.total();
        if position.bytes < end.bytes {
            return Some(child);
        }
        *abs = end;
    }
    None
}
