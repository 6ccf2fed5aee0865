//! The internal tree representation.
//!
//! A `Subtree` is an immutable, atomically reference-counted node. All
//! extents are stored *relative* (a leading padding plus a content size), so
//! a subtree never knows its absolute position: that is computed by the
//! public `Node` view walking down from the root. Relative storage is what
//! makes structural sharing work across edits; everything after an edit
//! shifts without being touched.
//!
//! Every subtree also records what the parser knew when it built it: the
//! automaton state it started in and how far past its end the lexer looked.
//! The reparse controller uses both to decide whether the subtree can be
//! spliced into a later parse unchanged.

use std::sync::Arc;

use crate::base::Length;
use crate::grammar::{FieldId, StateId, SymbolId};

/// Cost of a synthesized missing leaf.
pub(crate) const COST_MISSING: u32 = 110;
/// Base cost of an error node, plus a small amount per absorbed token.
pub(crate) const COST_ERROR_NODE: u32 = 100;
pub(crate) const COST_PER_SKIPPED: u32 = 10;

#[derive(Debug, Clone)]
pub(crate) struct Subtree(Arc<SubtreeData>);

#[derive(Debug, Clone)]
pub(crate) struct SubtreeData {
    pub symbol: SymbolId,
    /// The production that built this node; `None` for leaves, error nodes,
    /// and synthesized wrappers.
    pub production: Option<u16>,
    /// Extras and whitespace preceding the content.
    pub padding: Length,
    pub size: Length,
    /// Bytes the lexer examined beyond this subtree's end.
    pub lookahead_bytes: u32,
    /// Automaton state the parser was in when this subtree began.
    pub entry_state: StateId,
    /// Total cost of errors inside; zero means pristine.
    pub error_cost: u32,
    pub is_error: bool,
    pub is_missing: bool,
    pub is_extra: bool,
    /// Field annotation assigned by the parent production.
    pub field: Option<FieldId>,
    /// Alias annotation assigned by the parent production.
    pub alias: Option<u16>,
    pub children: Vec<Subtree>,
}

impl Subtree {
    pub fn leaf(
        symbol: SymbolId,
        padding: Length,
        size: Length,
        lookahead_bytes: u32,
        entry_state: StateId,
    ) -> Subtree {
        Subtree(Arc::new(SubtreeData {
            symbol,
            production: None,
            padding,
            size,
            lookahead_bytes,
            entry_state,
            error_cost: 0,
            is_error: false,
            is_missing: false,
            is_extra: false,
            field: None,
            alias: None,
            children: Vec::new(),
        }))
    }

    /// A zero-width leaf standing in for an expected-but-absent token.
    pub fn missing(symbol: SymbolId, entry_state: StateId) -> Subtree {
        Subtree(Arc::new(SubtreeData {
            symbol,
            production: None,
            padding: Length::ZERO,
            size: Length::ZERO,
            lookahead_bytes: 0,
            entry_state,
            error_cost: COST_MISSING,
            is_error: false,
            is_missing: true,
            is_extra: false,
            field: None,
            alias: None,
            children: Vec::new(),
        }))
    }

    /// An error node wrapping the given skipped subtrees.
    pub fn error(children: Vec<Subtree>, entry_state: StateId) -> Subtree {
        let (padding, size, lookahead_bytes) = aggregate_extents(&children);
        let child_cost: u32 = children.iter().map(|c| c.error_cost()).sum();
        Subtree(Arc::new(SubtreeData {
            symbol: SymbolId::ERROR,
            production: None,
            padding,
            size,
            lookahead_bytes,
            entry_state,
            error_cost: COST_ERROR_NODE + COST_PER_SKIPPED * children.len() as u32 + child_cost,
            is_error: true,
            is_missing: false,
            is_extra: false,
            field: None,
            alias: None,
            children,
        }))
    }

    /// An interior node built by reducing `production`, or a synthesized
    /// wrapper when `production` is `None`.
    pub fn internal(
        symbol: SymbolId,
        production: Option<u16>,
        children: Vec<Subtree>,
        entry_state: StateId,
    ) -> Subtree {
        let (padding, size, lookahead_bytes) = aggregate_extents(&children);
        let error_cost = children.iter().map(|c| c.error_cost()).sum();
        Subtree(Arc::new(SubtreeData {
            symbol,
            production,
            padding,
            size,
            lookahead_bytes,
            entry_state,
            error_cost,
            is_error: false,
            is_missing: false,
            is_extra: false,
            field: None,
            alias: None,
            children,
        }))
    }

    pub(crate) fn from_data(data: SubtreeData) -> Subtree {
        Subtree(Arc::new(data))
    }

    pub fn data(&self) -> &SubtreeData {
        &self.0
    }

    /// Stable identity for sharing checks: two nodes are the same allocation
    /// iff their pointers match.
    pub fn ptr(&self) -> *const SubtreeData {
        Arc::as_ptr(&self.0)
    }

    pub fn symbol(&self) -> SymbolId {
        self.0.symbol
    }

    pub fn total(&self) -> Length {
        self.0.padding + self.0.size
    }

    pub fn padding(&self) -> Length {
        self.0.padding
    }

    pub fn size(&self) -> Length {
        self.0.size
    }

    pub fn lookahead_bytes(&self) -> u32 {
        self.0.lookahead_bytes
    }

    pub fn entry_state(&self) -> StateId {
        self.0.entry_state
    }

    pub fn error_cost(&self) -> u32 {
        self.0.error_cost
    }

    pub fn is_leaf(&self) -> bool {
        self.0.production.is_none() && self.0.children.is_empty()
    }

    pub fn children(&self) -> &[Subtree] {
        &self.0.children
    }

    /// Mark this subtree as an extra (returns a copy if needed).
    pub fn into_extra(self) -> Subtree {
        if self.0.is_extra {
            return self;
        }
        let mut data = (*self.0).clone();
        data.is_extra = true;
        Subtree(Arc::new(data))
    }

    /// Attach the parent production's field/alias annotations. Shares the
    /// allocation when the annotations already match, which keeps reused
    /// subtrees identical across reparses.
    pub fn with_annotations(&self, field: Option<FieldId>, alias: Option<u16>) -> Subtree {
        if self.0.field == field && self.0.alias == alias {
            return self.clone();
        }
        let mut data = (*self.0).clone();
        data.field = field;
        data.alias = alias;
        Subtree(Arc::new(data))
    }
}

fn aggregate_extents(children: &[Subtree]) -> (Length, Length, u32) {
    let Some(first) = children.first() else {
        return (Length::ZERO, Length::ZERO, 0);
    };
    let padding = first.padding();
    let mut total = Length::ZERO;
    let mut reach = 0u64;
    for child in children {
        let child_end = u64::from(u32::from((total + child.total()).bytes));
        let child_reach = child_end + u64::from(child.lookahead_bytes());
        if child_reach > reach {
            reach = child_reach;
        }
        total += child.total();
    }
    let total_bytes = u64::from(u32::from(total.bytes));
    let lookahead = reach.saturating_sub(total_bytes) as u32;
    // The content size excludes the hoisted first-child padding.
    let size = Length {
        bytes: total.bytes - padding.bytes,
        point: strip_leading(padding.point, total.point),
    };
    (padding, size, lookahead)
}

/// The point distance left after removing a leading `prefix` from `whole`.
fn strip_leading(prefix: crate::base::Point, whole: crate::base::Point) -> crate::base::Point {
    use crate::base::Point;
    if whole.row == prefix.row {
        Point::new(0, whole.column - prefix.column)
    } else {
        Point::new(whole.row - prefix.row, whole.column)
    }
}
