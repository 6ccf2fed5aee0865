//! Text edits and tree invalidation.
//!
//! An [`InputEdit`] describes one text mutation: the byte range replaced and
//! the extent of its replacement. Applying it to a tree rebuilds only the
//! spine of subtrees whose extents the edit changes, remapping their
//! boundaries into new-text coordinates; every subtree ending at or before
//! the edit start, or starting at or after the old end, is shared untouched.
//! Positions are relative, so "after" subtrees shift for free, and walking
//! the edited tree yields new-text positions throughout.
//!
//! Whether a shared subtree is *trustworthy* for reuse (its lexer lookahead
//! might still cross into the edited range) is judged by the reparse
//! controller against the edit's byte ranges, not recorded here; that keeps
//! untouched allocations shared, which is what preserves node identity
//! across tree versions.

use serde::{Deserialize, Serialize};
use text_size::TextSize;

use super::subtree::Subtree;
use crate::base::{Length, Point};

/// A single text mutation: bytes `start..old_end` were replaced by new text
/// ending at `new_end`, with the matching row/column positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEdit {
    pub start_byte: TextSize,
    pub old_end_byte: TextSize,
    pub new_end_byte: TextSize,
    pub start_point: Point,
    pub old_end_point: Point,
    pub new_end_point: Point,
}

impl InputEdit {
    /// An edit that replaces nothing with nothing.
    pub fn noop_at(offset: TextSize, point: Point) -> Self {
        Self {
            start_byte: offset,
            old_end_byte: offset,
            new_end_byte: offset,
            start_point: point,
            old_end_point: point,
            new_end_point: point,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.start_byte == self.old_end_byte && self.start_byte == self.new_end_byte
    }

    /// Map an old-text position to its new-text position. Positions inside
    /// the replaced range collapse to the replacement's end.
    pub(crate) fn map_position(&self, position: Length) -> Length {
        if position.bytes <= self.start_byte {
            position
        } else if position.bytes >= self.old_end_byte {
            Length {
                bytes: self.new_end_byte + (position.bytes - self.old_end_byte),
                point: shift_point(position.point, self.old_end_point, self.new_end_point),
            }
        } else {
            Length {
                bytes: self.new_end_byte,
                point: self.new_end_point,
            }
        }
    }
}

/// Rebase `p` (at or after `old_end`) onto `new_end`.
fn shift_point(p: Point, old_end: Point, new_end: Point) -> Point {
    if p.row == old_end.row {
        Point::new(new_end.row, new_end.column + (p.column - old_end.column))
    } else {
        Point::new(new_end.row + (p.row - old_end.row), p.column)
    }
}

/// The distance from position `from` to position `to` (`from <= to`).
pub(crate) fn span_between(from: Length, to: Length) -> Length {
    let point = if to.point.row == from.point.row {
        Point::new(0, to.point.column - from.point.column)
    } else {
        Point::new(to.point.row - from.point.row, to.point.column)
    };
    Length {
        bytes: to.bytes - from.bytes,
        point,
    }
}

/// Rebuild the spine of subtrees whose extents `edit` changes, sharing
/// everything else. `abs` is the subtree's absolute start (including
/// padding) in the old text.
pub(crate) fn edit_subtree(subtree: &Subtree, abs: Length, edit: &InputEdit) -> Subtree {
    let end = abs + subtree.total();
    let insertion = edit.start_byte == edit.old_end_byte;

    // Entirely before the replaced range: extents are unchanged. Entirely
    // after it: unchanged too, since relative storage absorbs the shift —
    // except that a pure insertion exactly at a subtree's start lands in
    // that subtree's padding and must grow it, or the inserted bytes would
    // belong to no node at all.
    if end.bytes <= edit.start_byte {
        return subtree.clone();
    }
    if abs.bytes >= edit.old_end_byte && !(insertion && abs.bytes == edit.start_byte) {
        return subtree.clone();
    }

    let mut data = subtree.data().clone();

    if subtree.children().is_empty() {
        if insertion && abs.bytes == edit.start_byte {
            let inserted = span_between(
                Length {
                    bytes: edit.start_byte,
                    point: edit.start_point,
                },
                Length {
                    bytes: edit.new_end_byte,
                    point: edit.new_end_point,
                },
            );
            data.padding = inserted + data.padding;
        } else {
            // Leaves own their extents; remap the three boundaries.
            let content_start = abs + subtree.padding();
            let new_start = edit.map_position(abs);
            let new_content = edit.map_position(content_start);
            let new_end = edit.map_position(end);
            data.padding = span_between(new_start, new_content);
            data.size = span_between(new_content, new_end);
        }
    } else {
        let mut cursor = abs;
        let mut children = Vec::with_capacity(data.children.len());
        for child in subtree.children() {
            let edited = edit_subtree(child, cursor, edit);
            cursor += child.total();
            children.push(edited);
        }
        // Recompute extents from the adjusted children.
        let mut total = Length::ZERO;
        for child in &children {
            total += child.total();
        }
        let padding = children.first().map(|c| c.padding()).unwrap_or(Length::ZERO);
        data.padding = padding;
        data.size = span_between(padding, total);
        data.children = children;
    }

    Subtree::from_data(data)
}
