//! Foundation types for the strake engine.
//!
//! This module provides the position primitives used everywhere else:
//! - [`TextRange`], [`TextSize`] - byte offsets into source text
//! - [`Point`], [`PointRange`] - row/column positions
//! - [`Length`] - a byte distance paired with its point distance
//!
//! This module has NO dependencies on other strake modules.

mod point;

pub use point::{Length, Point, PointRange};

// Re-export text-size types for convenience
pub use text_size::{TextRange, TextSize};
