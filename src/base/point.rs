//! Row/column positions and combined byte+point distances.
//!
//! Positions are 0-indexed. Columns count bytes within the line, not
//! characters, so column arithmetic never needs to decode the text.

use std::fmt;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};
use text_size::TextSize;

/// A position in source text (0-indexed row and byte column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub row: u32,
    pub column: u32,
}

impl Point {
    pub const ZERO: Point = Point { row: 0, column: 0 };

    pub fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }

    /// The point distance covered by `text`: rows are newline counts, the
    /// column is the byte length of the final line.
    pub fn of_text(text: &str) -> Self {
        let bytes = text.as_bytes();
        let mut row = 0u32;
        let mut last_line_start = 0usize;
        for (i, &b) in bytes.iter().enumerate() {
            if b == b'\n' {
                row += 1;
                last_line_start = i + 1;
            }
        }
        Point {
            row,
            column: (bytes.len() - last_line_start) as u32,
        }
    }
}

impl PartialOrd for Point {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Point {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.row
            .cmp(&other.row)
            .then(self.column.cmp(&other.column))
    }
}

/// Adding a point *distance*: crossing a row boundary resets the column.
impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        if rhs.row > 0 {
            Point {
                row: self.row + rhs.row,
                column: rhs.column,
            }
        } else {
            Point {
                row: self.row,
                column: self.column + rhs.column,
            }
        }
    }
}

impl AddAssign for Point {
    fn add_assign(&mut self, rhs: Point) {
        *self = *self + rhs;
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.column)
    }
}

/// A range between two points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PointRange {
    pub start: Point,
    pub end: Point,
}

impl PointRange {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    /// Check if a point falls within this range (end-exclusive).
    pub fn contains(&self, point: Point) -> bool {
        self.start <= point && point < self.end
    }
}

impl fmt::Display for PointRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A distance through source text, tracked in bytes and points together.
///
/// Tree nodes store their extents as `Length`s relative to their parent, so
/// an edit shifts everything after it without touching the nodes themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Length {
    pub bytes: TextSize,
    pub point: Point,
}

impl Length {
    pub const ZERO: Length = Length {
        bytes: TextSize::new(0),
        point: Point::ZERO,
    };

    pub fn new(bytes: TextSize, point: Point) -> Self {
        Self { bytes, point }
    }

    /// The length of `text` in both dimensions.
    pub fn of_text(text: &str) -> Self {
        Self {
            bytes: TextSize::of(text),
            point: Point::of_text(text),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.bytes == TextSize::new(0)
    }
}

impl Add for Length {
    type Output = Length;

    fn add(self, rhs: Length) -> Length {
        Length {
            bytes: self.bytes + rhs.bytes,
            point: self.point + rhs.point,
        }
    }
}

impl AddAssign for Length {
    fn add_assign(&mut self, rhs: Length) {
        *self = *self + rhs;
    }
}
