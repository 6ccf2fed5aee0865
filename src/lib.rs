//! # strake
//!
//! An incremental, error-tolerant GLR parsing engine with a runtime grammar
//! compiler.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! parser    → GLR engine, error recovery, incremental reparse
//!   ↓
//! tree      → immutable syntax trees, nodes, edits
//!   ↓
//! lexer     → per-state DFA lexing, external scanner hook
//!   ↓
//! grammar   → rule DSL, grammar compiler, parse tables
//!   ↓
//! base      → primitives (Point, Length, TextRange)
//! ```
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use strake::grammar::rules::*;
//! use strake::{CompileOptions, GrammarBuilder, Parser};
//!
//! let mut g = GrammarBuilder::new("arith");
//! g.token("number", "[0-9]+");
//! g.rule(
//!     "expr",
//!     choice([
//!         sym("number"),
//!         prec_left(1, seq([sym("expr"), lit("+"), sym("expr")])),
//!     ]),
//! );
//! g.extra(pattern(r"[ \t\n]+"));
//!
//! let table = Arc::new(g.build("expr").unwrap().compile(&CompileOptions::default()));
//! let mut parser = Parser::new(table).unwrap();
//! let tree = parser.parse("1 + 2 + 3").unwrap();
//! assert!(!tree.has_error());
//! ```
//!
//! Parsing never fails on malformed source: the tree always comes back,
//! with unparseable regions marked by error and missing nodes. Editing and
//! reparsing reuses every subtree the edit left alone.

// ============================================================================
// MODULES (dependency order: base → grammar → lexer → tree → parser)
// ============================================================================

/// Foundation types: Point, Length, TextRange
pub mod base;

/// Grammar descriptions, the rule DSL, and the table compiler
pub mod grammar;

/// Runtime lexer and the external scanner hook
pub mod lexer;

/// Immutable syntax trees, nodes, and text edits
pub mod tree;

/// The GLR parser engine and incremental reparse entry points
pub mod parser;

mod error;

// Re-export the common surface
pub use base::{Length, Point, PointRange, TextRange, TextSize};
pub use error::{GrammarError, ParseCancelled, TableError};
pub use grammar::{
    Assoc, CompileOptions, FieldId, GrammarBuilder, ParseTable, RuleExpr, SymbolId,
};
pub use lexer::{ExternalScanner, ExternalToken};
pub use parser::{ParseOptions, Parser};
pub use tree::{InputEdit, Node, NodeId, Tree};
