//! Error types for grammar construction, table validation, and parsing.
//!
//! Malformed *source text* is never an error: the parser always returns a
//! tree, with invalid regions flagged on the nodes themselves. The types here
//! cover the conditions that are reported out-of-band instead:
//!
//! - [`GrammarError`] - a grammar description that cannot be lowered or
//!   compiled (undefined symbols, bad token patterns, no start rule);
//! - [`TableError`] - a compiled parse table that is internally inconsistent
//!   (dangling state references, unknown symbol ids), rejected before any
//!   parse attempt;
//! - [`ParseCancelled`] - cooperative cancellation observed mid-parse.

use text_size::TextSize;
use thiserror::Error;

/// Errors produced while building or compiling a grammar description.
#[derive(Debug, Error)]
pub enum GrammarError {
    /// A rule or token references a name that is never defined.
    #[error("undefined symbol `{0}`")]
    UndefinedSymbol(String),

    /// Two rules share the same name.
    #[error("duplicate rule `{0}`")]
    DuplicateRule(String),

    /// A token pattern failed to compile as an anchored regex.
    #[error("invalid pattern for token `{name}`: {message}")]
    BadPattern { name: String, message: String },

    /// A token pattern matches the empty string, which would stall the lexer.
    #[error("pattern for token `{0}` matches the empty string")]
    NullablePattern(String),

    /// An entry in `extras` does not lower to a single token.
    #[error("extra `{0}` is not a token")]
    ExtraNotToken(String),

    /// The named start rule does not exist.
    #[error("start rule `{0}` is not defined")]
    MissingStart(String),

    /// The start rule names a token, not a syntax rule.
    #[error("start rule `{0}` must be a syntax rule, not a token")]
    TokenStart(String),

    /// A defined rule can never be reached from the start rule.
    #[error("rule `{0}` is unreachable from the start rule")]
    UnreachableRule(String),

    /// A grammar description failed to deserialize.
    #[error("malformed grammar description: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The grammar defines no rules at all.
    #[error("grammar `{0}` defines no rules")]
    Empty(String),
}

/// Errors detected while validating a compiled parse table.
///
/// These indicate a bad table handed to the engine, not bad source text, and
/// are reported before any parse begins.
#[derive(Debug, Error)]
pub enum TableError {
    /// An action or goto references a state that does not exist.
    #[error("state {state} references nonexistent state {target}")]
    DanglingState { state: u32, target: u32 },

    /// An action, goto, or production references a symbol id out of range.
    #[error("unknown symbol id {0}")]
    UnknownSymbol(u16),

    /// A reduce action references a production that does not exist.
    #[error("state {state} reduces by nonexistent production {production}")]
    DanglingProduction { state: u32, production: u16 },

    /// A production's per-child metadata does not line up with its right side.
    #[error("production {0} has mismatched field or alias metadata")]
    MalformedProduction(u16),

    /// An action map is keyed by a nonterminal, or a goto by a terminal.
    #[error("state {state} uses symbol {symbol} with the wrong symbol kind")]
    WrongSymbolKind { state: u32, symbol: u16 },

    /// A terminal with shift actions has no token rule, and is not external.
    #[error("terminal `{0}` has no token rule")]
    MissingTokenRule(String),

    /// A token rule's pattern failed to compile when the table was loaded.
    #[error("token `{name}` has an uncompilable pattern: {message}")]
    BadTokenPattern { name: String, message: String },

    /// The reserved `end` and `ERROR` symbols are missing or misdeclared.
    #[error("reserved symbol {0} is missing or has the wrong kind")]
    ReservedSymbol(u16),

    /// The table's start state is out of range.
    #[error("start state {0} is out of range")]
    BadStartState(u32),

    /// A serialized table failed to deserialize.
    #[error("malformed parse table: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A parse or reparse observed its cancellation flag and stopped.
///
/// Distinct from any syntax failure: no tree is produced, and any previous
/// tree handed to the parser remains valid and untouched.
#[derive(Debug, Error)]
#[error("parse cancelled after {consumed:?} bytes")]
pub struct ParseCancelled {
    /// How far the parse had advanced when the flag was observed.
    pub consumed: TextSize,
}
