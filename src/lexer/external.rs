//! The external scanner hook.
//!
//! Some tokens cannot be expressed as a regular expression: indentation
//! blocks, heredoc bodies, nested comment syntaxes. A grammar declares such
//! tokens with [`GrammarBuilder::external`], and the host supplies a scanner
//! implementing [`ExternalScanner`]. Whenever any declared external token is
//! admissible at the current position, the engine consults the scanner
//! before the regex lexer; a scanner match wins.
//!
//! [`GrammarBuilder::external`]: crate::grammar::GrammarBuilder::external

use text_size::TextSize;

use crate::grammar::{SymbolId, TokenSet};

/// A token produced by an external scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalToken {
    /// Which external symbol matched. Must be one of the admissible kinds
    /// the scanner was offered; others are discarded.
    pub symbol: SymbolId,
    /// Matched length in bytes from the scan offset. May be zero for purely
    /// contextual tokens (e.g. indent/dedent markers).
    pub length: TextSize,
    /// Bytes examined beyond the match end while deciding, for incremental
    /// invalidation. Overestimating is safe; underestimating is not.
    pub lookahead_bytes: u32,
}

/// A capability the lexer invokes for tokens regular expressions cannot
/// express.
///
/// Scanners may keep internal state between calls within one parse; a parse
/// owns its scanner exclusively, so no synchronization is needed. A scanner
/// that produces zero-width tokens must not produce the same token twice in
/// a row at one offset, or the parse cannot make progress.
pub trait ExternalScanner: Send {
    /// Attempt to match one of `admissible` at byte `offset` of `text`.
    /// Return `None` for no match.
    fn scan(&mut self, text: &str, offset: TextSize, admissible: &TokenSet)
    -> Option<ExternalToken>;
}
