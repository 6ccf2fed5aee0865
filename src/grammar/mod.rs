//! Grammar descriptions and their compiled form.
//!
//! A grammar is described with the rule DSL in [`rules`] (sequences, choices,
//! repetition, precedence, fields, aliases), collected by a
//! [`GrammarBuilder`], lowered into flat productions ([`Grammar`]), and
//! compiled into a [`ParseTable`] that the parser engine drives.
//!
//! ```text
//! RuleExpr DSL  --builder-->  Grammar (flat productions)
//!                                 |
//!                              compile (LR item sets)
//!                                 v
//!                             ParseTable (states + actions)
//! ```
//!
//! Rule names starting with `_` are hidden: they parse normally but their
//! nodes are spliced into the parent's child list. Tokens declared in
//! `extras` may appear between any two tokens; named extras become extra
//! nodes, unnamed ones become padding on the following token.

mod builder;
mod compile;
pub mod json;
pub(crate) mod pattern;
pub mod rules;
mod table;
mod token_set;

pub use builder::GrammarBuilder;
pub use compile::CompileOptions;
pub use rules::RuleExpr;
pub use table::{Action, ParseState, ParseTable, StateId};
pub use token_set::TokenSet;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::GrammarError;

/// Identifies a terminal or nonterminal symbol within one grammar.
///
/// Ids 0 and 1 are reserved: 0 is the `end` terminal the lexer produces at
/// end of input, 1 is the `ERROR` symbol recovery wraps unparseable input in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct SymbolId(pub u16);

impl SymbolId {
    /// The end-of-input terminal.
    pub const END: SymbolId = SymbolId(0);
    /// The error symbol produced by recovery.
    pub const ERROR: SymbolId = SymbolId(1);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What kind of symbol an id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    /// Matched by a token rule (or reserved: `end`, `ERROR`).
    Terminal,
    /// Derived by productions.
    NonTerminal,
    /// Matched by the grammar's external scanner.
    External,
}

/// Per-symbol metadata carried by the grammar and its compiled table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub name: SmolStr,
    pub kind: SymbolKind,
    /// Named symbols appear in S-expressions and named-child iteration;
    /// anonymous ones (literal tokens) are structural.
    pub named: bool,
    /// Hidden symbols never appear as tree nodes; their children are spliced
    /// into the parent.
    pub hidden: bool,
}

/// Operator associativity for conflict resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Assoc {
    Left,
    Right,
}

/// Identifies a field name declared by the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldId(pub u16);

impl FieldId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A context-dependent rename attached to one production child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasSpec {
    pub name: SmolStr,
    pub named: bool,
}

/// A single token rule: terminal symbol, anchored regex, lexical priority.
///
/// Priority breaks longest-match ties; literal tokens default to priority 1
/// so keywords beat identifier patterns of the same length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRule {
    pub symbol: SymbolId,
    pub pattern: SmolStr,
    pub priority: i32,
}

/// One flat production: `lhs := rhs[0] rhs[1] ...`.
///
/// `fields` and `aliases` run parallel to `rhs`, naming or renaming the
/// child produced at each position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Production {
    pub lhs: SymbolId,
    pub rhs: Vec<SymbolId>,
    pub precedence: Option<i32>,
    pub assoc: Option<Assoc>,
    pub fields: Vec<Option<FieldId>>,
    pub aliases: Vec<Option<u16>>,
}

/// A validated, lowered grammar description: the input to table compilation.
///
/// Produced by [`GrammarBuilder::build`]; immutable afterwards.
#[derive(Debug, Clone)]
pub struct Grammar {
    pub(crate) name: SmolStr,
    pub(crate) symbols: Vec<SymbolInfo>,
    pub(crate) fields: Vec<SmolStr>,
    pub(crate) aliases: Vec<AliasSpec>,
    pub(crate) token_rules: Vec<TokenRule>,
    pub(crate) productions: Vec<Production>,
    pub(crate) extras: Vec<SymbolId>,
    pub(crate) externals: Vec<SymbolId>,
    pub(crate) start: SymbolId,
}

impl Grammar {
    /// The grammar's declared name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a symbol id by name.
    pub fn symbol(&self, name: &str) -> Option<SymbolId> {
        self.symbols
            .iter()
            .position(|s| s.name == name)
            .map(|i| SymbolId(i as u16))
    }

    /// The start symbol the parser derives.
    pub fn start_symbol(&self) -> SymbolId {
        self.start
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    /// Compile this grammar into a parse table.
    ///
    /// Compilation itself cannot fail once a grammar has been built; all
    /// description-level problems are caught by [`GrammarBuilder::build`].
    pub fn compile(&self, options: &CompileOptions) -> ParseTable {
        compile::compile(self, options)
    }
}

/// Build and compile a grammar in one step, with default options.
pub fn compile_grammar(builder: GrammarBuilder, start: &str) -> Result<ParseTable, GrammarError> {
    let grammar = builder.build(start)?;
    Ok(grammar.compile(&CompileOptions::default()))
}
