//! The parser: public entry points over the GLR engine.
//!
//! A [`Parser`] loads one compiled table (validating it first), owns the
//! compiled token DFAs and per-state admissible sets, and exposes two
//! operations:
//!
//! - [`Parser::parse`] - parse source text from scratch;
//! - [`Parser::reparse`] - parse new text against a previous tree and the
//!   edit that produced it, reusing every subtree the edit left alone.
//!
//! Both always return a tree for any input; syntax problems surface as
//! error and missing nodes inside it. The only failures reported out of
//! band are a bad table at load time and cooperative cancellation.
//!
//! A `Parser` is cheap to create per thread: independent parses over the
//! same shared table need no synchronization.

mod engine;
mod recovery;
mod reuse;
mod stack;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tracing::debug;

use crate::base::Length;
use crate::error::{ParseCancelled, TableError};
use crate::grammar::{ParseTable, SymbolId, SymbolKind, TokenSet};
use crate::lexer::{ExternalScanner, Lexer, TokenDfa, build_token_dfas};
use crate::tree::{InputEdit, Tree};
use engine::ParseSession;
use reuse::ReuseCursor;

/// Tunable parsing behavior.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// How many tokens a single-token repair must parse through before the
    /// recovery unit commits to it. Larger values recover more carefully on
    /// pathological input at some latency cost.
    pub max_recovery_lookahead: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_recovery_lookahead: 3,
        }
    }
}

impl ParseOptions {
    pub fn max_recovery_lookahead(mut self, tokens: usize) -> Self {
        self.max_recovery_lookahead = tokens;
        self
    }
}

/// An incremental parser for one grammar.
pub struct Parser {
    table: Arc<ParseTable>,
    dfas: Vec<TokenDfa>,
    admissible: Vec<TokenSet>,
    all_terminals: TokenSet,
    options: ParseOptions,
    external: Option<Box<dyn ExternalScanner>>,
    cancel: Option<Arc<AtomicBool>>,
}

impl Parser {
    /// Load a compiled table. The table is validated and its token patterns
    /// compiled before any parse can run; a malformed table is rejected
    /// here, never mid-parse.
    pub fn new(table: Arc<ParseTable>) -> Result<Parser, TableError> {
        table.validate()?;
        let dfas = build_token_dfas(&table)?;

        let symbol_count = table.symbol_count();
        let mut admissible = Vec::with_capacity(table.state_count());
        for id in 0..table.state_count() {
            let mut set = TokenSet::new(symbol_count);
            for (symbol, _) in table.state(id as u32).action_entries() {
                set.insert(symbol);
            }
            for &extra in table.extras() {
                set.insert(extra);
            }
            admissible.push(set);
        }

        let mut all_terminals = TokenSet::new(symbol_count);
        for i in 0..symbol_count {
            let symbol = SymbolId(i as u16);
            if table.symbol_kind(symbol) != Some(SymbolKind::NonTerminal) {
                all_terminals.insert(symbol);
            }
        }

        debug!(
            grammar = table.name(),
            states = table.state_count(),
            tokens = dfas.len(),
            "loaded grammar table"
        );

        Ok(Parser {
            table,
            dfas,
            admissible,
            all_terminals,
            options: ParseOptions::default(),
            external: None,
            cancel: None,
        })
    }

    /// The table this parser drives.
    pub fn table(&self) -> &Arc<ParseTable> {
        &self.table
    }

    pub fn set_options(&mut self, options: ParseOptions) -> &mut Self {
        self.options = options;
        self
    }

    /// Install (or remove) the external scanner for grammar-declared
    /// external tokens.
    pub fn set_external_scanner(&mut self, scanner: Option<Box<dyn ExternalScanner>>) -> &mut Self {
        self.external = scanner;
        self
    }

    /// Install a cancellation flag, checked between tokens. Setting the
    /// flag makes in-flight parses return [`ParseCancelled`]; previously
    /// produced trees are unaffected.
    pub fn set_cancel_flag(&mut self, flag: Option<Arc<AtomicBool>>) -> &mut Self {
        self.cancel = flag;
        self
    }

    /// Parse `text` from scratch.
    pub fn parse(&mut self, text: &str) -> Result<Tree, ParseCancelled> {
        self.run(text, None)
    }

    /// Parse `text` incrementally against the tree for the previous text
    /// and the edit that turned the previous text into `text`.
    ///
    /// Subtrees the edit could not affect are reused by reference. An edit
    /// that leaves token boundaries outside its span intact yields a tree
    /// node-for-node identical to parsing `text` from scratch.
    pub fn reparse(
        &mut self,
        text: &str,
        old_tree: &Tree,
        edit: &InputEdit,
    ) -> Result<Tree, ParseCancelled> {
        if !Arc::ptr_eq(old_tree.grammar(), &self.table) {
            return self.parse(text);
        }
        let edited = old_tree.with_edit(edit);
        self.run(text, Some((&edited, edit)))
    }

    fn run(
        &mut self,
        text: &str,
        previous: Option<(&Tree, &InputEdit)>,
    ) -> Result<Tree, ParseCancelled> {
        let lexer = Lexer::new(text, &self.dfas);
        let reuse = previous.map(|(tree, edit)| ReuseCursor::new(tree.root(), edit));
        let session = ParseSession::new(
            self.table.as_ref(),
            lexer,
            &self.admissible,
            &self.all_terminals,
            &self.options,
            self.cancel.as_deref(),
            self.external.as_deref_mut(),
            reuse,
        );
        let root = session.run()?;
        Ok(Tree::new(root, self.table.clone(), Length::of_text(text)))
    }
}
