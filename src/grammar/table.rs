//! The compiled parse table: the contract between the grammar compiler and
//! the parser engine.
//!
//! A table is immutable and freely shared (`Arc`) across parsers and threads.
//! Tables serialize to JSON so they can also be produced by an external
//! compiler; [`ParseTable::validate`] checks internal consistency before the
//! engine will drive one.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::{AliasSpec, Production, SymbolId, SymbolInfo, SymbolKind, TokenRule};
use crate::error::TableError;

pub type StateId = u32;

/// One admissible move for a (state, lookahead) pair.
///
/// A state may carry several actions for the same lookahead; the engine
/// forks a parse stack per action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Shift { state: StateId },
    Reduce { production: u16 },
    Accept,
}

/// One automaton state: terminal actions plus nonterminal gotos.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseState {
    pub(crate) actions: IndexMap<SymbolId, Vec<Action>>,
    pub(crate) gotos: IndexMap<SymbolId, StateId>,
}

impl ParseState {
    pub(crate) fn actions_for(&self, symbol: SymbolId) -> &[Action] {
        self.actions.get(&symbol).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn goto(&self, symbol: SymbolId) -> Option<StateId> {
        self.gotos.get(&symbol).copied()
    }

    /// Terminal entries in declaration order.
    pub(crate) fn action_entries(&self) -> impl Iterator<Item = (SymbolId, &[Action])> {
        self.actions.iter().map(|(&s, a)| (s, a.as_slice()))
    }
}

/// A compiled, immutable parsing automaton.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseTable {
    pub(crate) name: SmolStr,
    pub(crate) symbols: Vec<SymbolInfo>,
    pub(crate) fields: Vec<SmolStr>,
    pub(crate) aliases: Vec<AliasSpec>,
    pub(crate) token_rules: Vec<TokenRule>,
    pub(crate) productions: Vec<Production>,
    pub(crate) extras: Vec<SymbolId>,
    pub(crate) externals: Vec<SymbolId>,
    pub(crate) states: Vec<ParseState>,
    pub(crate) start_state: StateId,
    pub(crate) start_symbol: SymbolId,
}

impl ParseTable {
    /// The grammar's declared name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    /// Look up a symbol id by name.
    pub fn symbol(&self, name: &str) -> Option<SymbolId> {
        self.symbols
            .iter()
            .position(|s| s.name == name)
            .map(|i| SymbolId(i as u16))
    }

    /// The declared name of a symbol; `"?"` for an out-of-range id.
    pub fn symbol_name(&self, symbol: SymbolId) -> &str {
        self.symbols
            .get(symbol.index())
            .map(|s| s.name.as_str())
            .unwrap_or("?")
    }

    pub fn symbol_is_named(&self, symbol: SymbolId) -> bool {
        self.symbols
            .get(symbol.index())
            .is_some_and(|s| s.named)
    }

    pub(crate) fn symbol_is_hidden(&self, symbol: SymbolId) -> bool {
        self.symbols
            .get(symbol.index())
            .is_some_and(|s| s.hidden)
    }

    pub(crate) fn symbol_kind(&self, symbol: SymbolId) -> Option<SymbolKind> {
        self.symbols.get(symbol.index()).map(|s| s.kind)
    }

    pub(crate) fn is_extra(&self, symbol: SymbolId) -> bool {
        self.extras.contains(&symbol)
    }

    /// Look up a field id by name.
    pub fn field(&self, name: &str) -> Option<super::FieldId> {
        self.fields
            .iter()
            .position(|f| f == name)
            .map(|i| super::FieldId(i as u16))
    }

    pub fn field_name(&self, field: super::FieldId) -> Option<&str> {
        self.fields.get(field.index()).map(SmolStr::as_str)
    }

    pub(crate) fn alias_spec(&self, alias: u16) -> Option<&AliasSpec> {
        self.aliases.get(alias as usize)
    }

    pub(crate) fn token_rules(&self) -> &[TokenRule] {
        &self.token_rules
    }

    pub(crate) fn externals(&self) -> &[SymbolId] {
        &self.externals
    }

    pub(crate) fn extras(&self) -> &[SymbolId] {
        &self.extras
    }

    pub(crate) fn state(&self, id: StateId) -> &ParseState {
        &self.states[id as usize]
    }

    pub(crate) fn production(&self, id: u16) -> &Production {
        &self.productions[id as usize]
    }

    pub(crate) fn start_state(&self) -> StateId {
        self.start_state
    }

    pub fn start_symbol(&self) -> SymbolId {
        self.start_symbol
    }

    /// Deserialize a table from JSON and validate it.
    pub fn from_json(json: &str) -> Result<Self, TableError> {
        let table: ParseTable = serde_json::from_str(json)?;
        table.validate()?;
        Ok(table)
    }

    /// Serialize the table to JSON.
    pub fn to_json(&self) -> Result<String, TableError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check internal consistency: every state, production, and symbol
    /// reference must resolve, and reserved symbols must be declared.
    ///
    /// A table that fails validation is rejected before any parse begins.
    pub fn validate(&self) -> Result<(), TableError> {
        let symbol_count = self.symbols.len();
        let state_count = self.states.len() as StateId;

        let check_symbol = |symbol: SymbolId| -> Result<(), TableError> {
            if symbol.index() >= symbol_count {
                Err(TableError::UnknownSymbol(symbol.0))
            } else {
                Ok(())
            }
        };

        for reserved in [SymbolId::END, SymbolId::ERROR] {
            let ok = self
                .symbols
                .get(reserved.index())
                .is_some_and(|s| s.kind == SymbolKind::Terminal);
            if !ok {
                return Err(TableError::ReservedSymbol(reserved.0));
            }
        }

        if self.start_state >= state_count {
            return Err(TableError::BadStartState(self.start_state));
        }
        check_symbol(self.start_symbol)?;

        for (id, state) in self.states.iter().enumerate() {
            let id = id as StateId;
            for (&symbol, actions) in &state.actions {
                check_symbol(symbol)?;
                if self.symbols[symbol.index()].kind == SymbolKind::NonTerminal {
                    return Err(TableError::WrongSymbolKind {
                        state: id,
                        symbol: symbol.0,
                    });
                }
                for action in actions {
                    match *action {
                        Action::Shift { state: target } => {
                            if target >= state_count {
                                return Err(TableError::DanglingState { state: id, target });
                            }
                        }
                        Action::Reduce { production } => {
                            if production as usize >= self.productions.len() {
                                return Err(TableError::DanglingProduction {
                                    state: id,
                                    production,
                                });
                            }
                        }
                        Action::Accept => {}
                    }
                }
            }
            for (&symbol, &target) in &state.gotos {
                check_symbol(symbol)?;
                if self.symbols[symbol.index()].kind != SymbolKind::NonTerminal {
                    return Err(TableError::WrongSymbolKind {
                        state: id,
                        symbol: symbol.0,
                    });
                }
                if target >= state_count {
                    return Err(TableError::DanglingState { state: id, target });
                }
            }
        }

        for (id, production) in self.productions.iter().enumerate() {
            check_symbol(production.lhs)?;
            for &symbol in &production.rhs {
                check_symbol(symbol)?;
            }
            if production.fields.len() != production.rhs.len()
                || production.aliases.len() != production.rhs.len()
            {
                return Err(TableError::MalformedProduction(id as u16));
            }
            for alias in production.aliases.iter().flatten() {
                if *alias as usize >= self.aliases.len() {
                    return Err(TableError::MalformedProduction(id as u16));
                }
            }
            for field in production.fields.iter().flatten() {
                if field.index() >= self.fields.len() {
                    return Err(TableError::MalformedProduction(id as u16));
                }
            }
        }

        for rule in &self.token_rules {
            check_symbol(rule.symbol)?;
        }
        for &symbol in self.extras.iter().chain(&self.externals) {
            check_symbol(symbol)?;
        }

        // Every terminal the automaton can ask for must be lexable.
        for state in &self.states {
            for &symbol in state.actions.keys() {
                if symbol == SymbolId::END || symbol == SymbolId::ERROR {
                    continue;
                }
                let info = &self.symbols[symbol.index()];
                if info.kind == SymbolKind::External {
                    continue;
                }
                if !self.token_rules.iter().any(|r| r.symbol == symbol) {
                    return Err(TableError::MissingTokenRule(info.name.to_string()));
                }
            }
        }

        Ok(())
    }
}
