//! SLR(1) table construction with precedence-directed conflict resolution.
//!
//! The compiler builds the LR(0) canonical collection over the lowered
//! productions, places reduce actions on FOLLOW sets, and resolves
//! shift/reduce and reduce/reduce conflicts with declared precedence and
//! associativity. Conflicts that neither resolves are kept as multiple
//! actions on the same entry; the engine forks a parse stack per action.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use super::table::{Action, ParseState, ParseTable, StateId};
use super::token_set::TokenSet;
use super::{Assoc, Grammar, SymbolId, SymbolKind};

/// Knobs for conflict resolution left open by grammar authors.
///
/// With both defaults on, compiled tables are fully deterministic and the
/// engine never forks: undeclared shift/reduce conflicts prefer the shift
/// (extending the current construct), undeclared reduce/reduce conflicts
/// prefer the earlier-declared production. Turning either off keeps the
/// conflicting actions in the table for the GLR engine to explore.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub prefer_shift: bool,
    pub reduce_reduce_by_order: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            prefer_shift: true,
            reduce_reduce_by_order: true,
        }
    }
}

impl CompileOptions {
    pub fn prefer_shift(mut self, yes: bool) -> Self {
        self.prefer_shift = yes;
        self
    }

    pub fn reduce_reduce_by_order(mut self, yes: bool) -> Self {
        self.reduce_reduce_by_order = yes;
        self
    }
}

/// An LR(0) item: a production with a dot position.
///
/// `prod == AUGMENTED` refers to the synthetic `start' := start` production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct Item {
    prod: u32,
    dot: u32,
}

const AUGMENTED: u32 = u32::MAX;

struct Builder<'g> {
    grammar: &'g Grammar,
    options: &'g CompileOptions,
    nullable: Vec<bool>,
    first: Vec<TokenSet>,
    follow: Vec<TokenSet>,
    /// Productions grouped by left-hand symbol.
    by_lhs: FxHashMap<SymbolId, Vec<u32>>,
}

pub(crate) fn compile(grammar: &Grammar, options: &CompileOptions) -> ParseTable {
    let mut by_lhs: FxHashMap<SymbolId, Vec<u32>> = FxHashMap::default();
    for (i, production) in grammar.productions.iter().enumerate() {
        by_lhs.entry(production.lhs).or_default().push(i as u32);
    }

    let mut builder = Builder {
        grammar,
        options,
        nullable: vec![false; grammar.symbols.len()],
        first: vec![TokenSet::new(grammar.symbols.len()); grammar.symbols.len()],
        follow: vec![TokenSet::new(grammar.symbols.len()); grammar.symbols.len()],
        by_lhs,
    };
    builder.compute_nullable();
    builder.compute_first();
    builder.compute_follow();
    builder.build_states()
}

impl<'g> Builder<'g> {
    fn rhs(&self, prod: u32) -> &[SymbolId] {
        if prod == AUGMENTED {
            std::slice::from_ref(&self.grammar.start)
        } else {
            &self.grammar.productions[prod as usize].rhs
        }
    }

    fn is_nonterminal(&self, symbol: SymbolId) -> bool {
        self.grammar.symbols[symbol.index()].kind == SymbolKind::NonTerminal
    }

    fn compute_nullable(&mut self) {
        let mut changed = true;
        while changed {
            changed = false;
            for production in &self.grammar.productions {
                if self.nullable[production.lhs.index()] {
                    continue;
                }
                if production.rhs.iter().all(|s| self.nullable[s.index()]) {
                    self.nullable[production.lhs.index()] = true;
                    changed = true;
                }
            }
        }
    }

    fn compute_first(&mut self) {
        for (i, info) in self.grammar.symbols.iter().enumerate() {
            if info.kind != SymbolKind::NonTerminal {
                self.first[i].insert(SymbolId(i as u16));
            }
        }
        let mut changed = true;
        while changed {
            changed = false;
            for production in &self.grammar.productions {
                let lhs = production.lhs.index();
                for &symbol in &production.rhs {
                    let addition = self.first[symbol.index()].clone();
                    if self.first[lhs].union_with(&addition) {
                        changed = true;
                    }
                    if !self.nullable[symbol.index()] {
                        break;
                    }
                }
            }
        }
    }

    fn compute_follow(&mut self) {
        self.follow[self.grammar.start.index()].insert(SymbolId::END);
        let mut changed = true;
        while changed {
            changed = false;
            for production in &self.grammar.productions {
                for (i, &symbol) in production.rhs.iter().enumerate() {
                    if !self.is_nonterminal(symbol) {
                        continue;
                    }
                    let mut tail_nullable = true;
                    for &after in &production.rhs[i + 1..] {
                        let addition = self.first[after.index()].clone();
                        if self.follow[symbol.index()].union_with(&addition) {
                            changed = true;
                        }
                        if !self.nullable[after.index()] {
                            tail_nullable = false;
                            break;
                        }
                    }
                    if tail_nullable {
                        let addition = self.follow[production.lhs.index()].clone();
                        if self.follow[symbol.index()].union_with(&addition) {
                            changed = true;
                        }
                    }
                }
            }
        }
    }

    fn closure(&self, kernel: &[Item]) -> Vec<Item> {
        let mut items: Vec<Item> = kernel.to_vec();
        let mut seen: FxHashMap<Item, ()> = items.iter().map(|&i| (i, ())).collect();
        let mut cursor = 0;
        while cursor < items.len() {
            let item = items[cursor];
            cursor += 1;
            let rhs = self.rhs(item.prod);
            if let Some(&next) = rhs.get(item.dot as usize) {
                if self.is_nonterminal(next) {
                    for &prod in self.by_lhs.get(&next).map(Vec::as_slice).unwrap_or(&[]) {
                        let new_item = Item { prod, dot: 0 };
                        if seen.insert(new_item, ()).is_none() {
                            items.push(new_item);
                        }
                    }
                }
            }
        }
        items.sort();
        items
    }

    fn build_states(&mut self) -> ParseTable {
        let grammar = self.grammar;
        let start_kernel = vec![Item {
            prod: AUGMENTED,
            dot: 0,
        }];

        let mut kernels: IndexMap<Vec<Item>, StateId> = IndexMap::new();
        kernels.insert(start_kernel.clone(), 0);
        let mut closures: Vec<Vec<Item>> = vec![self.closure(&start_kernel)];
        let mut cursor = 0;

        let mut states: Vec<ParseState> = Vec::new();

        while cursor < closures.len() {
            let closure = closures[cursor].clone();

            // Group items by the symbol after the dot.
            let mut transitions: IndexMap<SymbolId, Vec<Item>> = IndexMap::new();
            let mut finals: Vec<Item> = Vec::new();
            for &item in &closure {
                match self.rhs(item.prod).get(item.dot as usize) {
                    Some(&next) => transitions.entry(next).or_default().push(Item {
                        prod: item.prod,
                        dot: item.dot + 1,
                    }),
                    None => finals.push(item),
                }
            }

            let mut state = ParseState::default();

            for (symbol, kernel) in &transitions {
                let mut kernel = kernel.clone();
                kernel.sort();
                let next_id = match kernels.get(&kernel) {
                    Some(&id) => id,
                    None => {
                        let id = kernels.len() as StateId;
                        kernels.insert(kernel.clone(), id);
                        closures.push(self.closure(&kernel));
                        id
                    }
                };
                if self.is_nonterminal(*symbol) {
                    state.gotos.insert(*symbol, next_id);
                } else {
                    state
                        .actions
                        .entry(*symbol)
                        .or_default()
                        .push(Action::Shift { state: next_id });
                }
            }

            for item in finals {
                if item.prod == AUGMENTED {
                    state
                        .actions
                        .entry(SymbolId::END)
                        .or_default()
                        .push(Action::Accept);
                    continue;
                }
                let lhs = grammar.productions[item.prod as usize].lhs;
                let follow = self.follow[lhs.index()].clone();
                for terminal in follow.iter() {
                    state
                        .actions
                        .entry(terminal)
                        .or_default()
                        .push(Action::Reduce {
                            production: item.prod as u16,
                        });
                }
            }

            self.resolve_conflicts(cursor as StateId, &closure, &mut state);
            states.push(state);
            cursor += 1;
        }

        debug!(
            grammar = %grammar.name,
            states = states.len(),
            "compiled parse table"
        );

        ParseTable {
            name: grammar.name.clone(),
            symbols: grammar.symbols.clone(),
            fields: grammar.fields.clone(),
            aliases: grammar.aliases.clone(),
            token_rules: grammar.token_rules.clone(),
            productions: grammar.productions.clone(),
            extras: grammar.extras.clone(),
            externals: grammar.externals.clone(),
            states,
            start_state: 0,
            start_symbol: grammar.start,
        }
    }

    /// Apply precedence, associativity, and option-driven defaults to every
    /// multi-action entry of `state`.
    fn resolve_conflicts(&self, id: StateId, closure: &[Item], state: &mut ParseState) {
        let grammar = self.grammar;
        for (&symbol, actions) in state.actions.iter_mut() {
            if actions.len() < 2 {
                continue;
            }

            // Precedence of the construct a shift would extend: the highest
            // declared precedence among items that shift this symbol.
            let shift_prec = closure
                .iter()
                .filter(|item| {
                    item.prod != AUGMENTED
                        && self.rhs(item.prod).get(item.dot as usize) == Some(&symbol)
                })
                .filter_map(|item| grammar.productions[item.prod as usize].precedence)
                .max();

            let shift = actions
                .iter()
                .find(|a| matches!(a, Action::Shift { .. }))
                .copied();
            let accept = actions.iter().any(|a| matches!(a, Action::Accept));
            let mut reduces: Vec<u16> = actions
                .iter()
                .filter_map(|a| match a {
                    Action::Reduce { production } => Some(*production),
                    _ => None,
                })
                .collect();

            let mut keep_shift = shift.is_some();
            if shift.is_some() {
                reduces.retain(|&production| {
                    let p = &grammar.productions[production as usize];
                    match (p.precedence, shift_prec) {
                        (Some(rp), Some(sp)) if rp > sp => {
                            keep_shift = false;
                            true
                        }
                        (Some(rp), Some(sp)) if rp < sp => false,
                        (Some(_), Some(_)) => match p.assoc {
                            Some(Assoc::Left) => {
                                keep_shift = false;
                                true
                            }
                            Some(Assoc::Right) => false,
                            None => !self.options.prefer_shift,
                        },
                        _ => !self.options.prefer_shift,
                    }
                });
            }

            if reduces.len() > 1 {
                let best_prec = reduces
                    .iter()
                    .filter_map(|&p| grammar.productions[p as usize].precedence)
                    .max();
                if let Some(best) = best_prec {
                    reduces.retain(|&p| {
                        grammar.productions[p as usize].precedence == Some(best)
                    });
                }
                if reduces.len() > 1 && self.options.reduce_reduce_by_order {
                    reduces.truncate(1);
                }
            }

            let before = actions.len();
            actions.clear();
            if accept {
                actions.push(Action::Accept);
            }
            if keep_shift {
                if let Some(shift_action) = shift {
                    actions.push(shift_action);
                }
            }
            for production in reduces {
                actions.push(Action::Reduce { production });
            }
            if actions.is_empty() {
                // Resolution dropped everything (a lone reduce lost to a
                // pruned shift); fall back to the original shift.
                if let Some(shift_action) = shift {
                    actions.push(shift_action);
                }
            }
            if actions.len() != before {
                trace!(
                    state = id,
                    symbol = %grammar.symbols[symbol.index()].name,
                    before,
                    after = actions.len(),
                    "resolved conflict"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::rules::*;
    use super::*;
    use crate::grammar::GrammarBuilder;

    fn arith_table() -> ParseTable {
        let mut g = GrammarBuilder::new("arith");
        g.token("number", "[0-9]+");
        g.rule(
            "expr",
            choice([
                sym("number"),
                prec_left(1, seq([sym("expr"), lit("+"), sym("expr")])),
            ]),
        );
        g.build("expr").unwrap().compile(&CompileOptions::default())
    }

    #[test]
    fn test_table_validates() {
        let table = arith_table();
        table.validate().unwrap();
        assert!(table.state_count() > 3);
    }

    #[test]
    fn test_left_assoc_resolves_to_reduce() {
        let table = arith_table();
        let plus = table.symbol("+").unwrap();
        // In the state after `expr '+' expr`, seeing another '+' must reduce
        // (left associativity), and the entry must be deterministic.
        let mut saw_reduce_entry = false;
        for state in &table.states {
            let actions = state.actions_for(plus);
            if actions
                .iter()
                .any(|a| matches!(a, Action::Reduce { .. }))
            {
                assert_eq!(actions.len(), 1, "conflict left unresolved: {actions:?}");
                saw_reduce_entry = true;
            }
        }
        assert!(saw_reduce_entry);
    }

    #[test]
    fn test_accept_reachable() {
        let table = arith_table();
        let accepts = table
            .states
            .iter()
            .flat_map(|s| s.actions_for(SymbolId::END))
            .filter(|a| matches!(a, Action::Accept))
            .count();
        assert_eq!(accepts, 1);
    }

    #[test]
    fn test_undeclared_conflict_prefers_shift_by_default() {
        // dangling-else shaped grammar
        let mut g = GrammarBuilder::new("ifelse");
        g.token("e", "e");
        g.rule(
            "stmt",
            choice([
                seq([lit("if"), sym("stmt")]),
                seq([lit("if"), sym("stmt"), lit("else"), sym("stmt")]),
                sym("e"),
            ]),
        );
        let table = g
            .build("stmt")
            .unwrap()
            .compile(&CompileOptions::default());
        table.validate().unwrap();
        let else_sym = table.symbol("else").unwrap();
        for state in &table.states {
            let actions = state.actions_for(else_sym);
            if actions.len() > 1 {
                panic!("shift preference should have pruned: {actions:?}");
            }
        }
    }
}
