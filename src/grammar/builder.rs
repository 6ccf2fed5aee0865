//! Collecting a grammar description and lowering it to flat productions.
//!
//! The builder accepts rule expressions by name, then `build` performs the
//! whole lowering pipeline:
//!
//! 1. classify rules into tokens (regex/literal bodies) and syntax rules;
//! 2. intern every symbol, literal, and inline pattern;
//! 3. flatten nested expressions into productions, generating hidden helper
//!    rules for choices, repetitions, and optionals;
//! 4. validate references, extras, the start rule, reachability, and that
//!    every token pattern compiles and cannot match the empty string.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use tracing::debug;

use super::rules::RuleExpr;
use super::{
    AliasSpec, Assoc, FieldId, Grammar, Production, SymbolId, SymbolInfo, SymbolKind, TokenRule,
    pattern,
};
use crate::error::GrammarError;

/// Accumulates a grammar description prior to lowering.
#[derive(Debug, Clone, Default)]
pub struct GrammarBuilder {
    pub(crate) name: SmolStr,
    pub(crate) rules: IndexMap<SmolStr, RuleExpr>,
    pub(crate) extras: Vec<RuleExpr>,
    pub(crate) externals: Vec<SmolStr>,
    duplicates: Vec<SmolStr>,
}

impl GrammarBuilder {
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Define a rule. A body consisting of a pattern or literal (optionally
    /// wrapped in `prec`) defines a token; anything else is a syntax rule.
    pub fn rule(&mut self, name: impl Into<SmolStr>, body: RuleExpr) -> &mut Self {
        let name = name.into();
        if self.rules.insert(name.clone(), body).is_some() {
            self.duplicates.push(name);
        }
        self
    }

    /// Define a named token with a regex pattern.
    pub fn token(&mut self, name: impl Into<SmolStr>, regex: &str) -> &mut Self {
        self.rule(name, RuleExpr::Pattern(regex.into()))
    }

    /// Define a named token with an explicit lexical priority.
    pub fn token_prec(&mut self, name: impl Into<SmolStr>, regex: &str, priority: i32) -> &mut Self {
        self.rule(
            name,
            RuleExpr::Prec {
                level: priority,
                assoc: None,
                content: Box::new(RuleExpr::Pattern(regex.into())),
            },
        )
    }

    /// Declare a token produced by the external scanner.
    pub fn external(&mut self, name: impl Into<SmolStr>) -> &mut Self {
        self.externals.push(name.into());
        self
    }

    /// Declare a token that may appear between any two tokens.
    ///
    /// Named extras become extra nodes in the tree; unnamed ones (literals
    /// and inline patterns) become padding on the following token.
    pub fn extra(&mut self, expr: RuleExpr) -> &mut Self {
        self.extras.push(expr);
        self
    }

    /// Lower the description into a validated [`Grammar`] deriving `start`.
    pub fn build(self, start: &str) -> Result<Grammar, GrammarError> {
        Lowering::run(self, start)
    }
}

/// A token rule body, before symbol assignment.
enum TokenBody {
    Regex(SmolStr),
    Text(SmolStr),
}

impl TokenBody {
    fn pattern(&self) -> SmolStr {
        match self {
            TokenBody::Regex(r) => r.clone(),
            TokenBody::Text(t) => regex_syntax::escape(t).into(),
        }
    }

    /// Literals outrank patterns at equal match length, so keywords beat
    /// identifier rules.
    fn default_priority(&self) -> i32 {
        match self {
            TokenBody::Regex(_) => 0,
            TokenBody::Text(_) => 1,
        }
    }
}

/// Splits a rule body into a token body and optional priority, when the rule
/// is token-like.
fn classify_token(body: &RuleExpr) -> Option<(TokenBody, Option<i32>)> {
    match body {
        RuleExpr::Pattern(p) => Some((TokenBody::Regex(p.clone()), None)),
        RuleExpr::Literal(t) => Some((TokenBody::Text(t.clone()), None)),
        RuleExpr::Prec { level, content, .. } => {
            classify_token(content).map(|(tok, _)| (tok, Some(*level)))
        }
        _ => None,
    }
}

/// One lowered production item with its annotations.
struct Item {
    symbol: SymbolId,
    field: Option<FieldId>,
    alias: Option<u16>,
}

/// Annotations inherited from enclosing `field`/`alias` wrappers.
#[derive(Clone, Copy, Default)]
struct ItemCtx {
    field: Option<FieldId>,
    alias: Option<u16>,
}

/// One production in progress.
#[derive(Default)]
struct AltAcc {
    items: Vec<Item>,
    prec: Option<i32>,
    assoc: Option<Assoc>,
}

struct Lowering {
    symbols: Vec<SymbolInfo>,
    fields: Vec<SmolStr>,
    aliases: Vec<AliasSpec>,
    token_rules: Vec<TokenRule>,
    productions: Vec<Production>,
    /// Rule, token, and external names.
    by_name: FxHashMap<SmolStr, SymbolId>,
    /// Inline literal text -> anonymous terminal.
    by_literal: FxHashMap<SmolStr, SymbolId>,
    /// Inline pattern source -> anonymous terminal.
    by_pattern: FxHashMap<SmolStr, SymbolId>,
    /// Structural dedup for generated helper rules.
    helpers: FxHashMap<RuleExpr, SymbolId>,
    helper_count: u32,
}

impl Lowering {
    fn run(builder: GrammarBuilder, start: &str) -> Result<Grammar, GrammarError> {
        if let Some(name) = builder.duplicates.first() {
            return Err(GrammarError::DuplicateRule(name.to_string()));
        }
        if builder.rules.is_empty() {
            return Err(GrammarError::Empty(builder.name.to_string()));
        }
        for reserved in ["end", "ERROR"] {
            if builder.rules.contains_key(reserved) {
                return Err(GrammarError::DuplicateRule(reserved.to_string()));
            }
        }

        let mut lowering = Lowering {
            symbols: vec![
                SymbolInfo {
                    name: "end".into(),
                    kind: SymbolKind::Terminal,
                    named: false,
                    hidden: false,
                },
                SymbolInfo {
                    name: "ERROR".into(),
                    kind: SymbolKind::Terminal,
                    named: true,
                    hidden: false,
                },
            ],
            fields: Vec::new(),
            aliases: Vec::new(),
            token_rules: Vec::new(),
            productions: Vec::new(),
            by_name: FxHashMap::default(),
            by_literal: FxHashMap::default(),
            by_pattern: FxHashMap::default(),
            helpers: FxHashMap::default(),
            helper_count: 0,
        };

        // Externals, then declared tokens, then syntax rules. Helper and
        // inline-literal symbols are appended as lowering discovers them.
        for name in &builder.externals {
            let id = lowering.intern_symbol(SymbolInfo {
                name: name.clone(),
                kind: SymbolKind::External,
                named: !name.starts_with('_'),
                hidden: false,
            });
            lowering.by_name.insert(name.clone(), id);
        }

        let mut token_bodies: Vec<(SymbolId, TokenBody, Option<i32>)> = Vec::new();
        let mut syntax_rules: Vec<(SmolStr, &RuleExpr)> = Vec::new();
        for (name, body) in &builder.rules {
            if let Some((tok, priority)) = classify_token(body) {
                let id = lowering.intern_symbol(SymbolInfo {
                    name: name.clone(),
                    kind: SymbolKind::Terminal,
                    named: !name.starts_with('_'),
                    hidden: false,
                });
                lowering.by_name.insert(name.clone(), id);
                token_bodies.push((id, tok, priority));
            } else {
                syntax_rules.push((name.clone(), body));
            }
        }
        for (name, _) in &syntax_rules {
            let id = lowering.intern_symbol(SymbolInfo {
                name: name.clone(),
                kind: SymbolKind::NonTerminal,
                named: !name.starts_with('_'),
                hidden: name.starts_with('_'),
            });
            lowering.by_name.insert(name.clone(), id);
        }

        for (id, tok, priority) in &token_bodies {
            lowering.token_rules.push(TokenRule {
                symbol: *id,
                pattern: tok.pattern(),
                priority: priority.unwrap_or_else(|| tok.default_priority()),
            });
        }

        for (name, body) in &syntax_rules {
            let lhs = lowering.by_name[name];
            for member in flatten_choice(body) {
                let mut acc = AltAcc::default();
                lowering.lower_into(member, &mut acc, ItemCtx::default())?;
                lowering.push_production(lhs, acc);
            }
        }

        // Extras must each lower to a bare token.
        let mut extras = Vec::new();
        for expr in &builder.extras {
            let mut acc = AltAcc::default();
            lowering.lower_into(expr, &mut acc, ItemCtx::default())?;
            let bad = acc.items.len() != 1
                || acc.items[0].field.is_some()
                || acc.items[0].alias.is_some()
                || lowering.symbols[acc.items[0].symbol.index()].kind == SymbolKind::NonTerminal;
            if bad {
                return Err(GrammarError::ExtraNotToken(format!("{expr:?}")));
            }
            extras.push(acc.items[0].symbol);
        }

        let start_id = match lowering.by_name.get(start) {
            None => return Err(GrammarError::MissingStart(start.to_string())),
            Some(&id) if lowering.symbols[id.index()].kind != SymbolKind::NonTerminal => {
                return Err(GrammarError::TokenStart(start.to_string()));
            }
            Some(&id) => id,
        };

        lowering.check_reachability(start_id, &extras, &builder)?;
        lowering.validate_patterns()?;

        let externals = builder
            .externals
            .iter()
            .map(|name| lowering.by_name[name])
            .collect();

        debug!(
            grammar = %builder.name,
            symbols = lowering.symbols.len(),
            productions = lowering.productions.len(),
            "lowered grammar"
        );

        Ok(Grammar {
            name: builder.name,
            symbols: lowering.symbols,
            fields: lowering.fields,
            aliases: lowering.aliases,
            token_rules: lowering.token_rules,
            productions: lowering.productions,
            extras,
            externals,
            start: start_id,
        })
    }

    fn intern_symbol(&mut self, info: SymbolInfo) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u16);
        self.symbols.push(info);
        id
    }

    fn literal_symbol(&mut self, text: &SmolStr) -> SymbolId {
        // A declared token whose body is this exact literal wins over a
        // fresh anonymous terminal.
        if let Some(rule) = self
            .token_rules
            .iter()
            .find(|r| r.pattern == regex_syntax::escape(text).as_str())
        {
            return rule.symbol;
        }
        if let Some(&id) = self.by_literal.get(text) {
            return id;
        }
        let id = self.intern_symbol(SymbolInfo {
            name: text.clone(),
            kind: SymbolKind::Terminal,
            named: false,
            hidden: false,
        });
        self.token_rules.push(TokenRule {
            symbol: id,
            pattern: regex_syntax::escape(text).into(),
            priority: 1,
        });
        self.by_literal.insert(text.clone(), id);
        id
    }

    fn pattern_symbol(&mut self, source: &SmolStr) -> SymbolId {
        if let Some(&id) = self.by_pattern.get(source) {
            return id;
        }
        let id = self.intern_symbol(SymbolInfo {
            name: source.clone(),
            kind: SymbolKind::Terminal,
            named: false,
            hidden: false,
        });
        self.token_rules.push(TokenRule {
            symbol: id,
            pattern: source.clone(),
            priority: 0,
        });
        self.by_pattern.insert(source.clone(), id);
        id
    }

    fn intern_field(&mut self, name: &SmolStr) -> FieldId {
        if let Some(i) = self.fields.iter().position(|f| f == name) {
            return FieldId(i as u16);
        }
        self.fields.push(name.clone());
        FieldId((self.fields.len() - 1) as u16)
    }

    fn intern_alias(&mut self, name: &SmolStr, named: bool) -> u16 {
        let spec = AliasSpec {
            name: name.clone(),
            named,
        };
        if let Some(i) = self.aliases.iter().position(|a| *a == spec) {
            return i as u16;
        }
        self.aliases.push(spec);
        (self.aliases.len() - 1) as u16
    }

    fn push_production(&mut self, lhs: SymbolId, acc: AltAcc) {
        let mut rhs = Vec::with_capacity(acc.items.len());
        let mut fields = Vec::with_capacity(acc.items.len());
        let mut aliases = Vec::with_capacity(acc.items.len());
        for item in acc.items {
            rhs.push(item.symbol);
            fields.push(item.field);
            aliases.push(item.alias);
        }
        self.productions.push(Production {
            lhs,
            rhs,
            precedence: acc.prec,
            assoc: acc.assoc,
            fields,
            aliases,
        });
    }

    fn lower_into(
        &mut self,
        expr: &RuleExpr,
        acc: &mut AltAcc,
        ctx: ItemCtx,
    ) -> Result<(), GrammarError> {
        match expr {
            RuleExpr::Blank => {}
            RuleExpr::Sym(name) => {
                let symbol = *self
                    .by_name
                    .get(name)
                    .ok_or_else(|| GrammarError::UndefinedSymbol(name.to_string()))?;
                acc.items.push(Item {
                    symbol,
                    field: ctx.field,
                    alias: ctx.alias,
                });
            }
            RuleExpr::Literal(text) => {
                let symbol = self.literal_symbol(text);
                acc.items.push(Item {
                    symbol,
                    field: ctx.field,
                    alias: ctx.alias,
                });
            }
            RuleExpr::Pattern(source) => {
                let symbol = self.pattern_symbol(source);
                acc.items.push(Item {
                    symbol,
                    field: ctx.field,
                    alias: ctx.alias,
                });
            }
            RuleExpr::Seq(members) => {
                for member in members {
                    self.lower_into(member, acc, ctx)?;
                }
            }
            RuleExpr::Choice(_) | RuleExpr::Repeat(_) | RuleExpr::Repeat1(_)
            | RuleExpr::Optional(_) => {
                let symbol = self.helper(expr)?;
                acc.items.push(Item {
                    symbol,
                    field: ctx.field,
                    alias: ctx.alias,
                });
            }
            RuleExpr::Prec {
                level,
                assoc,
                content,
            } => {
                // The outermost annotation on an alternative wins.
                if acc.prec.is_none() {
                    acc.prec = Some(*level);
                    acc.assoc = *assoc;
                }
                self.lower_into(content, acc, ctx)?;
            }
            RuleExpr::Field { name, content } => {
                let field = self.intern_field(name);
                self.lower_into(
                    content,
                    acc,
                    ItemCtx {
                        field: Some(field),
                        alias: ctx.alias,
                    },
                )?;
            }
            RuleExpr::Alias {
                name,
                named,
                content,
            } => {
                let alias = self.intern_alias(name, *named);
                self.lower_into(
                    content,
                    acc,
                    ItemCtx {
                        field: ctx.field,
                        alias: Some(alias),
                    },
                )?;
            }
        }
        Ok(())
    }

    /// Generate (or reuse) a hidden helper rule for a nested expression.
    fn helper(&mut self, expr: &RuleExpr) -> Result<SymbolId, GrammarError> {
        if let Some(&id) = self.helpers.get(expr) {
            return Ok(id);
        }
        self.helper_count += 1;
        let kind = match expr {
            RuleExpr::Choice(_) => "choice",
            RuleExpr::Repeat(_) => "repeat",
            RuleExpr::Repeat1(_) => "repeat1",
            RuleExpr::Optional(_) => "optional",
            _ => "helper",
        };
        let name: SmolStr = format!("__{kind}{}", self.helper_count).into();
        let id = self.intern_symbol(SymbolInfo {
            name,
            kind: SymbolKind::NonTerminal,
            named: false,
            hidden: true,
        });
        self.helpers.insert(expr.clone(), id);

        match expr {
            RuleExpr::Choice(members) => {
                for member in members {
                    let mut acc = AltAcc::default();
                    self.lower_into(member, &mut acc, ItemCtx::default())?;
                    self.push_production(id, acc);
                }
            }
            RuleExpr::Repeat(content) => {
                self.push_production(id, AltAcc::default());
                let mut acc = AltAcc::default();
                acc.items.push(Item {
                    symbol: id,
                    field: None,
                    alias: None,
                });
                self.lower_into(content, &mut acc, ItemCtx::default())?;
                self.push_production(id, acc);
            }
            RuleExpr::Repeat1(content) => {
                let mut first = AltAcc::default();
                self.lower_into(content, &mut first, ItemCtx::default())?;
                self.push_production(id, first);
                let mut rest = AltAcc::default();
                rest.items.push(Item {
                    symbol: id,
                    field: None,
                    alias: None,
                });
                self.lower_into(content, &mut rest, ItemCtx::default())?;
                self.push_production(id, rest);
            }
            RuleExpr::Optional(content) => {
                self.push_production(id, AltAcc::default());
                let mut acc = AltAcc::default();
                self.lower_into(content, &mut acc, ItemCtx::default())?;
                self.push_production(id, acc);
            }
            _ => {}
        }
        Ok(id)
    }

    fn check_reachability(
        &self,
        start: SymbolId,
        extras: &[SymbolId],
        builder: &GrammarBuilder,
    ) -> Result<(), GrammarError> {
        let mut reached = vec![false; self.symbols.len()];
        let mut work = vec![start];
        reached[start.index()] = true;
        for &extra in extras {
            if !reached[extra.index()] {
                reached[extra.index()] = true;
                work.push(extra);
            }
        }
        while let Some(symbol) = work.pop() {
            for production in self.productions.iter().filter(|p| p.lhs == symbol) {
                for &child in &production.rhs {
                    if !reached[child.index()] {
                        reached[child.index()] = true;
                        work.push(child);
                    }
                }
            }
        }
        // Externals are driven by the scanner, not by productions alone.
        for name in builder.rules.keys() {
            let id = self.by_name[name];
            if !reached[id.index()] {
                return Err(GrammarError::UnreachableRule(name.to_string()));
            }
        }
        Ok(())
    }

    fn validate_patterns(&self) -> Result<(), GrammarError> {
        for rule in &self.token_rules {
            let name = self.symbols[rule.symbol.index()].name.to_string();
            let dfa = pattern::build_dfa(&rule.pattern)
                .map_err(|message| GrammarError::BadPattern { name: name.clone(), message })?;
            if pattern::matches_empty(&dfa) {
                return Err(GrammarError::NullablePattern(name));
            }
        }
        Ok(())
    }
}

fn flatten_choice(expr: &RuleExpr) -> Vec<&RuleExpr> {
    match expr {
        RuleExpr::Choice(members) => members.iter().collect(),
        other => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use super::super::rules::*;
    use super::*;

    fn arith() -> GrammarBuilder {
        let mut g = GrammarBuilder::new("arith");
        g.token("number", "[0-9]+");
        g.rule(
            "expr",
            choice([
                sym("number"),
                prec_left(1, seq([sym("expr"), lit("+"), sym("expr")])),
            ]),
        );
        g.extra(pattern(r"[ \t\n]+"));
        g
    }

    #[test]
    fn test_lowering_produces_flat_productions() {
        let grammar = arith().build("expr").unwrap();
        let expr = grammar.symbol("expr").unwrap();
        let prods: Vec<_> = grammar
            .productions
            .iter()
            .filter(|p| p.lhs == expr)
            .collect();
        assert_eq!(prods.len(), 2);
        assert_eq!(prods[0].rhs.len(), 1);
        assert_eq!(prods[1].rhs.len(), 3);
        assert_eq!(prods[1].precedence, Some(1));
        assert_eq!(prods[1].assoc, Some(Assoc::Left));
    }

    #[test]
    fn test_literal_tokens_get_priority_over_patterns() {
        let grammar = arith().build("expr").unwrap();
        let plus = grammar.symbol("+").unwrap();
        let rule = grammar
            .token_rules
            .iter()
            .find(|r| r.symbol == plus)
            .unwrap();
        assert_eq!(rule.priority, 1);
    }

    #[test]
    fn test_undefined_symbol_rejected() {
        let mut g = GrammarBuilder::new("bad");
        g.rule("top", sym("nowhere"));
        assert!(matches!(
            g.build("top"),
            Err(GrammarError::UndefinedSymbol(name)) if name == "nowhere"
        ));
    }

    #[test]
    fn test_duplicate_rule_rejected() {
        let mut g = GrammarBuilder::new("bad");
        g.token("a", "a");
        g.token("a", "b");
        g.rule("top", sym("a"));
        assert!(matches!(g.build("top"), Err(GrammarError::DuplicateRule(_))));
    }

    #[test]
    fn test_nullable_token_pattern_rejected() {
        let mut g = GrammarBuilder::new("bad");
        g.token("ws", "[ ]*");
        g.rule("top", sym("ws"));
        assert!(matches!(
            g.build("top"),
            Err(GrammarError::NullablePattern(name)) if name == "ws"
        ));
    }

    #[test]
    fn test_missing_start_rejected() {
        let mut g = GrammarBuilder::new("bad");
        g.token("a", "a");
        g.rule("top", sym("a"));
        assert!(matches!(g.build("nope"), Err(GrammarError::MissingStart(_))));
    }

    #[test]
    fn test_token_start_rejected() {
        let mut g = GrammarBuilder::new("bad");
        g.token("a", "a");
        g.rule("top", sym("a"));
        assert!(matches!(g.build("a"), Err(GrammarError::TokenStart(_))));
    }

    #[test]
    fn test_unreachable_rule_rejected() {
        let mut g = GrammarBuilder::new("bad");
        g.token("a", "a");
        g.token("b", "b");
        g.rule("top", sym("a"));
        g.rule("orphan", sym("b"));
        assert!(matches!(
            g.build("top"),
            Err(GrammarError::UnreachableRule(name)) if name == "orphan"
        ));
    }

    #[test]
    fn test_repeat_generates_hidden_helper() {
        let mut g = GrammarBuilder::new("list");
        g.token("item", "x");
        g.rule("top", repeat(sym("item")));
        let grammar = g.build("top").unwrap();
        let helper = grammar
            .symbols
            .iter()
            .find(|s| s.name.starts_with("__repeat"))
            .unwrap();
        assert!(helper.hidden);
        assert!(!helper.named);
    }

    #[test]
    fn test_extra_must_be_token() {
        let mut g = GrammarBuilder::new("bad");
        g.token("a", "a");
        g.rule("junk", seq([sym("a"), sym("a")]));
        g.rule("top", seq([sym("a"), sym("junk")]));
        g.extra(sym("junk"));
        assert!(matches!(g.build("top"), Err(GrammarError::ExtraNotToken(_))));
    }
}
