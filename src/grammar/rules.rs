//! The rule expression DSL.
//!
//! Grammar rules are built from [`RuleExpr`] values via the free functions
//! here, mirroring the usual grammar-DSL vocabulary:
//!
//! ```
//! use strake::grammar::rules::*;
//!
//! // expr := expr '+' expr  (left associative, level 1)
//! let rule = choice([
//!     sym("number"),
//!     prec_left(1, seq([sym("expr"), lit("+"), sym("expr")])),
//! ]);
//! ```

use smol_str::SmolStr;

use super::Assoc;

/// A rule body expression, lowered to flat productions at build time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RuleExpr {
    /// Matches nothing; used for empty alternatives.
    Blank,
    /// A reference to a named rule, token, or external token.
    Sym(SmolStr),
    /// An anonymous literal token, e.g. `"+"` or a keyword.
    Literal(SmolStr),
    /// An anonymous regex token. As a rule body it defines a named token.
    Pattern(SmolStr),
    Seq(Vec<RuleExpr>),
    Choice(Vec<RuleExpr>),
    /// Zero or more repetitions.
    Repeat(Box<RuleExpr>),
    /// One or more repetitions.
    Repeat1(Box<RuleExpr>),
    Optional(Box<RuleExpr>),
    /// Precedence annotation; on token rules the level is lexical priority.
    Prec {
        level: i32,
        assoc: Option<Assoc>,
        content: Box<RuleExpr>,
    },
    /// Names the child produced by `content`.
    Field {
        name: SmolStr,
        content: Box<RuleExpr>,
    },
    /// Renames the node produced by `content` in this context.
    Alias {
        name: SmolStr,
        named: bool,
        content: Box<RuleExpr>,
    },
}

/// Reference a named rule or token.
pub fn sym(name: impl Into<SmolStr>) -> RuleExpr {
    RuleExpr::Sym(name.into())
}

/// An anonymous literal token.
pub fn lit(text: impl Into<SmolStr>) -> RuleExpr {
    RuleExpr::Literal(text.into())
}

/// An anchored regex pattern.
pub fn pattern(regex: impl Into<SmolStr>) -> RuleExpr {
    RuleExpr::Pattern(regex.into())
}

/// Match the given expressions in order.
pub fn seq(exprs: impl IntoIterator<Item = RuleExpr>) -> RuleExpr {
    RuleExpr::Seq(exprs.into_iter().collect())
}

/// Match any one of the given expressions.
pub fn choice(exprs: impl IntoIterator<Item = RuleExpr>) -> RuleExpr {
    RuleExpr::Choice(exprs.into_iter().collect())
}

/// Match `expr` zero or more times.
pub fn repeat(expr: RuleExpr) -> RuleExpr {
    RuleExpr::Repeat(Box::new(expr))
}

/// Match `expr` one or more times.
pub fn repeat1(expr: RuleExpr) -> RuleExpr {
    RuleExpr::Repeat1(Box::new(expr))
}

/// Match `expr` or nothing.
pub fn optional(expr: RuleExpr) -> RuleExpr {
    RuleExpr::Optional(Box::new(expr))
}

/// Matches nothing.
pub fn blank() -> RuleExpr {
    RuleExpr::Blank
}

/// Annotate `expr` with a precedence level.
pub fn prec(level: i32, expr: RuleExpr) -> RuleExpr {
    RuleExpr::Prec {
        level,
        assoc: None,
        content: Box::new(expr),
    }
}

/// Annotate `expr` as left-associative at `level`.
pub fn prec_left(level: i32, expr: RuleExpr) -> RuleExpr {
    RuleExpr::Prec {
        level,
        assoc: Some(Assoc::Left),
        content: Box::new(expr),
    }
}

/// Annotate `expr` as right-associative at `level`.
pub fn prec_right(level: i32, expr: RuleExpr) -> RuleExpr {
    RuleExpr::Prec {
        level,
        assoc: Some(Assoc::Right),
        content: Box::new(expr),
    }
}

/// Attach a field name to the child produced by `expr`.
pub fn field(name: impl Into<SmolStr>, expr: RuleExpr) -> RuleExpr {
    RuleExpr::Field {
        name: name.into(),
        content: Box::new(expr),
    }
}

/// Rename the node produced by `expr` to a named node called `name`.
pub fn alias(expr: RuleExpr, name: impl Into<SmolStr>) -> RuleExpr {
    RuleExpr::Alias {
        name: name.into(),
        named: true,
        content: Box::new(expr),
    }
}
