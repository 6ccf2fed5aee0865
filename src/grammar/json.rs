//! JSON form of a grammar description.
//!
//! The data shape mirrors the rule DSL one-to-one, so a grammar can be
//! authored (or generated by another tool) as data and ingested with
//! [`GrammarBuilder::from_json`]:
//!
//! ```json
//! {
//!   "name": "arith",
//!   "rules": {
//!     "number": { "type": "pattern", "value": "[0-9]+" },
//!     "expr": {
//!       "type": "choice",
//!       "members": [
//!         { "type": "symbol", "name": "number" },
//!         { "type": "prec_left", "level": 1, "content": { "type": "seq", "members": [
//!           { "type": "symbol", "name": "expr" },
//!           { "type": "string", "value": "+" },
//!           { "type": "symbol", "name": "expr" }
//!         ] } }
//!       ]
//!     }
//!   },
//!   "extras": [ { "type": "pattern", "value": "[ \\t\\n]+" } ]
//! }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::builder::GrammarBuilder;
use super::rules::RuleExpr;
use super::Assoc;
use crate::error::GrammarError;

#[derive(Debug, Serialize, Deserialize)]
struct GrammarJson {
    name: SmolStr,
    rules: IndexMap<SmolStr, RuleJson>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    extras: Vec<RuleJson>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    externals: Vec<SmolStr>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RuleJson {
    Blank,
    Symbol {
        name: SmolStr,
    },
    String {
        value: SmolStr,
    },
    Pattern {
        value: SmolStr,
    },
    Seq {
        members: Vec<RuleJson>,
    },
    Choice {
        members: Vec<RuleJson>,
    },
    Repeat {
        content: Box<RuleJson>,
    },
    Repeat1 {
        content: Box<RuleJson>,
    },
    Optional {
        content: Box<RuleJson>,
    },
    Prec {
        level: i32,
        content: Box<RuleJson>,
    },
    PrecLeft {
        level: i32,
        content: Box<RuleJson>,
    },
    PrecRight {
        level: i32,
        content: Box<RuleJson>,
    },
    Field {
        name: SmolStr,
        content: Box<RuleJson>,
    },
    Alias {
        name: SmolStr,
        #[serde(default = "default_true")]
        named: bool,
        content: Box<RuleJson>,
    },
}

fn default_true() -> bool {
    true
}

impl From<&RuleExpr> for RuleJson {
    fn from(expr: &RuleExpr) -> Self {
        match expr {
            RuleExpr::Blank => RuleJson::Blank,
            RuleExpr::Sym(name) => RuleJson::Symbol { name: name.clone() },
            RuleExpr::Literal(value) => RuleJson::String {
                value: value.clone(),
            },
            RuleExpr::Pattern(value) => RuleJson::Pattern {
                value: value.clone(),
            },
            RuleExpr::Seq(members) => RuleJson::Seq {
                members: members.iter().map(Into::into).collect(),
            },
            RuleExpr::Choice(members) => RuleJson::Choice {
                members: members.iter().map(Into::into).collect(),
            },
            RuleExpr::Repeat(content) => RuleJson::Repeat {
                content: Box::new(content.as_ref().into()),
            },
            RuleExpr::Repeat1(content) => RuleJson::Repeat1 {
                content: Box::new(content.as_ref().into()),
            },
            RuleExpr::Optional(content) => RuleJson::Optional {
                content: Box::new(content.as_ref().into()),
            },
            RuleExpr::Prec {
                level,
                assoc,
                content,
            } => {
                let content = Box::new(content.as_ref().into());
                match assoc {
                    None => RuleJson::Prec {
                        level: *level,
                        content,
                    },
                    Some(Assoc::Left) => RuleJson::PrecLeft {
                        level: *level,
                        content,
                    },
                    Some(Assoc::Right) => RuleJson::PrecRight {
                        level: *level,
                        content,
                    },
                }
            }
            RuleExpr::Field { name, content } => RuleJson::Field {
                name: name.clone(),
                content: Box::new(content.as_ref().into()),
            },
            RuleExpr::Alias {
                name,
                named,
                content,
            } => RuleJson::Alias {
                name: name.clone(),
                named: *named,
                content: Box::new(content.as_ref().into()),
            },
        }
    }
}

impl From<RuleJson> for RuleExpr {
    fn from(json: RuleJson) -> Self {
        match json {
            RuleJson::Blank => RuleExpr::Blank,
            RuleJson::Symbol { name } => RuleExpr::Sym(name),
            RuleJson::String { value } => RuleExpr::Literal(value),
            RuleJson::Pattern { value } => RuleExpr::Pattern(value),
            RuleJson::Seq { members } => {
                RuleExpr::Seq(members.into_iter().map(Into::into).collect())
            }
            RuleJson::Choice { members } => {
                RuleExpr::Choice(members.into_iter().map(Into::into).collect())
            }
            RuleJson::Repeat { content } => RuleExpr::Repeat(Box::new((*content).into())),
            RuleJson::Repeat1 { content } => RuleExpr::Repeat1(Box::new((*content).into())),
            RuleJson::Optional { content } => RuleExpr::Optional(Box::new((*content).into())),
            RuleJson::Prec { level, content } => RuleExpr::Prec {
                level,
                assoc: None,
                content: Box::new((*content).into()),
            },
            RuleJson::PrecLeft { level, content } => RuleExpr::Prec {
                level,
                assoc: Some(Assoc::Left),
                content: Box::new((*content).into()),
            },
            RuleJson::PrecRight { level, content } => RuleExpr::Prec {
                level,
                assoc: Some(Assoc::Right),
                content: Box::new((*content).into()),
            },
            RuleJson::Field { name, content } => RuleExpr::Field {
                name,
                content: Box::new((*content).into()),
            },
            RuleJson::Alias {
                name,
                named,
                content,
            } => RuleExpr::Alias {
                name,
                named,
                content: Box::new((*content).into()),
            },
        }
    }
}

impl GrammarBuilder {
    /// Parse a grammar description from its JSON form.
    pub fn from_json(json: &str) -> Result<GrammarBuilder, GrammarError> {
        let parsed: GrammarJson = serde_json::from_str(json)?;
        let mut builder = GrammarBuilder::new(parsed.name);
        for name in parsed.externals {
            builder.external(name);
        }
        for (name, body) in parsed.rules {
            builder.rule(name, body.into());
        }
        for extra in parsed.extras {
            builder.extra(extra.into());
        }
        Ok(builder)
    }

    /// Serialize this description to its JSON form.
    pub fn to_json(&self) -> Result<String, GrammarError> {
        let json = GrammarJson {
            name: self.name.clone(),
            rules: self
                .rules
                .iter()
                .map(|(name, body)| (name.clone(), body.into()))
                .collect(),
            extras: self.extras.iter().map(Into::into).collect(),
            externals: self.externals.clone(),
        };
        Ok(serde_json::to_string_pretty(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::rules::*;
    use super::*;

    #[test]
    fn test_round_trip_preserves_rules() {
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

        let json = g.to_json().unwrap();
        let back = GrammarBuilder::from_json(&json).unwrap();
        assert_eq!(g.rules, back.rules);
        assert_eq!(g.extras, back.extras);
    }

    #[test]
    fn test_ingest_from_literal_json() {
        let json = r#"{
            "name": "mini",
            "rules": {
                "word": { "type": "pattern", "value": "[a-z]+" },
                "doc": { "type": "repeat1", "content": { "type": "symbol", "name": "word" } }
            },
            "extras": [ { "type": "pattern", "value": " +" } ]
        }"#;
        let builder = GrammarBuilder::from_json(json).unwrap();
        let grammar = builder.build("doc").unwrap();
        assert!(grammar.symbol("word").is_some());
        assert!(grammar.symbol("doc").is_some());
    }

    #[test]
    fn test_malformed_json_reports_error() {
        let err = GrammarBuilder::from_json("{ not json").unwrap_err();
        assert!(matches!(err, GrammarError::Malformed(_)));
    }
}
