//! The runtime lexer.
//!
//! Token rules compile to anchored dense DFAs when a parser loads a table.
//! Each lex call walks every admissible DFA from the current offset, keeps
//! the longest match (ties: higher declared priority, then earlier
//! declaration), and records exactly how far past the match the decision
//! looked. That lookahead distance is what lets the reparse controller tell
//! whether an edit can retroactively change a token.
//!
//! When nothing matches, the lexer emits a zero-width error token and leaves
//! consuming bytes to the parser's recovery unit. The lexer itself holds no
//! state beyond the borrowed source text.

mod external;

pub use external::{ExternalScanner, ExternalToken};

use regex_automata::dfa::{dense, Automaton};
use regex_automata::{Anchored, Input};
use text_size::TextSize;

use crate::base::{Length, Point};
use crate::error::TableError;
use crate::grammar::{ParseTable, SymbolId, TokenSet};

/// A compiled token rule ready for matching.
pub(crate) struct TokenDfa {
    pub symbol: SymbolId,
    dfa: dense::DFA<Vec<u32>>,
    priority: i32,
    decl_index: usize,
}

/// Compile every token rule in `table`. Patterns were validated when the
/// grammar was built, but a table can arrive from outside, so failures are
/// reported as table errors.
pub(crate) fn build_token_dfas(table: &ParseTable) -> Result<Vec<TokenDfa>, TableError> {
    let mut dfas = Vec::new();
    for (decl_index, rule) in table.token_rules().iter().enumerate() {
        let dfa = crate::grammar::pattern::build_dfa(&rule.pattern).map_err(|message| {
            TableError::BadTokenPattern {
                name: table.symbol_name(rule.symbol).to_string(),
                message,
            }
        })?;
        dfas.push(TokenDfa {
            symbol: rule.symbol,
            dfa,
            priority: rule.priority,
            decl_index,
        });
    }
    Ok(dfas)
}

/// One lexed token, relative to the offset it was scanned at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LexedToken {
    pub symbol: SymbolId,
    /// Matched length in bytes; zero for `end` and error tokens.
    pub length: TextSize,
    /// Point extent of the matched text.
    pub point: Point,
    /// Bytes examined beyond the match end while deciding. An edit closer
    /// than this to the token's end can change the lex result.
    pub lookahead_bytes: u32,
}

impl LexedToken {
    pub fn size(&self) -> Length {
        Length::new(self.length, self.point)
    }

    pub fn is_end(&self) -> bool {
        self.symbol == SymbolId::END
    }

    pub fn is_error(&self) -> bool {
        self.symbol == SymbolId::ERROR
    }
}

/// Borrow of the source text plus the compiled token DFAs.
pub(crate) struct Lexer<'a> {
    text: &'a str,
    dfas: &'a [TokenDfa],
}

impl<'a> Lexer<'a> {
    pub fn new(text: &'a str, dfas: &'a [TokenDfa]) -> Self {
        Self { text, dfas }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    /// Lex one token at `offset`, restricted to `admissible` kinds.
    pub fn lex(&self, offset: TextSize, admissible: &TokenSet) -> LexedToken {
        let start = u32::from(offset) as usize;
        let bytes = self.text.as_bytes();
        if start >= bytes.len() {
            return LexedToken {
                symbol: SymbolId::END,
                length: TextSize::new(0),
                point: Point::ZERO,
                lookahead_bytes: 0,
            };
        }

        let tail = &bytes[start..];
        // (length, priority, declaration index) of the best match so far.
        let mut best: Option<(usize, i32, usize, SymbolId)> = None;
        let mut scan_max = 0usize;

        for token in self.dfas {
            if !admissible.contains(token.symbol) {
                continue;
            }
            let input = Input::new(self.text)
                .range(start..)
                .anchored(Anchored::Yes);
            let Ok(mut state) = token.dfa.start_state_forward(&input) else {
                continue;
            };

            let mut last_match: Option<usize> = None;
            let mut dead = false;
            let mut fed = 0usize;
            for &byte in tail {
                state = token.dfa.next_state(state, byte);
                fed += 1;
                if fed > scan_max {
                    scan_max = fed;
                }
                if token.dfa.is_match_state(state) {
                    // Match states are delayed by one byte.
                    last_match = Some(fed - 1);
                } else if token.dfa.is_dead_state(state) || token.dfa.is_quit_state(state) {
                    dead = true;
                    break;
                }
            }
            if !dead {
                state = token.dfa.next_eoi_state(state);
                if token.dfa.is_match_state(state) {
                    last_match = Some(tail.len());
                }
                // Still alive at end of input: the decision depended on the
                // input ending here, so count one byte past it.
                if tail.len() + 1 > scan_max {
                    scan_max = tail.len() + 1;
                }
            }

            if let Some(len) = last_match {
                let better = match best {
                    None => true,
                    Some((best_len, best_priority, best_decl, _)) => {
                        len > best_len
                            || (len == best_len
                                && (token.priority > best_priority
                                    || (token.priority == best_priority
                                        && token.decl_index < best_decl)))
                    }
                };
                if better {
                    best = Some((len, token.priority, token.decl_index, token.symbol));
                }
            }
        }

        match best {
            Some((len, _, _, symbol)) => {
                let matched = &self.text[start..start + len];
                LexedToken {
                    symbol,
                    length: TextSize::of(matched),
                    point: Point::of_text(matched),
                    lookahead_bytes: (scan_max.saturating_sub(len)) as u32,
                }
            }
            None => LexedToken {
                symbol: SymbolId::ERROR,
                length: TextSize::new(0),
                point: Point::ZERO,
                lookahead_bytes: scan_max as u32,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::rules::*;
    use crate::grammar::{CompileOptions, GrammarBuilder};

    fn fixture() -> (ParseTable, Vec<TokenDfa>) {
        let mut g = GrammarBuilder::new("lex");
        g.token("ident", "[a-z_]+");
        g.token("number", "[0-9]+");
        g.rule(
            "item",
            choice([sym("ident"), sym("number"), lit("if"), lit("+")]),
        );
        g.rule("top", repeat1(sym("item")));
        let table = g.build("top").unwrap().compile(&CompileOptions::default());
        let dfas = build_token_dfas(&table).unwrap();
        (table, dfas)
    }

    fn all_terminals(table: &ParseTable) -> TokenSet {
        let mut set = TokenSet::new(table.symbol_count());
        for i in 0..table.symbol_count() {
            set.insert(SymbolId(i as u16));
        }
        set
    }

    #[test]
    fn test_longest_match_wins() {
        let (table, dfas) = fixture();
        let lexer = Lexer::new("iffy", &dfas);
        let token = lexer.lex(TextSize::new(0), &all_terminals(&table));
        // "iffy" as an ident beats the "if" keyword on length.
        assert_eq!(token.symbol, table.symbol("ident").unwrap());
        assert_eq!(token.length, TextSize::new(4));
    }

    #[test]
    fn test_literal_beats_pattern_on_tie() {
        let (table, dfas) = fixture();
        let lexer = Lexer::new("if", &dfas);
        let token = lexer.lex(TextSize::new(0), &all_terminals(&table));
        assert_eq!(token.symbol, table.symbol("if").unwrap());
    }

    #[test]
    fn test_lookahead_counts_the_deciding_byte() {
        let (table, dfas) = fixture();
        let lexer = Lexer::new("ab+cd", &dfas);
        let token = lexer.lex(TextSize::new(0), &all_terminals(&table));
        assert_eq!(token.symbol, table.symbol("ident").unwrap());
        assert_eq!(token.length, TextSize::new(2));
        // The ident DFA had to see '+' to stop.
        assert!(token.lookahead_bytes >= 1);
    }

    #[test]
    fn test_token_at_end_of_input_has_lookahead() {
        let (table, dfas) = fixture();
        let lexer = Lexer::new("ab", &dfas);
        let token = lexer.lex(TextSize::new(0), &all_terminals(&table));
        assert_eq!(token.length, TextSize::new(2));
        // Appending text could extend the ident, so the decision depended on
        // the input ending.
        assert!(token.lookahead_bytes >= 1);
    }

    #[test]
    fn test_no_match_is_zero_width_error() {
        let (table, dfas) = fixture();
        let lexer = Lexer::new("?x", &dfas);
        let token = lexer.lex(TextSize::new(0), &all_terminals(&table));
        assert!(token.is_error());
        assert_eq!(token.length, TextSize::new(0));
    }

    #[test]
    fn test_end_of_input() {
        let (_, dfas) = fixture();
        let lexer = Lexer::new("ab", &dfas);
        let token = lexer.lex(TextSize::new(2), &TokenSet::new(8));
        assert!(token.is_end());
    }

    #[test]
    fn test_points_cross_newlines() {
        let mut g = GrammarBuilder::new("s");
        g.token("str", r#""[^"]*""#);
        g.rule("top", sym("str"));
        let table = g.build("top").unwrap().compile(&CompileOptions::default());
        let dfas = build_token_dfas(&table).unwrap();
        let lexer = Lexer::new("\"a\nbc\"", &dfas);
        let mut set = TokenSet::new(table.symbol_count());
        set.insert(table.symbol("str").unwrap());
        let token = lexer.lex(TextSize::new(0), &set);
        assert_eq!(token.length, TextSize::new(6));
        assert_eq!(token.point, Point::new(1, 3));
    }
}
