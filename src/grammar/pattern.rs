//! Compilation of token patterns into anchored DFAs.
//!
//! Both the grammar builder (validation) and the lexer (matching) compile
//! patterns the same way, so a pattern accepted at build time is guaranteed
//! to load in the lexer.

use regex_automata::dfa::dense;
use regex_automata::dfa::{Automaton, StartKind};
use regex_automata::{Anchored, Input};

/// Compile a token pattern into an anchored dense DFA.
pub(crate) fn build_dfa(pattern: &str) -> Result<dense::DFA<Vec<u32>>, String> {
    dense::Builder::new()
        .configure(dense::Config::new().start_kind(StartKind::Anchored))
        .build(pattern)
        .map_err(|e| e.to_string())
}

/// True if the pattern accepts the empty string.
pub(crate) fn matches_empty(dfa: &dense::DFA<Vec<u32>>) -> bool {
    let input = Input::new("").anchored(Anchored::Yes);
    let Ok(state) = dfa.start_state_forward(&input) else {
        return false;
    };
    dfa.is_match_state(dfa.next_eoi_state(state))
}
