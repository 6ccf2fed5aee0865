//! End-to-end parsing tests: tree shapes, precedence, extras, fields,
//! hidden rules, ranges, and the concurrency and cancellation contracts.

mod common;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use common::*;
use rstest::rstest;
use strake::grammar::rules::*;
use strake::grammar::{CompileOptions, GrammarBuilder, TokenSet};
use strake::{ExternalScanner, ExternalToken, Parser, Point, SymbolId, TextSize};

#[test]
fn test_parse_single_number() {
    let mut parser = Parser::new(arith_table()).unwrap();
    let tree = parser.parse("42").unwrap();
    assert!(!tree.has_error());
    let root = tree.root_node();
    assert_eq!(root.to_sexp(), "(expr (number))");
    assert_eq!(root.start_byte(), TextSize::new(0));
    assert_eq!(root.end_byte(), TextSize::new(2));
}

#[test]
fn test_addition_is_left_associative() {
    let mut parser = Parser::new(arith_table()).unwrap();
    let tree = parser.parse("1+2+3").unwrap();
    assert!(!tree.has_error());
    assert_eq!(
        tree.root_node().to_sexp(),
        "(expr (expr (expr (number)) (expr (number))) (expr (number)))"
    );
}

#[test]
fn test_multiplication_binds_tighter() {
    let mut parser = Parser::new(arith_table()).unwrap();
    let tree = parser.parse("1+2*3").unwrap();
    assert_eq!(
        tree.root_node().to_sexp(),
        "(expr (expr (number)) (expr (expr (number)) (expr (number))))"
    );
    let tree = parser.parse("1*2+3").unwrap();
    assert_eq!(
        tree.root_node().to_sexp(),
        "(expr (expr (expr (number)) (expr (number))) (expr (number)))"
    );
}

#[test]
fn test_parentheses_override_precedence() {
    let mut parser = Parser::new(arith_table()).unwrap();
    let tree = parser.parse("(1+2)*3").unwrap();
    assert!(!tree.has_error());
    assert_eq!(
        tree.root_node().to_sexp(),
        "(expr (expr (expr (expr (number)) (expr (number)))) (expr (number)))"
    );
}

#[test]
fn test_whitespace_becomes_padding() {
    let mut parser = Parser::new(arith_table()).unwrap();
    let spaced = parser.parse("1 + 2").unwrap();
    let dense = parser.parse("1+2").unwrap();
    assert_eq!(spaced.root_node().to_sexp(), dense.root_node().to_sexp());
    // The second number sits at byte 4 of the spaced text.
    let two = spaced.root_node().descendant_for_byte_range(
        TextSize::new(4),
        TextSize::new(5),
    );
    assert_eq!(two.kind(), "number");
    assert_eq!(two.start_byte(), TextSize::new(4));
}

#[test]
fn test_named_comment_extra_becomes_node() {
    let mut parser = Parser::new(arith_table()).unwrap();
    let tree = parser.parse("1 + // note\n2").unwrap();
    assert!(!tree.has_error());
    assert_eq!(
        tree.root_node().to_sexp(),
        "(expr (expr (number)) (comment) (expr (number)))"
    );
    let comment = tree
        .root_node()
        .named_children()
        .find(|c| c.kind() == "comment")
        .unwrap();
    assert!(comment.is_extra());
    assert_eq!(comment.start_byte(), TextSize::new(4));
    assert_eq!(comment.end_byte(), TextSize::new(11));
}

#[test]
fn test_root_range_spans_entire_input() {
    let mut parser = Parser::new(arith_table()).unwrap();
    let text = "  1+2  ";
    let tree = parser.parse(text).unwrap();
    assert!(!tree.has_error());
    let root = tree.root_node();
    assert_eq!(root.start_byte(), TextSize::new(0));
    assert_eq!(root.end_byte(), TextSize::of(text));
}

#[test]
fn test_points_across_newlines() {
    let mut parser = Parser::new(arith_table()).unwrap();
    let tree = parser.parse("1+\n2").unwrap();
    let two = tree
        .root_node()
        .descendant_for_byte_range(TextSize::new(3), TextSize::new(4));
    assert_eq!(two.kind(), "number");
    assert_eq!(two.start_point(), Point::new(1, 0));
    assert_eq!(tree.root_node().end_point(), Point::new(1, 1));
}

#[rstest]
#[case("1")]
#[case("1+2*3")]
#[case("(1+2)*(3+4)")]
#[case("1 + // c\n 2 * 3")]
#[case("@#!")]
#[case("1+")]
#[case("((((1")]
fn test_range_invariants_hold(#[case] text: &str) {
    let mut parser = Parser::new(arith_table()).unwrap();
    let tree = parser.parse(text).unwrap();
    let root = tree.root_node();
    assert_eq!(root.start_byte(), TextSize::new(0));
    assert_eq!(root.end_byte(), TextSize::of(text));
    check_range_invariants(root);
}

#[test]
fn test_fields_and_aliases() {
    let mut parser = Parser::new(lang_table()).unwrap();
    let tree = parser.parse("let x = 1; y;").unwrap();
    assert!(!tree.has_error());
    assert_eq!(
        tree.root_node().to_sexp(),
        "(source_file (let_statement name: (variable_name) value: (number_literal)) \
         (expression_statement (identifier)))"
    );
    let let_stmt = tree.root_node().named_child(0).unwrap();
    let name = let_stmt.child_by_field_name("name").unwrap();
    assert_eq!(name.kind(), "variable_name");
    assert_eq!(name.byte_range(), strake::TextRange::new(4.into(), 5.into()));
    let value = let_stmt.child_by_field_name("value").unwrap();
    assert_eq!(value.kind(), "number_literal");
}

#[test]
fn test_hidden_rules_never_appear() {
    let mut parser = Parser::new(lang_table()).unwrap();
    let tree = parser.parse("let a = 1; b; c;").unwrap();
    assert!(!tree.has_error());
    let hidden = count_nodes(tree.root_node(), &|n| n.kind().starts_with('_'));
    assert_eq!(hidden, 0);
    let kinds: Vec<_> = tree
        .root_node()
        .named_children()
        .map(|c| c.kind().to_string())
        .collect();
    assert_eq!(
        kinds,
        ["let_statement", "expression_statement", "expression_statement"]
    );
}

#[test]
fn test_empty_input_yields_empty_root() {
    let mut parser = Parser::new(lang_table()).unwrap();
    let tree = parser.parse("").unwrap();
    assert!(!tree.has_error());
    let root = tree.root_node();
    assert_eq!(root.kind(), "source_file");
    assert_eq!(root.child_count(), 0);
    assert_eq!(root.end_byte(), TextSize::new(0));
}

#[test]
fn test_totality_on_garbage() {
    let mut parser = Parser::new(arith_table()).unwrap();
    let text = "@#$%";
    let tree = parser.parse(text).unwrap();
    assert!(tree.has_error());
    let root = tree.root_node();
    assert_eq!(root.kind(), "expr");
    assert_eq!(root.end_byte(), TextSize::of(text));
    check_range_invariants(root);
}

#[test]
fn test_keyword_beats_identifier_of_same_length() {
    let mut parser = Parser::new(lang_table()).unwrap();
    // "lets" is an identifier, "let" alone is the keyword.
    let tree = parser.parse("lets;").unwrap();
    assert!(!tree.has_error());
    assert_eq!(
        tree.root_node().to_sexp(),
        "(source_file (expression_statement (identifier)))"
    );
}

#[test]
fn test_cancellation_is_distinct_and_nondestructive() {
    let mut parser = Parser::new(arith_table()).unwrap();
    let before = parser.parse("1+2").unwrap();

    let flag = Arc::new(AtomicBool::new(true));
    parser.set_cancel_flag(Some(flag.clone()));
    let err = parser.parse("1+2+3").unwrap_err();
    assert_eq!(u32::from(err.consumed), 0);

    // The previous tree is untouched and the parser recovers once the flag
    // clears.
    assert_eq!(before.root_node().to_sexp(), "(expr (expr (number)) (expr (number)))");
    flag.store(false, std::sync::atomic::Ordering::Relaxed);
    let tree = parser.parse("1+2+3").unwrap();
    assert!(!tree.has_error());
}

#[test]
fn test_independent_parses_share_one_table() {
    let table = arith_table();
    std::thread::scope(|scope| {
        let mut workers = Vec::new();
        for i in 0..4 {
            let table = table.clone();
            workers.push(scope.spawn(move || {
                let mut parser = Parser::new(table).unwrap();
                let text = format!("{i}+{i}*{i}");
                parser.parse(&text).unwrap().root_node().to_sexp()
            }));
        }
        for worker in workers {
            let sexp = worker.join().unwrap();
            assert_eq!(
                sexp,
                "(expr (expr (number)) (expr (expr (number)) (expr (number))))"
            );
        }
    });
}

/// Uppercase runs, which the grammar leaves to an external scanner.
struct ShoutScanner {
    symbol: SymbolId,
}

impl ExternalScanner for ShoutScanner {
    fn scan(
        &mut self,
        text: &str,
        offset: TextSize,
        admissible: &TokenSet,
    ) -> Option<ExternalToken> {
        if !admissible.contains(self.symbol) {
            return None;
        }
        let rest = &text[u32::from(offset) as usize..];
        let len = rest.bytes().take_while(u8::is_ascii_uppercase).count();
        (len > 0).then(|| ExternalToken {
            symbol: self.symbol,
            length: TextSize::new(len as u32),
            lookahead_bytes: 1,
        })
    }
}

#[test]
fn test_external_scanner_tokens() {
    let mut g = GrammarBuilder::new("shouty");
    g.token("word", "[a-z]+");
    g.external("shout");
    g.rule("doc", repeat1(choice([sym("word"), sym("shout")])));
    g.extra(pattern(" +"));
    let table = Arc::new(g.build("doc").unwrap().compile(&CompileOptions::default()));
    let shout = table.symbol("shout").unwrap();

    let mut parser = Parser::new(table).unwrap();
    parser.set_external_scanner(Some(Box::new(ShoutScanner { symbol: shout })));
    let tree = parser.parse("abc DEF ghi").unwrap();
    assert!(!tree.has_error());
    assert_eq!(tree.root_node().to_sexp(), "(doc (word) (shout) (word))");
    let shout_node = tree.root_node().named_child(1).unwrap();
    assert_eq!(shout_node.start_byte(), TextSize::new(4));
    assert_eq!(shout_node.end_byte(), TextSize::new(7));
}
