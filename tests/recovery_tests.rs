//! Error recovery: missing-leaf insertion, bad-token skipping, panic-mode
//! absorption, and the boundedness of damage from a single bad token.

mod common;

use common::*;
use rstest::rstest;
use strake::{Parser, TextSize};

fn error_count(tree: &strake::Tree) -> usize {
    count_nodes(tree.root_node(), &|n| n.is_error())
}

fn missing_count(tree: &strake::Tree) -> usize {
    count_nodes(tree.root_node(), &|n| n.is_missing())
}

#[test]
fn test_truncated_input_gets_missing_leaf() {
    let mut parser = Parser::new(arith_table()).unwrap();
    let tree = parser.parse("1+").unwrap();
    assert!(tree.has_error());
    assert_eq!(
        tree.root_node().to_sexp(),
        "(expr (expr (number)) (expr (MISSING number)))"
    );
    assert_eq!(missing_count(&tree), 1);
    assert_eq!(error_count(&tree), 0);
}

#[test]
fn test_unclosed_paren_gets_missing_close() {
    let mut parser = Parser::new(arith_table()).unwrap();
    let tree = parser.parse("(1+2").unwrap();
    assert_eq!(
        tree.root_node().to_sexp(),
        "(expr (expr (expr (number)) (expr (number))) (MISSING \")\"))"
    );
    assert_eq!(missing_count(&tree), 1);
    assert_eq!(error_count(&tree), 0);
}

#[test]
fn test_single_bad_token_is_bounded() {
    let mut parser = Parser::new(arith_table()).unwrap();
    let tree = parser.parse("1+$2+3").unwrap();
    assert!(tree.has_error());
    // Exactly one error region; the surrounding expression parses normally.
    assert_eq!(error_count(&tree), 1);
    assert_eq!(missing_count(&tree), 0);
    let sexp = tree.root_node().to_sexp();
    assert!(sexp.contains("(ERROR"), "no error node in {sexp}");
    // All three numbers survived as expression leaves.
    assert_eq!(count_nodes(tree.root_node(), &|n| n.kind() == "number"), 3);
    check_range_invariants(tree.root_node());
}

#[test]
fn test_trailing_garbage_becomes_one_error_node() {
    let mut parser = Parser::new(arith_table()).unwrap();
    let tree = parser.parse("1+2 @!?").unwrap();
    assert!(tree.has_error());
    assert_eq!(error_count(&tree), 1);
    let sexp = tree.root_node().to_sexp();
    assert!(
        sexp.starts_with("(expr (expr (number)) (expr (number))"),
        "valid prefix not preserved: {sexp}"
    );
    assert_eq!(tree.root_node().end_byte(), TextSize::new(7));
}

#[rstest]
#[case("@@@")]
#[case("+++")]
#[case(")1")]
fn test_garbage_always_produces_a_tree(#[case] text: &str) {
    let mut parser = Parser::new(arith_table()).unwrap();
    let tree = parser.parse(text).unwrap();
    assert!(tree.has_error());
    let root = tree.root_node();
    assert_eq!(root.kind(), "expr");
    assert_eq!(root.start_byte(), TextSize::new(0));
    assert_eq!(root.end_byte(), TextSize::of(text));
    check_range_invariants(root);
}

#[test]
fn test_statement_recovery_resumes_at_next_statement() {
    let mut parser = Parser::new(lang_table()).unwrap();
    let tree = parser.parse("let = 1; ok;").unwrap();
    assert!(tree.has_error());
    // The malformed let statement must not swallow the following one.
    let sexp = tree.root_node().to_sexp();
    assert!(
        sexp.contains("(expression_statement (identifier))"),
        "later statement lost: {sexp}"
    );
    check_range_invariants(tree.root_node());
}

#[test]
fn test_recovery_lookahead_is_configurable() {
    let mut parser = Parser::new(arith_table()).unwrap();
    parser.set_options(strake::ParseOptions::default().max_recovery_lookahead(5));
    let tree = parser.parse("1+$2+3").unwrap();
    assert_eq!(error_count(&tree), 1);
    assert_eq!(count_nodes(tree.root_node(), &|n| n.kind() == "number"), 3);
}
