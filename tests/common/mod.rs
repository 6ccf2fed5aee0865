//! Shared grammar fixtures and tree assertions.
#![allow(dead_code)]

use std::sync::Arc;

use once_cell::sync::Lazy;
use strake::grammar::rules::*;
use strake::grammar::{CompileOptions, GrammarBuilder, ParseTable};
use strake::{InputEdit, Node, Point, TextSize};

/// Arithmetic expressions with precedence, parentheses, whitespace padding,
/// and a named comment extra.
///
/// ```text
/// expr := number
///       | expr '+' expr   (left, 1)
///       | expr '*' expr   (left, 2)
///       | '(' expr ')'
/// ```
pub fn arith_builder() -> GrammarBuilder {
    let mut g = GrammarBuilder::new("arith");
    g.token("number", "[0-9]+");
    g.token("comment", "//[^\n]*");
    g.rule(
        "expr",
        choice([
            sym("number"),
            prec_left(1, seq([sym("expr"), lit("+"), sym("expr")])),
            prec_left(2, seq([sym("expr"), lit("*"), sym("expr")])),
            seq([lit("("), sym("expr"), lit(")")]),
        ]),
    );
    g.extra(pattern(r"[ \t\n]+"));
    g.extra(sym("comment"));
    g
}

static ARITH: Lazy<Arc<ParseTable>> = Lazy::new(|| {
    Arc::new(
        arith_builder()
            .build("expr")
            .unwrap()
            .compile(&CompileOptions::default()),
    )
});

pub fn arith_table() -> Arc<ParseTable> {
    ARITH.clone()
}

/// A small statement language exercising hidden rules, repetition, fields,
/// and aliases.
pub fn lang_table() -> Arc<ParseTable> {
    let mut g = GrammarBuilder::new("mini");
    g.token("identifier", "[a-zA-Z_][a-zA-Z0-9_]*");
    g.token("number_literal", "[0-9]+");
    g.rule("source_file", repeat(sym("_statement")));
    g.rule(
        "_statement",
        choice([sym("let_statement"), sym("expression_statement")]),
    );
    g.rule(
        "let_statement",
        seq([
            lit("let"),
            field("name", alias(sym("identifier"), "variable_name")),
            lit("="),
            field("value", sym("_expression")),
            lit(";"),
        ]),
    );
    g.rule("expression_statement", seq([sym("_expression"), lit(";")]));
    g.rule(
        "_expression",
        choice([sym("identifier"), sym("number_literal")]),
    );
    g.extra(pattern(r"[ \t\n]+"));
    Arc::new(
        g.build("source_file")
            .unwrap()
            .compile(&CompileOptions::default()),
    )
}

/// The row/column position at a byte offset of `text`.
pub fn point_at(text: &str, offset: usize) -> Point {
    Point::of_text(&text[..offset])
}

/// Replace `old_len` bytes at `start` with `replacement`, returning the new
/// text and the matching edit descriptor.
pub fn apply_edit(
    text: &str,
    start: usize,
    old_len: usize,
    replacement: &str,
) -> (String, InputEdit) {
    let old_end = start + old_len;
    let mut new_text = String::with_capacity(text.len() - old_len + replacement.len());
    new_text.push_str(&text[..start]);
    new_text.push_str(replacement);
    new_text.push_str(&text[old_end..]);
    let new_end = start + replacement.len();
    let edit = InputEdit {
        start_byte: TextSize::new(start as u32),
        old_end_byte: TextSize::new(old_end as u32),
        new_end_byte: TextSize::new(new_end as u32),
        start_point: point_at(text, start),
        old_end_point: point_at(text, old_end),
        new_end_point: point_at(&new_text, new_end),
    };
    (new_text, edit)
}

/// Assert two trees are node-for-node identical in kind, range, and flags.
pub fn assert_same_structure(a: Node<'_>, b: Node<'_>) {
    assert_eq!(a.kind(), b.kind(), "kind mismatch at {a:?} vs {b:?}");
    assert_eq!(a.symbol(), b.symbol(), "symbol mismatch at {a:?}");
    assert_eq!(a.byte_range(), b.byte_range(), "range mismatch at {a:?}");
    assert_eq!(a.point_range(), b.point_range(), "points mismatch at {a:?}");
    assert_eq!(a.is_error(), b.is_error(), "error flag mismatch at {a:?}");
    assert_eq!(a.is_missing(), b.is_missing(), "missing flag mismatch at {a:?}");
    assert_eq!(a.is_extra(), b.is_extra(), "extra flag mismatch at {a:?}");
    assert_eq!(a.is_named(), b.is_named(), "named flag mismatch at {a:?}");
    assert_eq!(
        a.child_count(),
        b.child_count(),
        "child count mismatch at {a:?}"
    );
    for (ca, cb) in a.children().zip(b.children()) {
        assert_same_structure(ca, cb);
    }
}

/// Assert the range invariants: children ordered, non-overlapping, and
/// contained in their parent.
pub fn check_range_invariants(node: Node<'_>) {
    let mut prev_end = node.start_byte();
    for child in node.children() {
        assert!(
            child.start_byte() >= prev_end,
            "overlapping siblings at {child:?}"
        );
        assert!(
            child.end_byte() <= node.end_byte(),
            "child {child:?} escapes parent {node:?}"
        );
        prev_end = child.end_byte();
        check_range_invariants(child);
    }
}

/// Count nodes matching a predicate.
pub fn count_nodes<'t>(node: Node<'t>, pred: &dyn Fn(Node<'t>) -> bool) -> usize {
    let mut count = usize::from(pred(node));
    for child in node.children() {
        count += count_nodes(child, pred);
    }
    count
}
