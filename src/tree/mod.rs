//! Trees and the public node view.
//!
//! A [`Tree`] is an immutable value: applying an edit with
//! [`Tree::with_edit`] yields a *new* tree that shares every unaffected
//! subtree with its predecessor, and reparsing yields another. Old versions
//! stay valid for as long as anyone holds them, and may be read from any
//! thread.
//!
//! [`Node`] is a lightweight borrowed view pairing an internal subtree with
//! its absolute position; all range queries resolve here, since subtrees
//! only store relative extents.

mod edit;
pub(crate) mod subtree;

pub use edit::InputEdit;

use std::fmt;
use std::sync::Arc;

use text_size::{TextRange, TextSize};

use crate::base::{Length, Point, PointRange};
use crate::grammar::{ParseTable, SymbolId};
use subtree::Subtree;

/// An immutable concrete syntax tree, stamped with the grammar that
/// produced it.
#[derive(Debug, Clone)]
pub struct Tree {
    root: Subtree,
    table: Arc<ParseTable>,
    text_len: Length,
}

impl Tree {
    pub(crate) fn new(root: Subtree, table: Arc<ParseTable>, text_len: Length) -> Tree {
        Tree {
            root,
            table,
            text_len,
        }
    }

    /// The root node. Its range always spans the entire source text.
    pub fn root_node(&self) -> Node<'_> {
        Node {
            tree: self,
            subtree: &self.root,
            position: Length::ZERO,
            whole_span: true,
        }
    }

    /// The grammar table this tree was parsed with.
    pub fn grammar(&self) -> &Arc<ParseTable> {
        &self.table
    }

    /// Length of the source text this tree describes.
    pub fn text_len(&self) -> TextSize {
        self.text_len.bytes
    }

    /// True if any error or missing node exists anywhere in the tree.
    pub fn has_error(&self) -> bool {
        self.root.error_cost() > 0
    }

    /// Produce a new tree adjusted for `edit`, sharing every subtree the
    /// edit cannot affect. The result reflects the *new* text's positions
    /// (approximately, inside the edited region) and is the required input
    /// to an incremental reparse.
    pub fn with_edit(&self, edit: &InputEdit) -> Tree {
        if edit.is_noop() {
            return self.clone();
        }
        let root = edit::edit_subtree(&self.root, Length::ZERO, edit);
        let text_len = edit.map_position(self.text_len);
        Tree {
            root,
            table: self.table.clone(),
            text_len,
        }
    }

    pub(crate) fn root(&self) -> &Subtree {
        &self.root
    }
}

/// Stable node identity within and across tree versions.
///
/// Two nodes compare equal iff they are the same shared allocation, which is
/// exactly the "was this subtree reused?" question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// A borrowed view of one tree node with resolved absolute positions.
#[derive(Clone, Copy)]
pub struct Node<'t> {
    tree: &'t Tree,
    subtree: &'t Subtree,
    /// Absolute start of the subtree's total span (padding included).
    position: Length,
    /// The root reports the whole text as its range, trailing trivia
    /// included.
    whole_span: bool,
}

impl<'t> Node<'t> {
    fn table(&self) -> &'t ParseTable {
        &self.tree.table
    }

    pub fn id(&self) -> NodeId {
        NodeId(self.subtree.ptr() as usize)
    }

    pub fn symbol(&self) -> SymbolId {
        self.subtree.symbol()
    }

    /// The node's kind name: its symbol name, or the alias the enclosing
    /// production assigned.
    pub fn kind(&self) -> &'t str {
        if let Some(alias) = self.subtree.data().alias {
            if let Some(spec) = self.table().alias_spec(alias) {
                return &spec.name;
            }
        }
        self.table().symbol_name(self.symbol())
    }

    pub fn is_named(&self) -> bool {
        if let Some(alias) = self.subtree.data().alias {
            if let Some(spec) = self.table().alias_spec(alias) {
                return spec.named;
            }
        }
        self.table().symbol_is_named(self.symbol())
    }

    fn content_start(&self) -> Length {
        if self.whole_span {
            Length::ZERO
        } else {
            self.position + self.subtree.padding()
        }
    }

    fn content_end(&self) -> Length {
        if self.whole_span {
            self.tree.text_len
        } else {
            self.content_start() + self.subtree.size()
        }
    }

    pub fn start_byte(&self) -> TextSize {
        self.content_start().bytes
    }

    pub fn end_byte(&self) -> TextSize {
        self.content_end().bytes
    }

    pub fn byte_range(&self) -> TextRange {
        TextRange::new(self.start_byte(), self.end_byte())
    }

    pub fn start_point(&self) -> Point {
        self.content_start().point
    }

    pub fn end_point(&self) -> Point {
        self.content_end().point
    }

    pub fn point_range(&self) -> PointRange {
        PointRange::new(self.start_point(), self.end_point())
    }

    /// True for nodes synthesized around unparseable input.
    pub fn is_error(&self) -> bool {
        self.subtree.data().is_error
    }

    /// True for zero-width leaves standing in for absent-but-expected
    /// tokens.
    pub fn is_missing(&self) -> bool {
        self.subtree.data().is_missing
    }

    pub fn is_extra(&self) -> bool {
        self.subtree.data().is_extra
    }

    /// True if any error or missing node exists in this subtree.
    pub fn has_error(&self) -> bool {
        self.subtree.error_cost() > 0
    }

    pub fn child_count(&self) -> usize {
        self.subtree.children().len()
    }

    pub fn children(&self) -> NodeChildren<'t> {
        NodeChildren {
            tree: self.tree,
            children: self.subtree.children(),
            index: 0,
            cursor: self.position,
        }
    }

    pub fn child(&self, index: usize) -> Option<Node<'t>> {
        self.children().nth(index)
    }

    pub fn named_children(self) -> impl Iterator<Item = Node<'t>> {
        self.children().filter(|c| c.is_named())
    }

    pub fn named_child(&self, index: usize) -> Option<Node<'t>> {
        self.named_children().nth(index)
    }

    /// The field name the enclosing production assigned to this node.
    pub fn field_name(&self) -> Option<&'t str> {
        let field = self.subtree.data().field?;
        self.table().field_name(field)
    }

    /// The first child carrying the given field name.
    pub fn child_by_field_name(&self, name: &str) -> Option<Node<'t>> {
        let field = self.table().field(name)?;
        self.children()
            .find(|c| c.subtree.data().field == Some(field))
    }

    /// The smallest node whose range contains `start..end`.
    pub fn descendant_for_byte_range(&self, start: TextSize, end: TextSize) -> Node<'t> {
        let mut node = *self;
        'descend: loop {
            for child in node.children() {
                if child.start_byte() <= start && end <= child.end_byte() {
                    node = child;
                    continue 'descend;
                }
            }
            return node;
        }
    }

    /// Render the named structure as an S-expression, e.g.
    /// `(expr (number) (expr (number)))`, with `field:` prefixes and
    /// `(ERROR ...)`/`(MISSING ...)` markers.
    pub fn to_sexp(&self) -> String {
        let mut out = String::new();
        self.write_sexp(&mut out);
        out
    }

    fn write_sexp(&self, out: &mut String) {
        if self.is_missing() {
            if self.is_named() {
                out.push_str(&format!("(MISSING {})", self.kind()));
            } else {
                out.push_str(&format!("(MISSING \"{}\")", self.kind()));
            }
            return;
        }
        out.push('(');
        out.push_str(self.kind());
        for child in self.children() {
            if child.is_named() || child.is_missing() {
                out.push(' ');
                if let Some(field) = child.field_name() {
                    out.push_str(field);
                    out.push_str(": ");
                }
                child.write_sexp(out);
            }
        }
        out.push(')');
    }
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{:?}..{:?}",
            self.kind(),
            self.start_byte(),
            self.end_byte()
        )
    }
}

/// Iterator over a node's children, resolving each child's position.
pub struct NodeChildren<'t> {
    tree: &'t Tree,
    children: &'t [Subtree],
    index: usize,
    cursor: Length,
}

impl<'t> Iterator for NodeChildren<'t> {
    type Item = Node<'t>;

    fn next(&mut self) -> Option<Node<'t>> {
        let subtree = self.children.get(self.index)?;
        let node = Node {
            tree: self.tree,
            subtree,
            position: self.cursor,
            whole_span: false,
        };
        self.index += 1;
        self.cursor += subtree.total();
        Some(node)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.children.len() - self.index;
        (rest, Some(rest))
    }
}
