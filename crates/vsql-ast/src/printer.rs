use std::fmt::Write as _;

use vsql_error::Result;

use crate::{FallbackPolicy, NodeId, NodeKind, ParseTree, Visitor, accept};

/// Renders a tree as an indented outline, one node per line:
///
/// ```text
/// SelectNode [0..24]
///   TokenNode 'SELECT' [0..6]
///   AttrListNode [7..8]
/// ```
///
/// Rendering recurses once per tree level; check [`ParseTree::height`]
/// before rendering arbitrarily nested input.
#[derive(Debug, Default)]
pub struct TreePrinter {
    out: String,
    depth: usize,
}

impl TreePrinter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Outline of the subtree rooted at `id`.
    pub fn render(tree: &ParseTree, id: NodeId) -> Result<String> {
        let mut printer = Self::new();
        accept(&mut printer, tree, id)?;
        Ok(printer.out)
    }

    /// Outline of the whole tree; empty if parsing never set a root.
    pub fn render_tree(tree: &ParseTree) -> Result<String> {
        tree.root()
            .map_or_else(|| Ok(String::new()), |root| Self::render(tree, root))
    }
}

impl Visitor for TreePrinter {
    fn name(&self) -> &'static str {
        "TreePrinter"
    }

    fn policy(&self) -> FallbackPolicy {
        FallbackPolicy::Recurse
    }

    fn pre_visit(&mut self, tree: &ParseTree, id: NodeId) {
        let node = tree.node(id);
        let _ = write!(self.out, "{:indent$}{}", "", node.nodetype(), indent = self.depth * 2);
        if let NodeKind::Expr(op) = node.kind {
            let _ = write!(self.out, "({op})");
        }
        if let Some(text) = tree.token_text(id) {
            let _ = write!(self.out, " '{text}'");
        }
        let _ = writeln!(self.out, " [{}..{}]", node.info.offset, node.info.end());
        self.depth += 1;
    }

    fn post_visit(&mut self, _tree: &ParseTree, _id: NodeId) {
        self.depth = self.depth.saturating_sub(1);
    }
}
