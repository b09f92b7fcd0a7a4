use vsql_error::{Result, VsqlError};

use crate::{NodeId, NodeKind, ParseTree};

/// What a visitor does with a node kind it does not override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Fail with `NotImplemented`: the pass must handle every kind it meets.
    Strict,
    /// Do nothing for the node itself and visit its children.
    Recurse,
}

/// A pass over a [`ParseTree`].
///
/// [`accept`] dispatches on the node kind to the matching `visit_*` method.
/// Every `visit_*` defaults to [`Visitor::fallback`], which applies
/// [`Visitor::policy`]. `pre_visit`/`post_visit` run around every dispatch.
pub trait Visitor {
    /// Name used in `NotImplemented` errors.
    fn name(&self) -> &'static str;

    fn policy(&self) -> FallbackPolicy {
        FallbackPolicy::Strict
    }

    fn pre_visit(&mut self, _tree: &ParseTree, _id: NodeId) {}

    fn post_visit(&mut self, _tree: &ParseTree, _id: NodeId) {}

    fn fallback(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        match self.policy() {
            FallbackPolicy::Strict => Err(VsqlError::not_implemented(format!(
                "{} in {}",
                tree.node(id).nodetype(),
                self.name()
            ))),
            FallbackPolicy::Recurse => walk_children(self, tree, id),
        }
    }

    fn visit_root(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        self.fallback(tree, id)
    }

    fn visit_select(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        self.fallback(tree, id)
    }

    fn visit_attr_list(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        self.fallback(tree, id)
    }

    fn visit_all_attr(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        self.fallback(tree, id)
    }

    fn visit_from(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        self.fallback(tree, id)
    }

    fn visit_where(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        self.fallback(tree, id)
    }

    fn visit_id(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        self.fallback(tree, id)
    }

    fn visit_id_group(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        self.fallback(tree, id)
    }

    fn visit_alias(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        self.fallback(tree, id)
    }

    fn visit_literal(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        self.fallback(tree, id)
    }

    fn visit_number(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        self.fallback(tree, id)
    }

    fn visit_null(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        self.fallback(tree, id)
    }

    fn visit_expr(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        self.fallback(tree, id)
    }

    fn visit_func_call(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        self.fallback(tree, id)
    }

    fn visit_param(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        self.fallback(tree, id)
    }

    fn visit_token(&mut self, tree: &ParseTree, id: NodeId) -> Result<()> {
        self.fallback(tree, id)
    }
}

/// Dispatch `id` to the visitor method for its kind.
pub fn accept<V: Visitor + ?Sized>(visitor: &mut V, tree: &ParseTree, id: NodeId) -> Result<()> {
    visitor.pre_visit(tree, id);
    let result = match tree.kind(id) {
        NodeKind::Root => visitor.visit_root(tree, id),
        NodeKind::Select => visitor.visit_select(tree, id),
        NodeKind::AttrList => visitor.visit_attr_list(tree, id),
        NodeKind::AllAttr => visitor.visit_all_attr(tree, id),
        NodeKind::From => visitor.visit_from(tree, id),
        NodeKind::Where => visitor.visit_where(tree, id),
        NodeKind::Id(_) => visitor.visit_id(tree, id),
        NodeKind::IdGroup => visitor.visit_id_group(tree, id),
        NodeKind::Alias => visitor.visit_alias(tree, id),
        NodeKind::Literal(_) => visitor.visit_literal(tree, id),
        NodeKind::Number(_) => visitor.visit_number(tree, id),
        NodeKind::Null(_) => visitor.visit_null(tree, id),
        NodeKind::Expr(_) => visitor.visit_expr(tree, id),
        NodeKind::FuncCall => visitor.visit_func_call(tree, id),
        NodeKind::Param(_) => visitor.visit_param(tree, id),
        NodeKind::Token(_) => visitor.visit_token(tree, id),
    };
    visitor.post_visit(tree, id);
    result
}

/// Visit every child of `id`, in order, stopping at the first error.
pub fn walk_children<V: Visitor + ?Sized>(
    visitor: &mut V,
    tree: &ParseTree,
    id: NodeId,
) -> Result<()> {
    for &child in tree.children(id) {
        accept(visitor, tree, child)?;
    }
    Ok(())
}
