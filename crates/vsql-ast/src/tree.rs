use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

use vsql_error::Result;
use vsql_types::Variant;

use crate::{SourceInfo, Token, TokenKind};

/// Index of a node inside its [`ParseTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Index of a token inside its [`ParseTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenId(usize);

impl TokenId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

/// Operator carried by an expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Concat,
    // Comparison
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    // Logical
    And,
    Or,
    Xor,
    Not,
    // Unary sign
    Neg,
    Pos,
    // Null checks
    IsNull,
    IsNotNull,
}

impl ExprOp {
    /// Operator for a binary infix token.
    #[must_use]
    pub const fn from_binary_token(kind: TokenKind) -> Option<Self> {
        let op = match kind {
            TokenKind::Plus => Self::Add,
            TokenKind::Minus => Self::Sub,
            TokenKind::Star => Self::Mul,
            TokenKind::Slash => Self::Div,
            TokenKind::Mod | TokenKind::Percent => Self::Mod,
            TokenKind::Concat => Self::Concat,
            TokenKind::Eq => Self::Eq,
            TokenKind::Ne => Self::Ne,
            TokenKind::Lt => Self::Lt,
            TokenKind::Gt => Self::Gt,
            TokenKind::Le => Self::Le,
            TokenKind::Ge => Self::Ge,
            TokenKind::And => Self::And,
            TokenKind::Or => Self::Or,
            TokenKind::Xor => Self::Xor,
            _ => return None,
        };
        Some(op)
    }

    /// Takes one operand rather than two.
    #[must_use]
    pub const fn is_unary(self) -> bool {
        matches!(
            self,
            Self::Not | Self::Neg | Self::Pos | Self::IsNull | Self::IsNotNull
        )
    }

    #[must_use]
    pub const fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Mod | Self::Neg | Self::Pos
        )
    }

    #[must_use]
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Gt | Self::Le | Self::Ge
        )
    }

    #[must_use]
    pub const fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Xor | Self::Not)
    }

    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add | Self::Pos => "+",
            Self::Sub | Self::Neg => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "MOD",
            Self::Concat => "||",
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Xor => "XOR",
            Self::Not => "NOT",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }
}

impl fmt::Display for ExprOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// What a node is, with the payload that kind carries.
///
/// Child layout per kind:
/// - `Root`: `[Select]`
/// - `Select`: `[Token(SELECT), AttrList, From, Where?]`
/// - `AttrList`: one child per attribute
/// - `AllAttr`: `[IdGroup?, Token(*)]`; the group names the source of `alias.*`
/// - `From`: `[Token(FROM), source...]`, each source an `IdGroup` or `Alias`
/// - `Where`: `[Token(WHERE), expr]`
/// - `IdGroup`: `[Id...]`, outermost qualifier first
/// - `Alias`: `[inner, Token(AS)?, Id]`
/// - `Expr`: `[operand]` or `[lhs, rhs]`
/// - `FuncCall`: `[Id, arg...]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Root,
    Select,
    AttrList,
    AllAttr,
    From,
    Where,
    Id(TokenId),
    IdGroup,
    Alias,
    Literal(TokenId),
    Number(TokenId),
    Null(TokenId),
    Expr(ExprOp),
    FuncCall,
    Param(TokenId),
    Token(TokenId),
}

impl NodeKind {
    #[must_use]
    pub const fn nodetype(self) -> NodeType {
        match self {
            Self::Root => NodeType::Root,
            Self::Select => NodeType::Select,
            Self::AttrList => NodeType::AttrList,
            Self::AllAttr => NodeType::AllAttr,
            Self::From => NodeType::From,
            Self::Where => NodeType::Where,
            Self::Id(_) => NodeType::Id,
            Self::IdGroup => NodeType::IdGroup,
            Self::Alias => NodeType::Alias,
            Self::Literal(_) => NodeType::Literal,
            Self::Number(_) => NodeType::Number,
            Self::Null(_) => NodeType::Null,
            Self::Expr(_) => NodeType::Expr,
            Self::FuncCall => NodeType::FuncCall,
            Self::Param(_) => NodeType::Param,
            Self::Token(_) => NodeType::Token,
        }
    }

    /// The token a leaf kind wraps.
    #[must_use]
    pub const fn token(self) -> Option<TokenId> {
        match self {
            Self::Id(t)
            | Self::Literal(t)
            | Self::Number(t)
            | Self::Null(t)
            | Self::Param(t)
            | Self::Token(t) => Some(t),
            _ => None,
        }
    }
}

/// Payload-free node identity, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Root,
    Select,
    AttrList,
    AllAttr,
    From,
    Where,
    Id,
    IdGroup,
    Alias,
    Literal,
    Number,
    Null,
    Expr,
    FuncCall,
    Param,
    Token,
}

impl NodeType {
    #[must_use]
    pub const fn str(self) -> &'static str {
        match self {
            Self::Root => "ParseTree",
            Self::Select => "SelectNode",
            Self::AttrList => "AttrListNode",
            Self::AllAttr => "AllAttrNode",
            Self::From => "FromNode",
            Self::Where => "WhereNode",
            Self::Id => "IdNode",
            Self::IdGroup => "IdGroupNode",
            Self::Alias => "AliasNode",
            Self::Literal => "LiteralNode",
            Self::Number => "NumberNode",
            Self::Null => "NullNode",
            Self::Expr => "ExprNode",
            Self::FuncCall => "FuncCallNode",
            Self::Param => "ParamNode",
            Self::Token => "TokenNode",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.str())
    }
}

/// One node of the tree. Its `info` covers its own token and every child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub children: Vec<NodeId>,
    pub info: SourceInfo,
}

impl Node {
    #[must_use]
    pub const fn nodetype(&self) -> NodeType {
        self.kind.nodetype()
    }
}

// ---------------------------------------------------------------------------
// ParseTree arena
// ---------------------------------------------------------------------------

/// Arena owning every token and node of one parsed statement.
#[derive(Debug)]
pub struct ParseTree {
    source: Arc<str>,
    tokens: Vec<Token>,
    nodes: Vec<Node>,
    root: Option<NodeId>,
    alias_counter: Cell<u32>,
    param_counter: Cell<usize>,
}

impl ParseTree {
    #[must_use]
    pub fn new(source: impl Into<Arc<str>>) -> Self {
        Self {
            source: source.into(),
            tokens: Vec::new(),
            nodes: Vec::new(),
            root: None,
            alias_counter: Cell::new(0),
            param_counter: Cell::new(0),
        }
    }

    /// Name stamped into every [`SourceInfo`] of this tree.
    #[must_use]
    pub const fn source_name(&self) -> &Arc<str> {
        &self.source
    }

    /// Take ownership of a token.
    pub fn push_token(&mut self, token: Token) -> TokenId {
        self.tokens.push(token);
        TokenId(self.tokens.len() - 1)
    }

    #[must_use]
    pub fn token(&self, id: TokenId) -> &Token {
        &self.tokens[id.0]
    }

    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Allocate a node. Its info is the union of its token's and its
    /// children's infos.
    pub fn add_node(&mut self, kind: NodeKind, children: Vec<NodeId>) -> NodeId {
        let mut info = kind.token().map_or_else(
            || SourceInfo::empty(Arc::clone(&self.source)),
            |t| self.tokens[t.0].info.clone(),
        );
        for child in &children {
            info.expand(&self.nodes[child.0].info);
        }
        self.nodes.push(Node {
            kind,
            children,
            info,
        });
        NodeId(self.nodes.len() - 1)
    }

    /// Wrap `select` in the root node and make it the tree's entry point.
    pub fn set_root(&mut self, select: NodeId) -> NodeId {
        let root = self.add_node(NodeKind::Root, vec![select]);
        self.root = Some(root);
        root
    }

    #[must_use]
    pub const fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// The statement's `Select` node, once parsing has finished.
    #[must_use]
    pub fn select(&self) -> Option<NodeId> {
        let root = self.root?;
        self.children(root)
            .first()
            .copied()
            .filter(|&id| self.kind(id) == NodeKind::Select)
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    #[must_use]
    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.nodes[id.0].kind
    }

    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    #[must_use]
    pub fn info(&self, id: NodeId) -> &SourceInfo {
        &self.nodes[id.0].info
    }

    /// First child of `id` with the given node type.
    #[must_use]
    pub fn child_of_type(&self, id: NodeId, nodetype: NodeType) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&c| self.kind(c).nodetype() == nodetype)
    }

    /// Text of the token a leaf node wraps.
    #[must_use]
    pub fn token_text(&self, id: NodeId) -> Option<&str> {
        self.kind(id)
            .token()
            .map(|t| self.tokens[t.0].text.as_str())
    }

    /// Name parts of an `IdGroup`, outermost first. Any other node yields
    /// its own token text, if any.
    #[must_use]
    pub fn name_parts(&self, id: NodeId) -> Vec<&str> {
        match self.kind(id) {
            NodeKind::IdGroup => self
                .children(id)
                .iter()
                .filter_map(|&c| self.token_text(c))
                .collect(),
            _ => self.token_text(id).into_iter().collect(),
        }
    }

    /// Value of a constant leaf: a string literal, number, or `NULL`.
    /// `Ok(None)` for every other kind.
    pub fn constant_value(&self, id: NodeId) -> Result<Option<Variant>> {
        let value = match self.kind(id) {
            NodeKind::Literal(t) => Variant::Text(self.tokens[t.0].text.clone()),
            NodeKind::Number(t) => Variant::from_number_text(&self.tokens[t.0].text)?,
            NodeKind::Null(_) => Variant::Null,
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    /// Next anonymous column alias number, starting at 1.
    pub fn next_alias(&self) -> u32 {
        let n = self.alias_counter.get() + 1;
        self.alias_counter.set(n);
        n
    }

    /// Next 1-based parameter ordinal.
    pub fn next_param_ordinal(&self) -> usize {
        let n = self.param_counter.get() + 1;
        self.param_counter.set(n);
        n
    }

    /// Number of parameter ordinals handed out so far.
    #[must_use]
    pub fn param_count(&self) -> usize {
        self.param_counter.get()
    }

    /// Number of nodes in the arena.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes on the longest path from `id` down to a leaf, `id` included.
    /// Children precede their parent in the arena, so one forward pass
    /// computes it without recursion.
    #[must_use]
    pub fn height(&self, id: NodeId) -> usize {
        let mut heights = vec![0_usize; id.0 + 1];
        for (i, node) in self.nodes[..=id.0].iter().enumerate() {
            heights[i] = 1 + node.children.iter().map(|c| heights[c.0]).max().unwrap_or(0);
        }
        heights[id.0]
    }

    /// Every node id, in allocation order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(tree: &mut ParseTree, kind: TokenKind, text: &str, offset: usize) -> TokenId {
        let info = SourceInfo::new(Arc::clone(tree.source_name()), offset, text.len(), 1);
        tree.push_token(Token::new(kind, text, info))
    }

    #[test]
    fn parent_info_covers_children() {
        let mut tree = ParseTree::new("<sql>");
        let a = tok(&mut tree, TokenKind::Ident, "a", 7);
        let b = tok(&mut tree, TokenKind::Ident, "b", 11);
        let a = tree.add_node(NodeKind::Id(a), vec![]);
        let b = tree.add_node(NodeKind::Id(b), vec![]);
        let sum = tree.add_node(NodeKind::Expr(ExprOp::Add), vec![a, b]);
        let info = tree.info(sum);
        assert_eq!(info.offset, 7);
        assert_eq!(info.end(), 12);
    }

    #[test]
    fn height_of_deep_chain() {
        let mut tree = ParseTree::new("<sql>");
        let one = tok(&mut tree, TokenKind::Number, "1", 0);
        let mut node = tree.add_node(NodeKind::Number(one), vec![]);
        assert_eq!(tree.height(node), 1);
        for _ in 0..50_000 {
            node = tree.add_node(NodeKind::Expr(ExprOp::Neg), vec![node]);
        }
        let other = tree.add_node(NodeKind::Null(one), vec![]);
        let sum = tree.add_node(NodeKind::Expr(ExprOp::Add), vec![other, node]);
        assert_eq!(tree.height(sum), 50_002);
        assert_eq!(tree.height(other), 1);
    }

    #[test]
    fn name_parts_of_group() {
        let mut tree = ParseTree::new("<sql>");
        let s = tok(&mut tree, TokenKind::Ident, "sales", 0);
        let t = tok(&mut tree, TokenKind::QuotedIdent, "order items", 6);
        let s = tree.add_node(NodeKind::Id(s), vec![]);
        let t = tree.add_node(NodeKind::Id(t), vec![]);
        let group = tree.add_node(NodeKind::IdGroup, vec![s, t]);
        assert_eq!(tree.name_parts(group), vec!["sales", "order items"]);
        assert_eq!(tree.name_parts(t), vec!["order items"]);
    }

    #[test]
    fn constants() {
        let mut tree = ParseTree::new("<sql>");
        let n = tok(&mut tree, TokenKind::Number, "2.5", 0);
        let s = tok(&mut tree, TokenKind::String, "x", 4);
        let n = tree.add_node(NodeKind::Number(n), vec![]);
        let s = tree.add_node(NodeKind::Literal(s), vec![]);
        let group = tree.add_node(NodeKind::IdGroup, vec![]);
        assert_eq!(tree.constant_value(n).unwrap(), Some(Variant::Double(2.5)));
        assert_eq!(tree.constant_value(s).unwrap(), Some(Variant::from("x")));
        assert_eq!(tree.constant_value(group).unwrap(), None);
    }

    #[test]
    fn counters_are_per_tree() {
        let a = ParseTree::new("a");
        let b = ParseTree::new("b");
        assert_eq!(a.next_alias(), 1);
        assert_eq!(a.next_alias(), 2);
        assert_eq!(b.next_alias(), 1);
        assert_eq!(a.next_param_ordinal(), 1);
        assert_eq!(a.param_count(), 1);
        assert_eq!(b.param_count(), 0);
    }

    #[test]
    fn root_and_select() {
        let mut tree = ParseTree::new("<sql>");
        assert!(tree.select().is_none());
        let select = tree.add_node(NodeKind::Select, vec![]);
        let root = tree.set_root(select);
        assert_eq!(tree.root(), Some(root));
        assert_eq!(tree.select(), Some(select));
        assert_eq!(tree.node(root).nodetype().str(), "ParseTree");
    }

    #[test]
    fn operator_classes() {
        assert_eq!(ExprOp::from_binary_token(TokenKind::Percent), Some(ExprOp::Mod));
        assert_eq!(ExprOp::from_binary_token(TokenKind::Not), None);
        assert!(ExprOp::IsNotNull.is_unary());
        assert!(ExprOp::Ge.is_comparison());
        assert!(ExprOp::Xor.is_logical());
        assert!(!ExprOp::Concat.is_arithmetic());
    }
}
