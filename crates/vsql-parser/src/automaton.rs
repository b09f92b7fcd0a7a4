// Push-driven grammar automaton for
//
//   SELECT attr [, attr]* FROM src [, src]* [WHERE expr] [;]
//
// The adapter feeds one token at a time. Clause structure is a flat state
// machine; expressions are built by an operator-precedence sub-automaton
// (operand and operator stacks). Semantic actions allocate nodes in the
// ParseTree as soon as a construct is complete.

use vsql_ast::{ExprOp, NodeId, NodeKind, ParseTree, TokenId, TokenKind};
use vsql_error::{Result, VsqlError};

/// Operator precedence, loosest first. All binary operators are
/// left-associative; prefix operators apply to everything tighter.
mod prec {
    pub const OR: u8 = 1; // OR, XOR
    pub const AND: u8 = 2;
    pub const NOT_PREFIX: u8 = 3;
    pub const EQUALITY: u8 = 4; // = != IS [NOT] NULL
    pub const COMPARISON: u8 = 5; // < <= > >=
    pub const ADD: u8 = 6; // + -
    pub const MUL: u8 = 7; // * / MOD
    pub const CONCAT: u8 = 8; // ||
    pub const UNARY: u8 = 9; // prefix - +
}

const fn binary_prec(op: ExprOp) -> u8 {
    match op {
        ExprOp::Or | ExprOp::Xor => prec::OR,
        ExprOp::And => prec::AND,
        ExprOp::Eq | ExprOp::Ne | ExprOp::IsNull | ExprOp::IsNotNull => prec::EQUALITY,
        ExprOp::Lt | ExprOp::Gt | ExprOp::Le | ExprOp::Ge => prec::COMPARISON,
        ExprOp::Add | ExprOp::Sub => prec::ADD,
        ExprOp::Mul | ExprOp::Div | ExprOp::Mod => prec::MUL,
        ExprOp::Concat => prec::CONCAT,
        ExprOp::Not => prec::NOT_PREFIX,
        ExprOp::Neg | ExprOp::Pos => prec::UNARY,
    }
}

fn reject(tree: &ParseTree, tok: TokenId) -> VsqlError {
    let token = tree.token(tok);
    let text = if token.is_eof() {
        token.kind.as_str().to_owned()
    } else {
        token.text.clone()
    };
    VsqlError::syntax(text, token.info.location())
}

// ---------------------------------------------------------------------------
// Expression sub-automaton
// ---------------------------------------------------------------------------

/// What the expression automaton did with a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExprStep {
    /// Token consumed; the expression continues.
    Consumed,
    /// Token does not belong to the expression, which is complete. The token
    /// was NOT consumed.
    Finished(NodeId),
    /// `alias.*` seen where an attribute expression was expected. The star
    /// token was consumed.
    QualifiedStar { group: NodeId, star: NodeId },
}

#[derive(Debug, Clone, Copy)]
enum Pending {
    Binary(ExprOp),
    Prefix(ExprOp),
    Paren,
    Call { name: NodeId, base: usize },
}

impl Pending {
    const fn prec(self) -> Option<u8> {
        match self {
            Self::Binary(op) | Self::Prefix(op) => Some(binary_prec(op)),
            Self::Paren | Self::Call { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Expecting an operand. `call_open` allows `)` to close an empty call.
    Operand { call_open: bool },
    /// Expecting an operator or the end of the expression.
    Operator,
    /// After an identifier: `.`, `(` or the end of the name.
    Name,
    /// After `name.`.
    NameDot,
    /// After `IS`.
    Is,
    /// After `IS NOT`.
    IsNot,
}

#[derive(Debug)]
pub(crate) struct ExprBuilder {
    operands: Vec<NodeId>,
    pending: Vec<Pending>,
    name: Vec<NodeId>,
    phase: Phase,
    allow_star: bool,
}

impl ExprBuilder {
    /// `allow_star` permits a leading `alias.*` (attribute position).
    pub(crate) const fn new(allow_star: bool) -> Self {
        Self {
            operands: Vec::new(),
            pending: Vec::new(),
            name: Vec::new(),
            phase: Phase::Operand { call_open: false },
            allow_star,
        }
    }

    pub(crate) fn feed(&mut self, tree: &mut ParseTree, tok: TokenId) -> Result<ExprStep> {
        loop {
            let kind = tree.token(tok).kind;
            let step = match self.phase {
                Phase::Operand { call_open } => self.on_operand(tree, tok, kind, call_open)?,
                Phase::Operator => self.on_operator(tree, tok, kind)?,
                Phase::Name => self.on_name(tree, tok, kind)?,
                Phase::NameDot => self.on_name_dot(tree, tok, kind)?,
                Phase::Is => match kind {
                    TokenKind::Not => {
                        self.phase = Phase::IsNot;
                        Some(ExprStep::Consumed)
                    }
                    TokenKind::Null => Some(self.postfix(tree, ExprOp::IsNull)?),
                    _ => return Err(reject(tree, tok)),
                },
                Phase::IsNot => match kind {
                    TokenKind::Null => Some(self.postfix(tree, ExprOp::IsNotNull)?),
                    _ => return Err(reject(tree, tok)),
                },
            };
            // `None`: the phase changed without consuming; re-dispatch.
            if let Some(step) = step {
                return Ok(step);
            }
        }
    }

    fn on_operand(
        &mut self,
        tree: &mut ParseTree,
        tok: TokenId,
        kind: TokenKind,
        call_open: bool,
    ) -> Result<Option<ExprStep>> {
        let leaf = match kind {
            TokenKind::Number => NodeKind::Number(tok),
            TokenKind::String => NodeKind::Literal(tok),
            TokenKind::Null => NodeKind::Null(tok),
            TokenKind::Question => NodeKind::Param(tok),
            TokenKind::Ident | TokenKind::QuotedIdent => {
                let id = tree.add_node(NodeKind::Id(tok), vec![]);
                self.name.push(id);
                self.phase = Phase::Name;
                return Ok(Some(ExprStep::Consumed));
            }
            TokenKind::LParen => {
                self.pending.push(Pending::Paren);
                self.phase = Phase::Operand { call_open: false };
                return Ok(Some(ExprStep::Consumed));
            }
            TokenKind::Minus | TokenKind::Plus | TokenKind::Not => {
                let op = match kind {
                    TokenKind::Minus => ExprOp::Neg,
                    TokenKind::Plus => ExprOp::Pos,
                    _ => ExprOp::Not,
                };
                self.pending.push(Pending::Prefix(op));
                self.phase = Phase::Operand { call_open: false };
                return Ok(Some(ExprStep::Consumed));
            }
            TokenKind::RParen if call_open => {
                self.close_group(tree, tok)?;
                return Ok(Some(ExprStep::Consumed));
            }
            _ => return Err(reject(tree, tok)),
        };
        let node = tree.add_node(leaf, vec![]);
        self.operands.push(node);
        self.phase = Phase::Operator;
        Ok(Some(ExprStep::Consumed))
    }

    fn on_operator(
        &mut self,
        tree: &mut ParseTree,
        tok: TokenId,
        kind: TokenKind,
    ) -> Result<Option<ExprStep>> {
        if let Some(op) = ExprOp::from_binary_token(kind) {
            self.reduce_while(tree, binary_prec(op))?;
            self.pending.push(Pending::Binary(op));
            self.phase = Phase::Operand { call_open: false };
            return Ok(Some(ExprStep::Consumed));
        }
        match kind {
            TokenKind::Is => {
                self.reduce_while(tree, prec::EQUALITY)?;
                self.phase = Phase::Is;
                Ok(Some(ExprStep::Consumed))
            }
            TokenKind::RParen if self.has_open_group() => {
                self.close_group(tree, tok)?;
                Ok(Some(ExprStep::Consumed))
            }
            TokenKind::Comma if self.has_open_group() => {
                self.reduce_while(tree, 0)?;
                match self.pending.last() {
                    Some(Pending::Call { .. }) => {
                        self.phase = Phase::Operand { call_open: false };
                        Ok(Some(ExprStep::Consumed))
                    }
                    _ => Err(reject(tree, tok)),
                }
            }
            _ if self.has_open_group() => Err(reject(tree, tok)),
            _ => {
                self.reduce_while(tree, 0)?;
                let root = self.finish(tree, tok)?;
                Ok(Some(ExprStep::Finished(root)))
            }
        }
    }

    fn on_name(
        &mut self,
        tree: &mut ParseTree,
        tok: TokenId,
        kind: TokenKind,
    ) -> Result<Option<ExprStep>> {
        match kind {
            TokenKind::Dot => {
                self.phase = Phase::NameDot;
                Ok(Some(ExprStep::Consumed))
            }
            TokenKind::LParen if self.name.len() == 1 => {
                let name = self.name.remove(0);
                self.pending.push(Pending::Call {
                    name,
                    base: self.operands.len(),
                });
                self.phase = Phase::Operand { call_open: true };
                Ok(Some(ExprStep::Consumed))
            }
            TokenKind::LParen => Err(reject(tree, tok)),
            _ => {
                let group = self.take_group(tree);
                self.operands.push(group);
                self.phase = Phase::Operator;
                Ok(None)
            }
        }
    }

    fn on_name_dot(
        &mut self,
        tree: &mut ParseTree,
        tok: TokenId,
        kind: TokenKind,
    ) -> Result<Option<ExprStep>> {
        match kind {
            TokenKind::Ident | TokenKind::QuotedIdent => {
                let id = tree.add_node(NodeKind::Id(tok), vec![]);
                self.name.push(id);
                self.phase = Phase::Name;
                Ok(Some(ExprStep::Consumed))
            }
            TokenKind::Star
                if self.allow_star && self.pending.is_empty() && self.operands.is_empty() =>
            {
                let group = self.take_group(tree);
                let star = tree.add_node(NodeKind::Token(tok), vec![]);
                self.reset();
                Ok(Some(ExprStep::QualifiedStar { group, star }))
            }
            _ => Err(reject(tree, tok)),
        }
    }

    fn take_group(&mut self, tree: &mut ParseTree) -> NodeId {
        let parts = std::mem::take(&mut self.name);
        tree.add_node(NodeKind::IdGroup, parts)
    }

    fn has_open_group(&self) -> bool {
        self.pending
            .iter()
            .any(|p| matches!(p, Pending::Paren | Pending::Call { .. }))
    }

    /// Apply pending operators whose precedence is at least `min`, stopping
    /// at the innermost open group.
    fn reduce_while(&mut self, tree: &mut ParseTree, min: u8) -> Result<()> {
        while let Some(&top) = self.pending.last() {
            match top.prec() {
                Some(p) if p >= min => {
                    self.pending.pop();
                    self.apply(tree, top)?;
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn apply(&mut self, tree: &mut ParseTree, pending: Pending) -> Result<()> {
        let node = match pending {
            Pending::Binary(op) => {
                let (Some(rhs), Some(lhs)) = (self.operands.pop(), self.operands.pop()) else {
                    return Err(VsqlError::internal("binary operator without two operands"));
                };
                tree.add_node(NodeKind::Expr(op), vec![lhs, rhs])
            }
            Pending::Prefix(op) => {
                let Some(operand) = self.operands.pop() else {
                    return Err(VsqlError::internal("prefix operator without operand"));
                };
                tree.add_node(NodeKind::Expr(op), vec![operand])
            }
            Pending::Paren | Pending::Call { .. } => {
                return Err(VsqlError::internal("group marker applied as operator"));
            }
        };
        self.operands.push(node);
        Ok(())
    }

    fn postfix(&mut self, tree: &mut ParseTree, op: ExprOp) -> Result<ExprStep> {
        let Some(operand) = self.operands.pop() else {
            return Err(VsqlError::internal("IS NULL without operand"));
        };
        let node = tree.add_node(NodeKind::Expr(op), vec![operand]);
        self.operands.push(node);
        self.phase = Phase::Operator;
        Ok(ExprStep::Consumed)
    }

    /// Handle `)`: close the innermost parenthesis or function call.
    fn close_group(&mut self, tree: &mut ParseTree, tok: TokenId) -> Result<()> {
        self.reduce_while(tree, 0)?;
        match self.pending.pop() {
            Some(Pending::Paren) => {}
            Some(Pending::Call { name, base }) => {
                if base > self.operands.len() {
                    return Err(VsqlError::internal("function arguments underflow"));
                }
                let mut children = vec![name];
                children.extend(self.operands.drain(base..));
                let call = tree.add_node(NodeKind::FuncCall, children);
                self.operands.push(call);
            }
            _ => return Err(reject(tree, tok)),
        }
        self.phase = Phase::Operator;
        Ok(())
    }

    fn finish(&mut self, tree: &ParseTree, tok: TokenId) -> Result<NodeId> {
        let root = match (self.operands.pop(), self.operands.is_empty()) {
            (Some(root), true) if self.pending.is_empty() => root,
            _ => return Err(reject(tree, tok)),
        };
        self.reset();
        Ok(root)
    }

    fn reset(&mut self) {
        self.operands.clear();
        self.pending.clear();
        self.name.clear();
        self.phase = Phase::Operand { call_open: false };
    }
}

// ---------------------------------------------------------------------------
// Statement automaton
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Expecting `SELECT`.
    Start,
    /// Expecting an attribute.
    AttrStart,
    /// Inside an attribute expression.
    AttrExpr,
    /// After an attribute expression: `AS`, a bare alias, or neither.
    AttrAlias(NodeId),
    /// After `expr AS`.
    AttrAliasName { attr: NodeId, as_kw: NodeId },
    /// Attribute complete: `,` or `FROM`.
    AfterAttr(NodeId),
    /// Expecting a source name.
    SrcStart,
    /// After a source name part.
    SrcName,
    /// After `name.`.
    SrcDot,
    /// After `src AS`.
    SrcAliasName { as_kw: NodeId },
    /// Source list complete so far: `,`, `WHERE`, `;`, or end.
    AfterSrc,
    /// Inside the WHERE expression.
    WhereExpr(NodeId),
    /// After the WHERE expression: `;` or end.
    AfterWhere,
    /// After `;`: only end of input may follow.
    End,
    Accepted,
}

/// Result of feeding one token to the statement automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Feed {
    NeedMore,
    Accepted,
}

enum Step {
    Consumed,
    Redispatch,
    Accept,
}

#[derive(Debug)]
pub(crate) struct Automaton {
    state: State,
    select_kw: Option<NodeId>,
    attrs: Vec<NodeId>,
    attr_list: Option<NodeId>,
    from_kw: Option<NodeId>,
    sources: Vec<NodeId>,
    src_parts: Vec<NodeId>,
    from: Option<NodeId>,
    where_clause: Option<NodeId>,
    expr: ExprBuilder,
}

impl Automaton {
    pub(crate) const fn new() -> Self {
        Self {
            state: State::Start,
            select_kw: None,
            attrs: Vec::new(),
            attr_list: None,
            from_kw: None,
            sources: Vec::new(),
            src_parts: Vec::new(),
            from: None,
            where_clause: None,
            expr: ExprBuilder::new(true),
        }
    }

    pub(crate) fn feed(&mut self, tree: &mut ParseTree, tok: TokenId) -> Result<Feed> {
        loop {
            match self.step(tree, tok)? {
                Step::Consumed => return Ok(Feed::NeedMore),
                Step::Accept => return Ok(Feed::Accepted),
                Step::Redispatch => {}
            }
        }
    }

    #[allow(clippy::too_many_lines)]
    fn step(&mut self, tree: &mut ParseTree, tok: TokenId) -> Result<Step> {
        let kind = tree.token(tok).kind;
        match self.state {
            State::Start => match kind {
                TokenKind::Select => {
                    self.select_kw = Some(tree.add_node(NodeKind::Token(tok), vec![]));
                    self.state = State::AttrStart;
                    Ok(Step::Consumed)
                }
                _ => Err(reject(tree, tok)),
            },

            State::AttrStart => match kind {
                TokenKind::Star => {
                    let star = tree.add_node(NodeKind::Token(tok), vec![]);
                    let attr = tree.add_node(NodeKind::AllAttr, vec![star]);
                    self.state = State::AfterAttr(attr);
                    Ok(Step::Consumed)
                }
                _ => {
                    self.expr = ExprBuilder::new(true);
                    self.state = State::AttrExpr;
                    Ok(Step::Redispatch)
                }
            },

            State::AttrExpr => match self.expr.feed(tree, tok)? {
                ExprStep::Consumed => Ok(Step::Consumed),
                ExprStep::Finished(expr) => {
                    self.state = State::AttrAlias(expr);
                    Ok(Step::Redispatch)
                }
                ExprStep::QualifiedStar { group, star } => {
                    let attr = tree.add_node(NodeKind::AllAttr, vec![group, star]);
                    self.state = State::AfterAttr(attr);
                    Ok(Step::Consumed)
                }
            },

            State::AttrAlias(attr) => match kind {
                TokenKind::As => {
                    let as_kw = tree.add_node(NodeKind::Token(tok), vec![]);
                    self.state = State::AttrAliasName { attr, as_kw };
                    Ok(Step::Consumed)
                }
                TokenKind::Ident | TokenKind::QuotedIdent => {
                    let name = tree.add_node(NodeKind::Id(tok), vec![]);
                    let alias = tree.add_node(NodeKind::Alias, vec![attr, name]);
                    self.state = State::AfterAttr(alias);
                    Ok(Step::Consumed)
                }
                _ => {
                    self.state = State::AfterAttr(attr);
                    Ok(Step::Redispatch)
                }
            },

            State::AttrAliasName { attr, as_kw } => match kind {
                TokenKind::Ident | TokenKind::QuotedIdent => {
                    let name = tree.add_node(NodeKind::Id(tok), vec![]);
                    let alias = tree.add_node(NodeKind::Alias, vec![attr, as_kw, name]);
                    self.state = State::AfterAttr(alias);
                    Ok(Step::Consumed)
                }
                _ => Err(reject(tree, tok)),
            },

            State::AfterAttr(attr) => match kind {
                TokenKind::Comma => {
                    self.attrs.push(attr);
                    self.state = State::AttrStart;
                    Ok(Step::Consumed)
                }
                TokenKind::From => {
                    self.attrs.push(attr);
                    let attrs = std::mem::take(&mut self.attrs);
                    self.attr_list = Some(tree.add_node(NodeKind::AttrList, attrs));
                    self.from_kw = Some(tree.add_node(NodeKind::Token(tok), vec![]));
                    self.state = State::SrcStart;
                    Ok(Step::Consumed)
                }
                _ => Err(reject(tree, tok)),
            },

            State::SrcStart => match kind {
                TokenKind::Ident | TokenKind::QuotedIdent => {
                    self.src_parts.push(tree.add_node(NodeKind::Id(tok), vec![]));
                    self.state = State::SrcName;
                    Ok(Step::Consumed)
                }
                _ => Err(reject(tree, tok)),
            },

            State::SrcName => match kind {
                TokenKind::Dot if self.src_parts.len() < 3 => {
                    self.state = State::SrcDot;
                    Ok(Step::Consumed)
                }
                TokenKind::As => {
                    let as_kw = tree.add_node(NodeKind::Token(tok), vec![]);
                    self.state = State::SrcAliasName { as_kw };
                    Ok(Step::Consumed)
                }
                TokenKind::Ident | TokenKind::QuotedIdent => {
                    let group = self.take_source_group(tree);
                    let name = tree.add_node(NodeKind::Id(tok), vec![]);
                    let alias = tree.add_node(NodeKind::Alias, vec![group, name]);
                    self.sources.push(alias);
                    self.state = State::AfterSrc;
                    Ok(Step::Consumed)
                }
                TokenKind::Comma | TokenKind::Where | TokenKind::Semicolon | TokenKind::Eof => {
                    let group = self.take_source_group(tree);
                    self.sources.push(group);
                    self.state = State::AfterSrc;
                    Ok(Step::Redispatch)
                }
                _ => Err(reject(tree, tok)),
            },

            State::SrcDot => match kind {
                TokenKind::Ident | TokenKind::QuotedIdent => {
                    self.src_parts.push(tree.add_node(NodeKind::Id(tok), vec![]));
                    self.state = State::SrcName;
                    Ok(Step::Consumed)
                }
                _ => Err(reject(tree, tok)),
            },

            State::SrcAliasName { as_kw } => match kind {
                TokenKind::Ident | TokenKind::QuotedIdent => {
                    let group = self.take_source_group(tree);
                    let name = tree.add_node(NodeKind::Id(tok), vec![]);
                    let alias = tree.add_node(NodeKind::Alias, vec![group, as_kw, name]);
                    self.sources.push(alias);
                    self.state = State::AfterSrc;
                    Ok(Step::Consumed)
                }
                _ => Err(reject(tree, tok)),
            },

            State::AfterSrc => match kind {
                TokenKind::Comma => {
                    self.state = State::SrcStart;
                    Ok(Step::Consumed)
                }
                TokenKind::Where => {
                    self.close_from(tree)?;
                    let where_kw = tree.add_node(NodeKind::Token(tok), vec![]);
                    self.expr = ExprBuilder::new(false);
                    self.state = State::WhereExpr(where_kw);
                    Ok(Step::Consumed)
                }
                TokenKind::Semicolon => {
                    self.close_from(tree)?;
                    self.state = State::End;
                    Ok(Step::Consumed)
                }
                TokenKind::Eof => {
                    self.close_from(tree)?;
                    self.accept(tree)
                }
                _ => Err(reject(tree, tok)),
            },

            State::WhereExpr(where_kw) => match self.expr.feed(tree, tok)? {
                ExprStep::Consumed => Ok(Step::Consumed),
                ExprStep::Finished(expr) => {
                    self.where_clause = Some(tree.add_node(NodeKind::Where, vec![where_kw, expr]));
                    self.state = State::AfterWhere;
                    Ok(Step::Redispatch)
                }
                ExprStep::QualifiedStar { .. } => Err(reject(tree, tok)),
            },

            State::AfterWhere => match kind {
                TokenKind::Semicolon => {
                    self.state = State::End;
                    Ok(Step::Consumed)
                }
                TokenKind::Eof => self.accept(tree),
                _ => Err(reject(tree, tok)),
            },

            State::End => match kind {
                TokenKind::Eof => self.accept(tree),
                _ => Err(reject(tree, tok)),
            },

            State::Accepted => Err(reject(tree, tok)),
        }
    }

    fn take_source_group(&mut self, tree: &mut ParseTree) -> NodeId {
        let parts = std::mem::take(&mut self.src_parts);
        tree.add_node(NodeKind::IdGroup, parts)
    }

    fn close_from(&mut self, tree: &mut ParseTree) -> Result<()> {
        let Some(from_kw) = self.from_kw else {
            return Err(VsqlError::internal("FROM clause closed before FROM keyword"));
        };
        let mut children = vec![from_kw];
        children.append(&mut self.sources);
        self.from = Some(tree.add_node(NodeKind::From, children));
        Ok(())
    }

    fn accept(&mut self, tree: &mut ParseTree) -> Result<Step> {
        let (Some(select_kw), Some(attr_list), Some(from)) =
            (self.select_kw, self.attr_list, self.from)
        else {
            return Err(VsqlError::internal("statement accepted before it was complete"));
        };
        let mut children = vec![select_kw, attr_list, from];
        children.extend(self.where_clause);
        let select = tree.add_node(NodeKind::Select, children);
        tree.set_root(select);
        self.state = State::Accepted;
        Ok(Step::Accept)
    }
}
