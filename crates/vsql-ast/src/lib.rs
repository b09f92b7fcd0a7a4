//! Syntax tree for vsql SELECT statements.
//!
//! A parse produces one [`ParseTree`]: an arena that owns every [`Token`] and
//! every [`Node`] of the statement. Nodes refer to each other and to their
//! tokens by index ([`NodeId`], [`TokenId`]), so the whole tree is released
//! as a unit and nothing outside it holds an owning reference.
//!
//! Passes over the tree implement [`Visitor`]; [`TreePrinter`] is the
//! diagnostic pass used in logs and tests.

mod printer;
mod token;
mod tree;
mod visitor;

use std::fmt;
use std::sync::Arc;

use vsql_error::ErrorLocation;

pub use printer::TreePrinter;
pub use token::{Token, TokenKind, lookup_keyword};
pub use tree::{ExprOp, Node, NodeId, NodeKind, NodeType, ParseTree, TokenId};
pub use visitor::{FallbackPolicy, Visitor, accept, walk_children};

// ---------------------------------------------------------------------------
// SourceInfo: source location tracking
// ---------------------------------------------------------------------------

/// Where a token or node came from in the SQL text.
///
/// Offsets are byte offsets into the statement. Merging two infos produces
/// one that covers both ranges and reports the earlier line.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SourceInfo {
    /// Name of the statement source, e.g. a file name or `"<sql>"`.
    pub source: Arc<str>,
    /// Byte offset of the first character.
    pub offset: usize,
    /// Length in bytes.
    pub length: usize,
    /// 1-based line of the first character.
    pub line: u32,
}

impl SourceInfo {
    #[must_use]
    pub const fn new(source: Arc<str>, offset: usize, length: usize, line: u32) -> Self {
        Self {
            source,
            offset,
            length,
            line,
        }
    }

    /// A zero-length info at the start of `source`, for nodes with no text.
    #[must_use]
    pub const fn empty(source: Arc<str>) -> Self {
        Self::new(source, 0, 0, 1)
    }

    /// Byte offset one past the last character.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.offset + self.length
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Grow this info to cover `other` as well.
    ///
    /// Never shrinks. A zero-length info adopts `other` outright so that
    /// placeholder positions do not drag the range back to offset 0.
    pub fn expand(&mut self, other: &Self) {
        if self.is_empty() {
            self.offset = other.offset;
            self.length = other.length;
            self.line = other.line;
            return;
        }
        if other.is_empty() {
            return;
        }
        let start = self.offset.min(other.offset);
        let end = self.end().max(other.end());
        self.offset = start;
        self.length = end - start;
        self.line = self.line.min(other.line);
    }

    /// Merged copy covering both infos.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        merged.expand(other);
        merged
    }

    /// The covered slice of `sql`, if the range is valid for it.
    #[must_use]
    pub fn slice<'a>(&self, sql: &'a str) -> Option<&'a str> {
        sql.get(self.offset..self.end())
    }

    /// This span as the location of an error.
    #[must_use]
    pub fn location(&self) -> ErrorLocation {
        ErrorLocation::new(&*self.source, self.line, self.offset, self.length)
    }
}

impl fmt::Debug for SourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}..{}", self.source, self.line, self.offset, self.end())
    }
}

impl fmt::Display for SourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} line {}, offset {}",
            self.source, self.line, self.offset
        )
    }
}
