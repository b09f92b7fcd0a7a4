use std::fmt;

use thiserror::Error;

/// Where in the SQL text a lexical or syntax error was detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorLocation {
    /// Statement source name, as configured for the parse.
    pub source: String,
    /// 1-based line.
    pub line: u32,
    /// Byte offset of the offending text.
    pub offset: usize,
    /// Length in bytes of the offending text.
    pub length: usize,
}

impl ErrorLocation {
    pub fn new(source: impl Into<String>, line: u32, offset: usize, length: usize) -> Self {
        Self {
            source: source.into(),
            line,
            offset,
            length,
        }
    }
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} line {}, offset {}", self.source, self.line, self.offset)
    }
}

/// Primary error type for vsql operations.
///
/// Every failure is raised at the point of detection and carries enough
/// structure for the caller to report it; nothing in the engine retries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VsqlError {
    // === Lexical Errors ===
    /// A character that starts no token.
    #[error("invalid character '{ch}' at {at}")]
    InvalidCharacter { ch: char, at: ErrorLocation },

    /// A quoted literal or identifier that runs to end of input.
    #[error("unterminated {what} starting at {at}")]
    Unterminated { what: &'static str, at: ErrorLocation },

    /// SQL text longer than the configured limit.
    #[error("SQL statement too long: {length} bytes (max {max})")]
    SqlTooLong { length: usize, max: usize },

    // === Syntax Errors ===
    /// The grammar automaton rejected a token.
    #[error("near \"{token}\": syntax error at {at}")]
    SyntaxError { token: String, at: ErrorLocation },

    // === Binder Errors ===
    /// Two FROM sources share one alias.
    #[error("duplicate source alias: {alias}")]
    DuplicateAlias { alias: String },

    /// The provider has no table by this name.
    #[error("no such table: {name}")]
    NoSuchTable { name: String },

    /// No registered source exposes this column.
    #[error("no such column: {name}")]
    NoSuchColumn { name: String },

    /// A qualified reference names an alias that was never registered.
    #[error("no such source alias: {alias}")]
    NoSuchSource { alias: String },

    /// An unqualified column exists in more than one source.
    #[error("ambiguous column name: {name}")]
    AmbiguousColumn { name: String },

    /// No scalar function with this name accepts this many arguments.
    #[error("no such function: {name}/{args}")]
    NoSuchFunction { name: String, args: usize },

    // === Runtime Errors ===
    /// Operation not permitted in the cursor's current state.
    #[error("cannot {operation} while cursor is {state}")]
    CursorState {
        operation: &'static str,
        state: &'static str,
    },

    /// Column position past the bound field list.
    #[error("column index {index} out of range ({count} columns)")]
    ColumnOutOfRange { index: usize, count: usize },

    /// Operand types the operator cannot combine.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// A null operand reached an operator under strict null handling.
    #[error("null value in {operation}")]
    NullValue { operation: String },

    /// Division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Integer overflow during computation.
    #[error("integer overflow")]
    IntegerOverflow,

    /// Expression nesting deeper than the evaluator allows.
    #[error("expression tree too deep (max {max})")]
    ExpressionTooDeep { max: usize },

    /// Feature not implemented by this engine.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    // === Provider Errors ===
    /// Failure reported by a data provider.
    #[error("data provider error: {0}")]
    Provider(String),

    /// Attempt to open a provider for writing.
    #[error("attempt to write a read-only data source")]
    ReadOnly,

    // === Internal Errors ===
    /// Internal logic error (should never happen).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`VsqlError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Invalid input characters or unterminated literals.
    Lexical,
    /// Token stream rejected by the grammar.
    Syntax,
    /// Names or parameters that cannot be bound to live sources.
    Binder,
    /// Failures while iterating or evaluating.
    Runtime,
    /// Failures raised by a data provider.
    Provider,
    /// Engine bugs.
    Internal,
}

impl ErrorCategory {
    /// Short lowercase label for diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lexical => "lexical",
            Self::Syntax => "syntax",
            Self::Binder => "binder",
            Self::Runtime => "runtime",
            Self::Provider => "provider",
            Self::Internal => "internal",
        }
    }
}

impl VsqlError {
    /// The coarse bucket this error belongs to.
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidCharacter { .. } | Self::Unterminated { .. } | Self::SqlTooLong { .. } => {
                ErrorCategory::Lexical
            }
            Self::SyntaxError { .. } => ErrorCategory::Syntax,
            Self::DuplicateAlias { .. }
            | Self::NoSuchTable { .. }
            | Self::NoSuchColumn { .. }
            | Self::NoSuchSource { .. }
            | Self::AmbiguousColumn { .. }
            | Self::NoSuchFunction { .. } => ErrorCategory::Binder,
            Self::CursorState { .. }
            | Self::ColumnOutOfRange { .. }
            | Self::TypeMismatch { .. }
            | Self::NullValue { .. }
            | Self::DivisionByZero
            | Self::IntegerOverflow
            | Self::ExpressionTooDeep { .. }
            | Self::NotImplemented(_) => ErrorCategory::Runtime,
            Self::Provider(_) | Self::ReadOnly => ErrorCategory::Provider,
            Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Whether the user can likely fix this by changing the query text.
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Lexical | ErrorCategory::Syntax | ErrorCategory::Binder
        ) || matches!(self, Self::TypeMismatch { .. } | Self::DivisionByZero)
    }

    /// Human-friendly suggestion for fixing this error.
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::DuplicateAlias { .. } => Some("Give each FROM source a distinct alias with AS"),
            Self::AmbiguousColumn { .. } => Some("Qualify the column with its source alias"),
            Self::NoSuchSource { .. } => Some("Use an alias declared in the FROM clause"),
            Self::NullValue { .. } => {
                Some("Enable null propagation or filter null rows with IS NOT NULL")
            }
            Self::CursorState { .. } => Some("Call execute() and first() before reading rows"),
            Self::NotImplemented(_) => Some("This feature is not available in vsql"),
            _ => None,
        }
    }

    /// Create a syntax error.
    pub fn syntax(token: impl Into<String>, at: ErrorLocation) -> Self {
        Self::SyntaxError {
            token: token.into(),
            at,
        }
    }

    /// Source location of a lexical or syntax error.
    pub const fn location(&self) -> Option<&ErrorLocation> {
        match self {
            Self::InvalidCharacter { at, .. }
            | Self::Unterminated { at, .. }
            | Self::SyntaxError { at, .. } => Some(at),
            _ => None,
        }
    }

    /// Create a type-mismatch error.
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a provider error.
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a not-implemented error.
    pub fn not_implemented(feature: impl Into<String>) -> Self {
        Self::NotImplemented(feature.into())
    }
}

/// Result type alias using `VsqlError`.
pub type Result<T> = std::result::Result<T, VsqlError>;
