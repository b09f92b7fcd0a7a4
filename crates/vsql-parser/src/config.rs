use serde::{Deserialize, Serialize};

/// Default upper bound on statement length, in bytes.
pub const DEFAULT_MAX_SQL_LENGTH: usize = 1_000_000;

/// Tokenizer and parser settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Name stamped into every `SourceInfo` the parse produces.
    pub source_name: String,
    /// Statements longer than this many bytes are rejected before tokenizing.
    pub max_sql_length: usize,
}

impl ParserConfig {
    #[must_use]
    pub fn with_source_name(mut self, source_name: impl Into<String>) -> Self {
        self.source_name = source_name.into();
        self
    }

    /// Returns `None` when `max_sql_length` is zero.
    #[must_use]
    pub fn with_max_sql_length(mut self, max_sql_length: usize) -> Option<Self> {
        if max_sql_length == 0 {
            return None;
        }
        self.max_sql_length = max_sql_length;
        Some(self)
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            source_name: "<sql>".to_owned(),
            max_sql_length: DEFAULT_MAX_SQL_LENGTH,
        }
    }
}
