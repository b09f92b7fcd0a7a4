use serde::{Deserialize, Serialize};
use vsql_parser::ParserConfig;

/// Default evaluator recursion limit.
pub const DEFAULT_MAX_EXPR_DEPTH: usize = 256;

/// How arithmetic, concatenation, and comparison treat a NULL operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NullArithmetic {
    /// SQL semantics: the result is NULL.
    #[default]
    Propagate,
    /// Fail with `NullValue`.
    Strict,
}

/// Settings for preparing and running a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub parser: ParserConfig,
    pub null_arithmetic: NullArithmetic,
    /// Prefix of generated column aliases (`EXPR_1`, `EXPR_2`, ...).
    pub alias_prefix: String,
    /// Deepest expression nesting the evaluator accepts.
    pub max_expr_depth: usize,
}

impl EngineConfig {
    #[must_use]
    pub fn with_parser(mut self, parser: ParserConfig) -> Self {
        self.parser = parser;
        self
    }

    #[must_use]
    pub fn with_null_arithmetic(mut self, null_arithmetic: NullArithmetic) -> Self {
        self.null_arithmetic = null_arithmetic;
        self
    }

    #[must_use]
    pub fn with_alias_prefix(mut self, alias_prefix: impl Into<String>) -> Self {
        self.alias_prefix = alias_prefix.into();
        self
    }

    /// Returns `None` when `max_expr_depth` is zero.
    #[must_use]
    pub fn with_max_expr_depth(mut self, max_expr_depth: usize) -> Option<Self> {
        if max_expr_depth == 0 {
            return None;
        }
        self.max_expr_depth = max_expr_depth;
        Some(self)
    }

    /// Alias for the `n`th anonymous output column.
    #[must_use]
    pub fn anonymous_alias(&self, n: u32) -> String {
        format!("{}_{n}", self.alias_prefix)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parser: ParserConfig::default(),
            null_arithmetic: NullArithmetic::Propagate,
            alias_prefix: "EXPR".to_owned(),
            max_expr_depth: DEFAULT_MAX_EXPR_DEPTH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.null_arithmetic, NullArithmetic::Propagate);
        assert_eq!(config.anonymous_alias(3), "EXPR_3");
        assert_eq!(config.max_expr_depth, DEFAULT_MAX_EXPR_DEPTH);
    }

    #[test]
    fn builders() {
        let config = EngineConfig::default()
            .with_alias_prefix("COL")
            .with_null_arithmetic(NullArithmetic::Strict)
            .with_max_expr_depth(8)
            .unwrap();
        assert_eq!(config.anonymous_alias(1), "COL_1");
        assert_eq!(config.null_arithmetic, NullArithmetic::Strict);
        assert!(EngineConfig::default().with_max_expr_depth(0).is_none());
    }

    #[test]
    fn deserialize_partial() {
        let config: EngineConfig = serde_json::from_str(
            r#"{"null_arithmetic":"Strict","parser":{"max_sql_length":512}}"#,
        )
        .unwrap();
        assert_eq!(config.null_arithmetic, NullArithmetic::Strict);
        assert_eq!(config.parser.max_sql_length, 512);
        assert_eq!(config.parser.source_name, "<sql>");
        assert_eq!(config.alias_prefix, "EXPR");
    }
}
