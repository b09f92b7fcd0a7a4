//! Public API facade for vsql.
//!
//! vsql runs a single `SELECT` over one or more named sources that only
//! expose a forward-only row cursor ([`DataProvider`]). Sources are combined
//! with a nested loop in FROM order and filtered by WHERE as rows are
//! produced.
//!
//! ```ignore
//! let mut catalog = MemoryCatalog::new();
//! catalog.register(ObjectName::bare("t"), table);
//! let rows = vsql::query("SELECT x FROM t WHERE x > ?", &catalog, params![5])?;
//! ```

use tracing::debug;

pub use vsql_ast::{
    ExprOp, NodeId, NodeKind, NodeType, ParseTree, SourceInfo, Token, TokenKind, TreePrinter,
    Visitor,
};
pub use vsql_engine::{
    BoundQuery, CursorState, DataProvider, EngineConfig, Field, FieldKind, FunctionRegistry,
    MemoryCatalog, MemoryProvider, MemoryTable, NullArithmetic, OpenMode, ProviderFactory,
    ScalarFunction, SqlCursor,
};
pub use vsql_error::{ErrorCategory, ErrorLocation, Result, VsqlError};
pub use vsql_parser::{ParserConfig, parse, parse_with, tokenize};
pub use vsql_types::{ColumnDesc, DataType, Identifier, ObjectName, ParamMap, Variant};

/// Build a [`ParamMap`] binding each value to its 1-based position.
///
/// ```ignore
/// let p = params![5, "x", None::<i64>];
/// assert_eq!(p.value(2), Variant::from("x"));
/// ```
#[macro_export]
macro_rules! params {
    () => {
        $crate::ParamMap::new()
    };
    ($($val:expr),+ $(,)?) => {
        [$($crate::Variant::from($val)),+]
            .into_iter()
            .collect::<$crate::ParamMap>()
    };
}

/// Prepare `sql` with the builtin functions and default settings.
pub fn prepare(sql: &str, factory: &dyn ProviderFactory) -> Result<SqlCursor> {
    prepare_with(
        sql,
        factory,
        &FunctionRegistry::with_builtins(),
        &EngineConfig::default(),
    )
}

pub fn prepare_with(
    sql: &str,
    factory: &dyn ProviderFactory,
    registry: &FunctionRegistry,
    config: &EngineConfig,
) -> Result<SqlCursor> {
    SqlCursor::prepare(sql, factory, registry, config)
}

/// Run `sql` to completion and collect every row.
pub fn query(
    sql: &str,
    factory: &dyn ProviderFactory,
    params: ParamMap,
) -> Result<Vec<Vec<Variant>>> {
    query_with(
        sql,
        factory,
        params,
        &FunctionRegistry::with_builtins(),
        &EngineConfig::default(),
    )
}

pub fn query_with(
    sql: &str,
    factory: &dyn ProviderFactory,
    params: ParamMap,
    registry: &FunctionRegistry,
    config: &EngineConfig,
) -> Result<Vec<Vec<Variant>>> {
    let mut cursor = prepare_with(sql, factory, registry, config)?;
    let rows = fetch_all(&mut cursor, params);
    let closed = cursor.close();
    let rows = rows?;
    closed?;
    debug!(rows = rows.len(), "query finished");
    Ok(rows)
}

/// Execute a prepared cursor and drain it from the first row.
pub fn fetch_all(cursor: &mut SqlCursor, params: ParamMap) -> Result<Vec<Vec<Variant>>> {
    cursor.execute(params)?;
    let mut rows = Vec::new();
    let mut more = cursor.first()?;
    while more {
        rows.push(cursor.row()?);
        more = cursor.next()?;
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> MemoryCatalog {
        let mut catalog = MemoryCatalog::new();
        catalog.register(
            ObjectName::bare("t"),
            MemoryTable::with_rows(
                vec![ColumnDesc::new("x", DataType::Integer)],
                vec![vec![Variant::Integer(1)], vec![Variant::Integer(2)]],
            )
            .unwrap(),
        );
        catalog
    }

    #[test]
    fn test_params_macro() {
        let p = params![5, "x", None::<i64>];
        assert_eq!(p.value(1), Variant::Integer(5));
        assert_eq!(p.value(2), Variant::from("x"));
        assert_eq!(p.value(3), Variant::Null);
        assert!(params![].is_empty());
    }

    #[test]
    fn test_query_collects_rows() {
        let rows = query("SELECT x, x * ? FROM t", &catalog(), params![10]).unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Variant::Integer(1), Variant::Integer(10)],
                vec![Variant::Integer(2), Variant::Integer(20)],
            ]
        );
    }

    #[test]
    fn test_prepare_reports_errors_by_category() {
        let err = prepare("SELECT FROM t", &catalog()).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Syntax);
        let err = prepare("SELECT y FROM t", &catalog()).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Binder);
        let err = prepare("SELECT x FROM t WHERE x = #", &catalog()).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Lexical);
    }

    #[test]
    fn test_closure_factory() {
        let catalog = catalog();
        let factory = |name: &ObjectName| catalog.create_provider(name);
        let rows = query("SELECT COUNT_ME.x FROM t AS count_me", &factory, params![]).unwrap();
        assert_eq!(rows.len(), 2);
    }
}
