//! The query cursor: nested-loop iteration over every FROM source with the
//! WHERE predicate checked on each combined row.
//!
//! # States
//!
//! ```text
//! Closed -> Prepared -> Open -> Positioned <-> Eof -> Closed
//!                  \______\_________\____________\--> Bad (after a failed fetch)
//! ```
//!
//! [`SqlCursor::execute`] records the parameters and opens the cursor
//! without fetching. [`SqlCursor::first`] and [`SqlCursor::next`] move to the
//! next combined row that satisfies WHERE, or report EOF.

use tracing::{debug, trace};
use vsql_ast::ParseTree;
use vsql_error::{Result, VsqlError};
use vsql_types::{ColumnDesc, ParamMap, Variant};

use crate::binder::{BoundQuery, bind};
use crate::config::EngineConfig;
use crate::eval::evaluate;
use crate::field::RowContext;
use crate::functions::FunctionRegistry;
use crate::provider::ProviderFactory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorState {
    Closed,
    /// Bound, waiting for `execute`.
    Prepared,
    /// Executed, not yet fetched.
    Open,
    /// On a row that satisfies WHERE.
    Positioned,
    /// Past the last row.
    Eof,
    /// A fetch failed; only `close` is allowed.
    Bad,
}

impl CursorState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Prepared => "prepared",
            Self::Open => "open",
            Self::Positioned => "positioned",
            Self::Eof => "at EOF",
            Self::Bad => "bad",
        }
    }
}

/// A forward-only, read-only cursor over one bound SELECT.
#[derive(Debug)]
pub struct SqlCursor {
    plan: Option<BoundQuery>,
    params: ParamMap,
    state: CursorState,
    config: EngineConfig,
    /// Identifies the current row for computed-field caching.
    generation: u64,
}

impl SqlCursor {
    /// Parse and bind `sql`. The cursor comes back `Prepared`.
    pub fn prepare(
        sql: &str,
        factory: &dyn ProviderFactory,
        registry: &FunctionRegistry,
        config: &EngineConfig,
    ) -> Result<Self> {
        let tree = vsql_parser::parse_with(sql, &config.parser)?;
        Self::from_tree(tree, factory, registry, config)
    }

    /// Bind an already parsed statement.
    pub fn from_tree(
        tree: ParseTree,
        factory: &dyn ProviderFactory,
        registry: &FunctionRegistry,
        config: &EngineConfig,
    ) -> Result<Self> {
        let plan = bind(tree, factory, registry, config)?;
        debug!(
            fields = plan.fields().len(),
            params = plan.param_count(),
            "cursor prepared"
        );
        Ok(Self {
            plan: Some(plan),
            params: ParamMap::new(),
            state: CursorState::Prepared,
            config: config.clone(),
            generation: 0,
        })
    }

    #[must_use]
    pub const fn state(&self) -> CursorState {
        self.state
    }

    /// The bound plan, until the cursor is closed.
    #[must_use]
    pub const fn plan(&self) -> Option<&BoundQuery> {
        self.plan.as_ref()
    }

    /// Number of `?` placeholders in the statement.
    #[must_use]
    pub fn param_count(&self) -> usize {
        self.plan.as_ref().map_or(0, BoundQuery::param_count)
    }

    /// Record the parameter values and open the cursor. Does not fetch.
    pub fn execute(&mut self, params: ParamMap) -> Result<()> {
        self.require(
            "execute",
            &[
                CursorState::Prepared,
                CursorState::Open,
                CursorState::Positioned,
                CursorState::Eof,
            ],
        )?;
        self.params = params;
        self.generation += 1;
        self.transition(CursorState::Open);
        Ok(())
    }

    /// Rewind every source and move to the first matching row. Returns
    /// `false` when there is none.
    pub fn first(&mut self) -> Result<bool> {
        self.require(
            "first",
            &[CursorState::Open, CursorState::Positioned, CursorState::Eof],
        )?;
        let result = self.rewind();
        self.settle(result)
    }

    /// Move to the next matching row. Returns `false` at EOF; calling it
    /// again at EOF is a no-op.
    pub fn next(&mut self) -> Result<bool> {
        if self.state == CursorState::Eof {
            return Ok(false);
        }
        self.require("next", &[CursorState::Positioned])?;
        let result = self.advance();
        self.settle(result)
    }

    #[must_use]
    pub fn eof(&self) -> bool {
        self.state == CursorState::Eof
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.plan.as_ref().map_or(0, |p| p.fields().len())
    }

    /// Value of output column `n` on the current row.
    pub fn column(&self, n: usize) -> Result<Variant> {
        self.require("read a column", &[CursorState::Positioned])?;
        let plan = self.bound("read a column")?;
        let field = plan.fields().get(n).ok_or(VsqlError::ColumnOutOfRange {
            index: n,
            count: plan.fields().len(),
        })?;
        field.value(&self.row_context(plan))
    }

    /// Value of the first output column called `name` (ASCII case-insensitive).
    pub fn column_by_name(&self, name: &str) -> Result<Variant> {
        let n = self.column_index(name).ok_or_else(|| VsqlError::NoSuchColumn {
            name: name.to_owned(),
        })?;
        self.column(n)
    }

    /// Position of the first output column called `name`.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.plan
            .as_ref()?
            .fields()
            .iter()
            .position(|f| f.name().eq_ignore_ascii_case(name))
    }

    /// Every column of the current row.
    pub fn row(&self) -> Result<Vec<Variant>> {
        (0..self.column_count()).map(|n| self.column(n)).collect()
    }

    pub fn describe_column(&self, n: usize) -> Result<ColumnDesc> {
        let plan = self.bound("describe a column")?;
        plan.fields()
            .get(n)
            .map(|f| f.describe().clone())
            .ok_or(VsqlError::ColumnOutOfRange {
                index: n,
                count: plan.fields().len(),
            })
    }

    /// Always -1: the row count is unknown until the scan finishes.
    #[must_use]
    pub const fn row_count(&self) -> i64 {
        -1
    }

    /// Always -1: the cursor never modifies rows.
    #[must_use]
    pub const fn affected_rows(&self) -> i64 {
        -1
    }

    /// Release every field and source. The cursor ends `Closed` even when a
    /// provider fails to close; that failure is returned.
    pub fn close(&mut self) -> Result<()> {
        let result = self.plan.take().map_or(Ok(()), |mut plan| plan.close());
        self.params.clear();
        self.transition(CursorState::Closed);
        result
    }

    // -- internals ----------------------------------------------------------

    fn require(&self, operation: &'static str, allowed: &[CursorState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(VsqlError::CursorState {
                operation,
                state: self.state.as_str(),
            })
        }
    }

    fn bound(&self, operation: &'static str) -> Result<&BoundQuery> {
        self.plan.as_ref().ok_or(VsqlError::CursorState {
            operation,
            state: CursorState::Closed.as_str(),
        })
    }

    fn bound_mut(&mut self, operation: &'static str) -> Result<&mut BoundQuery> {
        self.plan.as_mut().ok_or(VsqlError::CursorState {
            operation,
            state: CursorState::Closed.as_str(),
        })
    }

    fn row_context<'a>(&'a self, plan: &'a BoundQuery) -> RowContext<'a> {
        RowContext {
            plan,
            params: &self.params,
            config: &self.config,
            generation: self.generation,
        }
    }

    fn transition(&mut self, next: CursorState) {
        if self.state != next {
            debug!(from = self.state.as_str(), to = next.as_str(), "cursor state");
            self.state = next;
        }
    }

    /// Apply the outcome of a fetch: the new state, or `Bad` on error.
    fn settle(&mut self, result: Result<CursorState>) -> Result<bool> {
        match result {
            Ok(next) => {
                self.transition(next);
                Ok(next == CursorState::Positioned)
            }
            Err(err) => {
                self.transition(CursorState::Bad);
                Err(err)
            }
        }
    }

    fn rewind(&mut self) -> Result<CursorState> {
        let objects = self.bound_mut("first")?.objects_mut();
        for object in objects.iter_mut() {
            object.first()?;
        }
        // Any empty source empties the whole product.
        if objects.iter().any(|o| o.eof()) {
            return Ok(CursorState::Eof);
        }
        self.generation += 1;
        if self.row_matches()? {
            return Ok(CursorState::Positioned);
        }
        self.advance()
    }

    /// Step until a row satisfies WHERE or the product is exhausted.
    fn advance(&mut self) -> Result<CursorState> {
        loop {
            if !self.step()? {
                return Ok(CursorState::Eof);
            }
            self.generation += 1;
            if self.row_matches()? {
                return Ok(CursorState::Positioned);
            }
            trace!(generation = self.generation, "row rejected by WHERE");
        }
    }

    /// One nested-loop step: advance the innermost source, carrying into
    /// outer sources as inner ones run out. Returns `false` once the
    /// outermost source is exhausted.
    fn step(&mut self) -> Result<bool> {
        let objects = self.bound_mut("next")?.objects_mut();
        for i in (0..objects.len()).rev() {
            let object = &mut objects[i];
            object.next()?;
            if !object.eof() {
                return Ok(true);
            }
            if i == 0 {
                return Ok(false);
            }
            object.reset()?;
            if object.eof() {
                return Ok(false);
            }
        }
        Ok(false)
    }

    /// Whether the current row satisfies WHERE. NULL counts as false.
    fn row_matches(&self) -> Result<bool> {
        let plan = self.bound("evaluate WHERE")?;
        let Some(predicate) = plan.where_node() else {
            return Ok(true);
        };
        match evaluate(&self.row_context(plan), predicate)? {
            Variant::Bool(b) => Ok(b),
            Variant::Null => Ok(false),
            other => Err(VsqlError::type_mismatch(
                "BOOLEAN predicate",
                other.datatype().name(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use vsql_types::{DataType, ObjectName};

    use super::*;
    use crate::memory::{MemoryCatalog, MemoryTable};

    fn catalog() -> MemoryCatalog {
        let mut catalog = MemoryCatalog::new();
        catalog.register(
            ObjectName::bare("t"),
            MemoryTable::with_rows(
                vec![ColumnDesc::new("x", DataType::Integer)],
                vec![
                    vec![Variant::Integer(3)],
                    vec![Variant::Integer(7)],
                    vec![Variant::Integer(9)],
                ],
            )
            .unwrap(),
        );
        catalog.register(
            ObjectName::bare("empty"),
            MemoryTable::new(vec![ColumnDesc::new("y", DataType::Integer)]),
        );
        catalog
    }

    fn cursor(sql: &str) -> SqlCursor {
        SqlCursor::prepare(
            sql,
            &catalog(),
            &FunctionRegistry::with_builtins(),
            &EngineConfig::default(),
        )
        .unwrap()
    }

    fn drain(c: &mut SqlCursor) -> Vec<Vec<Variant>> {
        let mut rows = Vec::new();
        let mut more = c.first().unwrap();
        while more {
            rows.push(c.row().unwrap());
            more = c.next().unwrap();
        }
        rows
    }

    #[test]
    fn state_machine() {
        let mut c = cursor("SELECT x FROM t");
        assert_eq!(c.state(), CursorState::Prepared);
        assert!(matches!(
            c.first().unwrap_err(),
            VsqlError::CursorState {
                operation: "first",
                state: "prepared"
            }
        ));
        c.execute(ParamMap::new()).unwrap();
        assert_eq!(c.state(), CursorState::Open);
        assert!(c.column(0).is_err());
        assert!(c.next().is_err());
        assert!(c.first().unwrap());
        assert_eq!(c.state(), CursorState::Positioned);
        assert_eq!(c.column(0).unwrap(), Variant::Integer(3));
        c.close().unwrap();
        assert_eq!(c.state(), CursorState::Closed);
        assert_eq!(c.column_count(), 0);
        assert!(c.execute(ParamMap::new()).is_err());
    }

    #[test]
    fn where_filters_during_iteration() {
        let mut c = cursor("SELECT * FROM t WHERE t.x > 5");
        c.execute(ParamMap::new()).unwrap();
        assert_eq!(
            drain(&mut c),
            vec![vec![Variant::Integer(7)], vec![Variant::Integer(9)]]
        );
        assert!(c.eof());
        assert!(!c.next().unwrap());
        assert!(c.eof());
    }

    #[test]
    fn empty_inner_source_gives_no_rows() {
        let mut c = cursor("SELECT * FROM t, empty");
        c.execute(ParamMap::new()).unwrap();
        assert!(!c.first().unwrap());
        assert!(c.eof());
    }

    #[test]
    fn parameters_feed_where_and_fields() {
        let mut c = cursor("SELECT ?, x FROM t WHERE x = ?");
        assert_eq!(c.param_count(), 2);
        let params: ParamMap = [Variant::from("tag"), Variant::Integer(9)]
            .into_iter()
            .collect();
        c.execute(params).unwrap();
        assert_eq!(
            drain(&mut c),
            vec![vec![Variant::from("tag"), Variant::Integer(9)]]
        );
        // Re-executing with new values rescans.
        let mut params = ParamMap::new();
        params.bind(2, 3);
        c.execute(params).unwrap();
        assert_eq!(drain(&mut c), vec![vec![Variant::Null, Variant::Integer(3)]]);
    }

    #[test]
    fn column_access() {
        let mut c = cursor("SELECT x AS value, x * 2 FROM t");
        c.execute(ParamMap::new()).unwrap();
        c.first().unwrap();
        assert_eq!(c.column_by_name("VALUE").unwrap(), Variant::Integer(3));
        assert_eq!(c.column_by_name("expr_1").unwrap(), Variant::Integer(6));
        assert!(matches!(
            c.column(2).unwrap_err(),
            VsqlError::ColumnOutOfRange { index: 2, count: 2 }
        ));
        assert!(matches!(
            c.column_by_name("nope").unwrap_err(),
            VsqlError::NoSuchColumn { .. }
        ));
        assert_eq!(c.describe_column(1).unwrap().name, "EXPR_1");
        assert_eq!(c.describe_column(0).unwrap().data_type, DataType::Integer);
        assert_eq!(c.row_count(), -1);
        assert_eq!(c.affected_rows(), -1);
    }

    #[test]
    fn failed_fetch_marks_bad() {
        let mut c = cursor("SELECT x FROM t WHERE x < 5 OR x / (x - 7) > 0");
        c.execute(ParamMap::new()).unwrap();
        assert!(c.first().unwrap());
        assert_eq!(c.next().unwrap_err(), VsqlError::DivisionByZero);
        assert_eq!(c.state(), CursorState::Bad);
        assert!(c.next().is_err());
        assert!(c.first().is_err());
        c.close().unwrap();
    }

    #[test]
    fn non_boolean_where_value_is_an_error() {
        let mut c = cursor("SELECT x FROM t WHERE ?");
        let mut params = ParamMap::new();
        params.bind(1, 1);
        c.execute(params).unwrap();
        assert!(matches!(
            c.first().unwrap_err(),
            VsqlError::TypeMismatch { .. }
        ));
        assert_eq!(c.state(), CursorState::Bad);
    }

    #[test]
    fn null_where_rejects_row() {
        let mut c = cursor("SELECT x FROM t WHERE ?");
        c.execute(ParamMap::new()).unwrap();
        assert!(!c.first().unwrap());
    }
}
