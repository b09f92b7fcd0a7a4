//! In-process tables served through the [`DataProvider`] interface.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;
use vsql_error::{Result, VsqlError};
use vsql_types::{ColumnDesc, ObjectName, Variant};

use crate::provider::{DataProvider, OpenMode, ProviderFactory};

/// A table held entirely in memory: column descriptors plus rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryTable {
    columns: Vec<ColumnDesc>,
    rows: Vec<Vec<Variant>>,
}

impl MemoryTable {
    #[must_use]
    pub const fn new(columns: Vec<ColumnDesc>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table, checking every row has one value per column.
    pub fn with_rows(columns: Vec<ColumnDesc>, rows: Vec<Vec<Variant>>) -> Result<Self> {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn push_row(&mut self, row: Vec<Variant>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(VsqlError::provider(format!(
                "row has {} values, table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnDesc] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<Variant>] {
        &self.rows
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Named [`MemoryTable`]s. Serves as the provider factory for queries over
/// them.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    tables: BTreeMap<ObjectName, Arc<MemoryTable>>,
}

impl MemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a table, returning the previous one.
    pub fn register(&mut self, name: ObjectName, table: MemoryTable) -> Option<Arc<MemoryTable>> {
        self.tables.insert(name, Arc::new(table))
    }

    /// Find a table. Names compare case-insensitively; qualifiers omitted
    /// from the lookup match any registered qualifier, as long as exactly
    /// one table matches.
    #[must_use]
    pub fn lookup(
        &self,
        table: &str,
        schema: Option<&str>,
        catalog: Option<&str>,
    ) -> Option<Arc<MemoryTable>> {
        fn matches(wanted: Option<&str>, have: Option<&String>) -> bool {
            match (wanted, have) {
                (None, _) => true,
                (Some(w), Some(h)) => w.eq_ignore_ascii_case(h),
                (Some(_), None) => false,
            }
        }
        let mut found = self.tables.iter().filter(|(name, _)| {
            name.table.eq_ignore_ascii_case(table)
                && matches(schema, name.schema.as_ref())
                && matches(catalog, name.catalog.as_ref())
        });
        match (found.next(), found.next()) {
            (Some((_, t)), None) => Some(Arc::clone(t)),
            _ => None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl ProviderFactory for MemoryCatalog {
    fn create_provider(&self, _name: &ObjectName) -> Result<Box<dyn DataProvider>> {
        Ok(Box::new(MemoryProvider::new(self.clone())))
    }
}

/// Cursor over one table of a [`MemoryCatalog`].
#[derive(Debug)]
pub struct MemoryProvider {
    catalog: MemoryCatalog,
    table: Option<Arc<MemoryTable>>,
    pos: usize,
}

impl MemoryProvider {
    #[must_use]
    pub const fn new(catalog: MemoryCatalog) -> Self {
        Self {
            catalog,
            table: None,
            pos: 0,
        }
    }

    fn opened(&self) -> Result<&MemoryTable> {
        self.table
            .as_deref()
            .ok_or_else(|| VsqlError::provider("memory provider is not open"))
    }
}

impl DataProvider for MemoryProvider {
    fn open(
        &mut self,
        mode: OpenMode,
        table: &str,
        schema: Option<&str>,
        catalog: Option<&str>,
    ) -> Result<()> {
        if mode == OpenMode::Write {
            return Err(VsqlError::ReadOnly);
        }
        let found = self.catalog.lookup(table, schema, catalog).ok_or_else(|| {
            let name = ObjectName {
                catalog: catalog.map(str::to_owned),
                schema: schema.map(str::to_owned),
                table: table.to_owned(),
            };
            VsqlError::NoSuchTable {
                name: name.to_string(),
            }
        })?;
        debug!(table, rows = found.row_count(), "memory provider open");
        self.table = Some(found);
        self.pos = 0;
        Ok(())
    }

    fn first(&mut self) -> Result<()> {
        self.opened()?;
        self.pos = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<()> {
        let len = self.opened()?.row_count();
        if self.pos < len {
            self.pos += 1;
        }
        Ok(())
    }

    fn eof(&self) -> bool {
        self.table
            .as_ref()
            .is_none_or(|t| self.pos >= t.row_count())
    }

    fn close(&mut self) -> Result<()> {
        self.table = None;
        self.pos = 0;
        Ok(())
    }

    fn column_count(&self) -> usize {
        self.table.as_ref().map_or(0, |t| t.columns.len())
    }

    fn column_id(&self, name: &str) -> Option<usize> {
        self.table
            .as_ref()?
            .columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    fn column(&self, n: usize) -> Result<Variant> {
        let table = self.opened()?;
        let row = table
            .rows
            .get(self.pos)
            .ok_or_else(|| VsqlError::provider("memory provider is at EOF"))?;
        row.get(n).cloned().ok_or(VsqlError::ColumnOutOfRange {
            index: n,
            count: table.columns.len(),
        })
    }

    fn describe_column(&self, n: usize) -> Result<ColumnDesc> {
        let table = self.opened()?;
        table
            .columns
            .get(n)
            .cloned()
            .ok_or(VsqlError::ColumnOutOfRange {
                index: n,
                count: table.columns.len(),
            })
    }
}
