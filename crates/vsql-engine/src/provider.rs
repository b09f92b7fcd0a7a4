//! Data-provider traits: the minimal row-cursor interface a source must
//! expose to be queried.
//!
//! These traits are open. Hosts implement [`DataProvider`] for each kind of
//! backing store and hand the engine a [`ProviderFactory`] that creates one
//! unopened provider per FROM source.

use vsql_error::Result;
use vsql_types::{ColumnDesc, ObjectName, Variant};

/// Access mode requested when opening a provider. The engine itself only
/// ever opens for reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenMode {
    Read,
    Write,
}

/// One named relation exposed as a forward-only row cursor.
///
/// # Lifecycle
///
/// 1. [`open`](Self::open) binds the provider to a table.
/// 2. [`first`](Self::first) positions on the first row; iterate with
///    [`next`](Self::next) until [`eof`](Self::eof).
/// 3. [`close`](Self::close) releases the table. A closed provider may be
///    opened again.
pub trait DataProvider {
    fn open(
        &mut self,
        mode: OpenMode,
        table: &str,
        schema: Option<&str>,
        catalog: Option<&str>,
    ) -> Result<()>;

    /// Position on the first row (or at EOF if there are no rows).
    fn first(&mut self) -> Result<()>;

    /// Advance one row. Advancing past the last row sets EOF.
    fn next(&mut self) -> Result<()>;

    /// Whether the cursor is past the last row.
    fn eof(&self) -> bool;

    fn close(&mut self) -> Result<()>;

    fn column_count(&self) -> usize;

    /// Position of the column called `name`, if any.
    fn column_id(&self, name: &str) -> Option<usize>;

    /// Value of column `n` of the current row.
    fn column(&self, n: usize) -> Result<Variant>;

    fn describe_column(&self, n: usize) -> Result<ColumnDesc>;
}

/// Creates the provider that will serve one FROM source.
pub trait ProviderFactory {
    fn create_provider(&self, name: &ObjectName) -> Result<Box<dyn DataProvider>>;
}

impl<F> ProviderFactory for F
where
    F: Fn(&ObjectName) -> Result<Box<dyn DataProvider>>,
{
    fn create_provider(&self, name: &ObjectName) -> Result<Box<dyn DataProvider>> {
        self(name)
    }
}
