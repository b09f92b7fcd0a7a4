//! One FROM source bound to a live data provider.

use std::fmt;

use tracing::{trace, warn};
use vsql_error::Result;
use vsql_types::{ColumnDesc, Identifier, ObjectName, Variant};

use crate::provider::{DataProvider, OpenMode};

/// A FROM-clause source: its alias, the table it names, and the provider
/// serving its rows. Owned by exactly one cursor.
pub struct DbObject {
    alias: Identifier,
    name: ObjectName,
    provider: Box<dyn DataProvider>,
    open: bool,
}

impl DbObject {
    #[must_use]
    pub fn new(alias: Identifier, name: ObjectName, provider: Box<dyn DataProvider>) -> Self {
        Self {
            alias,
            name,
            provider,
            open: false,
        }
    }

    #[must_use]
    pub const fn alias(&self) -> &Identifier {
        &self.alias
    }

    #[must_use]
    pub const fn name(&self) -> &ObjectName {
        &self.name
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.open
    }

    /// Open the provider read-only on this source's table.
    pub fn open(&mut self) -> Result<()> {
        self.provider.open(
            OpenMode::Read,
            &self.name.table,
            self.name.schema.as_deref(),
            self.name.catalog.as_deref(),
        )?;
        self.open = true;
        trace!(alias = %self.alias, table = %self.name, "source opened");
        Ok(())
    }

    pub fn first(&mut self) -> Result<()> {
        self.provider.first()
    }

    pub fn next(&mut self) -> Result<()> {
        self.provider.next()
    }

    #[must_use]
    pub fn eof(&self) -> bool {
        self.provider.eof()
    }

    /// Rewind to the first row by closing and reopening the provider.
    pub fn reset(&mut self) -> Result<()> {
        trace!(alias = %self.alias, "source reset");
        self.close()?;
        self.open()?;
        self.first()
    }

    pub fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            self.provider.close()?;
        }
        Ok(())
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.provider.column_count()
    }

    #[must_use]
    pub fn column_id(&self, name: &str) -> Option<usize> {
        self.provider.column_id(name)
    }

    pub fn column(&self, n: usize) -> Result<Variant> {
        self.provider.column(n)
    }

    pub fn describe_column(&self, n: usize) -> Result<ColumnDesc> {
        self.provider.describe_column(n)
    }
}

impl Drop for DbObject {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(alias = %self.alias, error = %err, "closing source failed");
        }
    }
}

impl fmt::Debug for DbObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbObject")
            .field("alias", &self.alias)
            .field("name", &self.name)
            .field("open", &self.open)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use vsql_error::VsqlError;
    use vsql_types::DataType;

    use super::*;

    /// Counts down from `rows` and records every call it receives.
    struct Recording {
        rows: usize,
        pos: usize,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl DataProvider for Recording {
        fn open(
            &mut self,
            mode: OpenMode,
            table: &str,
            schema: Option<&str>,
            _catalog: Option<&str>,
        ) -> Result<()> {
            let schema = schema.map_or(String::new(), |s| format!("{s}."));
            self.log
                .borrow_mut()
                .push(format!("open {mode:?} {schema}{table}"));
            Ok(())
        }
        fn first(&mut self) -> Result<()> {
            self.log.borrow_mut().push("first".into());
            self.pos = 0;
            Ok(())
        }
        fn next(&mut self) -> Result<()> {
            self.pos += 1;
            Ok(())
        }
        fn eof(&self) -> bool {
            self.pos >= self.rows
        }
        fn close(&mut self) -> Result<()> {
            self.log.borrow_mut().push("close".into());
            Ok(())
        }
        fn column_count(&self) -> usize {
            1
        }
        fn column_id(&self, name: &str) -> Option<usize> {
            (name == "n").then_some(0)
        }
        fn column(&self, n: usize) -> Result<Variant> {
            if n == 0 {
                Ok(Variant::Integer(i64::try_from(self.pos).unwrap()))
            } else {
                Err(VsqlError::ColumnOutOfRange { index: n, count: 1 })
            }
        }
        fn describe_column(&self, _n: usize) -> Result<ColumnDesc> {
            Ok(ColumnDesc::new("n", DataType::Integer))
        }
    }

    fn object(rows: usize) -> (DbObject, Rc<RefCell<Vec<String>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let provider = Recording {
            rows,
            pos: 0,
            log: Rc::clone(&log),
        };
        let obj = DbObject::new(
            Identifier::new("t"),
            ObjectName::qualified("s", "tab"),
            Box::new(provider),
        );
        (obj, log)
    }

    #[test]
    fn open_passes_name_parts() {
        let (mut obj, log) = object(2);
        obj.open().unwrap();
        assert!(obj.is_open());
        assert_eq!(log.borrow()[0], "open Read s.tab");
    }

    #[test]
    fn reset_closes_reopens_and_rewinds() {
        let (mut obj, log) = object(2);
        obj.open().unwrap();
        obj.first().unwrap();
        obj.next().unwrap();
        obj.next().unwrap();
        assert!(obj.eof());
        obj.reset().unwrap();
        assert!(!obj.eof());
        assert_eq!(obj.column(0).unwrap(), Variant::Integer(0));
        assert_eq!(
            log.borrow().as_slice(),
            ["open Read s.tab", "first", "close", "open Read s.tab", "first"]
        );
    }

    #[test]
    fn drop_closes_once() {
        let (mut obj, log) = object(1);
        obj.open().unwrap();
        obj.close().unwrap();
        drop(obj);
        let closes = log.borrow().iter().filter(|l| *l == "close").count();
        assert_eq!(closes, 1);
    }
}
