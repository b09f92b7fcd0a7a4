use std::fmt;

use serde::{Deserialize, Serialize};

/// A single SQL name, compared by value.
///
/// Orderable so it can key the alias map of a bound query.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identifier {
    pub name: String,
}

impl Identifier {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A possibly catalog- and schema-qualified table name like
/// `sales.public.orders` or just `orders`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectName {
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub table: String,
}

impl ObjectName {
    /// Create an unqualified name.
    #[must_use]
    pub fn bare(table: impl Into<String>) -> Self {
        Self {
            catalog: None,
            schema: None,
            table: table.into(),
        }
    }

    /// Create a schema-qualified name.
    #[must_use]
    pub fn qualified(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            catalog: None,
            schema: Some(schema.into()),
            table: table.into(),
        }
    }

    /// Create a fully qualified name.
    #[must_use]
    pub fn full(
        catalog: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            catalog: Some(catalog.into()),
            schema: Some(schema.into()),
            table: table.into(),
        }
    }

    /// Build from one to three name parts, outermost first.
    #[must_use]
    pub fn from_parts(parts: &[&str]) -> Option<Self> {
        match parts {
            [table] => Some(Self::bare(*table)),
            [schema, table] => Some(Self::qualified(*schema, *table)),
            [catalog, schema, table] => Some(Self::full(*catalog, *schema, *table)),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref c) = self.catalog {
            write!(f, "{c}.")?;
        }
        if let Some(ref s) = self.schema {
            write!(f, "{s}.")?;
        }
        f.write_str(&self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_order_by_name() {
        let mut ids = vec![Identifier::new("b"), Identifier::new("a")];
        ids.sort();
        assert_eq!(ids[0].as_str(), "a");
        assert_eq!(Identifier::from("a"), Identifier::new("a"));
    }

    #[test]
    fn object_name_parts() {
        assert_eq!(ObjectName::from_parts(&["t"]), Some(ObjectName::bare("t")));
        let full = ObjectName::from_parts(&["c", "s", "t"]).unwrap();
        assert_eq!(full.to_string(), "c.s.t");
        assert_eq!(ObjectName::qualified("s", "t").to_string(), "s.t");
        assert_eq!(ObjectName::from_parts(&[]), None);
        assert_eq!(ObjectName::from_parts(&["a", "b", "c", "d"]), None);
    }
}
