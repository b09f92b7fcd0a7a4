use serde::{Deserialize, Serialize};

use crate::DataType;

/// Describes one output column of a provider or of a query cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDesc {
    /// Column name (or alias, for cursor output).
    pub name: String,
    /// Source type name as the provider spells it (e.g. `VARCHAR`).
    pub type_name: String,
    /// Scalar type values of this column carry.
    pub data_type: DataType,
    /// Maximum size in bytes or characters, when the source knows it.
    pub size: Option<u32>,
    /// Whether the column may yield NULL.
    pub nullable: bool,
    pub precision: Option<u16>,
    pub scale: Option<u16>,
    /// Whether the source can filter on this column.
    pub searchable: bool,
}

impl ColumnDesc {
    /// A nullable, non-searchable column whose type name is the type's own.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            type_name: data_type.name().to_owned(),
            data_type,
            size: None,
            nullable: true,
            precision: None,
            scale: None,
            searchable: false,
        }
    }

    #[must_use]
    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    #[must_use]
    pub const fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    #[must_use]
    pub const fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    #[must_use]
    pub const fn with_precision(mut self, precision: u16, scale: u16) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    #[must_use]
    pub const fn with_searchable(mut self, searchable: bool) -> Self {
        self.searchable = searchable;
        self
    }

    /// Same descriptor under another name.
    #[must_use]
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_type() {
        let desc = ColumnDesc::new("price", DataType::Double);
        assert_eq!(desc.type_name, "DOUBLE");
        assert!(desc.nullable);
        assert!(!desc.searchable);
        assert_eq!(desc.size, None);
    }

    #[test]
    fn builders_and_rename() {
        let desc = ColumnDesc::new("name", DataType::Text)
            .with_type_name("VARCHAR")
            .with_size(64)
            .with_nullable(false)
            .renamed("n");
        assert_eq!(desc.name, "n");
        assert_eq!(desc.type_name, "VARCHAR");
        assert_eq!(desc.size, Some(64));
        assert!(!desc.nullable);
    }
}
