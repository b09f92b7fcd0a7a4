use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed set of scalar types a [`Variant`](crate::Variant) can hold.
///
/// `Null` doubles as "type not known until execution" for fields whose value
/// only exists at run time (e.g. unbound parameters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Null,
    Boolean,
    Integer,
    Double,
    Text,
    Blob,
}

impl DataType {
    /// SQL-facing type name, as reported by column descriptors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Boolean => "BOOLEAN",
            Self::Integer => "INTEGER",
            Self::Double => "DOUBLE",
            Self::Text => "TEXT",
            Self::Blob => "BLOB",
        }
    }

    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Double)
    }

    /// Whether `||` accepts an operand of this type.
    #[must_use]
    pub const fn is_string_like(self) -> bool {
        matches!(self, Self::Text | Self::Integer | Self::Double)
    }

    /// Result type of `+ - * / MOD` over the two operand types.
    ///
    /// This is the whole promotion table: integers stay integers, any double
    /// operand promotes to double, a null operand adopts the other side's
    /// type. Every other combination is rejected with `None`.
    #[must_use]
    pub const fn arithmetic_result(lhs: Self, rhs: Self) -> Option<Self> {
        match (lhs, rhs) {
            (Self::Integer, Self::Integer) => Some(Self::Integer),
            (Self::Integer | Self::Double, Self::Integer | Self::Double) => Some(Self::Double),
            (Self::Null, Self::Null) => Some(Self::Null),
            (Self::Null, t) | (t, Self::Null) if t.is_numeric() => Some(t),
            _ => None,
        }
    }

    /// Common domain two operands are compared in, or `None` when the pair
    /// is not comparable.
    #[must_use]
    pub const fn comparison_domain(lhs: Self, rhs: Self) -> Option<Self> {
        match (lhs, rhs) {
            (Self::Null, t) | (t, Self::Null) => Some(t),
            (Self::Integer, Self::Integer) => Some(Self::Integer),
            (Self::Integer | Self::Double, Self::Integer | Self::Double) => Some(Self::Double),
            (Self::Boolean, Self::Boolean) => Some(Self::Boolean),
            (Self::Text, Self::Text) => Some(Self::Text),
            (Self::Blob, Self::Blob) => Some(Self::Blob),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
