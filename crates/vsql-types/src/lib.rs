//! Value types shared by the vsql parser, binder, and cursor.
//!
//! [`Variant`] is the engine's only value representation. Its arithmetic
//! and comparison rules are driven by the explicit promotion table on
//! [`DataType`], so every mixed-type combination is either promoted or
//! rejected with a typed error.

pub mod column;
pub mod datatype;
pub mod name;
pub mod value;

use std::collections::BTreeMap;

pub use column::ColumnDesc;
pub use datatype::DataType;
pub use name::{Identifier, ObjectName};
pub use value::{Variant, format_double, logical_and, logical_or, logical_xor};

/// Positional statement parameters, keyed by 1-based ordinal.
///
/// Positions that were never bound read as NULL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamMap {
    values: BTreeMap<usize, Variant>,
}

impl ParamMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `value` at 1-based `position`, returning the previous binding.
    pub fn bind(&mut self, position: usize, value: impl Into<Variant>) -> Option<Variant> {
        self.values.insert(position, value.into())
    }

    /// Current value at `position`; unbound positions are NULL.
    #[must_use]
    pub fn value(&self, position: usize) -> Variant {
        self.values.get(&position).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn is_bound(&self, position: usize) -> bool {
        self.values.contains_key(&position)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// Bind in order: the first item is parameter 1.
impl<V: Into<Variant>> FromIterator<V> for ParamMap {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i + 1, v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbound_positions_read_null() {
        let mut params = ParamMap::new();
        params.bind(2, 10_i64);
        assert!(params.value(1).is_null());
        assert_eq!(params.value(2), Variant::Integer(10));
        assert!(params.is_bound(2));
        assert!(!params.is_bound(1));
    }

    #[test]
    fn collect_is_one_based() {
        let params: ParamMap = vec![Variant::from("a"), Variant::Integer(1)]
            .into_iter()
            .collect();
        assert_eq!(params.len(), 2);
        assert_eq!(params.value(1), Variant::from("a"));
        assert_eq!(params.value(2), Variant::Integer(1));
        assert!(params.value(3).is_null());
    }

    #[test]
    fn rebinding_returns_previous() {
        let mut params = ParamMap::new();
        assert!(params.bind(1, "x").is_none());
        assert_eq!(params.bind(1, "y"), Some(Variant::from("x")));
        params.clear();
        assert!(params.is_empty());
    }
}
