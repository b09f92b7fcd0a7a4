//! Scalar functions callable from SQL expressions.
//!
//! [`ScalarFunction`] is open: hosts register their own functions in a
//! [`FunctionRegistry`] next to the builtins. Lookup is by
//! `(UPPERCASE name, num_args)` with a fallback to the variadic entry
//! `(UPPERCASE name, -1)`.
#![allow(clippy::unnecessary_literal_bound)]

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;
use vsql_error::{Result, VsqlError};
use vsql_types::{DataType, Variant};

/// A scalar (row-level) SQL function.
///
/// Invoked once per evaluation with already-evaluated arguments. Functions
/// are shared behind `Arc` and must be thread-safe.
pub trait ScalarFunction: Send + Sync {
    fn invoke(&self, args: &[Variant]) -> Result<Variant>;

    /// Number of arguments accepted, `-1` for variadic.
    fn num_args(&self) -> i32;

    fn name(&self) -> &str;

    /// Fewest arguments a variadic function accepts.
    fn min_args(&self) -> usize {
        0
    }

    /// Result type for the given argument types. `DataType::Null` when it
    /// is only known once the function runs.
    fn return_type(&self, _args: &[DataType]) -> DataType {
        DataType::Null
    }
}

/// Registry key: `(UPPERCASE name, num_args)`.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct FunctionKey {
    pub name: String,
    pub num_args: i32,
}

impl FunctionKey {
    #[must_use]
    pub fn new(name: &str, num_args: i32) -> Self {
        Self {
            name: name.to_ascii_uppercase(),
            num_args,
        }
    }
}

#[derive(Default, Clone)]
pub struct FunctionRegistry {
    scalars: HashMap<FunctionKey, Arc<dyn ScalarFunction>>,
}

impl FunctionRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every builtin scalar function.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        register_builtins(&mut registry);
        registry
    }

    /// Register a function, replacing (and returning) any previous one with
    /// the same key.
    pub fn register_scalar<F>(&mut self, function: F) -> Option<Arc<dyn ScalarFunction>>
    where
        F: ScalarFunction + 'static,
    {
        let key = FunctionKey::new(function.name(), function.num_args());
        self.scalars.insert(key, Arc::new(function))
    }

    /// Look up a function by `(name, num_args)`: exact match first, then the
    /// variadic version.
    #[must_use]
    pub fn find_scalar(&self, name: &str, num_args: i32) -> Option<Arc<dyn ScalarFunction>> {
        let exact = FunctionKey::new(name, num_args);
        if let Some(f) = self.scalars.get(&exact) {
            debug!(name = %exact.name, arity = num_args, hit = "exact", "registry lookup");
            return Some(Arc::clone(f));
        }
        let variadic = FunctionKey {
            num_args: -1,
            ..exact
        };
        let result = self
            .scalars
            .get(&variadic)
            .filter(|f| usize::try_from(num_args).is_ok_and(|n| n >= f.min_args()))
            .map(Arc::clone);
        debug!(
            name = %variadic.name,
            arity = num_args,
            hit = if result.is_some() { "variadic" } else { "miss" },
            "registry lookup"
        );
        result
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scalars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.scalars.keys().collect();
        keys.sort_by(|a, b| (&a.name, a.num_args).cmp(&(&b.name, b.num_args)));
        f.debug_struct("FunctionRegistry")
            .field("scalars", &keys)
            .finish()
    }
}

/// Register every builtin scalar function.
pub fn register_builtins(registry: &mut FunctionRegistry) {
    registry.register_scalar(UpperFunc);
    registry.register_scalar(LowerFunc);
    registry.register_scalar(LengthFunc);
    registry.register_scalar(AbsFunc);
    registry.register_scalar(CoalesceFunc);
    registry.register_scalar(IfNullFunc);
    registry.register_scalar(NullIfFunc);
    registry.register_scalar(TypeofFunc);
}

fn text_arg(name: &str, value: &Variant) -> Result<String> {
    value.to_text().ok_or_else(|| {
        VsqlError::type_mismatch(format!("text argument to {name}"), value.datatype().name())
    })
}

// ── upper/lower ─────────────────────────────────────────────────────────

pub struct UpperFunc;

impl ScalarFunction for UpperFunc {
    fn invoke(&self, args: &[Variant]) -> Result<Variant> {
        if args[0].is_null() {
            return Ok(Variant::Null);
        }
        Ok(Variant::Text(text_arg("upper", &args[0])?.to_uppercase()))
    }

    fn num_args(&self) -> i32 {
        1
    }

    fn name(&self) -> &str {
        "upper"
    }

    fn return_type(&self, _args: &[DataType]) -> DataType {
        DataType::Text
    }
}

pub struct LowerFunc;

impl ScalarFunction for LowerFunc {
    fn invoke(&self, args: &[Variant]) -> Result<Variant> {
        if args[0].is_null() {
            return Ok(Variant::Null);
        }
        Ok(Variant::Text(text_arg("lower", &args[0])?.to_lowercase()))
    }

    fn num_args(&self) -> i32 {
        1
    }

    fn name(&self) -> &str {
        "lower"
    }

    fn return_type(&self, _args: &[DataType]) -> DataType {
        DataType::Text
    }
}

// ── length ──────────────────────────────────────────────────────────────

/// Characters in a text value, bytes in a blob.
pub struct LengthFunc;

impl ScalarFunction for LengthFunc {
    fn invoke(&self, args: &[Variant]) -> Result<Variant> {
        let len = match &args[0] {
            Variant::Null => return Ok(Variant::Null),
            Variant::Blob(b) => b.len(),
            other => text_arg("length", other)?.chars().count(),
        };
        i64::try_from(len)
            .map(Variant::Integer)
            .map_err(|_| VsqlError::IntegerOverflow)
    }

    fn num_args(&self) -> i32 {
        1
    }

    fn name(&self) -> &str {
        "length"
    }

    fn return_type(&self, _args: &[DataType]) -> DataType {
        DataType::Integer
    }
}

// ── abs ─────────────────────────────────────────────────────────────────

pub struct AbsFunc;

impl ScalarFunction for AbsFunc {
    fn invoke(&self, args: &[Variant]) -> Result<Variant> {
        match &args[0] {
            Variant::Null => Ok(Variant::Null),
            Variant::Integer(i) => i
                .checked_abs()
                .map(Variant::Integer)
                .ok_or(VsqlError::IntegerOverflow),
            Variant::Double(f) => Ok(Variant::Double(f.abs())),
            other => Err(VsqlError::type_mismatch(
                "numeric argument to abs",
                other.datatype().name(),
            )),
        }
    }

    fn num_args(&self) -> i32 {
        1
    }

    fn name(&self) -> &str {
        "abs"
    }

    fn return_type(&self, args: &[DataType]) -> DataType {
        args.first().copied().unwrap_or(DataType::Null)
    }
}

// ── coalesce/ifnull/nullif ──────────────────────────────────────────────

/// First non-null argument.
pub struct CoalesceFunc;

impl ScalarFunction for CoalesceFunc {
    fn invoke(&self, args: &[Variant]) -> Result<Variant> {
        Ok(args
            .iter()
            .find(|v| !v.is_null())
            .cloned()
            .unwrap_or_default())
    }

    fn num_args(&self) -> i32 {
        -1
    }

    fn name(&self) -> &str {
        "coalesce"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn return_type(&self, args: &[DataType]) -> DataType {
        args.iter()
            .copied()
            .find(|t| *t != DataType::Null)
            .unwrap_or(DataType::Null)
    }
}

pub struct IfNullFunc;

impl ScalarFunction for IfNullFunc {
    fn invoke(&self, args: &[Variant]) -> Result<Variant> {
        CoalesceFunc.invoke(args)
    }

    fn num_args(&self) -> i32 {
        2
    }

    fn name(&self) -> &str {
        "ifnull"
    }

    fn return_type(&self, args: &[DataType]) -> DataType {
        CoalesceFunc.return_type(args)
    }
}

/// `NULLIF(a, b)`: null when `a = b`, else `a`.
pub struct NullIfFunc;

impl ScalarFunction for NullIfFunc {
    fn invoke(&self, args: &[Variant]) -> Result<Variant> {
        match args[0].sql_cmp(&args[1])? {
            Some(std::cmp::Ordering::Equal) => Ok(Variant::Null),
            _ => Ok(args[0].clone()),
        }
    }

    fn num_args(&self) -> i32 {
        2
    }

    fn name(&self) -> &str {
        "nullif"
    }

    fn return_type(&self, args: &[DataType]) -> DataType {
        args.first().copied().unwrap_or(DataType::Null)
    }
}

// ── typeof ──────────────────────────────────────────────────────────────

pub struct TypeofFunc;

impl ScalarFunction for TypeofFunc {
    fn invoke(&self, args: &[Variant]) -> Result<Variant> {
        Ok(Variant::Text(args[0].datatype().name().to_ascii_lowercase()))
    }

    fn num_args(&self) -> i32 {
        1
    }

    fn name(&self) -> &str {
        "typeof"
    }

    fn return_type(&self, _args: &[DataType]) -> DataType {
        DataType::Text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Variant]) -> Result<Variant> {
        let registry = FunctionRegistry::with_builtins();
        let arity = i32::try_from(args.len()).unwrap();
        registry
            .find_scalar(name, arity)
            .unwrap_or_else(|| panic!("{name}/{arity} not registered"))
            .invoke(args)
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = FunctionRegistry::with_builtins();
        assert!(registry.find_scalar("Upper", 1).is_some());
        assert!(registry.find_scalar("UPPER", 2).is_none());
        assert!(registry.find_scalar("nope", 1).is_none());
        assert_eq!(registry.len(), 8);
    }

    #[test]
    fn test_variadic_fallback_respects_min_args() {
        let registry = FunctionRegistry::with_builtins();
        assert!(registry.find_scalar("coalesce", 3).is_some());
        assert!(registry.find_scalar("coalesce", 0).is_none());
    }

    #[test]
    fn test_register_replaces() {
        struct Shout;
        impl ScalarFunction for Shout {
            fn invoke(&self, _args: &[Variant]) -> Result<Variant> {
                Ok(Variant::from("!"))
            }
            fn num_args(&self) -> i32 {
                1
            }
            fn name(&self) -> &str {
                "UPPER"
            }
        }
        let mut registry = FunctionRegistry::with_builtins();
        assert!(registry.register_scalar(Shout).is_some());
        let f = registry.find_scalar("upper", 1).unwrap();
        assert_eq!(f.invoke(&[Variant::from("a")]).unwrap(), Variant::from("!"));
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(
            call("upper", &[Variant::from("abc")]).unwrap(),
            Variant::from("ABC")
        );
        assert_eq!(
            call("lower", &[Variant::from("ÀB")]).unwrap(),
            Variant::from("àb")
        );
        assert_eq!(
            call("length", &[Variant::from("héllo")]).unwrap(),
            Variant::Integer(5)
        );
        assert_eq!(
            call("length", &[Variant::Blob(vec![0, 1, 2])]).unwrap(),
            Variant::Integer(3)
        );
        assert_eq!(
            call("upper", &[Variant::Integer(7)]).unwrap(),
            Variant::from("7")
        );
        assert!(call("upper", &[Variant::Bool(true)]).is_err());
    }

    #[test]
    fn test_null_in_null_out() {
        for name in ["upper", "lower", "length", "abs"] {
            assert_eq!(call(name, &[Variant::Null]).unwrap(), Variant::Null, "{name}");
        }
    }

    #[test]
    fn test_abs() {
        assert_eq!(call("abs", &[Variant::Integer(-4)]).unwrap(), Variant::Integer(4));
        assert_eq!(call("abs", &[Variant::Double(-1.5)]).unwrap(), Variant::Double(1.5));
        assert_eq!(
            call("abs", &[Variant::Integer(i64::MIN)]).unwrap_err(),
            VsqlError::IntegerOverflow
        );
    }

    #[test]
    fn test_null_handling_functions() {
        assert_eq!(
            call("coalesce", &[Variant::Null, Variant::Integer(2), Variant::Integer(3)]).unwrap(),
            Variant::Integer(2)
        );
        assert_eq!(call("coalesce", &[Variant::Null]).unwrap(), Variant::Null);
        assert_eq!(
            call("ifnull", &[Variant::Null, Variant::from("d")]).unwrap(),
            Variant::from("d")
        );
        assert_eq!(
            call("nullif", &[Variant::Integer(1), Variant::Integer(1)]).unwrap(),
            Variant::Null
        );
        assert_eq!(
            call("nullif", &[Variant::Integer(1), Variant::Double(2.0)]).unwrap(),
            Variant::Integer(1)
        );
    }

    #[test]
    fn test_typeof() {
        assert_eq!(
            call("typeof", &[Variant::Double(1.0)]).unwrap(),
            Variant::from("double")
        );
        assert_eq!(call("typeof", &[Variant::Null]).unwrap(), Variant::from("null"));
    }

    #[test]
    fn test_return_types() {
        let registry = FunctionRegistry::with_builtins();
        let coalesce = registry.find_scalar("coalesce", 2).unwrap();
        assert_eq!(
            coalesce.return_type(&[DataType::Null, DataType::Double]),
            DataType::Double
        );
        let length = registry.find_scalar("length", 1).unwrap();
        assert_eq!(length.return_type(&[DataType::Text]), DataType::Integer);
    }
}
