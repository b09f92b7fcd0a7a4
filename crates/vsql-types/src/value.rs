use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use vsql_error::{Result, VsqlError};

use crate::DataType;

/// A dynamically-typed scalar value.
///
/// This is the uniform value representation of the engine: literals, bound
/// parameters, provider columns, and computed results all travel as a
/// `Variant`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub enum Variant {
    /// SQL NULL.
    #[default]
    Null,
    /// A boolean truth value.
    Bool(bool),
    /// A 64-bit signed integer.
    Integer(i64),
    /// A 64-bit IEEE 754 floating-point number.
    Double(f64),
    /// A UTF-8 text string.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl Variant {
    /// Build a value from the text of a numeric literal.
    ///
    /// Text without a decimal point becomes an integer (falling back to a
    /// double when it does not fit in `i64`); text with one becomes a double.
    pub fn from_number_text(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if !trimmed.contains('.') {
            if let Ok(i) = trimmed.parse::<i64>() {
                return Ok(Self::Integer(i));
            }
        }
        trimmed
            .parse::<f64>()
            .map(Self::Double)
            .map_err(|_| VsqlError::type_mismatch("numeric literal", format!("'{text}'")))
    }

    /// The runtime type of this value.
    pub const fn datatype(&self) -> DataType {
        match self {
            Self::Null => DataType::Null,
            Self::Bool(_) => DataType::Boolean,
            Self::Integer(_) => DataType::Integer,
            Self::Double(_) => DataType::Double,
            Self::Text(_) => DataType::Text,
            Self::Blob(_) => DataType::Blob,
        }
    }

    /// Returns true if this is a NULL value.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view: integers widen to `f64`.
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Self::Blob(b) => Some(b),
            _ => None,
        }
    }

    /// Typed accessor; fails with `TypeMismatch` when the value is not a `T`.
    pub fn get<T>(&self) -> Result<T>
    where
        T: for<'a> TryFrom<&'a Self, Error = VsqlError>,
    {
        T::try_from(self)
    }

    /// Render as text for concatenation. `None` for non-string-like values.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s.clone()),
            Self::Integer(i) => Some(i.to_string()),
            Self::Double(f) => Some(format_double(*f)),
            Self::Null | Self::Bool(_) | Self::Blob(_) => None,
        }
    }

    fn mismatch(&self, expected: &str) -> VsqlError {
        VsqlError::type_mismatch(expected, self.datatype().name())
    }

    /// Resolve the result type of an arithmetic operator or fail.
    fn arithmetic_type(&self, other: &Self) -> Result<DataType> {
        DataType::arithmetic_result(self.datatype(), other.datatype()).ok_or_else(|| {
            let culprit = if self.datatype().is_numeric() || self.is_null() {
                other
            } else {
                self
            };
            culprit.mismatch("numeric")
        })
    }

    /// `self + other`. Null operands yield null.
    pub fn checked_add(&self, other: &Self) -> Result<Self> {
        self.arithmetic(other, i64::checked_add, |a, b| a + b)
    }

    /// `self - other`. Null operands yield null.
    pub fn checked_sub(&self, other: &Self) -> Result<Self> {
        self.arithmetic(other, i64::checked_sub, |a, b| a - b)
    }

    /// `self * other`. Null operands yield null.
    pub fn checked_mul(&self, other: &Self) -> Result<Self> {
        self.arithmetic(other, i64::checked_mul, |a, b| a * b)
    }

    /// `self / other`. Integer division truncates toward zero.
    pub fn checked_div(&self, other: &Self) -> Result<Self> {
        if other.is_zero() && !self.is_null() {
            self.arithmetic_type(other)?;
            return Err(VsqlError::DivisionByZero);
        }
        self.arithmetic(other, i64::checked_div, |a, b| a / b)
    }

    /// `self MOD other`. Sign follows the dividend.
    pub fn checked_rem(&self, other: &Self) -> Result<Self> {
        if other.is_zero() && !self.is_null() {
            self.arithmetic_type(other)?;
            return Err(VsqlError::DivisionByZero);
        }
        // The divisor is non-zero here; MIN MOD -1 is 0, not an overflow.
        self.arithmetic(other, |a, b| Some(a.wrapping_rem(b)), |a, b| a % b)
    }

    fn is_zero(&self) -> bool {
        match self {
            Self::Integer(i) => *i == 0,
            Self::Double(f) => *f == 0.0,
            _ => false,
        }
    }

    fn arithmetic(
        &self,
        other: &Self,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Result<Self> {
        match self.arithmetic_type(other)? {
            _ if self.is_null() || other.is_null() => Ok(Self::Null),
            DataType::Integer => match (self, other) {
                (Self::Integer(a), Self::Integer(b)) => {
                    int_op(*a, *b).map(Self::Integer).ok_or(VsqlError::IntegerOverflow)
                }
                _ => Err(VsqlError::internal("integer promotion on non-integers")),
            },
            _ => match (self.as_double(), other.as_double()) {
                (Some(a), Some(b)) => Ok(Self::Double(float_op(a, b))),
                _ => Err(VsqlError::internal("double promotion on non-numerics")),
            },
        }
    }

    /// Unary minus.
    pub fn checked_neg(&self) -> Result<Self> {
        match self {
            Self::Null => Ok(Self::Null),
            Self::Integer(i) => i.checked_neg().map(Self::Integer).ok_or(VsqlError::IntegerOverflow),
            Self::Double(f) => Ok(Self::Double(-f)),
            other => Err(other.mismatch("numeric")),
        }
    }

    /// Unary plus: checks the operand is numeric and returns it unchanged.
    pub fn checked_pos(&self) -> Result<Self> {
        match self {
            Self::Null | Self::Integer(_) | Self::Double(_) => Ok(self.clone()),
            other => Err(other.mismatch("numeric")),
        }
    }

    /// `self || other`. Numbers are rendered as text; null operands yield null.
    pub fn concat(&self, other: &Self) -> Result<Self> {
        if self.is_null() || other.is_null() {
            for v in [self, other] {
                if !v.is_null() && !v.datatype().is_string_like() {
                    return Err(v.mismatch("text"));
                }
            }
            return Ok(Self::Null);
        }
        let lhs = self.to_text().ok_or_else(|| self.mismatch("text"))?;
        let rhs = other.to_text().ok_or_else(|| other.mismatch("text"))?;
        Ok(Self::Text(lhs + &rhs))
    }

    /// SQL comparison. `Ok(None)` when either side is null.
    pub fn sql_cmp(&self, other: &Self) -> Result<Option<Ordering>> {
        let domain = DataType::comparison_domain(self.datatype(), other.datatype())
            .ok_or_else(|| other.mismatch(self.datatype().name()))?;
        if self.is_null() || other.is_null() {
            return Ok(None);
        }
        let ord = match (domain, self, other) {
            (DataType::Integer, Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (DataType::Double, _, _) => match (self.as_double(), other.as_double()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
            (DataType::Boolean, Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (DataType::Text, Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (DataType::Blob, Self::Blob(a), Self::Blob(b)) => Some(a.cmp(b)),
            _ => None,
        };
        Ok(ord)
    }

    /// Three-valued truth of this value: `None` for null.
    pub fn truth(&self) -> Result<Option<bool>> {
        match self {
            Self::Null => Ok(None),
            Self::Bool(b) => Ok(Some(*b)),
            other => Err(other.mismatch("boolean")),
        }
    }

    /// Promote to the given type if the promotion is lossless.
    #[allow(clippy::cast_precision_loss)]
    pub fn coerce_to(&self, target: DataType) -> Option<Self> {
        match (self, target) {
            (v, t) if v.datatype() == t => Some(v.clone()),
            (Self::Null, _) => Some(Self::Null),
            (Self::Integer(i), DataType::Double) => Some(Self::Double(*i as f64)),
            (Self::Integer(_) | Self::Double(_), DataType::Text) => self.to_text().map(Self::Text),
            _ => None,
        }
    }
}

/// Kleene AND over three-valued truths.
#[must_use]
pub const fn logical_and(lhs: Option<bool>, rhs: Option<bool>) -> Option<bool> {
    match (lhs, rhs) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

/// Kleene OR over three-valued truths.
#[must_use]
pub const fn logical_or(lhs: Option<bool>, rhs: Option<bool>) -> Option<bool> {
    match (lhs, rhs) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

/// XOR: unknown if either side is unknown.
#[must_use]
pub const fn logical_xor(lhs: Option<bool>, rhs: Option<bool>) -> Option<bool> {
    match (lhs, rhs) {
        (Some(a), Some(b)) => Some(a ^ b),
        _ => None,
    }
}

/// Format a double so that it always reads back as a double (`120.0`, not `120`).
#[must_use]
pub fn format_double(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Double(v) => f.write_str(&format_double(*v)),
            Self::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Self::Blob(b) => {
                f.write_str("X'")?;
                for byte in b {
                    write!(f, "{byte:02X}")?;
                }
                f.write_str("'")
            }
        }
    }
}

/// Structural equality: same type and same payload. `Null == Null` here,
/// unlike SQL `=`; use [`Variant::sql_cmp`] for query semantics.
impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a.to_bits() == b.to_bits() || a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Blob(a), Self::Blob(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Variant {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Variant {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for Variant {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<f64> for Variant {
    fn from(f: f64) -> Self {
        Self::Double(f)
    }
}

impl From<String> for Variant {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Variant {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<Vec<u8>> for Variant {
    fn from(b: Vec<u8>) -> Self {
        Self::Blob(b)
    }
}

impl<T: Into<Self>> From<Option<T>> for Variant {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Null, Into::into)
    }
}

impl TryFrom<&Variant> for bool {
    type Error = VsqlError;

    fn try_from(v: &Variant) -> Result<Self> {
        v.as_bool().ok_or_else(|| v.mismatch("boolean"))
    }
}

impl TryFrom<&Variant> for i64 {
    type Error = VsqlError;

    fn try_from(v: &Variant) -> Result<Self> {
        v.as_integer().ok_or_else(|| v.mismatch("integer"))
    }
}

impl TryFrom<&Variant> for f64 {
    type Error = VsqlError;

    fn try_from(v: &Variant) -> Result<Self> {
        v.as_double().ok_or_else(|| v.mismatch("double"))
    }
}

impl TryFrom<&Variant> for String {
    type Error = VsqlError;

    fn try_from(v: &Variant) -> Result<Self> {
        v.as_text().map(str::to_owned).ok_or_else(|| v.mismatch("text"))
    }
}
