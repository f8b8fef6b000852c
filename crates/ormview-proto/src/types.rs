//! Type handles and property types.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Handle to a class registered in the metadata registry.
///
/// Holds the fully qualified name (e.g. `Hr.Employee`). The short name used
/// for default storage names and flat aliases is the last `.`-separated part.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeName(String);

impl TypeName {
    /// Create a type name from its fully qualified form.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The fully qualified name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The unqualified name (text after the last `.`).
    pub fn short_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for TypeName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for TypeName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Scalar data types a property can hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    /// Boolean value.
    Bool,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point.
    Float64,
    /// Fixed-precision decimal.
    Decimal {
        /// Total number of digits.
        precision: u8,
        /// Number of digits after decimal point.
        scale: u8,
    },
    /// UTF-8 string.
    String,
    /// Binary data.
    Bytes,
    /// Date and time.
    DateTime,
    /// UUID (128-bit identifier).
    Uuid,
}

impl ScalarType {
    /// Check if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ScalarType::Int32 | ScalarType::Int64 | ScalarType::Float64 | ScalarType::Decimal { .. }
        )
    }
}

/// Declared type of a property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    /// A plain value stored in a column.
    Scalar(ScalarType),
    /// A reference to another data object (many-to-one).
    Master(TypeName),
    /// A detail collection (one-to-many) backed by a collection type.
    Detail(TypeName),
}

impl PropertyType {
    /// Check if this is a master reference.
    pub fn is_master(&self) -> bool {
        matches!(self, PropertyType::Master(_))
    }

    /// Check if this is a detail collection.
    pub fn is_detail(&self) -> bool {
        matches!(self, PropertyType::Detail(_))
    }

    /// The referenced class of a master property.
    pub fn master_class(&self) -> Option<&TypeName> {
        match self {
            PropertyType::Master(class) => Some(class),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyType::Scalar(scalar) => write!(f, "{:?}", scalar),
            PropertyType::Master(class) => write!(f, "master {}", class),
            PropertyType::Detail(collection) => write!(f, "detail {}", collection),
        }
    }
}
