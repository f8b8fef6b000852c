//! Property definitions.

use ormview_proto::{PropertyType, ScalarType, TypeName};
use serde::{Deserialize, Serialize};

/// Declared storage name of a property.
///
/// A single name is used as-is for scalars and as the stem of `{name}_m{i}`
/// columns for masters. An indexed list names each master candidate column
/// positionally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StorageName {
    /// One name.
    Single(String),
    /// One name per candidate type.
    Indexed(Vec<String>),
}

impl StorageName {
    /// The name used for plain column lookups.
    ///
    /// Indexed names have no single column; the first entry stands in.
    pub fn primary(&self) -> &str {
        match self {
            StorageName::Single(name) => name,
            StorageName::Indexed(names) => names.first().map(String::as_str).unwrap_or_default(),
        }
    }

    /// Name at `index`, if declared. A single name answers every index.
    pub fn at(&self, index: usize) -> Option<&str> {
        match self {
            StorageName::Single(name) => Some(name),
            StorageName::Indexed(names) => names.get(index).map(String::as_str),
        }
    }

    /// Column holding the key of the `index`-th master candidate.
    pub fn master_column(&self, index: usize) -> Option<String> {
        match self {
            StorageName::Single(name) => Some(format!("{}_m{}", name, index)),
            StorageName::Indexed(names) => names.get(index).cloned(),
        }
    }

    /// Number of declared names.
    pub fn len(&self) -> usize {
        match self {
            StorageName::Single(_) => 1,
            StorageName::Indexed(names) => names.len(),
        }
    }

    /// Check if no names are declared.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Expression text targeted at one execution engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineExpression {
    /// Engine identity the expression is written for.
    pub engine: String,
    /// Expression text; property references are written as `@Name@`.
    pub expression: String,
}

/// A property definition within a class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDef {
    /// Property name.
    pub name: String,
    /// Declared type.
    pub property_type: PropertyType,
    /// Storage name override. Absent means the property name.
    #[serde(default)]
    pub storage: Option<StorageName>,
    /// Value is required.
    #[serde(default)]
    pub not_null: bool,
    /// Property has no column; it may be computed by an expression.
    #[serde(default)]
    pub not_stored: bool,
    /// Display caption.
    #[serde(default)]
    pub caption: Option<String>,
    /// Maximum string length.
    #[serde(default)]
    pub str_len: Option<u32>,
    /// Allowed concrete types for a master (polymorphic usage).
    #[serde(default)]
    pub type_usage: Vec<TypeName>,
    /// Per-engine expressions.
    #[serde(default)]
    pub expressions: Vec<EngineExpression>,
    /// Marks the link to the aggregating object of a detail.
    #[serde(default)]
    pub aggregator: bool,
    /// Marks the ordering property of a detail.
    #[serde(default)]
    pub order: bool,
}

impl PropertyDef {
    /// Create a property of any type.
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            property_type,
            storage: None,
            not_null: false,
            not_stored: false,
            caption: None,
            str_len: None,
            type_usage: Vec::new(),
            expressions: Vec::new(),
            aggregator: false,
            order: false,
        }
    }

    /// Create a scalar property.
    pub fn scalar(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self::new(name, PropertyType::Scalar(scalar))
    }

    /// Create a master reference.
    pub fn master(name: impl Into<String>, class: impl Into<TypeName>) -> Self {
        Self::new(name, PropertyType::Master(class.into()))
    }

    /// Create a detail collection property.
    pub fn detail(name: impl Into<String>, collection: impl Into<TypeName>) -> Self {
        Self::new(name, PropertyType::Detail(collection.into()))
    }

    /// Set the storage name.
    pub fn with_storage(mut self, name: impl Into<String>) -> Self {
        self.storage = Some(StorageName::Single(name.into()));
        self
    }

    /// Set one storage name per master candidate.
    pub fn with_storage_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.storage = Some(StorageName::Indexed(
            names.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Mark as required.
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Mark as not stored.
    pub fn not_stored(mut self) -> Self {
        self.not_stored = true;
        self
    }

    /// Set the caption.
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    /// Set the maximum string length.
    pub fn with_str_len(mut self, len: u32) -> Self {
        self.str_len = Some(len);
        self
    }

    /// Restrict a master to the given concrete types.
    pub fn with_type_usage<I, T>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeName>,
    {
        self.type_usage = types.into_iter().map(Into::into).collect();
        self
    }

    /// Add an expression for an engine.
    pub fn with_expression(mut self, engine: impl Into<String>, expression: impl Into<String>) -> Self {
        self.expressions.push(EngineExpression {
            engine: engine.into(),
            expression: expression.into(),
        });
        self
    }

    /// Mark as the aggregator link.
    pub fn aggregator(mut self) -> Self {
        self.aggregator = true;
        self
    }

    /// Mark as the ordering property.
    pub fn order(mut self) -> Self {
        self.order = true;
        self
    }

    /// Effective storage name: the override or the property name.
    pub fn storage_name(&self) -> StorageName {
        self.storage
            .clone()
            .unwrap_or_else(|| StorageName::Single(self.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_builder() {
        let prop = PropertyDef::scalar("Name", ScalarType::String)
            .not_null()
            .with_caption("Full name")
            .with_str_len(100);

        assert_eq!(prop.name, "Name");
        assert!(prop.not_null);
        assert!(!prop.not_stored);
        assert_eq!(prop.caption.as_deref(), Some("Full name"));
        assert_eq!(prop.str_len, Some(100));
        assert_eq!(prop.storage_name(), StorageName::Single("Name".into()));
    }

    #[test]
    fn test_master_columns() {
        let single = StorageName::Single("Workplace".into());
        assert_eq!(single.master_column(0).as_deref(), Some("Workplace_m0"));
        assert_eq!(single.master_column(3).as_deref(), Some("Workplace_m3"));
        assert_eq!(single.at(5), Some("Workplace"));

        let indexed = StorageName::Indexed(vec!["SiteOffice".into(), "SitePlant".into()]);
        assert_eq!(indexed.master_column(1).as_deref(), Some("SitePlant"));
        assert_eq!(indexed.master_column(2), None);
        assert_eq!(indexed.primary(), "SiteOffice");
        assert_eq!(indexed.len(), 2);
    }

    #[test]
    fn test_storage_name_json_forms() {
        let single: StorageName = serde_json::from_str("\"Dept\"").unwrap();
        assert_eq!(single, StorageName::Single("Dept".into()));

        let indexed: StorageName = serde_json::from_str("[\"A\", \"B\"]").unwrap();
        assert_eq!(indexed, StorageName::Indexed(vec!["A".into(), "B".into()]));
    }
}
