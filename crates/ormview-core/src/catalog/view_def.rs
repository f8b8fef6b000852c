//! Declared views and detail collections.

use ormview_proto::TypeName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A view as declared on a class.
///
/// Detail views are referenced by name and resolved against the detail's
/// item class when the view is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewDef {
    /// View name.
    pub name: String,
    /// Dotted property paths.
    #[serde(default)]
    pub properties: Vec<String>,
    /// Path prefix -> required subtype.
    #[serde(default)]
    pub master_type_filters: BTreeMap<String, TypeName>,
    /// Detail views.
    #[serde(default)]
    pub details: Vec<DetailViewDef>,
    /// Pseudo-detail views.
    #[serde(default)]
    pub pseudo_details: Vec<PseudoDetailViewDef>,
}

/// Detail property and the view of its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailViewDef {
    /// Detail property on the owning class.
    pub property: String,
    /// View name on the item class.
    pub view: String,
}

/// Unrelated class loaded alongside the view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PseudoDetailViewDef {
    /// Pseudo-detail class.
    pub class: TypeName,
    /// View name on that class.
    pub view: String,
}

impl ViewDef {
    /// Create a view from property paths.
    pub fn new<I, S>(name: impl Into<String>, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            properties: properties.into_iter().map(Into::into).collect(),
            master_type_filters: BTreeMap::new(),
            details: Vec::new(),
            pseudo_details: Vec::new(),
        }
    }

    /// Restrict a master path to a subtype.
    pub fn with_master_type_filter(mut self, prefix: impl Into<String>, class: impl Into<TypeName>) -> Self {
        self.master_type_filters.insert(prefix.into(), class.into());
        self
    }

    /// Add a detail view.
    pub fn with_detail(mut self, property: impl Into<String>, view: impl Into<String>) -> Self {
        self.details.push(DetailViewDef {
            property: property.into(),
            view: view.into(),
        });
        self
    }

    /// Add a pseudo-detail view.
    pub fn with_pseudo_detail(mut self, class: impl Into<TypeName>, view: impl Into<String>) -> Self {
        self.pseudo_details.push(PseudoDetailViewDef {
            class: class.into(),
            view: view.into(),
        });
        self
    }
}

/// A detail collection type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailCollectionDef {
    /// Collection type name.
    pub name: TypeName,
    /// Element class.
    pub item: TypeName,
    /// Concrete element classes when the collection is polymorphic.
    #[serde(default)]
    pub type_usage: Vec<TypeName>,
}

impl DetailCollectionDef {
    /// Create a collection of `item`.
    pub fn new(name: impl Into<TypeName>, item: impl Into<TypeName>) -> Self {
        Self {
            name: name.into(),
            item: item.into(),
            type_usage: Vec::new(),
        }
    }

    /// Declare the concrete element classes.
    pub fn with_type_usage<I, T>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeName>,
    {
        self.type_usage = types.into_iter().map(Into::into).collect();
        self
    }
}

/// An execution engine identity with an optional base engine.
///
/// Expressions declared for a base engine apply to derived engines unless
/// a closer one is declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineDef {
    /// Engine identity.
    pub name: String,
    /// Base engine.
    #[serde(default)]
    pub base: Option<String>,
}

impl EngineDef {
    /// Create a root engine.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: None,
        }
    }

    /// Create an engine derived from `base`.
    pub fn derived(name: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: Some(base.into()),
        }
    }
}
