//! Class definitions.

use super::property::PropertyDef;
use super::view_def::ViewDef;
use ormview_proto::{ScalarType, TypeName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A data class definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    /// Fully qualified class name (unique within the registry).
    pub name: TypeName,
    /// Base class, absent for a root class.
    #[serde(default)]
    pub base: Option<TypeName>,
    /// Table name. Absent means the short class name.
    #[serde(default)]
    pub storage_name: Option<String>,
    /// Discriminator value. Absent means the short class name.
    #[serde(default)]
    pub type_storage_name: Option<String>,
    /// Primary key column. Inherited; absent on the whole chain means `primaryKey`.
    #[serde(default)]
    pub primary_key_storage_name: Option<String>,
    /// Primary key type. Inherited.
    #[serde(default)]
    pub key_type: Option<ScalarType>,
    /// Display caption. Absent means the short class name.
    #[serde(default)]
    pub caption: Option<String>,
    /// Property whose value captions an instance. Inherited.
    #[serde(default)]
    pub caption_property: Option<String>,
    /// Class has no storage of its own.
    #[serde(default)]
    pub not_stored: bool,
    /// Generated at runtime and may be redefined; facts about it are never cached.
    #[serde(default)]
    pub ephemeral: bool,
    /// Partial loading orders; merged with those of base classes.
    #[serde(default)]
    pub loading_order: Vec<Vec<String>>,
    /// Per-property usage overrides. Apply to this class only.
    #[serde(default)]
    pub property_type_usages: BTreeMap<String, Vec<TypeName>>,
    /// Properties declared by this class (not inherited ones).
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
    /// Views declared on this class.
    #[serde(default)]
    pub views: Vec<ViewDef>,
}

impl ClassDef {
    /// Create a root class.
    pub fn new(name: impl Into<TypeName>) -> Self {
        Self {
            name: name.into(),
            base: None,
            storage_name: None,
            type_storage_name: None,
            primary_key_storage_name: None,
            key_type: None,
            caption: None,
            caption_property: None,
            not_stored: false,
            ephemeral: false,
            loading_order: Vec::new(),
            property_type_usages: BTreeMap::new(),
            properties: Vec::new(),
            views: Vec::new(),
        }
    }

    /// Create a class derived from `base`.
    pub fn derived(name: impl Into<TypeName>, base: impl Into<TypeName>) -> Self {
        let mut class = Self::new(name);
        class.base = Some(base.into());
        class
    }

    /// Add a property.
    pub fn with_property(mut self, property: PropertyDef) -> Self {
        self.properties.push(property);
        self
    }

    /// Add multiple properties.
    pub fn with_properties(mut self, properties: impl IntoIterator<Item = PropertyDef>) -> Self {
        self.properties.extend(properties);
        self
    }

    /// Add a view.
    pub fn with_view(mut self, view: ViewDef) -> Self {
        self.views.push(view);
        self
    }

    /// Set the table name.
    pub fn with_storage_name(mut self, name: impl Into<String>) -> Self {
        self.storage_name = Some(name.into());
        self
    }

    /// Set the discriminator value.
    pub fn with_type_storage_name(mut self, name: impl Into<String>) -> Self {
        self.type_storage_name = Some(name.into());
        self
    }

    /// Set the primary key column.
    pub fn with_primary_key_storage_name(mut self, name: impl Into<String>) -> Self {
        self.primary_key_storage_name = Some(name.into());
        self
    }

    /// Set the primary key type.
    pub fn with_key_type(mut self, key_type: ScalarType) -> Self {
        self.key_type = Some(key_type);
        self
    }

    /// Set the caption.
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    /// Set the caption property.
    pub fn with_caption_property(mut self, property: impl Into<String>) -> Self {
        self.caption_property = Some(property.into());
        self
    }

    /// Add a partial loading order.
    pub fn with_loading_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.loading_order
            .push(order.into_iter().map(Into::into).collect());
        self
    }

    /// Override the usage types of a property for this class only.
    pub fn with_property_type_usage<I, T>(mut self, property: impl Into<String>, types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeName>,
    {
        self.property_type_usages.insert(
            property.into(),
            types.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Mark as not stored.
    pub fn not_stored(mut self) -> Self {
        self.not_stored = true;
        self
    }

    /// Mark as ephemeral.
    pub fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }

    /// Get a property declared directly on this class.
    pub fn get_property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Get a view declared directly on this class.
    pub fn get_view(&self, name: &str) -> Option<&ViewDef> {
        self.views.iter().find(|v| v.name == name)
    }
}
