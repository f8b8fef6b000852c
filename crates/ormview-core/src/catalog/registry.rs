//! Class registry: the declarative metadata every lookup is answered from.

use super::class::ClassDef;
use super::property::PropertyDef;
use super::view_def::{DetailCollectionDef, EngineDef};
use crate::error::{Error, Result};
use ormview_proto::{PropertyType, TypeName};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Serialized form of a registry.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    classes: Vec<ClassDef>,
    #[serde(default)]
    collections: Vec<DetailCollectionDef>,
    #[serde(default)]
    engines: Vec<EngineDef>,
}

/// Registry of classes, detail collections and execution engines.
///
/// Populated once at startup, in code or from JSON, and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    classes: HashMap<TypeName, ClassDef>,
    collections: HashMap<TypeName, DetailCollectionDef>,
    engines: HashMap<String, EngineDef>,
}

impl ClassRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a class.
    pub fn with_class(mut self, class: ClassDef) -> Self {
        self.classes.insert(class.name.clone(), class);
        self
    }

    /// Add a detail collection type.
    pub fn with_collection(mut self, collection: DetailCollectionDef) -> Self {
        self.collections.insert(collection.name.clone(), collection);
        self
    }

    /// Add an execution engine.
    pub fn with_engine(mut self, engine: EngineDef) -> Self {
        self.engines.insert(engine.name.clone(), engine);
        self
    }

    /// Parse and validate a registry from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let document: RegistryDocument =
            serde_json::from_str(json).map_err(|e| Error::Deserialization(e.to_string()))?;

        let mut registry = Self::new();
        for class in document.classes {
            if registry.classes.contains_key(&class.name) {
                return Err(Error::Registry(format!("class '{}' declared twice", class.name)));
            }
            registry.classes.insert(class.name.clone(), class);
        }
        for collection in document.collections {
            registry
                .collections
                .insert(collection.name.clone(), collection);
        }
        for engine in document.engines {
            registry.engines.insert(engine.name.clone(), engine);
        }

        registry.validate()?;
        Ok(registry)
    }

    /// Read, parse and validate a registry from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serialize the registry to JSON, classes sorted by name.
    pub fn to_json(&self) -> Result<String> {
        let mut document = RegistryDocument {
            classes: self.classes.values().cloned().collect(),
            collections: self.collections.values().cloned().collect(),
            engines: self.engines.values().cloned().collect(),
        };
        document.classes.sort_by(|a, b| a.name.cmp(&b.name));
        document.collections.sort_by(|a, b| a.name.cmp(&b.name));
        document.engines.sort_by(|a, b| a.name.cmp(&b.name));

        serde_json::to_string_pretty(&document)
            .map_err(|e| Error::Registry(format!("cannot serialize registry: {}", e)))
    }

    /// Check that every reference names a registered class or collection
    /// and that inheritance is acyclic.
    pub fn validate(&self) -> Result<()> {
        for class in self.classes.values() {
            if let Some(base) = &class.base {
                self.require_class(base, || format!("base of '{}'", class.name))?;
            }
            self.base_chain(&class.name)?;

            for property in &class.properties {
                self.validate_property(class, property)?;
            }
            for (property, types) in &class.property_type_usages {
                for t in types {
                    self.require_class(t, || format!("type usage of '{}.{}'", class.name, property))?;
                }
            }
            for view in &class.views {
                for filter in view.master_type_filters.values() {
                    self.require_class(filter, || {
                        format!("master type filter of view '{}' on '{}'", view.name, class.name)
                    })?;
                }
            }
        }

        for collection in self.collections.values() {
            self.require_class(&collection.item, || format!("item of '{}'", collection.name))?;
            for t in &collection.type_usage {
                self.require_class(t, || format!("type usage of '{}'", collection.name))?;
            }
        }

        for engine in self.engines.values() {
            let mut seen = HashSet::new();
            let mut current = Some(engine);
            while let Some(e) = current {
                if !seen.insert(e.name.as_str()) {
                    return Err(Error::Registry(format!(
                        "cyclic engine inheritance at '{}'",
                        engine.name
                    )));
                }
                current = match &e.base {
                    Some(base) => Some(self.engines.get(base).ok_or_else(|| {
                        Error::Registry(format!("unknown base engine '{}' of '{}'", base, e.name))
                    })?),
                    None => None,
                };
            }
        }

        Ok(())
    }

    fn validate_property(&self, class: &ClassDef, property: &PropertyDef) -> Result<()> {
        match &property.property_type {
            PropertyType::Master(target) => {
                self.require_class(target, || format!("master '{}.{}'", class.name, property.name))?;
            }
            PropertyType::Detail(collection) => {
                if !self.collections.contains_key(collection) {
                    return Err(Error::Registry(format!(
                        "unknown detail collection '{}' of '{}.{}'",
                        collection, class.name, property.name
                    )));
                }
            }
            PropertyType::Scalar(_) => {}
        }
        for t in &property.type_usage {
            self.require_class(t, || format!("type usage of '{}.{}'", class.name, property.name))?;
        }
        Ok(())
    }

    fn require_class(&self, name: &TypeName, context: impl FnOnce() -> String) -> Result<()> {
        if self.classes.contains_key(name) {
            Ok(())
        } else {
            Err(Error::Registry(format!("unknown class '{}' in {}", name, context())))
        }
    }

    /// Get a class by name.
    pub fn class(&self, name: &str) -> Option<&ClassDef> {
        self.classes.get(name)
    }

    /// Get a class by name, failing with [`Error::ClassNotFound`].
    pub fn get_class(&self, name: &TypeName) -> Result<&ClassDef> {
        self.classes
            .get(name)
            .ok_or_else(|| Error::ClassNotFound(name.clone()))
    }

    /// Get a detail collection type.
    pub fn collection(&self, name: &str) -> Option<&DetailCollectionDef> {
        self.collections.get(name)
    }

    /// Get an engine definition.
    pub fn engine(&self, name: &str) -> Option<&EngineDef> {
        self.engines.get(name)
    }

    /// All class names, sorted.
    pub fn class_names(&self) -> Vec<&TypeName> {
        let mut names: Vec<_> = self.classes.keys().collect();
        names.sort();
        names
    }

    /// Number of registered classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Check if no classes are registered.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// The class followed by its bases, nearest first.
    pub fn base_chain(&self, name: &TypeName) -> Result<Vec<&ClassDef>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(name);

        while let Some(class_name) = current {
            if !seen.insert(class_name) {
                return Err(Error::Registry(format!(
                    "cyclic inheritance at '{}'",
                    class_name
                )));
            }
            let class = self.get_class(class_name)?;
            chain.push(class);
            current = class.base.as_ref();
        }

        Ok(chain)
    }

    /// Check if `class` is `base` or derives from it.
    pub fn is_same_or_subclass(&self, class: &TypeName, base: &TypeName) -> bool {
        class == base || self.is_subclass_of(class, base)
    }

    /// Check if `class` strictly derives from `base`.
    pub fn is_subclass_of(&self, class: &TypeName, base: &TypeName) -> bool {
        match self.base_chain(class) {
            Ok(chain) => chain.iter().skip(1).any(|c| &c.name == base),
            Err(_) => false,
        }
    }

    /// Find a property on the class or its bases.
    ///
    /// Returns the declaring class along with the definition.
    pub fn find_property(&self, class: &TypeName, property: &str) -> Result<(&ClassDef, &PropertyDef)> {
        for owner in self.base_chain(class)? {
            if let Some(def) = owner.get_property(property) {
                return Ok((owner, def));
            }
        }
        Err(Error::property_not_found(class, property))
    }

    /// The engine followed by its bases, nearest first.
    ///
    /// Unknown engines yield just themselves.
    pub fn engine_chain(&self, engine: &str) -> Vec<String> {
        let mut chain = vec![engine.to_string()];
        let mut current = self.engines.get(engine).and_then(|e| e.base.as_deref());

        while let Some(base) = current {
            if chain.iter().any(|e| e == base) || chain.len() > self.engines.len() {
                break;
            }
            chain.push(base.to_string());
            current = self.engines.get(base).and_then(|e| e.base.as_deref());
        }

        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ViewDef;
    use crate::fixtures::hr_registry;
    use ormview_proto::ScalarType;

    #[test]
    fn test_fixture_is_valid() {
        let registry = hr_registry();
        registry.validate().unwrap();
        assert!(registry.class("Hr.Employee").is_some());
        assert!(registry.class("Hr.Nope").is_none());
    }

    #[test]
    fn test_base_chain_and_subclass() {
        let registry = hr_registry();
        let chain: Vec<&str> = registry
            .base_chain(&"Hr.Contractor".into())
            .unwrap()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(chain, vec!["Hr.Contractor", "Hr.Employee", "Hr.Person"]);

        assert!(registry.is_subclass_of(&"Hr.Contractor".into(), &"Hr.Person".into()));
        assert!(!registry.is_subclass_of(&"Hr.Person".into(), &"Hr.Person".into()));
        assert!(registry.is_same_or_subclass(&"Hr.Person".into(), &"Hr.Person".into()));
        assert!(!registry.is_same_or_subclass(&"Hr.Department".into(), &"Hr.Person".into()));
    }

    #[test]
    fn test_find_property_walks_bases() {
        let registry = hr_registry();
        let (owner, prop) = registry.find_property(&"Hr.Employee".into(), "Name").unwrap();
        assert_eq!(owner.name.as_str(), "Hr.Person");
        assert_eq!(prop.name, "Name");

        let err = registry.find_property(&"Hr.Employee".into(), "Nope").unwrap_err();
        assert!(matches!(err, Error::PropertyNotFound { .. }));
    }

    #[test]
    fn test_engine_chain() {
        let registry = hr_registry();
        assert_eq!(registry.engine_chain("PostgreSql"), vec!["PostgreSql", "Sql"]);
        assert_eq!(registry.engine_chain("Unknown"), vec!["Unknown"]);
    }

    #[test]
    fn test_validate_rejects_unknown_master() {
        let registry = ClassRegistry::new().with_class(
            ClassDef::new("A").with_property(PropertyDef::master("B", "Missing")),
        );
        let err = registry.validate().unwrap_err();
        assert!(matches!(err, Error::Registry(msg) if msg.contains("Missing")));
    }

    #[test]
    fn test_validate_rejects_cycle() {
        let registry = ClassRegistry::new()
            .with_class(ClassDef::derived("A", "B"))
            .with_class(ClassDef::derived("B", "A"));
        assert!(matches!(registry.validate(), Err(Error::Registry(_))));
    }

    #[test]
    fn test_validate_rejects_unknown_filter() {
        let registry = ClassRegistry::new().with_class(
            ClassDef::new("A")
                .with_property(PropertyDef::scalar("X", ScalarType::Int32))
                .with_view(ViewDef::new("V", ["X"]).with_master_type_filter("X", "Ghost")),
        );
        assert!(registry.validate().is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let registry = hr_registry();
        let json = registry.to_json().unwrap();
        let back = ClassRegistry::from_json(&json).unwrap();

        assert_eq!(back.len(), registry.len());
        assert_eq!(
            back.class("Hr.Employee").unwrap(),
            registry.class("Hr.Employee").unwrap()
        );
    }

    #[test]
    fn test_from_json_rejects_duplicates() {
        let json = r#"{ "classes": [ { "name": "A" }, { "name": "A" } ] }"#;
        assert!(matches!(ClassRegistry::from_json(json), Err(Error::Registry(_))));
    }

    #[test]
    fn test_from_json_reports_parse_errors() {
        assert!(matches!(
            ClassRegistry::from_json("{ not json"),
            Err(Error::Deserialization(_))
        ));
    }
}
