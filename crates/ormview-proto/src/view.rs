//! Declarative views: which properties to load for a class.

use crate::error::Error;
use crate::path::PropertyPath;
use crate::types::TypeName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One property requested by a view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyInView {
    /// Dotted path relative to the view's class.
    pub path: PropertyPath,
    /// True when the property was added after the view was declared
    /// (e.g. pulled in by a computed property's expression).
    #[serde(default)]
    pub appended: bool,
}

impl PropertyInView {
    /// A declared property.
    pub fn new(path: PropertyPath) -> Self {
        Self {
            path,
            appended: false,
        }
    }
}

/// A nested view for a detail collection property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailInView {
    /// Detail collection property name on the aggregator.
    pub name: String,
    /// View of the detail item class.
    pub view: View,
}

/// A view of an unrelated class loaded alongside this one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PseudoDetailInView {
    /// Class of the pseudo-detail objects.
    pub class: TypeName,
    /// Name of the view to load them with.
    pub view_name: String,
}

/// A named, declarative shape over a class.
///
/// Views are immutable once handed out by the view cache; callers get clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    /// View name (unique per class).
    pub name: String,
    /// Class the view is defined on.
    pub define_class: TypeName,
    /// Requested properties in order. Duplicates are allowed.
    #[serde(default)]
    pub properties: Vec<PropertyInView>,
    /// Path prefix -> required subtype, restricting polymorphic masters.
    #[serde(default)]
    pub master_type_filters: BTreeMap<String, TypeName>,
    /// Detail collection views.
    #[serde(default)]
    pub details: Vec<DetailInView>,
    /// Pseudo-detail views.
    #[serde(default)]
    pub pseudo_details: Vec<PseudoDetailInView>,
}

impl View {
    /// Create an empty view.
    pub fn new(name: impl Into<String>, define_class: impl Into<TypeName>) -> Self {
        Self {
            name: name.into(),
            define_class: define_class.into(),
            properties: Vec::new(),
            master_type_filters: BTreeMap::new(),
            details: Vec::new(),
            pseudo_details: Vec::new(),
        }
    }

    /// Create a view from dotted property paths.
    pub fn from_paths<'p>(
        name: impl Into<String>,
        define_class: impl Into<TypeName>,
        paths: impl IntoIterator<Item = &'p str>,
    ) -> Result<Self, Error> {
        let mut view = Self::new(name, define_class);
        for path in paths {
            view.properties
                .push(PropertyInView::new(PropertyPath::parse(path)?));
        }
        Ok(view)
    }

    /// Add a property path.
    pub fn with_property(mut self, path: &str) -> Result<Self, Error> {
        self.properties
            .push(PropertyInView::new(PropertyPath::parse(path)?));
        Ok(self)
    }

    /// Add an already parsed path.
    pub fn with_path(mut self, path: PropertyPath) -> Self {
        self.properties.push(PropertyInView::new(path));
        self
    }

    /// Restrict the master at `prefix` to `class` and its subtypes.
    pub fn with_master_type_filter(
        mut self,
        prefix: impl Into<String>,
        class: impl Into<TypeName>,
    ) -> Self {
        self.master_type_filters.insert(prefix.into(), class.into());
        self
    }

    /// Add a detail view.
    pub fn with_detail(mut self, name: impl Into<String>, view: View) -> Self {
        self.details.push(DetailInView {
            name: name.into(),
            view,
        });
        self
    }

    /// Add a pseudo-detail view reference.
    pub fn with_pseudo_detail(
        mut self,
        class: impl Into<TypeName>,
        view_name: impl Into<String>,
    ) -> Self {
        self.pseudo_details.push(PseudoDetailInView {
            class: class.into(),
            view_name: view_name.into(),
        });
        self
    }

    /// Subtype filter registered for a path prefix.
    pub fn master_type_filter(&self, prefix: &str) -> Option<&TypeName> {
        self.master_type_filters.get(prefix)
    }

    /// Check if a path is requested.
    pub fn contains_property(&self, path: &PropertyPath) -> bool {
        self.properties.iter().any(|p| &p.path == path)
    }

    /// Append paths not already present, marking them as appended.
    ///
    /// Returns the number of paths actually added.
    pub fn append_properties<I, S>(&mut self, paths: I) -> Result<usize, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut added = 0;
        for path in paths {
            let path = PropertyPath::parse(path.as_ref())?;
            if self.contains_property(&path) {
                continue;
            }
            self.properties.push(PropertyInView {
                path,
                appended: true,
            });
            added += 1;
        }
        Ok(added)
    }

    /// Dotted names of the requested properties, in order.
    pub fn property_names(&self) -> Vec<String> {
        self.properties.iter().map(|p| p.path.to_string()).collect()
    }

    /// Find a detail view by property name.
    pub fn detail(&self, name: &str) -> Option<&DetailInView> {
        self.details.iter().find(|d| d.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_builder() {
        let view = View::new("EmployeeL", "Hr.Employee")
            .with_property("Name")
            .unwrap()
            .with_property("Department.Title")
            .unwrap()
            .with_master_type_filter("Workplace", "Hr.Office");

        assert_eq!(view.properties.len(), 2);
        assert_eq!(view.property_names(), vec!["Name", "Department.Title"]);
        assert_eq!(
            view.master_type_filter("Workplace").map(TypeName::as_str),
            Some("Hr.Office")
        );
        assert!(view.master_type_filter("Department").is_none());
    }

    #[test]
    fn test_from_paths_rejects_bad_path() {
        assert!(View::from_paths("V", "Hr.Employee", ["Name", "Department."]).is_err());
    }

    #[test]
    fn test_duplicates_are_kept() {
        let view = View::from_paths("V", "Hr.Employee", ["Name", "Name"]).unwrap();
        assert_eq!(view.properties.len(), 2);
    }

    #[test]
    fn test_append_properties_skips_present() {
        let mut view = View::from_paths("V", "Hr.Employee", ["Name"]).unwrap();
        let added = view.append_properties(["Name", "Salary", "Bonus"]).unwrap();

        assert_eq!(added, 2);
        assert_eq!(view.properties.len(), 3);
        assert!(!view.properties[0].appended);
        assert!(view.properties[1].appended);
        assert!(view.properties[2].appended);
    }

    #[test]
    fn test_detail_lookup() {
        let lines = View::from_paths("OrderLineE", "Sales.OrderLine", ["Qty"]).unwrap();
        let view = View::new("OrderE", "Sales.Order").with_detail("Lines", lines);

        assert!(view.detail("Lines").is_some());
        assert!(view.detail("Payments").is_none());
    }
}
