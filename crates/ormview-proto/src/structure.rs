//! Compiled storage structures.
//!
//! A [`StorageStructure`] is the join graph computed for a view against a
//! concrete class, plus one [`PropStorage`] binding per requested property.
//! Sources live in an arena indexed by [`SourceId`]; the root is always
//! `SourceId(0)`.

use crate::error::Error;
use crate::path::PropertyPath;
use crate::types::{PropertyType, TypeName};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Strategy used to turn a view into sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageStrategy {
    /// One table per class; only master/detail navigation creates joins.
    Flat,
    /// One table per class in the inheritance ladder; properties declared on
    /// a base class are read from the base table joined by primary key.
    Hierarchical,
}

/// Index of a source inside a [`StorageStructure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(pub usize);

impl SourceId {
    /// The root source.
    pub const ROOT: SourceId = SourceId(0);
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a storage entry attaches to its parent source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentLink {
    /// Whether the link column may be null (outer join).
    pub nullable: bool,
    /// Column in the parent storage holding the link.
    pub column: String,
    /// Index of the parent's storage entry this entry attaches to.
    pub parent_index: usize,
}

/// One physical storage binding of a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassStorageDef {
    /// Table (storage) name.
    pub storage: String,
    /// Primary key column.
    pub primary_key: String,
    /// Type discriminator value of the owner.
    pub type_storage: String,
    /// Class stored here.
    pub owner: TypeName,
    /// Link to the parent source, absent for the root.
    pub link: Option<ParentLink>,
}

/// A join node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropSource {
    /// This node's id.
    pub id: SourceId,
    /// Alias, unique within the structure.
    pub name: String,
    /// Property (or key column) that produced this node from its parent.
    pub object_link: String,
    /// True when this node is another class of the same row (hierarchical).
    pub hierarchical_link: bool,
    /// Physical bindings; more than one only for polymorphic fan-out.
    pub storages: Vec<ClassStorageDef>,
    /// Parent node, absent for the root.
    pub parent: Option<SourceId>,
    /// Child nodes in creation order.
    pub linked: Vec<SourceId>,
}

impl PropSource {
    /// Create a detached source.
    pub fn new(name: impl Into<String>, object_link: impl Into<String>) -> Self {
        Self {
            id: SourceId::ROOT,
            name: name.into(),
            object_link: object_link.into(),
            hierarchical_link: false,
            storages: Vec::new(),
            parent: None,
            linked: Vec::new(),
        }
    }

    /// Add a storage binding.
    pub fn with_storage(mut self, storage: ClassStorageDef) -> Self {
        self.storages.push(storage);
        self
    }

    /// Mark as a hierarchical (same row) link.
    pub fn hierarchical(mut self) -> Self {
        self.hierarchical_link = true;
        self
    }

    /// Check if this source fans out over several candidate classes.
    pub fn is_polymorphic(&self) -> bool {
        self.storages.len() > 1
    }

    /// Owner class of the first storage entry.
    pub fn primary_owner(&self) -> Option<&TypeName> {
        self.storages.first().map(|s| &s.owner)
    }
}

/// Resolved binding of one requested property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropStorage {
    /// Path as requested in the view.
    pub name: PropertyPath,
    /// Leaf segment.
    pub simple_name: String,
    /// Source holding the columns.
    pub source: SourceId,
    /// Resolved leaf type.
    pub property_type: PropertyType,
    /// Columns, parallel to the source's storages. A scalar has one column
    /// per entry; a master has one column per candidate class. Empty inner
    /// lists mean the property is not stored in that entry.
    pub columns: Vec<Vec<String>>,
    /// Candidate classes per storage entry when the leaf is a master.
    pub master_types: Option<Vec<Vec<TypeName>>>,
    /// Repeats a path that appeared earlier in the view.
    pub multiple: bool,
    /// Was appended to the view rather than declared.
    pub additional: bool,
    /// Physically stored.
    pub stored: bool,
    /// Expression for the active engine, if declared.
    pub expression: Option<String>,
}

impl PropStorage {
    /// Total number of master candidates across storage entries.
    pub fn masters_count(&self) -> usize {
        self.master_types
            .as_ref()
            .map(|types| types.iter().map(Vec::len).sum())
            .unwrap_or(0)
    }

    /// First column of the first storage entry.
    pub fn first_column(&self) -> Option<&str> {
        self.columns
            .first()
            .and_then(|cols| cols.first())
            .map(String::as_str)
    }
}

/// Join graph plus per-property bindings for a compiled view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageStructure {
    sources: Vec<PropSource>,
    /// One binding per view property in declaration order.
    pub props: Vec<PropStorage>,
}

impl StorageStructure {
    /// Create a structure with the given root source.
    pub fn new(mut root: PropSource) -> Self {
        root.id = SourceId::ROOT;
        root.parent = None;
        root.linked.clear();
        Self {
            sources: vec![root],
            props: Vec::new(),
        }
    }

    /// The root source.
    pub fn root(&self) -> &PropSource {
        &self.sources[0]
    }

    /// Get a source by id.
    pub fn source(&self, id: SourceId) -> Option<&PropSource> {
        self.sources.get(id.0)
    }

    /// Get a mutable source by id.
    pub fn source_mut(&mut self, id: SourceId) -> Option<&mut PropSource> {
        self.sources.get_mut(id.0)
    }

    /// All sources, root first, in creation order.
    pub fn sources(&self) -> &[PropSource] {
        &self.sources
    }

    /// Attach `source` under `parent` and return its id.
    ///
    /// Returns `None` if `parent` does not exist.
    pub fn attach(&mut self, parent: SourceId, mut source: PropSource) -> Option<SourceId> {
        if parent.0 >= self.sources.len() {
            return None;
        }
        let id = SourceId(self.sources.len());
        source.id = id;
        source.parent = Some(parent);
        source.linked.clear();
        self.sources.push(source);
        self.sources[parent.0].linked.push(id);
        Some(id)
    }

    /// Child of `parent` with the given alias.
    pub fn find_linked(&self, parent: SourceId, alias: &str) -> Option<SourceId> {
        self.source(parent)?
            .linked
            .iter()
            .copied()
            .find(|child| self.sources[child.0].name == alias)
    }

    /// Any source with the given alias.
    pub fn find_by_name(&self, alias: &str) -> Option<&PropSource> {
        self.sources.iter().find(|s| s.name == alias)
    }

    /// Children of a source.
    pub fn linked(&self, id: SourceId) -> impl Iterator<Item = &PropSource> {
        self.source(id)
            .map(|s| s.linked.as_slice())
            .unwrap_or_default()
            .iter()
            .map(move |child| &self.sources[child.0])
    }

    /// Number of joins (every non-root source is one join).
    pub fn join_count(&self) -> usize {
        self.sources.len() - 1
    }

    /// Aliases in creation order.
    pub fn aliases(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name.as_str()).collect()
    }

    /// Sources in depth-first order starting at the root.
    pub fn depth_first(&self) -> Vec<&PropSource> {
        let mut out = Vec::with_capacity(self.sources.len());
        let mut stack = vec![SourceId::ROOT];
        while let Some(id) = stack.pop() {
            let source = &self.sources[id.0];
            out.push(source);
            stack.extend(source.linked.iter().rev().copied());
        }
        out
    }

    /// Binding of the first occurrence of a path.
    pub fn prop(&self, path: &str) -> Option<&PropStorage> {
        self.props.iter().find(|p| p.name.to_string() == path)
    }

    /// Source owning a binding.
    pub fn source_of(&self, prop: &PropStorage) -> Option<&PropSource> {
        self.source(prop.source)
    }

    /// Serialize as pretty JSON, e.g. to hand to an out-of-process SQL generator.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Parse a structure serialized by [`to_json`](Self::to_json).
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(owner: &str) -> ClassStorageDef {
        ClassStorageDef {
            storage: owner.to_string(),
            primary_key: "primaryKey".into(),
            type_storage: owner.to_string(),
            owner: owner.into(),
            link: None,
        }
    }

    #[test]
    fn test_attach_and_find() {
        let mut structure =
            StorageStructure::new(PropSource::new("Employee", "").with_storage(storage("Employee")));
        let dept = structure
            .attach(
                SourceId::ROOT,
                PropSource::new("EmployeeDepartment", "Department").with_storage(storage("Department")),
            )
            .unwrap();

        assert_eq!(dept, SourceId(1));
        assert_eq!(structure.join_count(), 1);
        assert_eq!(structure.find_linked(SourceId::ROOT, "EmployeeDepartment"), Some(dept));
        assert_eq!(structure.find_linked(SourceId::ROOT, "Other"), None);
        assert_eq!(structure.source(dept).unwrap().parent, Some(SourceId::ROOT));
        assert_eq!(structure.linked(SourceId::ROOT).count(), 1);
    }

    #[test]
    fn test_attach_to_missing_parent() {
        let mut structure = StorageStructure::new(PropSource::new("A0", ""));
        assert!(structure.attach(SourceId(7), PropSource::new("A1", "x")).is_none());
    }

    #[test]
    fn test_depth_first_order() {
        let mut structure = StorageStructure::new(PropSource::new("R", ""));
        let a = structure.attach(SourceId::ROOT, PropSource::new("RA", "A")).unwrap();
        structure.attach(SourceId::ROOT, PropSource::new("RB", "B")).unwrap();
        structure.attach(a, PropSource::new("RAC", "C")).unwrap();

        let names: Vec<&str> = structure.depth_first().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["R", "RA", "RAC", "RB"]);
        assert_eq!(structure.aliases(), vec!["R", "RA", "RB", "RAC"]);
    }

    #[test]
    fn test_masters_count() {
        let prop = PropStorage {
            name: PropertyPath::parse("Workplace").unwrap(),
            simple_name: "Workplace".into(),
            source: SourceId::ROOT,
            property_type: PropertyType::Master("Hr.Place".into()),
            columns: vec![vec!["Workplace_m0".into(), "Workplace_m1".into()]],
            master_types: Some(vec![vec!["Hr.Office".into(), "Hr.Plant".into()]]),
            multiple: false,
            additional: false,
            stored: true,
            expression: None,
        };
        assert_eq!(prop.masters_count(), 2);
        assert_eq!(prop.first_column(), Some("Workplace_m0"));
    }

    #[test]
    fn test_json_dump() {
        let mut structure =
            StorageStructure::new(PropSource::new("Employee", "").with_storage(storage("Employee")));
        structure
            .attach(SourceId::ROOT, PropSource::new("EmployeeManager", "Manager"))
            .unwrap();

        let json = structure.to_json().unwrap();
        assert!(json.contains("\"EmployeeManager\""));
        assert_eq!(StorageStructure::from_json(&json).unwrap(), structure);
        assert!(matches!(
            StorageStructure::from_json("[]"),
            Err(Error::Deserialization(_))
        ));
    }
}
