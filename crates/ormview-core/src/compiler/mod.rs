//! View-to-storage compilation.
//!
//! Turns a [`View`] and a concrete target class into a [`StorageStructure`]:
//! a tree of join sources plus one [`PropStorage`](ormview_proto::PropStorage)
//! binding per requested property.
//!
//! Two strategies share the walk over path segments:
//!
//! - [`StorageStrategy::Flat`]: one table per class. Only master navigation
//!   creates joins; a polymorphic master fans out into one storage entry
//!   per candidate class.
//! - [`StorageStrategy::Hierarchical`]: one table per class of the
//!   inheritance ladder. A property declared on a base class is read from
//!   the base table, joined to the row by primary key.

mod flat;
mod hierarchical;

use crate::error::{Error, Result};
use crate::metadata::Metadata;
use ormview_proto::{
    ClassStorageDef, ParentLink, PropSource, SourceId, StorageStrategy, StorageStructure, TypeName,
    View,
};
use tracing::{debug, instrument, trace};

/// Compiles views into storage structures.
#[derive(Debug, Clone, Copy)]
pub struct ViewCompiler<'a> {
    metadata: &'a Metadata,
}

impl<'a> ViewCompiler<'a> {
    pub(crate) fn new(metadata: &'a Metadata) -> Self {
        Self { metadata }
    }

    /// Compile `view` against `target`.
    ///
    /// `engine` picks the expression recorded for unstored properties.
    /// Returns `Ok(None)` when master type filters exclude every candidate
    /// of a polymorphic master: the view cannot be satisfied for `target`.
    ///
    /// # Errors
    ///
    /// [`Error::IncompatibleView`] when `target` does not derive from the
    /// view's class; [`Error::PropertyNotFound`] or [`Error::NotNavigable`]
    /// when a path does not resolve.
    #[instrument(skip(self, view), fields(view = %view.name))]
    pub fn compile(
        &self,
        view: &View,
        target: &TypeName,
        strategy: StorageStrategy,
        engine: &str,
    ) -> Result<Option<StorageStructure>> {
        self.check_target(view, target)?;

        let structure = match strategy {
            StorageStrategy::Flat => flat::compile(self, view, target, engine)?,
            StorageStrategy::Hierarchical => hierarchical::compile(self, view, target, engine)?,
        };

        match &structure {
            Some(structure) => debug!(
                joins = structure.join_count(),
                props = structure.props.len(),
                "compiled view"
            ),
            None => debug!("master type filters leave no candidates"),
        }
        Ok(structure)
    }

    /// Look up view `name` of `class` and compile it against that class.
    pub fn compile_named(
        &self,
        name: &str,
        class: &TypeName,
        strategy: StorageStrategy,
        engine: &str,
    ) -> Result<Option<StorageStructure>> {
        let view = self.metadata.views().view(name, class)?;
        self.compile(&view, class, strategy, engine)
    }

    fn check_target(&self, view: &View, target: &TypeName) -> Result<()> {
        let registry = self.metadata.registry();
        registry.get_class(target)?;
        registry.get_class(&view.define_class)?;
        if !registry.is_same_or_subclass(target, &view.define_class) {
            return Err(Error::IncompatibleView {
                view_class: view.define_class.clone(),
                target: target.clone(),
            });
        }
        Ok(())
    }

    fn class_storage(&self, owner: &TypeName, link: Option<ParentLink>) -> Result<ClassStorageDef> {
        Ok(ClassStorageDef {
            storage: self.metadata.class_storage_name(owner)?,
            primary_key: self.metadata.primary_key_storage_name(owner)?,
            type_storage: self.metadata.type_storage_name(owner)?,
            owner: owner.clone(),
            link,
        })
    }

    fn expression(&self, owner: &TypeName, leaf: &str, engine: &str) -> Result<Option<String>> {
        self.metadata.expressions().resolve(owner, leaf, engine)
    }
}

/// Classes a navigation segment can lead to, and whether it is a detail.
///
/// A master yields its usage types, a detail the usage types of its
/// collection.
fn navigation_candidates(
    metadata: &Metadata,
    owner: &TypeName,
    segment: &str,
) -> Result<(bool, Vec<TypeName>)> {
    if metadata.property_type(owner, segment)?.is_detail() {
        Ok((true, metadata.detail_usage_types(owner, segment)?))
    } else {
        Ok((false, metadata.usage_types(owner, segment)?))
    }
}

/// Check a candidate class against an optional master type filter.
fn passes_filter(metadata: &Metadata, candidate: &TypeName, filter: Option<&TypeName>) -> bool {
    filter.map_or(true, |f| metadata.registry().is_same_or_subclass(candidate, f))
}

/// A link hanging off a nullable link is nullable too.
fn reached_optionally(storage: &ClassStorageDef) -> bool {
    storage.link.as_ref().is_some_and(|link| link.nullable)
}

fn source(structure: &StorageStructure, id: SourceId) -> Result<&PropSource> {
    structure.source(id).ok_or(Error::UnknownSource(id))
}

fn attach(structure: &mut StorageStructure, parent: SourceId, child: PropSource) -> Result<SourceId> {
    let alias = child.name.clone();
    let id = structure
        .attach(parent, child)
        .ok_or(Error::UnknownSource(parent))?;
    trace!(%alias, %parent, source = %id, "added join");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::hr_metadata;

    #[test]
    fn test_incompatible_target() {
        let metadata = hr_metadata();
        let view = View::from_paths("DepartmentL", "Hr.Department", ["Title"]).unwrap();

        for strategy in [StorageStrategy::Flat, StorageStrategy::Hierarchical] {
            let err = metadata
                .compiler()
                .compile(&view, &TypeName::new("Hr.Employee"), strategy, "Sql")
                .unwrap_err();
            assert!(matches!(err, Error::IncompatibleView { .. }));
        }
    }

    #[test]
    fn test_base_view_on_derived_target() {
        let metadata = hr_metadata();
        let view = View::from_paths("PersonL", "Hr.Person", ["Name"]).unwrap();
        let structure = metadata
            .compiler()
            .compile(&view, &TypeName::new("Hr.Employee"), StorageStrategy::Flat, "Sql")
            .unwrap()
            .unwrap();

        assert_eq!(structure.root().name, "Person");
        assert_eq!(structure.root().storages[0].storage, "Employee");
    }

    #[test]
    fn test_unknown_target() {
        let metadata = hr_metadata();
        let view = View::from_paths("PersonL", "Hr.Person", ["Name"]).unwrap();
        let err = metadata
            .compiler()
            .compile(&view, &TypeName::new("Hr.Ghost"), StorageStrategy::Flat, "Sql")
            .unwrap_err();
        assert!(matches!(err, Error::ClassNotFound(_)));
    }

    #[test]
    fn test_compile_named() {
        let metadata = hr_metadata();
        let structure = metadata
            .compiler()
            .compile_named("EmployeeL", &TypeName::new("Hr.Employee"), StorageStrategy::Flat, "Sql")
            .unwrap()
            .unwrap();
        assert_eq!(structure.props.len(), 2);

        let err = metadata
            .compiler()
            .compile_named("Nope", &TypeName::new("Hr.Employee"), StorageStrategy::Flat, "Sql")
            .unwrap_err();
        assert!(matches!(err, Error::ViewNotFound { .. }));
    }

    #[test]
    fn test_root_storage_definition() {
        let metadata = hr_metadata();
        let storage = metadata
            .compiler()
            .class_storage(&TypeName::new("Hr.Department"), None)
            .unwrap();
        assert_eq!(storage.storage, "Departments");
        assert_eq!(storage.primary_key, "DeptId");
        assert_eq!(storage.type_storage, "Department");
        assert!(storage.link.is_none());
    }
}
