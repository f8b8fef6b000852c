//! Flat strategy: one table per class.
//!
//! A child source is named after its parent's alias followed by the
//! segment. Aliases are unique within a structure: when that name is taken
//! by a source on another branch, a numeric suffix is added.

use super::{
    attach, navigation_candidates, passes_filter, reached_optionally, source, ViewCompiler,
};
use crate::error::Result;
use ormview_proto::{
    ParentLink, PropSource, PropStorage, PropertyInView, PropertyPath, SourceId, StorageStructure,
    TypeName, View,
};
use std::collections::HashSet;
use tracing::debug;

pub(super) fn compile(
    compiler: &ViewCompiler<'_>,
    view: &View,
    target: &TypeName,
    engine: &str,
) -> Result<Option<StorageStructure>> {
    let metadata = compiler.metadata;
    let resolver = metadata.resolver();

    let root = PropSource::new(view.define_class.short_name(), "")
        .with_storage(compiler.class_storage(target, None)?);
    let mut structure = StorageStructure::new(root);
    let mut seen: HashSet<&PropertyPath> = HashSet::new();

    for property in &view.properties {
        let multiple = !seen.insert(&property.path);
        let path = property.path.without_primary_key();
        let segments = path.segments();
        let (navigation, leaf) = segments.split_at(segments.len() - 1);
        let leaf = leaf[0].as_str();

        let mut current = SourceId::ROOT;
        let mut class = target.clone();
        for (depth, segment) in navigation.iter().enumerate() {
            let prefix = path.prefix(depth + 1);
            let filter = view.master_type_filter(&prefix);
            let next_class = resolver.navigate(&class, segment, filter)?;

            current = match linked_through(&structure, current, segment) {
                Some(id) => id,
                None => {
                    let alias = format!("{}{}", source(&structure, current)?.name, segment);
                    let alias = unique_alias(&structure, alias);
                    let Some(child) = fan_out(compiler, &structure, current, segment, alias, filter)? else {
                        debug!(path = %property.path, %prefix, "no candidate class passes the type filter");
                        return Ok(None);
                    };
                    attach(&mut structure, current, child)?
                }
            };
            class = next_class;
        }

        let prop = bind_leaf(compiler, &structure, current, &class, property, leaf, engine)?;
        structure.props.push(PropStorage { multiple, ..prop });
    }

    Ok(Some(structure))
}

/// Build the child source reached through `segment` from every storage
/// entry of `parent`. Returns `None` when the filter excludes every
/// candidate of some entry.
fn fan_out(
    compiler: &ViewCompiler<'_>,
    structure: &StorageStructure,
    parent: SourceId,
    segment: &str,
    alias: String,
    filter: Option<&TypeName>,
) -> Result<Option<PropSource>> {
    let metadata = compiler.metadata;
    let mut child = PropSource::new(alias, segment);

    for (parent_index, storage) in source(structure, parent)?.storages.iter().enumerate() {
        let owner = &storage.owner;
        let (is_detail, candidates) = navigation_candidates(metadata, owner, segment)?;
        let nullable = reached_optionally(storage)
            || !metadata.property_not_null(owner, segment)?
            || candidates.len() > 1;

        let mut added = 0;
        for (index, candidate) in candidates.iter().enumerate() {
            if !passes_filter(metadata, candidate, filter) {
                continue;
            }
            // Details link back to the parent row by its key.
            let column = if is_detail {
                metadata.primary_key_storage_name(owner)?
            } else {
                metadata.master_column(owner, segment, index)?
            };
            let link = ParentLink {
                nullable,
                column,
                parent_index,
            };
            child.storages.push(compiler.class_storage(candidate, Some(link))?);
            added += 1;
        }
        if added == 0 {
            return Ok(None);
        }
    }

    Ok(Some(child))
}

/// Child of `parent` joined through `segment`.
fn linked_through(structure: &StorageStructure, parent: SourceId, segment: &str) -> Option<SourceId> {
    structure
        .linked(parent)
        .find(|child| child.object_link == segment)
        .map(|child| child.id)
}

/// `alias`, or `alias` with the first free numeric suffix.
fn unique_alias(structure: &StorageStructure, alias: String) -> String {
    if structure.find_by_name(&alias).is_none() {
        return alias;
    }
    let mut suffix = 1;
    loop {
        let candidate = format!("{}{}", alias, suffix);
        if structure.find_by_name(&candidate).is_none() {
            return candidate;
        }
        suffix += 1;
    }
}

fn bind_leaf(
    compiler: &ViewCompiler<'_>,
    structure: &StorageStructure,
    current: SourceId,
    class: &TypeName,
    property: &PropertyInView,
    leaf: &str,
    engine: &str,
) -> Result<PropStorage> {
    let metadata = compiler.metadata;
    let storages = &source(structure, current)?.storages;
    let first_owner = storages
        .first()
        .map(|s| s.owner.clone())
        .unwrap_or_else(|| class.clone());

    let property_type = metadata.property_type(class, leaf)?;
    let is_master = metadata.property_type(&first_owner, leaf)?.is_master();

    let mut columns = Vec::with_capacity(storages.len());
    let mut master_types = Vec::new();
    for storage in storages {
        let owner = &storage.owner;
        if is_master {
            let usage = metadata.usage_types(owner, leaf)?;
            let names = (0..usage.len())
                .map(|index| metadata.master_column(owner, leaf, index))
                .collect::<Result<Vec<_>>>()?;
            columns.push(names);
            master_types.push(usage);
        } else if metadata.is_stored_property(owner, leaf)? {
            columns.push(vec![metadata.property_storage_name(owner, leaf)?]);
        } else {
            columns.push(Vec::new());
        }
    }

    Ok(PropStorage {
        name: property.path.clone(),
        simple_name: leaf.to_string(),
        source: current,
        property_type,
        columns,
        master_types: is_master.then_some(master_types),
        multiple: false,
        additional: property.appended,
        stored: metadata.is_stored_property(&first_owner, leaf)?,
        expression: compiler.expression(&first_owner, leaf, engine)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ClassDef, ClassRegistry, PropertyDef};
    use crate::fixtures::hr_metadata;
    use crate::metadata::Metadata;
    use ormview_proto::{PropertyType, ScalarType, StorageStrategy};

    fn compile_flat(metadata: &Metadata, view: &View, target: &str) -> Option<StorageStructure> {
        metadata
            .compiler()
            .compile(view, &TypeName::new(target), StorageStrategy::Flat, "Sql")
            .unwrap()
    }

    #[test]
    fn test_single_master_join() {
        let metadata = hr_metadata();
        let view = View::from_paths("EmployeeL", "Hr.Employee", ["Name", "Department.Title"]).unwrap();
        let structure = compile_flat(&metadata, &view, "Hr.Employee").unwrap();

        assert_eq!(structure.aliases(), vec!["Employee", "EmployeeDepartment"]);
        assert_eq!(structure.join_count(), 1);

        let department = structure.find_by_name("EmployeeDepartment").unwrap();
        assert_eq!(department.object_link, "Department");
        let storage = &department.storages[0];
        assert_eq!(storage.storage, "Departments");
        let link = storage.link.as_ref().unwrap();
        assert_eq!(link.column, "Department_m0");
        assert!(!link.nullable);
        assert_eq!(link.parent_index, 0);

        let name = &structure.props[0];
        assert_eq!(name.source, SourceId::ROOT);
        assert_eq!(name.columns, vec![vec!["Name".to_string()]]);
        assert_eq!(name.property_type, PropertyType::Scalar(ScalarType::String));

        let title = &structure.props[1];
        assert_eq!(title.source, department.id);
        assert_eq!(title.first_column(), Some("Title"));
        assert_eq!(title.simple_name, "Title");
    }

    #[test]
    fn test_self_reference_creates_one_source_per_hop() {
        let metadata = hr_metadata();
        let view = View::from_paths("Chain", "Hr.Employee", ["Manager.Manager.Name", "Manager.Name"]).unwrap();
        let structure = compile_flat(&metadata, &view, "Hr.Employee").unwrap();

        assert_eq!(structure.join_count(), 2);
        assert_eq!(
            structure.aliases(),
            vec!["Employee", "EmployeeManager", "EmployeeManagerManager"]
        );
        let first_hop = structure.find_by_name("EmployeeManager").unwrap();
        assert!(first_hop.storages[0].link.as_ref().unwrap().nullable);
        assert_eq!(structure.props[1].source, first_hop.id);
    }

    #[test]
    fn test_aliases_unique_across_branches() {
        let registry = ClassRegistry::new()
            .with_class(ClassDef::new("Hr.Employee").with_properties([
                PropertyDef::master("Manager", "Hr.Employee"),
                PropertyDef::master("Department", "Hr.Department"),
                PropertyDef::master("ManagerDepartment", "Hr.Department"),
            ]))
            .with_class(
                ClassDef::new("Hr.Department")
                    .with_property(PropertyDef::scalar("Title", ScalarType::String)),
            );
        let metadata = Metadata::with_registry(registry);
        let view = View::from_paths(
            "Depts",
            "Hr.Employee",
            ["Manager.Department.Title", "ManagerDepartment.Title", "ManagerDepartment.Title"],
        )
        .unwrap();
        let structure = compile_flat(&metadata, &view, "Hr.Employee").unwrap();

        assert_eq!(
            structure.aliases(),
            vec![
                "Employee",
                "EmployeeManager",
                "EmployeeManagerDepartment",
                "EmployeeManagerDepartment1"
            ]
        );
        let own = structure.find_by_name("EmployeeManagerDepartment1").unwrap();
        assert_eq!(own.parent, Some(SourceId::ROOT));
        assert_eq!(own.object_link, "ManagerDepartment");
        assert_eq!(structure.props[1].source, own.id);
        assert_eq!(structure.props[2].source, own.id);
        assert_ne!(structure.props[0].source, own.id);
    }

    #[test]
    fn test_link_under_optional_master_is_nullable() {
        let metadata = hr_metadata();
        let view = View::from_paths("Chain", "Hr.Employee", ["Manager.Department.Title", "Department.Title"]).unwrap();
        let structure = compile_flat(&metadata, &view, "Hr.Employee").unwrap();

        let nullable = |alias: &str| {
            let source = structure.find_by_name(alias).unwrap();
            source.storages[0].link.as_ref().unwrap().nullable
        };
        assert!(nullable("EmployeeManager"));
        // Department is required, but the manager may be absent.
        assert!(nullable("EmployeeManagerDepartment"));
        assert!(!nullable("EmployeeDepartment"));
    }

    #[test]
    fn test_polymorphic_fan_out() {
        let metadata = hr_metadata();
        let view = View::from_paths("Places", "Hr.Employee", ["Workplace.Address"]).unwrap();
        let structure = compile_flat(&metadata, &view, "Hr.Employee").unwrap();

        let workplace = structure.find_by_name("EmployeeWorkplace").unwrap();
        assert!(workplace.is_polymorphic());
        let links: Vec<_> = workplace
            .storages
            .iter()
            .map(|s| s.link.as_ref().unwrap().column.as_str())
            .collect();
        assert_eq!(links, vec!["Workplace_m0", "Workplace_m1"]);
        assert!(workplace.storages.iter().all(|s| s.link.as_ref().unwrap().nullable));

        let address = &structure.props[0];
        assert_eq!(address.columns, vec![vec!["Address".to_string()], vec!["Address".to_string()]]);
    }

    #[test]
    fn test_type_filter_narrows_fan_out() {
        let metadata = hr_metadata();
        let view = View::from_paths("Plants", "Hr.Employee", ["Workplace.Capacity"])
            .unwrap()
            .with_master_type_filter("Workplace", "Hr.Plant");
        let structure = compile_flat(&metadata, &view, "Hr.Employee").unwrap();

        let workplace = structure.find_by_name("EmployeeWorkplace").unwrap();
        assert_eq!(workplace.storages.len(), 1);
        assert_eq!(workplace.storages[0].owner, TypeName::new("Hr.Plant"));
        assert_eq!(workplace.storages[0].link.as_ref().unwrap().column, "Workplace_m1");
        assert_eq!(
            structure.props[0].property_type,
            PropertyType::Scalar(ScalarType::Int32)
        );
    }

    #[test]
    fn test_filter_excluding_every_candidate_is_unsatisfiable() {
        let metadata = hr_metadata();
        let view = View::from_paths("Warehouses", "Hr.Employee", ["Name", "Workplace.Address"])
            .unwrap()
            .with_master_type_filter("Workplace", "Hr.Warehouse");
        assert!(compile_flat(&metadata, &view, "Hr.Employee").is_none());
    }

    #[test]
    fn test_master_leaf_columns() {
        let metadata = hr_metadata();
        let view = View::from_paths("Refs", "Hr.Employee", ["Workplace", "Site", "Department.__PrimaryKey"]).unwrap();
        let structure = compile_flat(&metadata, &view, "Hr.Employee").unwrap();

        let workplace = &structure.props[0];
        assert_eq!(
            workplace.columns,
            vec![vec!["Workplace_m0".to_string(), "Workplace_m1".to_string()]]
        );
        assert_eq!(workplace.masters_count(), 2);

        let site = &structure.props[1];
        assert_eq!(site.columns, vec![vec!["SiteOffice".to_string(), "SitePlant".to_string()]]);

        let key = &structure.props[2];
        assert_eq!(key.name.to_string(), "Department.__PrimaryKey");
        assert_eq!(key.simple_name, "Department");
        assert_eq!(key.source, SourceId::ROOT);
        assert_eq!(key.columns, vec![vec!["Department_m0".to_string()]]);
        assert_eq!(structure.join_count(), 0);
    }

    #[test]
    fn test_duplicates_and_appended() {
        let metadata = hr_metadata();
        let mut view = View::from_paths("Dup", "Hr.Employee", ["Department.Title", "Name", "Department.Title"]).unwrap();
        view.append_properties(["Salary"]).unwrap();
        let structure = compile_flat(&metadata, &view, "Hr.Employee").unwrap();

        assert_eq!(structure.props.len(), 4);
        assert_eq!(structure.join_count(), 1);
        let flags: Vec<_> = structure.props.iter().map(|p| (p.multiple, p.additional)).collect();
        assert_eq!(flags, vec![(false, false), (false, false), (true, false), (false, true)]);
        assert_eq!(structure.props[0].source, structure.props[2].source);
    }

    #[test]
    fn test_not_stored_leaf_gets_expression() {
        let metadata = hr_metadata();
        let view = View::from_paths("Pay", "Hr.Employee", ["TotalPay", "Salary"]).unwrap();
        let structure = metadata
            .compiler()
            .compile(&view, &TypeName::new("Hr.Employee"), StorageStrategy::Flat, "MsSql")
            .unwrap()
            .unwrap();

        let total = &structure.props[0];
        assert!(!total.stored);
        assert_eq!(total.columns, vec![Vec::<String>::new()]);
        assert_eq!(
            total.expression.as_deref(),
            Some("ISNULL(@Salary@,0) + ISNULL(@Bonus@,0)")
        );
        assert!(structure.props[1].stored);
        assert_eq!(structure.props[1].expression, None);
    }

    #[test]
    fn test_scalar_navigation_fails() {
        let metadata = hr_metadata();
        let view = View::from_paths("Bad", "Hr.Employee", ["Name.Title"]).unwrap();
        let err = metadata
            .compiler()
            .compile(&view, &TypeName::new("Hr.Employee"), StorageStrategy::Flat, "Sql")
            .unwrap_err();
        assert!(matches!(err, crate::Error::NotNavigable { .. }));
    }

    #[test]
    fn test_unknown_property_fails() {
        let metadata = hr_metadata();
        let view = View::from_paths("Bad", "Hr.Employee", ["Department.Nope"]).unwrap();
        let err = metadata
            .compiler()
            .compile(&view, &TypeName::new("Hr.Employee"), StorageStrategy::Flat, "Sql")
            .unwrap_err();
        assert!(matches!(err, crate::Error::PropertyNotFound { .. }));
    }
}
