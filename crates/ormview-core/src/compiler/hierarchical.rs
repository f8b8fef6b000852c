//! Hierarchical strategy: one table per class of the inheritance ladder.
//!
//! Sources are keyed by (path prefix, class). A ladder source holds the base
//! class declaring a property and joins on the primary key; a master source
//! holds the class a master segment leads to and joins on the master column.
//! A detail segment joins its items on the owner's primary key. Aliases
//! are `A0`, `A1`, ... in creation order.

use super::{
    attach, navigation_candidates, passes_filter, reached_optionally, source, ViewCompiler,
};
use crate::error::Result;
use ormview_proto::{
    ParentLink, PropSource, PropStorage, PropertyPath, SourceId, StorageStructure, TypeName, View,
    PRIMARY_KEY,
};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Source key: path prefix text and the class the source holds.
type SourceKey = (String, TypeName);

struct Ladder<'c, 'a> {
    compiler: &'c ViewCompiler<'a>,
    structure: StorageStructure,
    sources: HashMap<SourceKey, SourceId>,
    next_alias: usize,
}

impl<'c, 'a> Ladder<'c, 'a> {
    fn new(compiler: &'c ViewCompiler<'a>, target: &TypeName) -> Result<Self> {
        let root = PropSource::new("A0", "").with_storage(compiler.class_storage(target, None)?);
        let mut sources = HashMap::new();
        sources.insert((String::new(), target.clone()), SourceId::ROOT);
        Ok(Self {
            compiler,
            structure: StorageStructure::new(root),
            sources,
            next_alias: 1,
        })
    }

    /// Whether rows of `id` may be missing for a row of the root.
    fn optional(&self, id: SourceId) -> Result<bool> {
        Ok(source(&self.structure, id)?
            .storages
            .first()
            .is_some_and(reached_optionally))
    }

    fn source_for(
        &mut self,
        key: SourceKey,
        parent: SourceId,
        make: impl FnOnce(String) -> Result<PropSource>,
    ) -> Result<SourceId> {
        if let Some(&id) = self.sources.get(&key) {
            return Ok(id);
        }
        let alias = format!("A{}", self.next_alias);
        self.next_alias += 1;
        let id = attach(&mut self.structure, parent, make(alias)?)?;
        self.sources.insert(key, id);
        Ok(id)
    }

    /// Source holding `declaring`, the base of `class` that declares a property.
    fn ladder(&mut self, prefix: String, class: &TypeName, declaring: &TypeName, parent: SourceId) -> Result<SourceId> {
        let compiler = self.compiler;
        let nullable = self.optional(parent)?;
        self.source_for((prefix, declaring.clone()), parent, |alias| {
            let column = compiler.metadata.primary_key_storage_name(class)?;
            let link = ParentLink {
                nullable,
                column: column.clone(),
                parent_index: 0,
            };
            Ok(PropSource::new(alias, column)
                .with_storage(compiler.class_storage(declaring, Some(link))?)
                .hierarchical())
        })
    }

    /// Source holding `target`, reached through master or detail `segment`
    /// of `declaring`.
    fn master(
        &mut self,
        prefix: String,
        segment: &str,
        declaring: &TypeName,
        target: &TypeName,
        parent: SourceId,
    ) -> Result<SourceId> {
        let compiler = self.compiler;
        let optional = self.optional(parent)?;
        self.source_for((prefix, target.clone()), parent, |alias| {
            let metadata = compiler.metadata;
            let column = if metadata.property_type(declaring, segment)?.is_detail() {
                metadata.primary_key_storage_name(declaring)?
            } else {
                metadata.property_storage_name(declaring, segment)?
            };
            let link = ParentLink {
                nullable: optional || !metadata.property_not_null(declaring, segment)?,
                column,
                parent_index: 0,
            };
            Ok(PropSource::new(alias, segment).with_storage(compiler.class_storage(target, Some(link))?))
        })
    }
}

pub(super) fn compile(
    compiler: &ViewCompiler<'_>,
    view: &View,
    target: &TypeName,
    engine: &str,
) -> Result<Option<StorageStructure>> {
    let metadata = compiler.metadata;
    let resolver = metadata.resolver();
    let mut ladder = Ladder::new(compiler, target)?;
    let mut seen: HashSet<&PropertyPath> = HashSet::new();

    for property in &view.properties {
        let multiple = !seen.insert(&property.path);
        let path = if resolver.resolve_path(target, &property.path)?.leaf_type.is_master() {
            property.path.join(PRIMARY_KEY)?
        } else {
            property.path.clone()
        };
        let segments = path.segments();

        let mut current = SourceId::ROOT;
        let mut class = target.clone();
        for (depth, segment) in segments.iter().enumerate() {
            let declaring = metadata.declaring_class(&class, segment)?;
            if declaring != class {
                current = ladder.ladder(path.prefix(depth), &class, &declaring, current)?;
            }

            if depth + 1 < segments.len() {
                let prefix = path.prefix(depth + 1);
                let filter = view.master_type_filter(&prefix);
                if filter.is_some() {
                    let (_, candidates) = navigation_candidates(metadata, &class, segment)?;
                    if !candidates.iter().any(|c| passes_filter(metadata, c, filter)) {
                        debug!(path = %property.path, %prefix, "no candidate class passes the type filter");
                        return Ok(None);
                    }
                }
                let next_class = resolver.navigate(&class, segment, filter)?;
                current = ladder.master(prefix, segment, &declaring, &next_class, current)?;
                class = next_class;
            }
        }

        let leaf = path.leaf();
        let owner = source(&ladder.structure, current)?
            .primary_owner()
            .cloned()
            .unwrap_or_else(|| class.clone());
        let stored = metadata.is_stored_property(&owner, leaf)?;
        let columns = if stored {
            vec![metadata.property_storage_name(&owner, leaf)?]
        } else {
            Vec::new()
        };

        ladder.structure.props.push(PropStorage {
            name: property.path.clone(),
            simple_name: leaf.to_string(),
            source: current,
            property_type: metadata.property_type(&class, leaf)?,
            columns: vec![columns],
            master_types: None,
            multiple,
            additional: property.appended,
            stored,
            expression: compiler.expression(&owner, leaf, engine)?,
        });
    }

    Ok(Some(ladder.structure))
}
