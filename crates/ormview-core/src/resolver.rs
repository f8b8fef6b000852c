//! Dotted property path resolution.
//!
//! A path is resolved as a left-to-right fold over its segments: every
//! non-final segment navigates from the current class to the class it
//! references (a master's class or a detail's item class), and the final
//! segment is looked up on the class reached.

use crate::catalog::StorageName;
use crate::error::{Error, Result};
use crate::metadata::{FactKey, FactKind, Metadata};
use ormview_proto::{PropertyPath, PropertyType, TypeName, PRIMARY_KEY};
use tracing::trace;

/// Everything known about the leaf of a resolved path.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProperty {
    /// The resolved path.
    pub path: PropertyPath,
    /// Class the leaf segment was looked up on.
    pub owner: TypeName,
    /// Declared type of the leaf.
    pub leaf_type: PropertyType,
    /// Class declaring the leaf.
    pub declaring: TypeName,
    /// Storage name of the leaf.
    pub storage: StorageName,
    /// Candidate classes of a master or detail leaf.
    pub usage_types: Vec<TypeName>,
    /// Leaf has a column.
    pub stored: bool,
    /// Leaf is required.
    pub not_null: bool,
}

/// Resolves dotted paths against a root class.
///
/// A borrowed view over [`Metadata`]; cheap to create.
#[derive(Debug, Clone, Copy)]
pub struct PathResolver<'a> {
    metadata: &'a Metadata,
}

impl<'a> PathResolver<'a> {
    pub(crate) fn new(metadata: &'a Metadata) -> Self {
        Self { metadata }
    }

    /// Resolve a dotted path given as text.
    pub fn resolve(&self, root: &TypeName, path: &str) -> Result<ResolvedProperty> {
        let path = PropertyPath::parse(path)?;
        self.resolve_path(root, &path)
    }

    /// Resolve a parsed path. Results are memoized per (root, path).
    pub fn resolve_path(&self, root: &TypeName, path: &PropertyPath) -> Result<ResolvedProperty> {
        let key = FactKey::property(FactKind::ResolvedPath, root, path.to_string());
        self.metadata
            .resolved
            .get_or_try_insert_with(key, self.metadata.cacheable(root), || {
                self.resolve_uncached(root, path)
            })
    }

    fn resolve_uncached(&self, root: &TypeName, path: &PropertyPath) -> Result<ResolvedProperty> {
        let owner = self.resolve_owner(root, path)?;
        let resolved = self
            .describe_leaf(owner, path)
            .map_err(|err| in_path_context(err, root, path))?;
        trace!(root = %root, path = %path, owner = %resolved.owner, "resolved path");
        Ok(resolved)
    }

    fn describe_leaf(&self, owner: TypeName, path: &PropertyPath) -> Result<ResolvedProperty> {
        let leaf = path.leaf();
        let metadata = self.metadata;
        Ok(ResolvedProperty {
            path: path.clone(),
            leaf_type: metadata.property_type(&owner, leaf)?,
            declaring: metadata.declaring_class(&owner, leaf)?,
            storage: metadata.storage_name_of(&owner, leaf)?,
            usage_types: if leaf == PRIMARY_KEY {
                Vec::new()
            } else {
                metadata.usage_types(&owner, leaf)?
            },
            stored: metadata.is_stored_property(&owner, leaf)?,
            not_null: metadata.property_not_null(&owner, leaf)?,
            owner,
        })
    }

    /// Class the leaf of `path` is looked up on.
    pub fn resolve_owner(&self, root: &TypeName, path: &PropertyPath) -> Result<TypeName> {
        let segments = path.segments();
        let mut owner = root.clone();
        for segment in &segments[..segments.len().saturating_sub(1)] {
            owner = self
                .navigate(&owner, segment, None)
                .map_err(|err| in_path_context(err, root, path))?;
        }
        Ok(owner)
    }

    /// Class reached by following `segment` from `owner`.
    ///
    /// A master leads to its declared class and a detail to its item class,
    /// unless `filter` narrows it to a subtype.
    pub fn navigate(&self, owner: &TypeName, segment: &str, filter: Option<&TypeName>) -> Result<TypeName> {
        let target = match self.metadata.property_type(owner, segment)? {
            PropertyType::Master(class) => class,
            PropertyType::Detail(_) => self.metadata.item_type(owner, segment)?,
            PropertyType::Scalar(_) => {
                return Err(Error::NotNavigable {
                    class: owner.clone(),
                    property: segment.to_string(),
                })
            }
        };
        Ok(filter.cloned().unwrap_or(target))
    }

    /// Leaf type and declaring class of a path.
    pub fn resolve_type(&self, root: &TypeName, path: &str) -> Result<(PropertyType, TypeName)> {
        let resolved = self.resolve(root, path)?;
        Ok((resolved.leaf_type, resolved.declaring))
    }

    /// Declaring class of the leaf of a path.
    pub fn resolve_declaring_type(&self, root: &TypeName, path: &str) -> Result<TypeName> {
        Ok(self.resolve(root, path)?.declaring)
    }

    /// Column name of the leaf of a path.
    pub fn resolve_storage_name(&self, root: &TypeName, path: &str) -> Result<String> {
        Ok(self.resolve(root, path)?.storage.primary().to_string())
    }

    /// `index`-th storage name of the leaf of a path.
    pub fn resolve_indexed_storage_name(&self, root: &TypeName, path: &str, index: usize) -> Result<String> {
        let resolved = self.resolve(root, path)?;
        self.metadata
            .indexed_storage_name(&resolved.owner, resolved.path.leaf(), index)
    }

    /// Candidate classes of the leaf of a path.
    pub fn resolve_usage_types(&self, root: &TypeName, path: &str) -> Result<Vec<TypeName>> {
        Ok(self.resolve(root, path)?.usage_types)
    }

    /// Caption of the leaf of a path.
    pub fn resolve_caption(&self, root: &TypeName, path: &str) -> Result<String> {
        let resolved = self.resolve(root, path)?;
        self.metadata
            .property_caption(&resolved.owner, resolved.path.leaf())
    }

    /// Check if the leaf of a path is required.
    pub fn resolve_not_null(&self, root: &TypeName, path: &str) -> Result<bool> {
        Ok(self.resolve(root, path)?.not_null)
    }

    /// Check if the leaf of a path has a column.
    pub fn resolve_stored(&self, root: &TypeName, path: &str) -> Result<bool> {
        Ok(self.resolve(root, path)?.stored)
    }

    /// String length of the leaf of a path.
    pub fn resolve_str_len(&self, root: &TypeName, path: &str) -> Result<Option<u32>> {
        let resolved = self.resolve(root, path)?;
        self.metadata
            .property_str_len(&resolved.owner, resolved.path.leaf())
    }

    /// Check if every segment of a path resolves.
    pub fn exists(&self, root: &TypeName, path: &str) -> bool {
        self.resolve(root, path).is_ok()
    }
}

/// Report a missing property against the root class and the full path.
fn in_path_context(err: Error, root: &TypeName, path: &PropertyPath) -> Error {
    match err {
        Error::PropertyNotFound { .. } => Error::property_not_found(root, path.to_string()),
        other => other,
    }
}
