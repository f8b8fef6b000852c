//! ORMView Core - metadata resolution and view-to-storage compilation.
//!
//! This crate answers where the data for a requested object shape lives:
//! it resolves dotted property paths against a class registry and compiles
//! declarative views into join graphs with per-property column bindings.
//!
//! ```
//! use ormview_core::catalog::{ClassDef, ClassRegistry, PropertyDef};
//! use ormview_core::{Metadata, StorageStrategy, TypeName, View};
//! use ormview_core::proto::ScalarType;
//!
//! let registry = ClassRegistry::new()
//!     .with_class(
//!         ClassDef::new("Hr.Employee")
//!             .with_property(PropertyDef::scalar("Name", ScalarType::String))
//!             .with_property(PropertyDef::master("Department", "Hr.Department")),
//!     )
//!     .with_class(
//!         ClassDef::new("Hr.Department")
//!             .with_property(PropertyDef::scalar("Title", ScalarType::String)),
//!     );
//! let metadata = Metadata::with_registry(registry);
//!
//! let view = View::from_paths("EmployeeL", "Hr.Employee", ["Name", "Department.Title"]).unwrap();
//! let structure = metadata
//!     .compiler()
//!     .compile(&view, &TypeName::new("Hr.Employee"), StorageStrategy::Flat, "Sql")
//!     .unwrap()
//!     .unwrap();
//!
//! assert_eq!(structure.join_count(), 1);
//! assert_eq!(structure.props[1].first_column(), Some("Title"));
//! ```

pub mod catalog;
pub mod compiler;
pub mod config;
pub mod error;
pub mod expression;
pub mod metadata;
pub mod resolver;
pub mod views;

#[cfg(test)]
pub(crate) mod fixtures;

pub use catalog::{ClassDef, ClassRegistry, PropertyDef, StorageName, ViewDef};
pub use compiler::ViewCompiler;
pub use config::{DeclaredKeyType, KeyTypeProvider, MetadataConfig, StorageNameOverride, ViewTuner};
pub use error::{Error, Result};
pub use expression::{properties_in_expression, ExpressionResolver};
pub use metadata::{CacheInfo, FactKind, Metadata};
pub use resolver::{PathResolver, ResolvedProperty};
pub use views::ViewCatalog;

pub use ormview_proto::{
    PropSource, PropStorage, PropertyPath, PropertyType, SourceId, StorageStrategy,
    StorageStructure, TypeName, View,
};

/// Re-export protocol types.
pub use ormview_proto as proto;
