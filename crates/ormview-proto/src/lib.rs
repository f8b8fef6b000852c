//! ORMView shape types.
//!
//! This crate defines the data shapes exchanged between the metadata layer
//! and its consumers: type handles, dotted property paths, declarative views
//! and the compiled storage structures a view resolves to.
//!
//! # Modules
//!
//! - [`types`] - Type handles and property types
//! - [`path`] - Dotted property paths
//! - [`view`] - Declarative views over a class
//! - [`structure`] - Compiled join graphs and property bindings
//! - [`error`] - Shape error types
//!
//! # Serialization
//!
//! All types derive `serde::Serialize` and `serde::Deserialize`. Paths and
//! type names serialize as plain strings:
//!
//! ```
//! use ormview_proto::View;
//!
//! let view = View::from_paths("EmployeeL", "Hr.Employee", ["Name", "Department.Title"]).unwrap();
//! let json = serde_json::to_string(&view).unwrap();
//! let back: View = serde_json::from_str(&json).unwrap();
//! assert_eq!(back, view);
//! ```

pub mod error;
pub mod path;
pub mod structure;
pub mod types;
pub mod view;

pub use error::Error;

// Re-export commonly used types at crate root
pub use path::{PropertyPath, PRIMARY_KEY};
pub use structure::{
    ClassStorageDef, ParentLink, PropSource, PropStorage, SourceId, StorageStrategy,
    StorageStructure,
};
pub use types::{PropertyType, ScalarType, TypeName};
pub use view::{DetailInView, PropertyInView, PseudoDetailInView, View};
