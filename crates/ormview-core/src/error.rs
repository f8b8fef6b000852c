//! Core error types.

use ormview_proto::{SourceId, TypeName};
use thiserror::Error;

/// Metadata and compilation errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A property (or path segment) does not exist on the class.
    #[error("property '{property}' not found on class '{class}'")]
    PropertyNotFound {
        /// Class the lookup was made against.
        class: TypeName,
        /// Missing property name or path.
        property: String,
    },

    /// Class is not registered.
    #[error("class '{0}' not found")]
    ClassNotFound(TypeName),

    /// The target class is neither the view's class nor a subclass of it.
    #[error("view defined on '{view_class}' cannot be applied to '{target}'")]
    IncompatibleView {
        /// Class the view is defined on.
        view_class: TypeName,
        /// Class the view was compiled against.
        target: TypeName,
    },

    /// A non-final path segment names a scalar property.
    #[error("property '{property}' of '{class}' is not a master or detail and cannot be navigated")]
    NotNavigable {
        /// Class owning the property.
        class: TypeName,
        /// The scalar property.
        property: String,
    },

    /// Indexed storage name lookup past the declared names.
    #[error("storage name index {index} out of range for '{class}.{property}' ({len} names declared)")]
    StorageIndexOutOfRange {
        /// Class owning the property.
        class: TypeName,
        /// Property name.
        property: String,
        /// Requested index.
        index: usize,
        /// Number of declared names.
        len: usize,
    },

    /// No view with this name on the class or its bases.
    #[error("view '{view}' not found for class '{class}'")]
    ViewNotFound {
        /// View name.
        view: String,
        /// Class searched.
        class: TypeName,
    },

    /// A join source id that does not belong to the structure being built.
    #[error("join source {0} does not exist")]
    UnknownSource(SourceId),

    /// Inconsistent registry contents.
    #[error("invalid registry: {0}")]
    Registry(String),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ormview_proto::Error),

    /// I/O error while reading configuration.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn property_not_found(class: &TypeName, property: impl Into<String>) -> Self {
        Error::PropertyNotFound {
            class: class.clone(),
            property: property.into(),
        }
    }
}
