//! Declarative metadata catalog.
//!
//! The catalog holds the class, property, view, detail-collection and engine
//! records that every metadata lookup is answered from.

mod class;
mod property;
mod registry;
mod view_def;

pub use class::ClassDef;
pub use property::{EngineExpression, PropertyDef, StorageName};
pub use registry::ClassRegistry;
pub use view_def::{DetailCollectionDef, DetailViewDef, EngineDef, PseudoDetailViewDef, ViewDef};
