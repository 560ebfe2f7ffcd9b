//! XQL Core Library
//!
//! This crate provides the fundamental types shared by the XQL query engine.
//!
//! # Modules
//!
//! - `error` - Error type with stable codes and result alias
//! - `value` - Column and parameter values
//! - `schema` - Entity, property and relation metadata
//! - `registry` - Entity model registry
//! - `entity` - Loaded entity instances and relation cells
//! - `database` - The database connection seam

pub mod database;
pub mod entity;
pub mod error;
pub mod registry;
pub mod schema;
pub mod value;

pub use database::Database;
pub use entity::{Entity, RelationCell, RelationValue};
pub use error::{Error, Result};
pub use registry::EntityRegistry;
pub use schema::{AccessType, EntityModel, PropertyModel, RelationKind, RelationModel};
pub use value::{Row, Value, ValueKey};
