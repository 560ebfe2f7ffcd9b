//! XQL - entity query language engine
//!
//! This is the main library crate that re-exports all XQL components.

pub use xql_core as core;
pub use xql_query as query;

// Re-export commonly used types
pub use xql_core::{
    AccessType, Database, Entity, EntityModel, EntityRegistry, Error, PropertyModel,
    RelationCell, RelationKind, RelationModel, RelationValue, Result, Row, Value,
};

pub use xql_query::{
    QueryContext, QueryExecutor, QueryModel, QueryResult, Record, ResolveType, Resolver,
    XqlConfig,
};
