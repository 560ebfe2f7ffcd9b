//! XQL query engine
//!
//! Parses XQL text into a [`QueryModel`], generates SQL for it, runs it
//! through a [`Database`](xql_core::Database) and resolves requested
//! relations on the loaded entities.
//!
//! # Overview
//!
//! - Tokenizer producing positioned tokens
//! - One finite state machine parser per clause
//! - SQL generation with positional parameters
//! - Row materialization into entities
//! - EAGER batched and LAZY on-demand relation resolution

pub mod config;
pub mod context;
pub mod executor;
pub mod generator;
pub mod lexer;
pub mod model;
pub mod parser;
pub mod resolver;

pub use config::XqlConfig;
pub use context::QueryContext;
pub use executor::{ExecutionStats, QueryExecutor, QueryResult, Record};
pub use generator::{Generator, SqlGenerator, SqlStatement};
pub use lexer::{tokenize, Token, TokenType};
pub use model::{
    AliasModel, Direction, FilterModel, FromModel, JoinKind, JoinModel, OrderModel,
    ParameterModel, QueryModel, ResolveType, WhereModel, WithModel,
};
pub use parser::parse;
pub use resolver::Resolver;
