//! Query context
//!
//! Everything a query needs at run time, handed to the executor and the
//! resolver explicitly.

use crate::config::XqlConfig;
use crate::executor::QueryExecutor;
use crate::generator::{SqlGenerator, SqlStatement};
use crate::model::QueryModel;
use crate::resolver::Resolver;
use std::sync::Arc;
use tracing::{debug, info, warn};
use xql_core::{Database, EntityRegistry, Result};

/// Database, entity metadata and configuration for running queries
#[derive(Clone)]
pub struct QueryContext {
    database: Arc<dyn Database>,
    registry: Arc<EntityRegistry>,
    config: XqlConfig,
}

impl QueryContext {
    /// Create a context with the default configuration
    pub fn new(database: Arc<dyn Database>, registry: Arc<EntityRegistry>) -> Self {
        Self {
            database,
            registry,
            config: XqlConfig::default(),
        }
    }

    /// Builder: replace the configuration
    pub fn with_config(mut self, config: XqlConfig) -> Self {
        self.config = config;
        self
    }

    pub fn database(&self) -> &dyn Database {
        self.database.as_ref()
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn config(&self) -> &XqlConfig {
        &self.config
    }

    /// Parse XQL text
    pub fn parse(&self, xql: &str) -> Result<QueryModel> {
        QueryModel::parse(xql)
    }

    pub fn generator(&self) -> SqlGenerator<'_> {
        SqlGenerator::new(&self.registry, &self.config.column_separator)
    }

    pub fn executor(&self) -> QueryExecutor<'_> {
        QueryExecutor::new(self)
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(self)
    }

    /// Run `f` inside a transaction.
    ///
    /// Commits when `f` succeeds. On failure the transaction is rolled back
    /// and the error from `f` is returned.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&QueryContext) -> Result<T>,
    {
        self.database.begin()?;
        match f(self) {
            Ok(value) => {
                self.database.commit()?;
                debug!("Transaction committed");
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.database.rollback() {
                    warn!("Rollback failed: {}", rollback);
                }
                debug!("Transaction rolled back: {}", e);
                Err(e)
            }
        }
    }

    pub(crate) fn log_statement(&self, statement: &SqlStatement) {
        if self.config.log_sql {
            info!(params = statement.params.len(), "SQL: {}", statement.sql);
        } else {
            debug!(params = statement.params.len(), "SQL: {}", statement.sql);
        }
    }
}

impl std::fmt::Debug for QueryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryContext")
            .field("entities", &self.registry.len())
            .field("config", &self.config)
            .finish()
    }
}
