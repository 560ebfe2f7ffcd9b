//! Database connection seam
//!
//! The engine never talks to a driver directly. Generated SQL and its
//! positional parameters are handed to an implementation of [`Database`].

use crate::error::Result;
use crate::value::{Row, Value};

/// A SQL connection consumed by the executor and the resolver.
///
/// Implementations report their own failures as `Error::Database`.
pub trait Database: Send + Sync {
    /// Run a query and return its rows
    fn select(
        &self,
        sql: &str,
        params: &[Value],
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Vec<Row>>;

    /// Run a query and return its first row
    fn select_first(&self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        Ok(self.select(sql, params, Some(1), None)?.into_iter().next())
    }

    /// Run a statement and return the number of affected rows
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Begin a transaction
    fn begin(&self) -> Result<()>;

    /// Commit the current transaction
    fn commit(&self) -> Result<()>;

    /// Roll back the current transaction
    fn rollback(&self) -> Result<()>;

    /// Key generated by the last insert
    fn last_insert_id(&self) -> Result<Value>;
}
