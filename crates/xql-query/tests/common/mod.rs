//! Shared fixtures: an entity registry and an in-memory recording database

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use xql_core::{
    Database, EntityModel, EntityRegistry, Error, PropertyModel, RelationModel, Result, Row, Value,
};
use xql_query::{QueryContext, XqlConfig};

/// projects -> users (many-to-one), projects -> tasks (one-to-many)
pub fn registry() -> EntityRegistry {
    EntityRegistry::new()
        .with(
            EntityModel::new("projects", "project")
                .class("Project")
                .property(PropertyModel::new("id").primary_key())
                .property(PropertyModel::new("userId").field("user_id"))
                .property(PropertyModel::new("title"))
                .property(PropertyModel::relation(
                    "owner",
                    RelationModel::many_to_one("users", "userId", "id"),
                ))
                .property(PropertyModel::relation(
                    "tasks",
                    RelationModel::one_to_many("tasks", "id", "projectId"),
                )),
        )
        .unwrap()
        .with(
            EntityModel::new("users", "user")
                .class("User")
                .property(PropertyModel::new("id").primary_key())
                .property(PropertyModel::new("name")),
        )
        .unwrap()
        .with(
            EntityModel::new("tasks", "task")
                .class("Task")
                .property(PropertyModel::new("id").primary_key())
                .property(PropertyModel::new("projectId").field("project_id"))
                .property(PropertyModel::new("title"))
                .property(PropertyModel::new("status").enumeration(&["ACTIVE", "DONE"]))
                .property(PropertyModel::relation(
                    "project",
                    RelationModel::many_to_one("projects", "projectId", "id"),
                )),
        )
        .unwrap()
}

/// Build a row from column/value pairs
pub fn row(columns: &[(&str, Value)]) -> Row {
    columns
        .iter()
        .map(|(column, value)| (column.to_string(), value.clone()))
        .collect()
}

/// A statement seen by [`MemoryDatabase`]
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Database double.
///
/// Labelled selects (`... AS alias__prop ...`) answer with the rows registered
/// through [`MemoryDatabase::respond`]. Plain selects of the form
/// `SELECT .. FROM table WHERE column = ?` or `.. IN (..)` filter the rows of
/// the table registered through [`MemoryDatabase::table`].
#[derive(Default)]
pub struct MemoryDatabase {
    responses: Vec<(String, Vec<Row>)>,
    tables: HashMap<String, Vec<Row>>,
    statements: Mutex<Vec<Statement>>,
    transactions: Mutex<Vec<&'static str>>,
    fail_on: Option<String>,
    last_id: i64,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, fragment: &str, rows: Vec<Row>) -> Self {
        self.responses.push((fragment.to_string(), rows));
        self
    }

    pub fn table(mut self, name: &str, rows: Vec<Row>) -> Self {
        self.tables.insert(name.to_string(), rows);
        self
    }

    pub fn fail_on(mut self, fragment: &str) -> Self {
        self.fail_on = Some(fragment.to_string());
        self
    }

    pub fn last_id(mut self, id: i64) -> Self {
        self.last_id = id;
        self
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.statements.lock().unwrap().clone()
    }

    pub fn transactions(&self) -> Vec<&'static str> {
        self.transactions.lock().unwrap().clone()
    }

    fn record(&self, sql: &str, params: &[Value]) -> Result<()> {
        self.statements.lock().unwrap().push(Statement {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        match &self.fail_on {
            Some(fragment) if sql.contains(fragment.as_str()) => {
                Err(Error::Database(format!("rejected: {}", sql)))
            }
            _ => Ok(()),
        }
    }

    fn related(&self, sql: &str, params: &[Value]) -> Vec<Row> {
        let word_after = |marker: &str| {
            sql.split(marker)
                .nth(1)
                .and_then(|rest| rest.split_whitespace().next())
                .unwrap_or_default()
                .to_string()
        };
        let table = word_after(" FROM ");
        let column = word_after(" WHERE ");
        self.tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| r.get(&column).is_some_and(|v| params.contains(v)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Database for MemoryDatabase {
    fn select(
        &self,
        sql: &str,
        params: &[Value],
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Vec<Row>> {
        self.record(sql, params)?;
        let rows = if sql.contains(" AS ") {
            self.responses
                .iter()
                .find(|(fragment, _)| sql.contains(fragment.as_str()))
                .map(|(_, rows)| rows.clone())
                .unwrap_or_default()
        } else {
            self.related(sql, params)
        };
        Ok(rows
            .into_iter()
            .skip(offset.unwrap_or(0))
            .take(limit.unwrap_or(usize::MAX))
            .collect())
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.record(sql, params)?;
        Ok(1)
    }

    fn begin(&self) -> Result<()> {
        self.transactions.lock().unwrap().push("begin");
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.transactions.lock().unwrap().push("commit");
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.transactions.lock().unwrap().push("rollback");
        Ok(())
    }

    fn last_insert_id(&self) -> Result<Value> {
        Ok(Value::Integer(self.last_id))
    }
}

/// Context over a shared database double
pub fn context(database: MemoryDatabase) -> (Arc<MemoryDatabase>, QueryContext) {
    context_with(database, XqlConfig::default())
}

pub fn context_with(
    database: MemoryDatabase,
    config: XqlConfig,
) -> (Arc<MemoryDatabase>, QueryContext) {
    let database = Arc::new(database);
    let context = QueryContext::new(database.clone(), Arc::new(registry())).with_config(config);
    (database, context)
}

/// Primary-select row of a project under alias `p`
pub fn project_row(id: i64, user_id: Option<i64>, title: &str) -> Row {
    row(&[
        ("p__id", Value::Integer(id)),
        ("p__userId", Value::from(user_id)),
        ("p__title", Value::from(title)),
    ])
}

/// Table row of a task
pub fn task(id: i64, project_id: i64, title: &str, status: &str) -> Row {
    row(&[
        ("id", Value::Integer(id)),
        ("project_id", Value::Integer(project_id)),
        ("title", Value::from(title)),
        ("status", Value::from(status)),
    ])
}

/// Table row of a user
pub fn user(id: i64, name: &str) -> Row {
    row(&[("id", Value::Integer(id)), ("name", Value::from(name))])
}
