//! Query execution
//!
//! Runs generated statements against the context's [`Database`](xql_core::Database),
//! materializes each row into one [`Entity`] per loaded alias and hands the
//! records to the resolver.

use crate::context::QueryContext;
use crate::generator::Generator;
use crate::model::{JoinKind, QueryModel};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;
use xql_core::{Entity, EntityModel, Result, Row, Value};

/// Entities materialized from one result row, by alias
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entities: Vec<(String, Entity)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entity loaded for an alias; `None` for an unmatched outer join
    pub fn get(&self, alias: &str) -> Option<&Entity> {
        self.entities.iter().find(|(a, _)| a == alias).map(|(_, e)| e)
    }

    pub fn get_mut(&mut self, alias: &str) -> Option<&mut Entity> {
        self.entities
            .iter_mut()
            .find(|(a, _)| a == alias)
            .map(|(_, e)| e)
    }

    pub fn insert(&mut self, alias: &str, entity: Entity) {
        match self.get_mut(alias) {
            Some(existing) => *existing = entity,
            None => self.entities.push((alias.to_string(), entity)),
        }
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.entities.iter().map(|(a, _)| a.as_str())
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// JSON object keyed by alias
    pub fn to_json(&self) -> serde_json::Value {
        let object = self
            .entities
            .iter()
            .map(|(alias, entity)| (alias.clone(), entity.to_json()))
            .collect();
        serde_json::Value::Object(object)
    }
}

/// Execution statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    /// Statements sent to the database, relation queries included
    pub statements: u64,
    pub rows_returned: u64,
    pub execution_time_ms: u64,
}

/// Query execution result
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// True if each record carries several independent entities
    pub multi_entity: bool,

    /// Alias whose entity represents a record when not multi-entity
    pub primary_alias: String,

    pub records: Vec<Record>,

    pub stats: ExecutionStats,
}

impl QueryResult {
    /// Primary entity of every record
    pub fn entities(&self) -> Vec<&Entity> {
        self.records
            .iter()
            .filter_map(|r| r.get(&self.primary_alias))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records as alias-keyed objects, or primary entities when not multi-entity
    pub fn to_json(&self) -> serde_json::Value {
        let items = if self.multi_entity {
            self.records.iter().map(Record::to_json).collect()
        } else {
            self.entities().into_iter().map(Entity::to_json).collect()
        };
        serde_json::Value::Array(items)
    }
}

/// Query executor
#[derive(Debug)]
pub struct QueryExecutor<'a> {
    context: &'a QueryContext,
}

impl<'a> QueryExecutor<'a> {
    /// Create a new query executor
    pub fn new(context: &'a QueryContext) -> Self {
        Self { context }
    }

    /// Bind, run and materialize a query, then resolve its `with` relations
    pub fn fetch(
        &self,
        query: &mut QueryModel,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<QueryResult> {
        let start = Instant::now();
        let mut stats = ExecutionStats::default();

        query.bind(self.context.registry())?;
        let statement = self.context.generator().select(query)?;
        self.context.log_statement(&statement);

        let limit = limit.or(self.context.config().default_limit);
        let rows = self
            .context
            .database()
            .select(&statement.sql, &statement.params, limit, offset)?;
        stats.statements += 1;
        stats.rows_returned = rows.len() as u64;

        let layout = self.layout(query)?;
        let mut records = rows
            .iter()
            .map(|row| self.materialize(&layout, row))
            .collect::<Result<Vec<_>>>()?;

        stats.statements += self.context.resolver().resolve(query, &mut records)?;
        stats.execution_time_ms = start.elapsed().as_millis() as u64;

        debug!(
            records = records.len(),
            statements = stats.statements,
            "Fetched {}",
            query.xql()
        );

        Ok(QueryResult {
            multi_entity: query.is_multi_entity(),
            primary_alias: query
                .selected_aliases()
                .first()
                .map(|a| a.to_string())
                .unwrap_or_default(),
            records,
            stats,
        })
    }

    /// First record of a query, if any
    pub fn fetch_first(&self, query: &mut QueryModel) -> Result<Option<Record>> {
        Ok(self.fetch(query, Some(1), None)?.records.into_iter().next())
    }

    /// Insert an entity; a single null primary key receives the generated id
    pub fn insert(&self, entity: &mut Entity) -> Result<u64> {
        let statement = self.context.generator().insert(entity)?;
        self.context.log_statement(&statement);
        let affected = self
            .context
            .database()
            .execute(&statement.sql, &statement.params)?;

        let model = Arc::clone(entity.model());
        if let [key] = model.primary_keys() {
            if entity.get(key).is_none_or(Value::is_null) {
                let id = self.context.database().last_insert_id()?;
                entity.set(key, id)?;
            }
        }
        Ok(affected)
    }

    pub fn update(&self, entity: &Entity) -> Result<u64> {
        let statement = self.context.generator().update(entity)?;
        self.context.log_statement(&statement);
        self.context
            .database()
            .execute(&statement.sql, &statement.params)
    }

    pub fn delete(&self, entity: &Entity) -> Result<u64> {
        let statement = self.context.generator().delete(entity)?;
        self.context.log_statement(&statement);
        self.context
            .database()
            .execute(&statement.sql, &statement.params)
    }

    fn layout(&self, query: &QueryModel) -> Result<Vec<Slot>> {
        let generator = self.context.generator();
        let sparse_from = query
            .joins()
            .iter()
            .any(|j| matches!(j.kind, JoinKind::Right | JoinKind::Outer));

        query
            .loaded_aliases()
            .into_iter()
            .map(|alias| {
                let model = self.context.registry().get(query.entity_for_alias(alias)?)?;
                let columns = model
                    .readable()
                    .map(|p| (generator.label(alias, &p.name), p.field_name.clone()))
                    .collect();
                Ok(Slot {
                    alias: alias.to_string(),
                    required: !sparse_from && query.join_for_alias(alias).is_none(),
                    model,
                    columns,
                })
            })
            .collect()
    }

    fn materialize(&self, layout: &[Slot], row: &Row) -> Result<Record> {
        let mut record = Record::new();
        for slot in layout {
            let fields: Row = slot
                .columns
                .iter()
                .map(|(label, field)| (field.clone(), row.get(label).cloned().unwrap_or_default()))
                .collect();
            let entity = Entity::from_row(Arc::clone(&slot.model), &fields)?;

            if slot.required {
                entity.primary_key()?;
            } else if entity.is_absent() {
                continue;
            }
            record.insert(&slot.alias, entity);
        }
        Ok(record)
    }
}

/// Where an alias's entity sits in a result row
#[derive(Debug)]
struct Slot {
    alias: String,
    required: bool,
    model: Arc<EntityModel>,

    /// (label, column) pairs
    columns: Vec<(String, String)>,
}
