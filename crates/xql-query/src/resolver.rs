//! Relation resolution
//!
//! Populates the relation properties requested through
//! [`QueryModel::with`] on already materialized entities.
//!
//! - EAGER many-to-one relations whose target is already joined in the query
//!   are taken from the same record, without another round trip.
//! - Other EAGER relations are fetched with one batched query per chunk of
//!   distinct parent keys and grouped by foreign key.
//! - LAZY relations are deferred on the entity and fetched by [`Resolver::load`]
//!   on first read.
//!
//! A resolved relation is never fetched again. Relations of the fetched
//! entities are left untouched.

use crate::context::QueryContext;
use crate::executor::Record;
use crate::generator::Generator;
use crate::model::{QueryModel, ResolveType, WithModel};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace};
use xql_core::{
    Entity, EntityModel, Error, RelationCell, RelationKind, RelationModel, RelationValue, Result,
    Value, ValueKey,
};

/// Relation resolver
#[derive(Debug)]
pub struct Resolver<'a> {
    context: &'a QueryContext,
}

impl<'a> Resolver<'a> {
    pub fn new(context: &'a QueryContext) -> Self {
        Self { context }
    }

    /// Resolve every `with` relation of a query, in declaration order.
    ///
    /// Returns the number of statements sent to the database.
    pub fn resolve(&self, query: &QueryModel, records: &mut [Record]) -> Result<u64> {
        let mut statements = 0;
        for with in query.withs() {
            let relation = self.relation(query, with)?;
            trace!("Resolving {}.{} ({:?})", with.alias, with.property, with.resolve_type);

            match with.resolve_type {
                ResolveType::Lazy => {
                    for entity in records.iter_mut().filter_map(|r| r.get_mut(&with.alias)) {
                        entity.defer(&with.property, relation.clone());
                    }
                }
                ResolveType::Eager => {
                    let linked = match relation.kind {
                        RelationKind::ManyToOne => query.linked_alias(&with.alias, &relation),
                        RelationKind::OneToMany => None,
                    };
                    if let Some(linked) = linked {
                        fold(records, &with.alias, &with.property, linked);
                        continue;
                    }
                    let mut owners: Vec<&mut Entity> = records
                        .iter_mut()
                        .filter_map(|r| r.get_mut(&with.alias))
                        .collect();
                    statements += self.resolve_batch(&mut owners, &with.property, &relation)?;
                }
            }
        }
        Ok(statements)
    }

    /// Resolve one relation on a set of entities with batched queries.
    ///
    /// Entities that already hold the relation are skipped. Returns the number
    /// of statements sent to the database.
    pub fn resolve_batch(
        &self,
        owners: &mut [&mut Entity],
        property: &str,
        relation: &RelationModel,
    ) -> Result<u64> {
        let mut keys: Vec<Value> = Vec::new();
        let mut seen = HashSet::new();
        for owner in owners.iter().filter(|e| !e.is_resolved(property)) {
            if let Some(value) = owner.get(&relation.local_property) {
                if let Some(key) = value.key() {
                    if seen.insert(key) {
                        keys.push(value.clone());
                    }
                }
            }
        }

        let mut statements = 0;
        let mut groups: HashMap<ValueKey, Vec<Entity>> = HashMap::new();
        if !keys.is_empty() {
            let target = self.target(owners.first().map(|e| e.model().name()), relation)?;
            for chunk in keys.chunks(self.context.config().max_batch_size.max(1)) {
                for entity in self.fetch_related(&target, relation, chunk)? {
                    if let Some(key) = entity.get(&relation.foreign_property).and_then(Value::key) {
                        groups.entry(key).or_default().push(entity);
                    }
                }
                statements += 1;
            }
            debug!(
                "Resolved {} for {} key(s) in {} batch(es)",
                property,
                keys.len(),
                statements
            );
        }

        for owner in owners.iter_mut() {
            if owner.is_resolved(property) {
                continue;
            }
            let group = owner
                .get(&relation.local_property)
                .and_then(Value::key)
                .and_then(|key| groups.get(&key));
            owner.resolve(property, relation_value(relation.kind, group));
        }
        Ok(statements)
    }

    /// Value of a relation, fetched with one query on first access
    pub fn load<'e>(&self, entity: &'e mut Entity, property: &str) -> Result<&'e RelationValue> {
        if !entity.is_resolved(property) {
            let relation = match entity.relation_cell(property) {
                Some(RelationCell::Unresolved(relation)) => relation.clone(),
                _ => entity.model().relation(property).cloned().ok_or_else(|| {
                    Error::UnresolvedLink {
                        from: entity.model().name().to_string(),
                        to: property.to_string(),
                    }
                })?,
            };

            let value = match entity.get(&relation.local_property) {
                Some(key) if !key.is_null() => {
                    let target = self.target(Some(entity.model().name()), &relation)?;
                    let keys = std::slice::from_ref(key);
                    let related = self.fetch_related(&target, &relation, keys)?;
                    match relation.kind {
                        RelationKind::ManyToOne => {
                            RelationValue::One(related.into_iter().next().map(Box::new))
                        }
                        RelationKind::OneToMany => RelationValue::Many(related),
                    }
                }
                _ => relation_value(relation.kind, None),
            };
            debug!("Loaded {}.{}", entity.model().name(), property);
            entity.resolve(property, value);
        }

        entity
            .relation(property)
            .ok_or_else(|| Error::Internal(format!("relation {} not resolved", property)))
    }

    /// Relation of a `with`; the owner's model must be flagged as needing resolution
    fn relation(&self, query: &QueryModel, with: &WithModel) -> Result<RelationModel> {
        let entity = query.entity_for_alias(&with.alias)?;
        let model = self.context.registry().get(entity)?;
        let unresolved_link = || Error::UnresolvedLink {
            from: entity.to_string(),
            to: with.property.clone(),
        };
        if !model.is_unresolved() {
            return Err(unresolved_link());
        }
        match &with.relation {
            Some(relation) => Ok(relation.clone()),
            None => model.relation(&with.property).cloned().ok_or_else(unresolved_link),
        }
    }

    fn target(&self, owner: Option<&str>, relation: &RelationModel) -> Result<Arc<EntityModel>> {
        self.context
            .registry()
            .get(&relation.target)
            .map_err(|_| Error::UnresolvedLink {
                from: owner.unwrap_or_default().to_string(),
                to: relation.target.clone(),
            })
    }

    fn fetch_related(
        &self,
        target: &Arc<EntityModel>,
        relation: &RelationModel,
        keys: &[Value],
    ) -> Result<Vec<Entity>> {
        let statement =
            self.context
                .generator()
                .select_related(target, &relation.foreign_property, keys)?;
        self.context.log_statement(&statement);
        self.context
            .database()
            .select(&statement.sql, &statement.params, None, None)?
            .iter()
            .map(|row| Entity::from_row(Arc::clone(target), row))
            .collect()
    }
}

/// Take a many-to-one target from the alias it was joined under
fn fold(records: &mut [Record], alias: &str, property: &str, linked: &str) {
    for record in records.iter_mut() {
        let target = record.get(linked).cloned().map(Box::new);
        if let Some(owner) = record.get_mut(alias) {
            owner.resolve(property, RelationValue::One(target));
        }
    }
}

fn relation_value(kind: RelationKind, group: Option<&Vec<Entity>>) -> RelationValue {
    match kind {
        RelationKind::ManyToOne => {
            RelationValue::One(group.and_then(|g| g.first()).cloned().map(Box::new))
        }
        RelationKind::OneToMany => RelationValue::Many(group.cloned().unwrap_or_default()),
    }
}
