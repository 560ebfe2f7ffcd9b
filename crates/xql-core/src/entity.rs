//! Loaded entity instances
//!
//! An [`Entity`] owns its column values and one [`RelationCell`] per relation
//! property that a query asked for. A cell only moves from `Unresolved` to
//! `Resolved`, never back.

use crate::error::{Error, Result};
use crate::schema::{EntityModel, RelationModel};
use crate::value::{Row, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Resolved value of a relation property
#[derive(Debug, Clone, PartialEq)]
pub enum RelationValue {
    /// Many-to-one target, `None` if no row matched
    One(Option<Box<Entity>>),
    /// One-to-many targets, empty if no row matched
    Many(Vec<Entity>),
}

impl RelationValue {
    /// Single target, if this is a many-to-one value
    pub fn as_one(&self) -> Option<&Entity> {
        match self {
            RelationValue::One(target) => target.as_deref(),
            RelationValue::Many(_) => None,
        }
    }

    /// Targets, if this is a one-to-many value
    pub fn as_many(&self) -> Option<&[Entity]> {
        match self {
            RelationValue::Many(targets) => Some(targets),
            RelationValue::One(_) => None,
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            RelationValue::One(Some(target)) => target.to_json(),
            RelationValue::One(None) => serde_json::Value::Null,
            RelationValue::Many(targets) => {
                serde_json::Value::Array(targets.iter().map(Entity::to_json).collect())
            }
        }
    }
}

/// State of one relation property on one entity
#[derive(Debug, Clone, PartialEq)]
pub enum RelationCell {
    /// Deferred: holds what is needed to fetch the value on first read
    Unresolved(RelationModel),
    /// Fetched
    Resolved(RelationValue),
}

/// A loaded row of an entity type
#[derive(Debug, Clone)]
pub struct Entity {
    model: Arc<EntityModel>,
    values: HashMap<String, Value>,
    relations: HashMap<String, RelationCell>,
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.model.name() == other.model.name()
            && self.values == other.values
            && self.relations == other.relations
    }
}

impl Entity {
    /// Create an empty entity
    pub fn new(model: Arc<EntityModel>) -> Self {
        Self {
            model,
            values: HashMap::new(),
            relations: HashMap::new(),
        }
    }

    /// Materialize an entity from a row keyed by column name
    pub fn from_row(model: Arc<EntityModel>, row: &Row) -> Result<Self> {
        let mut values = HashMap::new();
        for property in model.readable() {
            let value = row.get(&property.field_name).cloned().unwrap_or_default();
            property.validate(&value)?;
            values.insert(property.name.clone(), value);
        }
        Ok(Self {
            model,
            values,
            relations: HashMap::new(),
        })
    }

    /// Entity metadata
    pub fn model(&self) -> &Arc<EntityModel> {
        &self.model
    }

    /// Get a property value
    pub fn get(&self, property: &str) -> Option<&Value> {
        self.values.get(property)
    }

    /// Set a property value
    pub fn set<V: Into<Value>>(&mut self, property: &str, value: V) -> Result<()> {
        let model = self.model.require(property)?;
        if model.is_expandable() {
            return Err(Error::unknown_property(self.model.name(), property));
        }
        let value = value.into();
        model.validate(&value)?;
        self.values.insert(property.to_string(), value);
        Ok(())
    }

    /// Builder form of [`Entity::set`]
    pub fn with<V: Into<Value>>(mut self, property: &str, value: V) -> Result<Self> {
        self.set(property, value)?;
        Ok(self)
    }

    /// Primary key values in declaration order
    pub fn primary_key(&self) -> Result<Vec<Value>> {
        self.model
            .primary_keys()
            .iter()
            .map(|name| match self.values.get(name) {
                Some(value) if !value.is_null() => Ok(value.clone()),
                _ => Err(Error::PrimaryKeyIsNull),
            })
            .collect()
    }

    /// True if every primary key column is null, as for an unmatched outer join
    pub fn is_absent(&self) -> bool {
        let keys = self.model.primary_keys();
        !keys.is_empty()
            && keys
                .iter()
                .all(|name| self.values.get(name).is_none_or(Value::is_null))
    }

    /// Resolved relation value
    pub fn relation(&self, property: &str) -> Option<&RelationValue> {
        match self.relations.get(property) {
            Some(RelationCell::Resolved(value)) => Some(value),
            _ => None,
        }
    }

    /// Relation cell, resolved or not
    pub fn relation_cell(&self, property: &str) -> Option<&RelationCell> {
        self.relations.get(property)
    }

    /// True if the relation already holds its value
    pub fn is_resolved(&self, property: &str) -> bool {
        matches!(self.relations.get(property), Some(RelationCell::Resolved(_)))
    }

    /// Install a deferred relation; an existing cell is left as is
    pub fn defer(&mut self, property: &str, relation: RelationModel) {
        self.relations
            .entry(property.to_string())
            .or_insert(RelationCell::Unresolved(relation));
    }

    /// Store a relation value. Returns false if the relation was already resolved.
    pub fn resolve(&mut self, property: &str, value: RelationValue) -> bool {
        if self.is_resolved(property) {
            return false;
        }
        self.relations
            .insert(property.to_string(), RelationCell::Resolved(value));
        true
    }

    /// Flatten to a JSON object: properties plus resolved relations
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        for property in self.model.properties() {
            if let Some(value) = self.values.get(&property.name) {
                object.insert(property.name.clone(), value.to_json());
            } else if let Some(value) = self.relation(&property.name) {
                object.insert(property.name.clone(), value.to_json());
            }
        }
        serde_json::Value::Object(object)
    }
}
