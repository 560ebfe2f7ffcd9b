//! Entity metadata
//!
//! An [`EntityModel`] maps an entity name to a table, its properties to
//! columns, and declares which properties are relations to other entities.

use crate::error::{Error, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How a property may be accessed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessType {
    /// Loaded from the database, never written
    Read,
    /// Written to the database, never loaded
    Write,
    /// Loaded and written
    ReadWrite,
    /// Relation property; its value is produced by the resolver
    Expandable,
}

impl AccessType {
    /// Returns true if the property is selected when loading rows
    pub fn is_readable(self) -> bool {
        matches!(self, AccessType::Read | AccessType::ReadWrite)
    }

    /// Returns true if the property is written on insert/update
    pub fn is_writable(self) -> bool {
        matches!(self, AccessType::Write | AccessType::ReadWrite)
    }
}

/// Cardinality of a relation seen from the owning entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    /// The owner has many targets: `targets.foreign == owner.local`
    OneToMany,
    /// The owner points at one target: `target.foreign == owner.local`
    ManyToOne,
}

/// A relation declared on an entity property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationModel {
    /// Relation cardinality
    pub kind: RelationKind,

    /// Entity name on the other side
    pub target: String,

    /// Linking property on the owning entity
    pub local_property: String,

    /// Linking property on the target entity
    pub foreign_property: String,
}

impl RelationModel {
    /// Declare a one-to-many relation
    pub fn one_to_many(target: &str, local_property: &str, foreign_property: &str) -> Self {
        Self {
            kind: RelationKind::OneToMany,
            target: target.to_string(),
            local_property: local_property.to_string(),
            foreign_property: foreign_property.to_string(),
        }
    }

    /// Declare a many-to-one relation
    pub fn many_to_one(target: &str, local_property: &str, foreign_property: &str) -> Self {
        Self {
            kind: RelationKind::ManyToOne,
            target: target.to_string(),
            local_property: local_property.to_string(),
            foreign_property: foreign_property.to_string(),
        }
    }
}

/// Metadata for one entity property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyModel {
    /// Property name used in XQL
    pub name: String,

    /// Database column name
    pub field_name: String,

    /// Access type
    pub access: AccessType,

    /// Part of the primary key
    pub primary_key: bool,

    /// Allowed values for enum-typed columns
    pub enum_values: Option<Vec<String>>,

    /// Relation declaration (expandable properties only)
    pub relation: Option<RelationModel>,
}

impl PropertyModel {
    /// Create a read/write property whose column has the same name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            field_name: name.to_string(),
            access: AccessType::ReadWrite,
            primary_key: false,
            enum_values: None,
            relation: None,
        }
    }

    /// Create an expandable relation property
    pub fn relation(name: &str, relation: RelationModel) -> Self {
        Self {
            name: name.to_string(),
            field_name: name.to_string(),
            access: AccessType::Expandable,
            primary_key: false,
            enum_values: None,
            relation: Some(relation),
        }
    }

    /// Builder: set the column name
    pub fn field(mut self, field_name: &str) -> Self {
        self.field_name = field_name.to_string();
        self
    }

    /// Builder: mark as primary key
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Builder: set the access type
    pub fn access(mut self, access: AccessType) -> Self {
        self.access = access;
        self
    }

    /// Builder: restrict the column to a set of values
    pub fn enumeration(mut self, values: &[&str]) -> Self {
        self.enum_values = Some(values.iter().map(|v| v.to_string()).collect());
        self
    }

    /// Returns true if the property is a relation
    pub fn is_expandable(&self) -> bool {
        self.access == AccessType::Expandable
    }

    /// Check a loaded value against the declared enum values
    pub fn validate(&self, value: &Value) -> Result<()> {
        let Some(allowed) = &self.enum_values else {
            return Ok(());
        };
        match value {
            Value::Null => Ok(()),
            Value::String(s) if allowed.iter().any(|a| a == s) => Ok(()),
            Value::String(s) => Err(Error::InvalidEnumValue(s.clone())),
            other => Err(Error::InvalidEnumValue(format!("{:?}", other))),
        }
    }
}

/// Metadata for an entity type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityModel {
    /// Entity name used in XQL `from`/`join`
    name: String,

    /// Class name of the declaring type
    class_name: String,

    /// Table name
    table_name: String,

    /// Properties in declaration order
    properties: Vec<PropertyModel>,

    /// Property index by name
    by_name: HashMap<String, usize>,

    /// Property index by column name
    by_field: HashMap<String, usize>,

    /// Primary key property names in declaration order
    primary_keys: Vec<String>,

    /// True if any property needs resolution after loading
    unresolved: bool,
}

impl EntityModel {
    /// Create an entity model with the given name and table
    pub fn new(name: &str, table_name: &str) -> Self {
        Self {
            name: name.to_string(),
            class_name: name.to_string(),
            table_name: table_name.to_string(),
            properties: Vec::new(),
            by_name: HashMap::new(),
            by_field: HashMap::new(),
            primary_keys: Vec::new(),
            unresolved: false,
        }
    }

    /// Builder: set the class name
    pub fn class(mut self, class_name: &str) -> Self {
        self.class_name = class_name.to_string();
        self
    }

    /// Builder: add a property
    pub fn property(mut self, property: PropertyModel) -> Self {
        let index = self.properties.len();
        if property.primary_key {
            self.primary_keys.push(property.name.clone());
        }
        if property.is_expandable() {
            self.unresolved = true;
        } else {
            self.by_field.insert(property.field_name.clone(), index);
        }
        self.by_name.insert(property.name.clone(), index);
        self.properties.push(property);
        self
    }

    /// Entity name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Class name
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Table name
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Properties in declaration order
    pub fn properties(&self) -> &[PropertyModel] {
        &self.properties
    }

    /// Look up a property by name
    pub fn get(&self, name: &str) -> Option<&PropertyModel> {
        self.by_name.get(name).map(|&i| &self.properties[i])
    }

    /// Look up a property by column name
    pub fn get_by_field(&self, field_name: &str) -> Option<&PropertyModel> {
        self.by_field.get(field_name).map(|&i| &self.properties[i])
    }

    /// Look up a property by name, failing with `UnknownEntityProperty`
    pub fn require(&self, name: &str) -> Result<&PropertyModel> {
        self.get(name)
            .ok_or_else(|| Error::unknown_property(&self.name, name))
    }

    /// Column name of a non-relation property
    pub fn column(&self, name: &str) -> Result<&str> {
        match self.require(name)? {
            p if p.is_expandable() => Err(Error::unknown_property(&self.name, name)),
            p => Ok(p.field_name.as_str()),
        }
    }

    /// Primary key property names
    pub fn primary_keys(&self) -> &[String] {
        &self.primary_keys
    }

    /// Relation declared on a property
    pub fn relation(&self, property: &str) -> Option<&RelationModel> {
        self.get(property).and_then(|p| p.relation.as_ref())
    }

    /// Properties loaded from rows
    pub fn readable(&self) -> impl Iterator<Item = &PropertyModel> {
        self.properties.iter().filter(|p| p.access.is_readable())
    }

    /// Properties written on insert/update
    pub fn writable(&self) -> impl Iterator<Item = &PropertyModel> {
        self.properties.iter().filter(|p| p.access.is_writable())
    }

    /// True if loaded instances need relation resolution
    pub fn is_unresolved(&self) -> bool {
        self.unresolved
    }

    /// Override the resolution hint once relation wiring is known
    pub fn set_unresolved(&mut self, unresolved: bool) {
        self.unresolved = unresolved;
    }
}
