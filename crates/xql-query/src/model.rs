//! Query model
//!
//! The structured form of a parsed XQL statement. Phase parsers append to it;
//! callers then attach `with` relations, parameter values and filter values.

use crate::lexer::{Token, TokenType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use xql_core::{EntityRegistry, Error, RelationKind, RelationModel, Result, Value};

/// An alias selected before `from`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasModel {
    pub alias: String,
}

/// An entity named in the `from` clause
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FromModel {
    pub entity: String,
    pub alias: String,
}

/// Join kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinKind {
    Left,
    Right,
    Inner,
    Outer,
}

impl JoinKind {
    /// SQL join keyword
    pub fn sql(self) -> &'static str {
        match self {
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Outer => "FULL OUTER JOIN",
        }
    }
}

/// A join, normalized so the joined side is the entity named after `join`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinModel {
    pub kind: JoinKind,
    pub entity: String,
    pub join_alias: String,
    pub join_property: String,
    pub source_alias: String,
    pub source_property: String,
}

/// The `where` expression as an unevaluated token stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhereModel {
    pub tokens: Vec<Token>,
}

impl WhereModel {
    /// True if the query has no `where` clause
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Aliases referenced by the expression
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.tokens
            .iter()
            .filter(|t| t.kind == TokenType::Alias)
            .map(|t| t.text.as_str())
    }
}

/// A late-bound filter slot declared by `filter by`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterModel {
    pub alias: String,
    pub property: String,

    /// Runtime value; unset slots do not restrict the query
    pub value: Option<Value>,
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    /// SQL keyword
    pub fn sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// An `order by` item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderModel {
    pub alias: String,
    pub property: String,
    pub direction: Direction,
}

/// Relation resolution timing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolveType {
    /// Fetched on first read
    Lazy,
    /// Fetched right after the primary rows
    Eager,
}

/// A relation requested through [`QueryModel::with`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithModel {
    pub alias: String,
    pub property: String,
    pub resolve_type: ResolveType,

    /// Relation declaration, filled in by [`QueryModel::bind`]
    pub relation: Option<RelationModel>,
}

/// A named `:parameter` of the `where` clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterModel {
    pub name: String,
    pub value: Option<Value>,
}

/// A parsed XQL statement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryModel {
    xql: String,
    aliases: Vec<AliasModel>,
    froms: Vec<FromModel>,
    joins: Vec<JoinModel>,
    where_model: WhereModel,
    filters: Vec<FilterModel>,
    orders: Vec<OrderModel>,
    withs: Vec<WithModel>,
    parameters: BTreeMap<String, ParameterModel>,
}

impl QueryModel {
    /// Parse an XQL statement
    pub fn parse(xql: &str) -> Result<Self> {
        crate::parser::parse(xql)
    }

    pub(crate) fn new(xql: &str) -> Self {
        Self {
            xql: xql.to_string(),
            ..Default::default()
        }
    }

    // ========== Accessors ==========

    /// Source text
    pub fn xql(&self) -> &str {
        &self.xql
    }

    /// Selected aliases
    pub fn aliases(&self) -> &[AliasModel] {
        &self.aliases
    }

    /// `from` entities
    pub fn froms(&self) -> &[FromModel] {
        &self.froms
    }

    /// Joins in source order
    pub fn joins(&self) -> &[JoinModel] {
        &self.joins
    }

    /// `where` expression
    pub fn where_model(&self) -> &WhereModel {
        &self.where_model
    }

    /// Filter slots
    pub fn filters(&self) -> &[FilterModel] {
        &self.filters
    }

    /// Order items
    pub fn orders(&self) -> &[OrderModel] {
        &self.orders
    }

    /// Requested relations in declaration order
    pub fn withs(&self) -> &[WithModel] {
        &self.withs
    }

    /// Parameters by name
    pub fn parameters(&self) -> &BTreeMap<String, ParameterModel> {
        &self.parameters
    }

    /// Alias of the first `from` entity
    pub fn root_alias(&self) -> Option<&str> {
        self.froms.first().map(|f| f.alias.as_str())
    }

    /// Aliases introduced by `from` and `join`
    pub fn declared_aliases(&self) -> impl Iterator<Item = &str> {
        self.froms
            .iter()
            .map(|f| f.alias.as_str())
            .chain(self.joins.iter().map(|j| j.join_alias.as_str()))
    }

    /// Aliases whose entities are loaded: the selected ones, or all declared
    pub fn selected_aliases(&self) -> Vec<&str> {
        if self.aliases.is_empty() {
            self.declared_aliases().collect()
        } else {
            self.aliases.iter().map(|a| a.alias.as_str()).collect()
        }
    }

    /// True if the alias is introduced by `from` or `join`
    pub fn has_alias(&self, alias: &str) -> bool {
        self.declared_aliases().any(|a| a == alias)
    }

    /// Entity name behind an alias
    pub fn entity_for_alias(&self, alias: &str) -> Result<&str> {
        self.froms
            .iter()
            .find(|f| f.alias == alias)
            .map(|f| f.entity.as_str())
            .or_else(|| {
                self.joins
                    .iter()
                    .find(|j| j.join_alias == alias)
                    .map(|j| j.entity.as_str())
            })
            .ok_or_else(|| Error::UnknownEntityAlias(alias.to_string()))
    }

    /// Join that introduced an alias
    pub fn join_for_alias(&self, alias: &str) -> Option<&JoinModel> {
        self.joins.iter().find(|j| j.join_alias == alias)
    }

    /// Alias already joined to `alias` along `relation`, if the query has such a join
    pub fn linked_alias(&self, alias: &str, relation: &RelationModel) -> Option<&str> {
        self.joins.iter().find_map(|join| {
            if join.source_alias == alias
                && join.source_property == relation.local_property
                && join.entity == relation.target
                && join.join_property == relation.foreign_property
            {
                return Some(join.join_alias.as_str());
            }
            let source_entity = self.entity_for_alias(&join.source_alias).ok()?;
            if join.join_alias == alias
                && join.join_property == relation.local_property
                && source_entity == relation.target
                && join.source_property == relation.foreign_property
            {
                return Some(join.source_alias.as_str());
            }
            None
        })
    }

    /// True if a row carries several independent entities.
    ///
    /// Each EAGER many-to-one relation folds one alias into its owner; the
    /// result is multi-entity when aliases beyond the root remain unfolded.
    pub fn is_multi_entity(&self) -> bool {
        let folded = self
            .withs
            .iter()
            .filter(|w| w.resolve_type == ResolveType::Eager)
            .filter(|w| {
                w.relation
                    .as_ref()
                    .is_some_and(|r| r.kind == RelationKind::ManyToOne)
            })
            .count();
        self.selected_aliases().len().saturating_sub(1) > folded
    }

    /// Selected aliases plus aliases joined in for EAGER relations
    pub fn loaded_aliases(&self) -> Vec<&str> {
        let mut aliases = self.selected_aliases();
        for with in &self.withs {
            if with.resolve_type != ResolveType::Eager {
                continue;
            }
            let linked = with
                .relation
                .as_ref()
                .and_then(|relation| self.linked_alias(&with.alias, relation));
            if let Some(linked) = linked {
                if !aliases.contains(&linked) {
                    aliases.push(linked);
                }
            }
        }
        aliases
    }

    // ========== Caller API ==========

    /// Request resolution of a relation property on an alias
    pub fn with(
        &mut self,
        alias: &str,
        property: &str,
        resolve_type: ResolveType,
    ) -> Result<&mut Self> {
        if !self.has_alias(alias) {
            return Err(Error::UnknownEntityAlias(alias.to_string()));
        }
        self.withs.push(WithModel {
            alias: alias.to_string(),
            property: property.to_string(),
            resolve_type,
            relation: None,
        });
        Ok(self)
    }

    /// Bind a value to a `:parameter`
    pub fn set_parameter<V: Into<Value>>(&mut self, name: &str, value: V) -> Result<&mut Self> {
        let parameter = self
            .parameters
            .get_mut(name)
            .ok_or_else(|| Error::UnboundParameter(name.to_string()))?;
        parameter.value = Some(value.into());
        Ok(self)
    }

    /// Set the runtime value of a declared filter slot
    pub fn set_filter<V: Into<Value>>(
        &mut self,
        alias: &str,
        property: &str,
        value: V,
    ) -> Result<&mut Self> {
        let filter = self
            .filters
            .iter_mut()
            .find(|f| f.alias == alias && f.property == property)
            .ok_or_else(|| Error::unknown_property(alias, property))?;
        filter.value = Some(value.into());
        Ok(self)
    }

    /// Check entities, properties and requested relations against the registry
    pub fn bind(&mut self, registry: &EntityRegistry) -> Result<()> {
        for from in &self.froms {
            registry.get(&from.entity)?;
        }

        for join in &self.joins {
            registry.get(&join.entity)?.column(&join.join_property)?;
            let source = registry.get(self.entity_for_alias(&join.source_alias)?)?;
            source.column(&join.source_property)?;
        }

        let mut references: Vec<(&str, &str)> = Vec::new();
        let tokens = &self.where_model.tokens;
        for pair in tokens.windows(2) {
            if pair[0].kind == TokenType::Alias && pair[1].kind == TokenType::Property {
                references.push((pair[0].text.as_str(), pair[1].text.as_str()));
            }
        }
        references.extend(self.filters.iter().map(|f| (f.alias.as_str(), f.property.as_str())));
        references.extend(self.orders.iter().map(|o| (o.alias.as_str(), o.property.as_str())));
        for (alias, property) in references {
            registry.get(self.entity_for_alias(alias)?)?.column(property)?;
        }

        let mut bound = Vec::with_capacity(self.withs.len());
        for with in &self.withs {
            let entity = self.entity_for_alias(&with.alias)?;
            let relation = registry
                .get(entity)?
                .relation(&with.property)
                .cloned()
                .ok_or_else(|| Error::UnresolvedLink {
                    from: entity.to_string(),
                    to: with.property.clone(),
                })?;
            registry
                .get(&relation.target)
                .map_err(|_| Error::UnresolvedLink {
                    from: entity.to_string(),
                    to: relation.target.clone(),
                })?;
            bound.push(relation);
        }
        for (with, relation) in self.withs.iter_mut().zip(bound) {
            with.relation = Some(relation);
        }

        debug!("Bound query with {} relation(s)", self.withs.len());
        Ok(())
    }

    // ========== Parser API ==========

    pub(crate) fn add_alias(&mut self, alias: &str) {
        self.aliases.push(AliasModel {
            alias: alias.to_string(),
        });
    }

    pub(crate) fn add_from(&mut self, entity: &str, alias: &str) {
        self.froms.push(FromModel {
            entity: entity.to_string(),
            alias: alias.to_string(),
        });
    }

    pub(crate) fn add_join(&mut self, join: JoinModel) {
        self.joins.push(join);
    }

    pub(crate) fn push_where_token(&mut self, token: Token) {
        if token.kind == TokenType::Parameter {
            self.parameters
                .entry(token.text.clone())
                .or_insert_with(|| ParameterModel {
                    name: token.text.clone(),
                    value: None,
                });
        }
        self.where_model.tokens.push(token);
    }

    pub(crate) fn add_filter(&mut self, alias: &str, property: &str) {
        self.filters.push(FilterModel {
            alias: alias.to_string(),
            property: property.to_string(),
            value: None,
        });
    }

    pub(crate) fn add_order(&mut self, alias: &str, property: &str) {
        self.orders.push(OrderModel {
            alias: alias.to_string(),
            property: property.to_string(),
            direction: Direction::Asc,
        });
    }

    pub(crate) fn set_last_order_direction(&mut self, direction: Direction) {
        if let Some(order) = self.orders.last_mut() {
            order.direction = direction;
        }
    }

    /// Every referenced alias must be introduced by `from` or `join`
    pub(crate) fn validate_aliases(&self) -> Result<()> {
        let referenced = self
            .aliases
            .iter()
            .map(|a| a.alias.as_str())
            .chain(self.joins.iter().map(|j| j.source_alias.as_str()))
            .chain(self.where_model.aliases())
            .chain(self.filters.iter().map(|f| f.alias.as_str()))
            .chain(self.orders.iter().map(|o| o.alias.as_str()));

        for alias in referenced {
            if !self.has_alias(alias) {
                return Err(Error::UnknownEntityAlias(alias.to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xql_core::{EntityModel, PropertyModel};

    fn registry() -> EntityRegistry {
        EntityRegistry::new()
            .with(
                EntityModel::new("projects", "project")
                    .property(PropertyModel::new("id").primary_key())
                    .property(PropertyModel::new("userId").field("user_id"))
                    .property(PropertyModel::new("title"))
                    .property(PropertyModel::relation(
                        "owner",
                        RelationModel::many_to_one("users", "userId", "id"),
                    )),
            )
            .unwrap()
            .with(
                EntityModel::new("users", "user")
                    .property(PropertyModel::new("id").primary_key())
                    .property(PropertyModel::new("name")),
            )
            .unwrap()
    }

    #[test]
    fn test_entity_for_alias() {
        let query = QueryModel::parse("p, u from projects p left join users u on p.userId = u.id")
            .unwrap();
        assert_eq!(query.entity_for_alias("p").unwrap(), "projects");
        assert_eq!(query.entity_for_alias("u").unwrap(), "users");
        assert_eq!(
            query.entity_for_alias("x").unwrap_err(),
            Error::UnknownEntityAlias("x".to_string())
        );
        assert_eq!(query.root_alias(), Some("p"));
    }

    #[test]
    fn test_with_requires_known_alias() {
        let mut query = QueryModel::parse("p from projects p").unwrap();
        assert!(query.with("p", "owner", ResolveType::Eager).is_ok());
        assert_eq!(
            query.with("q", "owner", ResolveType::Lazy).unwrap_err(),
            Error::UnknownEntityAlias("q".to_string())
        );
        assert_eq!(query.withs().len(), 1);
    }

    #[test]
    fn test_parameters_and_filters() {
        let mut query =
            QueryModel::parse("p from projects p where p.id == :id filter by p.title").unwrap();

        assert!(query.parameters().contains_key("id"));
        query.set_parameter("id", 5).unwrap();
        assert_eq!(query.parameters()["id"].value, Some(Value::Integer(5)));
        assert_eq!(
            query.set_parameter("other", 1).unwrap_err(),
            Error::UnboundParameter("other".to_string())
        );

        query.set_filter("p", "title", "Alpha").unwrap();
        assert_eq!(query.filters()[0].value, Some(Value::from("Alpha")));
        assert!(query.set_filter("p", "id", 1).is_err());
    }

    #[test]
    fn test_bind_resolves_relations() {
        let registry = registry();
        let mut query = QueryModel::parse("p from projects p order by p.title").unwrap();
        query.with("p", "owner", ResolveType::Eager).unwrap();
        query.bind(&registry).unwrap();

        let relation = query.withs()[0].relation.as_ref().unwrap();
        assert_eq!(relation.kind, RelationKind::ManyToOne);
        assert_eq!(relation.target, "users");
    }

    #[test]
    fn test_bind_rejects_unknown_names() {
        let registry = registry();

        let mut query = QueryModel::parse("p from projects p").unwrap();
        query.with("p", "tasks", ResolveType::Eager).unwrap();
        assert_eq!(
            query.bind(&registry).unwrap_err(),
            Error::UnresolvedLink {
                from: "projects".to_string(),
                to: "tasks".to_string()
            }
        );

        let mut query = QueryModel::parse("t from tasks t").unwrap();
        assert_eq!(
            query.bind(&registry).unwrap_err(),
            Error::UnknownEntity("tasks".to_string())
        );

        let mut query = QueryModel::parse("p from projects p where p.budget > 10").unwrap();
        assert_eq!(
            query.bind(&registry).unwrap_err(),
            Error::unknown_property("projects", "budget")
        );
    }

    #[test]
    fn test_multi_entity() {
        let registry = registry();

        let query = QueryModel::parse("p from projects p").unwrap();
        assert!(!query.is_multi_entity());

        let mut query =
            QueryModel::parse("p, u from projects p left join users u on p.userId = u.id").unwrap();
        assert!(query.is_multi_entity());

        query.with("p", "owner", ResolveType::Eager).unwrap();
        query.bind(&registry).unwrap();
        assert!(!query.is_multi_entity());
        assert_eq!(
            query.linked_alias("p", query.withs()[0].relation.as_ref().unwrap()),
            Some("u")
        );
    }

    #[test]
    fn test_lazy_relation_does_not_fold() {
        let registry = registry();
        let mut query =
            QueryModel::parse("p, u from projects p left join users u on p.userId = u.id").unwrap();
        query.with("p", "owner", ResolveType::Lazy).unwrap();
        query.bind(&registry).unwrap();
        assert!(query.is_multi_entity());
    }

    #[test]
    fn test_loaded_aliases_include_eager_joins() {
        let registry = registry();
        let mut query =
            QueryModel::parse("p from projects p left join users u on u.id = p.userId").unwrap();
        assert_eq!(query.loaded_aliases(), vec!["p"]);

        query.with("p", "owner", ResolveType::Eager).unwrap();
        query.bind(&registry).unwrap();
        assert_eq!(query.loaded_aliases(), vec!["p", "u"]);
        assert_eq!(query.selected_aliases(), vec!["p"]);
    }
}
