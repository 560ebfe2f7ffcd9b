//! SQL generation
//!
//! Turns a bound [`QueryModel`] into a `SELECT` statement with positional
//! `?` parameters, and entities into write statements.

use crate::lexer::{Token, TokenType};
use crate::model::QueryModel;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use xql_core::{Entity, EntityModel, EntityRegistry, Error, Result, Value};

/// SQL text with its positional parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Statement synthesis
pub trait Generator {
    /// Select every loaded alias of a query
    fn select(&self, query: &QueryModel) -> Result<SqlStatement>;

    /// Select the rows of `target` whose `foreign_property` is one of `keys`
    fn select_related(
        &self,
        target: &EntityModel,
        foreign_property: &str,
        keys: &[Value],
    ) -> Result<SqlStatement>;

    fn insert(&self, entity: &Entity) -> Result<SqlStatement>;

    fn update(&self, entity: &Entity) -> Result<SqlStatement>;

    fn delete(&self, entity: &Entity) -> Result<SqlStatement>;
}

/// Generator for ANSI-style SQL
#[derive(Debug, Clone)]
pub struct SqlGenerator<'a> {
    registry: &'a EntityRegistry,
    separator: &'a str,
}

impl<'a> SqlGenerator<'a> {
    pub fn new(registry: &'a EntityRegistry, separator: &'a str) -> Self {
        Self {
            registry,
            separator,
        }
    }

    /// Column label of a property in a select result
    pub fn label(&self, alias: &str, property: &str) -> String {
        format!("{}{}{}", alias, self.separator, property)
    }

    fn model(&self, query: &QueryModel, alias: &str) -> Result<Arc<EntityModel>> {
        self.registry.get(query.entity_for_alias(alias)?)
    }

    fn column(&self, query: &QueryModel, alias: &str, property: &str) -> Result<String> {
        let model = self.model(query, alias)?;
        Ok(format!("{}.{}", alias, model.column(property)?))
    }

    fn translate_where(
        &self,
        query: &QueryModel,
        sql: &mut SqlBuilder,
        params: &mut Vec<Value>,
    ) -> Result<()> {
        let tokens = &query.where_model().tokens;
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            match token.kind {
                TokenType::Alias => {
                    let property = tokens
                        .get(i + 1)
                        .filter(|t| t.kind == TokenType::Property)
                        .ok_or(Error::SyntaxError(token.position))?;
                    sql.push(&self.column(query, &token.text, &property.text)?);
                    i += 1;
                }
                TokenType::OpEq | TokenType::OpNe
                    if tokens.get(i + 1).is_some_and(|t| t.kind == TokenType::Null) =>
                {
                    sql.push(if token.kind == TokenType::OpEq {
                        "IS NULL"
                    } else {
                        "IS NOT NULL"
                    });
                    i += 1;
                }
                TokenType::Parameter => {
                    let value = query
                        .parameters()
                        .get(&token.text)
                        .and_then(|p| p.value.clone())
                        .ok_or_else(|| Error::UnboundParameter(token.text.clone()))?;
                    sql.push("?");
                    params.push(value);
                }
                kind if kind.is_literal() => match token.value() {
                    Some(Value::Null) => sql.push("NULL"),
                    Some(value) => {
                        sql.push("?");
                        params.push(value);
                    }
                    None => return Err(unexpected(token)),
                },
                kind => sql.push(operator(kind).ok_or_else(|| unexpected(token))?),
            }
            i += 1;
        }
        Ok(())
    }

    fn key_condition(&self, model: &EntityModel, entity: &Entity) -> Result<(String, Vec<Value>)> {
        let keys = entity.primary_key()?;
        if keys.is_empty() {
            return Err(Error::PrimaryKeyIsNull);
        }
        let conditions = model
            .primary_keys()
            .iter()
            .map(|name| Ok(format!("{} = ?", model.column(name)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok((conditions.join(" AND "), keys))
    }
}

impl Generator for SqlGenerator<'_> {
    fn select(&self, query: &QueryModel) -> Result<SqlStatement> {
        let mut params = Vec::new();

        let mut columns = Vec::new();
        for alias in query.loaded_aliases() {
            let model = self.model(query, alias)?;
            for property in model.readable() {
                columns.push(format!(
                    "{}.{} AS {}",
                    alias,
                    property.field_name,
                    self.label(alias, &property.name)
                ));
            }
        }
        if columns.is_empty() {
            return Err(Error::UnsupportedFeature("select without columns".to_string()));
        }

        let mut tables = Vec::new();
        for from in query.froms() {
            let model = self.registry.get(&from.entity)?;
            tables.push(format!("{} {}", model.table_name(), from.alias));
        }

        let mut sql = SqlBuilder::new();
        sql.push("SELECT");
        sql.push(&columns.join(", "));
        sql.push("FROM");
        sql.push(&tables.join(", "));

        for join in query.joins() {
            let model = self.registry.get(&join.entity)?;
            sql.push(join.kind.sql());
            sql.push(&format!("{} {}", model.table_name(), join.join_alias));
            sql.push("ON");
            sql.push(&self.column(query, &join.join_alias, &join.join_property)?);
            sql.push("=");
            sql.push(&self.column(query, &join.source_alias, &join.source_property)?);
        }

        let filters: Vec<_> = query.filters().iter().filter(|f| f.value.is_some()).collect();
        if !query.where_model().is_empty() || !filters.is_empty() {
            sql.push("WHERE");
        }
        if !query.where_model().is_empty() {
            if filters.is_empty() {
                self.translate_where(query, &mut sql, &mut params)?;
            } else {
                sql.push("(");
                self.translate_where(query, &mut sql, &mut params)?;
                sql.push(")");
            }
        }
        for (n, filter) in filters.iter().enumerate() {
            if n > 0 || !query.where_model().is_empty() {
                sql.push("AND");
            }
            let column = self.column(query, &filter.alias, &filter.property)?;
            match &filter.value {
                Some(Value::Array(values)) if values.is_empty() => sql.push("1 = 0"),
                Some(Value::Array(values)) => {
                    sql.push(&format!("{} IN ({})", column, placeholders(values.len())));
                    params.extend(values.iter().cloned());
                }
                Some(Value::Null) | None => sql.push(&format!("{} IS NULL", column)),
                Some(value) => {
                    sql.push(&format!("{} = ?", column));
                    params.push(value.clone());
                }
            }
        }

        if !query.orders().is_empty() {
            let orders = query
                .orders()
                .iter()
                .map(|o| {
                    let column = self.column(query, &o.alias, &o.property)?;
                    Ok(format!("{} {}", column, o.direction.sql()))
                })
                .collect::<Result<Vec<_>>>()?;
            sql.push("ORDER BY");
            sql.push(&orders.join(", "));
        }

        Ok(SqlStatement {
            sql: sql.finish(),
            params,
        })
    }

    fn select_related(
        &self,
        target: &EntityModel,
        foreign_property: &str,
        keys: &[Value],
    ) -> Result<SqlStatement> {
        let columns: Vec<_> = target.readable().map(|p| p.field_name.as_str()).collect();
        let column = target.column(foreign_property)?;
        let condition = match keys {
            [] => return Err(Error::Internal("related select without keys".to_string())),
            [_] => format!("{} = ?", column),
            _ => format!("{} IN ({})", column, placeholders(keys.len())),
        };
        Ok(SqlStatement {
            sql: format!(
                "SELECT {} FROM {} WHERE {}",
                columns.join(", "),
                target.table_name(),
                condition
            ),
            params: keys.to_vec(),
        })
    }

    fn insert(&self, entity: &Entity) -> Result<SqlStatement> {
        let model = entity.model();
        let mut columns = Vec::new();
        let mut params = Vec::new();
        for property in model.writable() {
            match entity.get(&property.name) {
                Some(value) if property.primary_key && value.is_null() => {}
                None if property.primary_key => {}
                value => {
                    columns.push(property.field_name.as_str());
                    params.push(value.cloned().unwrap_or_default());
                }
            }
        }
        Ok(SqlStatement {
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({})",
                model.table_name(),
                columns.join(", "),
                placeholders(columns.len())
            ),
            params,
        })
    }

    fn update(&self, entity: &Entity) -> Result<SqlStatement> {
        let model = entity.model();
        let (condition, keys) = self.key_condition(model, entity)?;
        let mut assignments = Vec::new();
        let mut params = Vec::new();
        for property in model.writable().filter(|p| !p.primary_key) {
            if let Some(value) = entity.get(&property.name) {
                assignments.push(format!("{} = ?", property.field_name));
                params.push(value.clone());
            }
        }
        if assignments.is_empty() {
            return Err(Error::UnsupportedFeature(format!(
                "update of {} without writable values",
                model.name()
            )));
        }
        params.extend(keys);
        Ok(SqlStatement {
            sql: format!(
                "UPDATE {} SET {} WHERE {}",
                model.table_name(),
                assignments.join(", "),
                condition
            ),
            params,
        })
    }

    fn delete(&self, entity: &Entity) -> Result<SqlStatement> {
        let model = entity.model();
        let (condition, params) = self.key_condition(model, entity)?;
        Ok(SqlStatement {
            sql: format!("DELETE FROM {} WHERE {}", model.table_name(), condition),
            params,
        })
    }
}

/// Space-separated SQL text that keeps brackets tight
#[derive(Debug, Default)]
struct SqlBuilder {
    text: String,
}

impl SqlBuilder {
    fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, piece: &str) {
        if !self.text.is_empty() && !self.text.ends_with('(') && piece != ")" {
            self.text.push(' ');
        }
        self.text.push_str(piece);
    }

    fn finish(self) -> String {
        self.text
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn operator(kind: TokenType) -> Option<&'static str> {
    let sql = match kind {
        TokenType::OpAdd => "+",
        TokenType::OpSub => "-",
        TokenType::OpMul => "*",
        TokenType::OpDiv => "/",
        TokenType::OpMod => "%",
        TokenType::OpAnd => "AND",
        TokenType::OpOr => "OR",
        TokenType::OpNot => "NOT",
        TokenType::OpEq => "=",
        TokenType::OpNe => "<>",
        TokenType::OpGt => ">",
        TokenType::OpGe => ">=",
        TokenType::OpLt => "<",
        TokenType::OpLe => "<=",
        TokenType::OpLike => "LIKE",
        TokenType::SpOpen => "(",
        TokenType::SpClose => ")",
        _ => return None,
    };
    Some(sql)
}

fn unexpected(token: &Token) -> Error {
    Error::Internal(format!("unexpected token {} in where clause", token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResolveType;
    use xql_core::{PropertyModel, RelationModel};

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

    fn select(registry: &EntityRegistry, query: &QueryModel) -> SqlStatement {
        SqlGenerator::new(registry, "__").select(query).unwrap()
    }

    #[test]
    fn test_simple_select() {
        let registry = registry();
        let query = QueryModel::parse("p from projects p").unwrap();
        assert_eq!(
            select(&registry, &query).sql,
            "SELECT p.id AS p__id, p.user_id AS p__userId, p.title AS p__title FROM project p"
        );
    }

    #[test]
    fn test_join_where_order() {
        let registry = registry();
        let mut query = QueryModel::parse(
            "p, u from projects p left join users u on p.userId = u.id \
             where (p.title %% 'A%' || u.name != null) && p.id >= :min order by u.name desc, p.id",
        )
        .unwrap();
        query.set_parameter("min", 10).unwrap();

        let statement = select(&registry, &query);
        assert_eq!(
            statement.sql,
            "SELECT p.id AS p__id, p.user_id AS p__userId, p.title AS p__title, \
             u.id AS u__id, u.name AS u__name FROM project p \
             LEFT JOIN user u ON u.id = p.user_id \
             WHERE (p.title LIKE ? OR u.name IS NOT NULL) AND p.id >= ? \
             ORDER BY u.name DESC, p.id ASC"
        );
        assert_eq!(statement.params, vec![Value::from("A%"), Value::Integer(10)]);
    }

    #[test]
    fn test_literals() {
        let registry = registry();
        let query =
            QueryModel::parse("p from projects p where (p.id > 3) == true or null == p.title")
                .unwrap();

        let statement = select(&registry, &query);
        assert!(statement.sql.ends_with("WHERE (p.id > ?) = ? OR NULL = p.title"));
        assert_eq!(statement.params, vec![Value::Integer(3), Value::Boolean(true)]);
    }

    #[test]
    fn test_unbound_parameter() {
        let registry = registry();
        let query = QueryModel::parse("p from projects p where p.id == :id").unwrap();
        assert_eq!(
            SqlGenerator::new(&registry, "__").select(&query).unwrap_err(),
            Error::UnboundParameter("id".to_string())
        );
    }

    #[test]
    fn test_filters() {
        let registry = registry();
        let mut query = QueryModel::parse(
            "p from projects p where p.id > 1 filter by p.title, p.userId, p.id",
        )
        .unwrap();
        query.set_filter("p", "title", "Alpha").unwrap();
        query.set_filter("p", "userId", vec![1, 2]).unwrap();

        let statement = select(&registry, &query);
        assert!(statement.sql.ends_with(
            "FROM project p WHERE (p.id > ?) AND p.title = ? AND p.user_id IN (?, ?)"
        ));
        assert_eq!(statement.params.len(), 4);
    }

    #[test]
    fn test_eager_join_columns_are_loaded() {
        let registry = registry();
        let mut query =
            QueryModel::parse("p from projects p left join users u on p.userId = u.id").unwrap();
        query.with("p", "owner", ResolveType::Eager).unwrap();
        query.bind(&registry).unwrap();
        assert!(select(&registry, &query).sql.contains("u.name AS u__name"));
    }

    #[test]
    fn test_select_related() {
        let registry = registry();
        let users = registry.get("users").unwrap();
        let generator = SqlGenerator::new(&registry, "__");

        let single = generator.select_related(&users, "id", &[Value::Integer(1)]).unwrap();
        assert_eq!(single.sql, "SELECT id, name FROM user WHERE id = ?");

        let batch = generator
            .select_related(&users, "id", &[Value::Integer(1), Value::Integer(2)])
            .unwrap();
        assert_eq!(batch.sql, "SELECT id, name FROM user WHERE id IN (?, ?)");
        assert_eq!(batch.params.len(), 2);
    }

    #[test]
    fn test_write_statements() {
        let registry = registry();
        let generator = SqlGenerator::new(&registry, "__");
        let users = registry.get("users").unwrap();

        let fresh = Entity::new(users.clone()).with("name", "Ada").unwrap();
        assert_eq!(
            generator.insert(&fresh).unwrap().sql,
            "INSERT INTO user (name) VALUES (?)"
        );
        assert_eq!(generator.update(&fresh).unwrap_err(), Error::PrimaryKeyIsNull);
        assert_eq!(generator.delete(&fresh).unwrap_err(), Error::PrimaryKeyIsNull);

        let stored = fresh.with("id", 7).unwrap();
        let update = generator.update(&stored).unwrap();
        assert_eq!(update.sql, "UPDATE user SET name = ? WHERE id = ?");
        assert_eq!(update.params, vec![Value::from("Ada"), Value::Integer(7)]);
        assert_eq!(
            generator.delete(&stored).unwrap().sql,
            "DELETE FROM user WHERE id = ?"
        );
    }
}
