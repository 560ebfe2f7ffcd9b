//! Property tests for alias handling and bracket balance

use proptest::prelude::*;
use xql_core::Error;
use xql_query::QueryModel;

const KEYWORDS: &[&str] = &[
    "from", "join", "where", "filter", "order", "by", "left", "right", "inner", "outer", "asc",
    "ascending", "desc", "descending", "on", "and", "or", "not", "like", "null", "true", "false",
];

fn identifier() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,8}".prop_filter("keyword", |s| !KEYWORDS.contains(&s.as_str()))
}

/// A balanced expression over `p.id` and integer constants
fn expression() -> impl Strategy<Value = String> {
    let leaf = (0i64..100).prop_map(|n| format!("p.id > {}", n));
    leaf.prop_recursive(4, 16, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("{} and {}", a, b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("({} or {})", a, b)),
            inner.prop_map(|a| format!("not ({})", a)),
        ]
    })
}

proptest! {
    /// Without an alias the entity name is its own alias
    #[test]
    fn from_alias_defaults_to_entity(entity in identifier()) {
        let query = QueryModel::parse(&format!("from {}", entity)).unwrap();
        prop_assert_eq!(query.froms().len(), 1);
        prop_assert_eq!(&query.froms()[0].alias, &entity);
        prop_assert_eq!(&query.froms()[0].entity, &entity);
    }

    /// An explicit alias is kept
    #[test]
    fn from_alias_is_kept(entity in identifier(), alias in identifier()) {
        let query = QueryModel::parse(&format!("{} from {} {}", alias, entity, alias)).unwrap();
        prop_assert_eq!(&query.froms()[0].alias, &alias);
        prop_assert_eq!(query.selected_aliases(), vec![alias.as_str()]);
    }

    /// Balanced expressions parse and reference only declared aliases
    #[test]
    fn balanced_brackets_parse(expr in expression()) {
        let query = QueryModel::parse(&format!("p from projects p where {}", expr)).unwrap();
        prop_assert!(query.where_model().aliases().all(|a| a == "p"));
    }

    /// A dropped closing bracket is reported at an opening bracket
    #[test]
    fn missing_close_is_unpaired(expr in expression()) {
        let xql = format!("p from projects p where ({}", expr);
        match QueryModel::parse(&xql) {
            Err(Error::UnpairedBracket(pos)) => prop_assert_eq!(&xql[pos..pos + 1], "("),
            other => prop_assert!(false, "unexpected result {:?}", other),
        }
    }

    /// An extra closing bracket is reported at its own position
    #[test]
    fn extra_close_is_unpaired(expr in expression()) {
        let xql = format!("p from projects p where {})", expr);
        prop_assert_eq!(
            QueryModel::parse(&xql).unwrap_err(),
            Error::UnpairedBracket(xql.len() - 1)
        );
    }

    /// References to undeclared aliases never survive parsing
    #[test]
    fn undeclared_alias_is_rejected(alias in identifier()) {
        prop_assume!(alias != "p");
        let xql = format!("p from projects p where {}.id == 1", alias);
        prop_assert_eq!(QueryModel::parse(&xql).unwrap_err(), Error::UnknownEntityAlias(alias));
    }
}
