//! Filter phase: `filter by a.x, b.y`

use super::{Matrix, PhaseParser, State, Step};
use crate::lexer::TokenType;
use crate::model::QueryModel;
use std::sync::LazyLock;
use xql_core::Result;

static MATRIX: LazyLock<Matrix> = LazyLock::new(|| {
    Matrix::new(&[
        (State::S00, &[TokenType::KwFilter], State::S01),
        (State::S01, &[TokenType::KwBy], State::S02),
        (State::S02, &[TokenType::Unknown], State::S03),
        (State::S03, &[TokenType::SpDot], State::S04),
        (State::S04, &[TokenType::Unknown], State::S05),
        (State::S05, &[TokenType::SpComma], State::S02),
        (State::S05, &[TokenType::KwOrder, TokenType::Stop], State::Stop),
    ])
});

/// Declares the runtime filter slots
#[derive(Debug, Default)]
pub struct FilterParser {
    alias: String,
}

impl FilterParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PhaseParser for FilterParser {
    fn matrix(&self) -> &Matrix {
        &MATRIX
    }

    fn on_move(&mut self, step: &Step<'_>, query: &mut QueryModel) -> Result<()> {
        match step.to {
            State::S03 => self.alias = step.current.text.clone(),
            State::S05 => query.add_filter(&self.alias, &step.current.text),
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FilterModel;
    use xql_core::Error;

    #[test]
    fn test_matrix() {
        assert_eq!(MATRIX.transitions().len(), 8);
        assert_eq!(MATRIX.next(State::S05, TokenType::KwWhere), None);
    }

    #[test]
    fn test_filter_list() {
        let query = QueryModel::parse("p from projects p filter by p.title, p.userId order by p.id")
            .unwrap();
        assert_eq!(
            query.filters(),
            &[
                FilterModel {
                    alias: "p".into(),
                    property: "title".into(),
                    value: None,
                },
                FilterModel {
                    alias: "p".into(),
                    property: "userId".into(),
                    value: None,
                },
            ]
        );
        assert_eq!(query.orders().len(), 1);
    }

    #[test]
    fn test_filter_requires_by() {
        assert_eq!(
            QueryModel::parse("p from projects p filter p.title").unwrap_err(),
            Error::SyntaxError(25)
        );
    }

    #[test]
    fn test_filter_alias_must_exist() {
        assert_eq!(
            QueryModel::parse("p from projects p filter by x.title").unwrap_err(),
            Error::UnknownEntityAlias("x".to_string())
        );
    }
}
