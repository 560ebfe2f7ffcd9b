//! From phase: `from entity [alias], ...`

use super::{Matrix, PhaseParser, State, Step};
use crate::lexer::TokenType;
use crate::model::QueryModel;
use std::sync::LazyLock;
use xql_core::{Error, Result};

/// Tokens that end the from list
const NEXT_CLAUSE: &[TokenType] = &[
    TokenType::KwLeft,
    TokenType::KwRight,
    TokenType::KwInner,
    TokenType::KwOuter,
    TokenType::KwJoin,
    TokenType::KwWhere,
    TokenType::KwFilter,
    TokenType::KwOrder,
    TokenType::Stop,
];

static MATRIX: LazyLock<Matrix> = LazyLock::new(|| {
    Matrix::new(&[
        (State::S00, &[TokenType::KwFrom], State::S01),
        (State::S01, &[TokenType::Unknown], State::S02),
        (State::S02, &[TokenType::Unknown], State::S03),
        (State::S02, &[TokenType::SpComma], State::S01),
        (State::S02, NEXT_CLAUSE, State::Stop),
        (State::S03, &[TokenType::SpComma], State::S01),
        (State::S03, NEXT_CLAUSE, State::Stop),
    ])
});

/// Collects `from` entities; an entity without alias is its own alias
#[derive(Debug, Default)]
pub struct FromParser;

impl FromParser {
    pub fn new() -> Self {
        Self
    }
}

impl PhaseParser for FromParser {
    fn matrix(&self) -> &Matrix {
        &MATRIX
    }

    fn on_move(&mut self, step: &Step<'_>, query: &mut QueryModel) -> Result<()> {
        let (entity, alias) = match (step.from, step.to) {
            (State::S02, State::S03) => (step.previous()?, step.current),
            (State::S02, _) => (step.previous()?, step.previous()?),
            _ => return Ok(()),
        };

        if query.has_alias(&alias.text) {
            return Err(Error::SyntaxError(alias.position));
        }
        query.add_from(&entity.text, &alias.text);
        Ok(())
    }
}
