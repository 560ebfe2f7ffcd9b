//! Order phase: `order by a.x [asc|desc], ...`

use super::{Matrix, PhaseParser, State, Step};
use crate::lexer::TokenType;
use crate::model::{Direction, QueryModel};
use std::sync::LazyLock;
use xql_core::Result;

static MATRIX: LazyLock<Matrix> = LazyLock::new(|| {
    Matrix::new(&[
        (State::S00, &[TokenType::KwOrder], State::S01),
        (State::S01, &[TokenType::KwBy], State::S02),
        (State::S02, &[TokenType::Unknown], State::S03),
        (State::S03, &[TokenType::SpDot], State::S04),
        (State::S04, &[TokenType::Unknown], State::S05),
        (State::S05, &[TokenType::KwAsc, TokenType::KwDesc], State::S06),
        (State::S05, &[TokenType::SpComma], State::S02),
        (State::S06, &[TokenType::SpComma], State::S02),
        (State::S05, &[TokenType::Stop], State::Stop),
        (State::S06, &[TokenType::Stop], State::Stop),
    ])
});

/// Collects sort keys; a key without direction sorts ascending
#[derive(Debug, Default)]
pub struct OrderParser {
    alias: String,
}

impl OrderParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PhaseParser for OrderParser {
    fn matrix(&self) -> &Matrix {
        &MATRIX
    }

    fn on_move(&mut self, step: &Step<'_>, query: &mut QueryModel) -> Result<()> {
        match step.to {
            State::S03 => self.alias = step.current.text.clone(),
            State::S05 => query.add_order(&self.alias, &step.current.text),
            State::S06 if step.current.kind == TokenType::KwDesc => {
                query.set_last_order_direction(Direction::Desc)
            }
            State::S06 => query.set_last_order_direction(Direction::Asc),
            _ => {}
        }
        Ok(())
    }
}
