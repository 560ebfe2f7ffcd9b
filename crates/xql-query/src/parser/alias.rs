//! Alias phase: `a, b, c` before `from`

use super::{Matrix, PhaseParser, State, Step};
use crate::lexer::TokenType;
use crate::model::QueryModel;
use std::sync::LazyLock;
use xql_core::Result;

static MATRIX: LazyLock<Matrix> = LazyLock::new(|| {
    Matrix::new(&[
        (State::S00, &[TokenType::Unknown], State::S01),
        (State::S00, &[TokenType::KwFrom], State::Stop),
        (State::S01, &[TokenType::SpComma], State::S02),
        (State::S01, &[TokenType::KwFrom], State::Stop),
        (State::S02, &[TokenType::Unknown], State::S01),
    ])
});

/// Collects the selected aliases
#[derive(Debug, Default)]
pub struct AliasParser;

impl AliasParser {
    pub fn new() -> Self {
        Self
    }
}

impl PhaseParser for AliasParser {
    fn matrix(&self) -> &Matrix {
        &MATRIX
    }

    fn on_move(&mut self, step: &Step<'_>, query: &mut QueryModel) -> Result<()> {
        if step.to == State::S01 {
            query.add_alias(&step.current.text);
        }
        Ok(())
    }
}
