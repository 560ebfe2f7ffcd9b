//! Where phase
//!
//! The expression is kept as a token stream. An identifier is held back until
//! the next token shows whether it names an alias (`alias.property`); the
//! token after `:` is a parameter name.

use super::{Matrix, PhaseParser, State, Step};
use crate::lexer::{Token, TokenType};
use crate::model::QueryModel;
use std::sync::LazyLock;
use xql_core::{Error, Result};

const OPERATORS: &[TokenType] = &[
    TokenType::OpAdd,
    TokenType::OpSub,
    TokenType::OpMul,
    TokenType::OpDiv,
    TokenType::OpMod,
    TokenType::OpAnd,
    TokenType::OpOr,
    TokenType::OpEq,
    TokenType::OpNe,
    TokenType::OpGt,
    TokenType::OpGe,
    TokenType::OpLt,
    TokenType::OpLe,
    TokenType::OpLike,
];

static MATRIX: LazyLock<Matrix> = LazyLock::new(|| {
    Matrix::new(&[
        (State::S00, &[TokenType::KwWhere], State::S01),
        // operand expected
        (
            State::S01,
            &[TokenType::SpOpen, TokenType::OpNot, TokenType::OpSub],
            State::S01,
        ),
        (State::S01, &[TokenType::Unknown], State::S02),
        (State::S01, &[TokenType::SpColon], State::S05),
        (
            State::S01,
            &[
                TokenType::Constant,
                TokenType::Null,
                TokenType::True,
                TokenType::False,
            ],
            State::S04,
        ),
        (State::S02, &[TokenType::SpDot], State::S03),
        (State::S03, &[TokenType::Unknown], State::S04),
        (State::S05, &[TokenType::Unknown], State::S04),
        // operand complete
        (State::S04, OPERATORS, State::S01),
        (State::S04, &[TokenType::SpClose], State::S04),
        (
            State::S04,
            &[TokenType::KwFilter, TokenType::KwOrder, TokenType::Stop],
            State::Stop,
        ),
    ])
});

/// Accumulates the `where` expression into the model's [`WhereModel`](crate::model::WhereModel)
#[derive(Debug, Default)]
pub struct WhereParser {
    /// Positions of the currently open brackets
    brackets: Vec<usize>,

    /// Identifier waiting for its classification
    pending: Option<Token>,
}

impl WhereParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PhaseParser for WhereParser {
    fn matrix(&self) -> &Matrix {
        &MATRIX
    }

    fn on_move(&mut self, step: &Step<'_>, query: &mut QueryModel) -> Result<()> {
        let current = step.current;
        match (step.from, step.to) {
            (State::S00, _) | (State::S01, State::S05) | (State::S02, State::S03) => {
                if let Some(alias) = self.pending.take() {
                    query.push_where_token(alias.reclassified(TokenType::Alias));
                }
            }
            (State::S01, State::S01) => {
                if current.kind == TokenType::SpOpen {
                    self.brackets.push(current.position);
                }
                query.push_where_token(current.clone());
            }
            (State::S01, State::S02) => self.pending = Some(current.clone()),
            (State::S03, State::S04) => {
                query.push_where_token(current.reclassified(TokenType::Property));
            }
            (State::S05, State::S04) => {
                query.push_where_token(current.reclassified(TokenType::Parameter));
            }
            (State::S04, State::S04) => {
                if self.brackets.pop().is_none() {
                    return Err(Error::UnpairedBracket(current.position));
                }
                query.push_where_token(current.clone());
            }
            (State::S04, State::Stop) => {
                if let Some(&open) = self.brackets.last() {
                    return Err(Error::UnpairedBracket(open));
                }
            }
            _ => query.push_where_token(current.clone()),
        }
        Ok(())
    }
}
