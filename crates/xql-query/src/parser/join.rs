//! Join phase: `left|right|inner|outer join entity [alias] on a.x = b.y`, repeated

use super::{Matrix, PhaseParser, State, Step};
use crate::lexer::{Token, TokenType};
use crate::model::{JoinKind, JoinModel, QueryModel};
use std::sync::LazyLock;
use xql_core::{Error, Result};

const JOIN_KINDS: &[TokenType] = &[
    TokenType::KwLeft,
    TokenType::KwRight,
    TokenType::KwInner,
    TokenType::KwOuter,
];

static MATRIX: LazyLock<Matrix> = LazyLock::new(|| {
    Matrix::new(&[
        (State::S00, JOIN_KINDS, State::S01),
        (State::S00, &[TokenType::KwJoin], State::S02),
        (State::S01, &[TokenType::KwJoin], State::S02),
        (State::S02, &[TokenType::Unknown], State::S03),
        (State::S03, &[TokenType::Unknown], State::S04),
        (State::S03, &[TokenType::KwOn], State::S05),
        (State::S04, &[TokenType::KwOn], State::S05),
        (State::S05, &[TokenType::Unknown], State::S06),
        (State::S06, &[TokenType::SpDot], State::S07),
        (State::S07, &[TokenType::Unknown], State::S08),
        (State::S08, &[TokenType::OpEq], State::S09),
        (State::S09, &[TokenType::Unknown], State::S10),
        (State::S10, &[TokenType::SpDot], State::S11),
        (State::S11, &[TokenType::Unknown], State::S12),
        (State::S12, JOIN_KINDS, State::S01),
        (State::S12, &[TokenType::KwJoin], State::S02),
        (
            State::S12,
            &[
                TokenType::KwWhere,
                TokenType::KwFilter,
                TokenType::KwOrder,
                TokenType::Stop,
            ],
            State::Stop,
        ),
    ])
});

/// Join under construction
#[derive(Debug)]
struct Draft {
    kind: JoinKind,
    entity: String,
    alias: Token,
    left: (String, String),
    right_alias: String,
}

/// Collects joins and normalizes their `on` condition
#[derive(Debug, Default)]
pub struct JoinParser {
    kind: Option<JoinKind>,
    draft: Option<Draft>,
}

impl JoinParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn draft(&mut self) -> Result<&mut Draft> {
        self.draft
            .as_mut()
            .ok_or_else(|| Error::Internal("join condition without joined entity".to_string()))
    }

    fn finish(&mut self, right_property: &str, query: &mut QueryModel) -> Result<()> {
        let draft = self
            .draft
            .take()
            .ok_or_else(|| Error::Internal("join condition without joined entity".to_string()))?;
        let alias = draft.alias.text.as_str();
        let (left_alias, left_property) = draft.left;

        let (join_property, source_alias, source_property) =
            if left_alias == alias && draft.right_alias != alias {
                (left_property, draft.right_alias, right_property.to_string())
            } else if draft.right_alias == alias && left_alias != alias {
                (right_property.to_string(), left_alias, left_property)
            } else {
                return Err(Error::InvalidJoinAlias(alias.to_string()));
            };

        query.add_join(JoinModel {
            kind: draft.kind,
            entity: draft.entity,
            join_alias: draft.alias.text,
            join_property,
            source_alias,
            source_property,
        });
        Ok(())
    }
}

fn join_kind(kind: TokenType) -> JoinKind {
    match kind {
        TokenType::KwLeft => JoinKind::Left,
        TokenType::KwRight => JoinKind::Right,
        TokenType::KwOuter => JoinKind::Outer,
        _ => JoinKind::Inner,
    }
}

impl PhaseParser for JoinParser {
    fn matrix(&self) -> &Matrix {
        &MATRIX
    }

    fn on_move(&mut self, step: &Step<'_>, query: &mut QueryModel) -> Result<()> {
        let current = step.current;
        match step.to {
            State::S01 => self.kind = Some(join_kind(current.kind)),
            State::S02 if step.from != State::S01 => self.kind = Some(JoinKind::Inner),
            State::S03 => {
                self.draft = Some(Draft {
                    kind: self.kind.take().unwrap_or(JoinKind::Inner),
                    entity: current.text.clone(),
                    alias: current.clone(),
                    left: (String::new(), String::new()),
                    right_alias: String::new(),
                });
            }
            State::S04 => self.draft()?.alias = current.clone(),
            State::S05 => {
                let alias = &self.draft()?.alias;
                if query.has_alias(&alias.text) {
                    return Err(Error::SyntaxError(alias.position));
                }
            }
            State::S06 => self.draft()?.left.0 = current.text.clone(),
            State::S08 => self.draft()?.left.1 = current.text.clone(),
            State::S10 => self.draft()?.right_alias = current.text.clone(),
            State::S12 => self.finish(&current.text, query)?,
            _ => {}
        }
        Ok(())
    }
}
