//! Phase parsers
//!
//! An XQL statement is parsed clause by clause. Each clause ("phase") has its
//! own finite state machine, declared as a transition [`Matrix`]. All phases
//! share one [`TokenStream`]; a phase stops on the keyword that opens the next
//! clause and pushes that token back so the next phase starts with it.

mod alias;
mod filter;
mod from;
mod join;
mod order;
mod where_clause;

pub use alias::AliasParser;
pub use filter::FilterParser;
pub use from::FromParser;
pub use join::JoinParser;
pub use order::OrderParser;
pub use where_clause::WhereParser;

use crate::lexer::{tokenize, Token, TokenType};
use crate::model::QueryModel;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use tracing::{debug, trace};
use xql_core::{Error, Result};

/// Parser state. `Stop` ends the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum State {
    S00,
    S01,
    S02,
    S03,
    S04,
    S05,
    S06,
    S07,
    S08,
    S09,
    S10,
    S11,
    S12,
    Stop,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Stop => f.write_str("ST"),
            other => write!(f, "{:02}", *other as u8),
        }
    }
}

/// A transition rule: from a state, any of the token kinds leads to a state
pub type Rule = (State, &'static [TokenType], State);

/// State transition table
#[derive(Debug, Clone, Default)]
pub struct Matrix {
    table: HashMap<State, HashMap<TokenType, State>>,
}

impl Matrix {
    /// Build a table from rules
    pub fn new(rules: &[Rule]) -> Self {
        let mut table: HashMap<State, HashMap<TokenType, State>> = HashMap::new();
        for &(from, kinds, to) in rules {
            let row = table.entry(from).or_default();
            for &kind in kinds {
                row.insert(kind, to);
            }
        }
        Self { table }
    }

    /// Target state for a token kind, if the transition exists
    pub fn next(&self, from: State, kind: TokenType) -> Option<State> {
        self.table.get(&from).and_then(|row| row.get(&kind)).copied()
    }

    /// All transitions, sorted by source state
    pub fn transitions(&self) -> Vec<(State, TokenType, State)> {
        let mut all: Vec<_> = self
            .table
            .iter()
            .flat_map(|(&from, row)| row.iter().map(move |(&kind, &to)| (from, kind, to)))
            .collect();
        all.sort_by_key(|&(from, kind, to)| (from, kind.name(), to));
        all
    }

    /// Token kinds accepted in a state
    pub fn accepted(&self, from: State) -> Vec<TokenType> {
        let mut kinds: Vec<_> = self
            .table
            .get(&from)
            .map(|row| row.keys().copied().collect())
            .unwrap_or_default();
        kinds.sort_by_key(|k| k.name());
        kinds
    }
}

/// Clause being parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Alias,
    From,
    Join,
    Where,
    Filter,
    Order,
    End,
}

impl Phase {
    /// Phase opened by a stopping token
    pub fn after(kind: TokenType) -> Option<Phase> {
        match kind {
            TokenType::KwFrom => Some(Phase::From),
            TokenType::KwLeft
            | TokenType::KwRight
            | TokenType::KwInner
            | TokenType::KwOuter
            | TokenType::KwJoin => Some(Phase::Join),
            TokenType::KwWhere => Some(Phase::Where),
            TokenType::KwFilter => Some(Phase::Filter),
            TokenType::KwOrder => Some(Phase::Order),
            TokenType::Stop => Some(Phase::End),
            _ => None,
        }
    }
}

/// Token cursor shared by all phases
#[derive(Debug, Clone)]
pub struct TokenStream {
    tokens: VecDeque<Token>,
}

impl TokenStream {
    /// Create a stream over a token sequence
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens: tokens.into(),
        }
    }

    /// Pop the next token
    pub fn next(&mut self) -> Option<Token> {
        self.tokens.pop_front()
    }

    /// Push a token back so it is read again
    pub fn unread(&mut self, token: Token) {
        self.tokens.push_front(token);
    }

    /// Remaining tokens
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// True if every token was consumed
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// One transition handed to [`PhaseParser::on_move`]
#[derive(Debug)]
pub struct Step<'a> {
    pub from: State,
    pub to: State,
    pub current: &'a Token,
    pub previous: Option<&'a Token>,
}

impl Step<'_> {
    /// The token before the current one
    pub fn previous(&self) -> Result<&Token> {
        self.previous
            .ok_or_else(|| Error::Internal(format!("no token before state {}", self.to)))
    }
}

/// A clause parser driven by its transition matrix
pub trait PhaseParser {
    /// Transition table
    fn matrix(&self) -> &Matrix;

    /// Side effects of one transition
    fn on_move(&mut self, step: &Step<'_>, query: &mut QueryModel) -> Result<()>;

    /// Consume tokens until the stop state and return the next phase
    fn run(&mut self, stream: &mut TokenStream, query: &mut QueryModel) -> Result<Phase> {
        let mut state = State::S00;
        let mut previous: Option<Token> = None;

        while let Some(current) = stream.next() {
            let next = self.matrix().next(state, current.kind).ok_or_else(|| {
                if current.kind == TokenType::Stop {
                    Error::UnexpectedExpressionEnd
                } else {
                    Error::SyntaxError(current.position)
                }
            })?;

            trace!("{} -> {} on {}", state, next, current);
            self.on_move(
                &Step {
                    from: state,
                    to: next,
                    current: &current,
                    previous: previous.as_ref(),
                },
                query,
            )?;

            if next == State::Stop {
                let phase =
                    Phase::after(current.kind).ok_or(Error::SyntaxError(current.position))?;
                stream.unread(current);
                return Ok(phase);
            }

            state = next;
            previous = Some(current);
        }

        Err(Error::UnexpectedExpressionEnd)
    }
}

/// Parse an XQL statement into a [`QueryModel`]
pub fn parse(xql: &str) -> Result<QueryModel> {
    let mut stream = TokenStream::new(tokenize(xql)?);
    let mut query = QueryModel::new(xql);
    let mut phase = Phase::Alias;

    loop {
        trace!("Entering {:?} phase", phase);
        phase = match phase {
            Phase::Alias => AliasParser::new().run(&mut stream, &mut query)?,
            Phase::From => FromParser::new().run(&mut stream, &mut query)?,
            Phase::Join => JoinParser::new().run(&mut stream, &mut query)?,
            Phase::Where => WhereParser::new().run(&mut stream, &mut query)?,
            Phase::Filter => FilterParser::new().run(&mut stream, &mut query)?,
            Phase::Order => OrderParser::new().run(&mut stream, &mut query)?,
            Phase::End => break,
        };
    }

    query.validate_aliases()?;
    debug!(
        "Parsed XQL: {} from, {} join, {} where token(s), {} filter, {} order",
        query.froms().len(),
        query.joins().len(),
        query.where_model().tokens.len(),
        query.filters().len(),
        query.orders().len()
    );
    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(State::S00.to_string(), "00");
        assert_eq!(State::S12.to_string(), "12");
        assert_eq!(State::Stop.to_string(), "ST");
    }

    #[test]
    fn test_matrix_lookup() {
        let matrix = Matrix::new(&[
            (State::S00, &[TokenType::Unknown, TokenType::Constant], State::S01),
            (State::S01, &[TokenType::Stop], State::Stop),
        ]);

        assert_eq!(matrix.next(State::S00, TokenType::Constant), Some(State::S01));
        assert_eq!(matrix.next(State::S01, TokenType::Unknown), None);
        assert_eq!(matrix.next(State::S05, TokenType::Stop), None);
        assert_eq!(matrix.transitions().len(), 3);
        assert_eq!(
            matrix.accepted(State::S00),
            vec![TokenType::Constant, TokenType::Unknown]
        );
    }

    #[test]
    fn test_phase_after() {
        assert_eq!(Phase::after(TokenType::KwFrom), Some(Phase::From));
        assert_eq!(Phase::after(TokenType::KwOuter), Some(Phase::Join));
        assert_eq!(Phase::after(TokenType::Stop), Some(Phase::End));
        assert_eq!(Phase::after(TokenType::SpComma), None);
    }

    #[test]
    fn test_token_stream_unread() {
        let mut stream = TokenStream::new(tokenize("a b").unwrap());
        let first = stream.next().unwrap();
        assert_eq!(stream.len(), 2);
        stream.unread(first.clone());
        assert_eq!(stream.next(), Some(first));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse("").unwrap_err(), Error::UnexpectedExpressionEnd);
    }

    #[test]
    fn test_unknown_alias_reference() {
        assert_eq!(
            parse("x from projects p").unwrap_err(),
            Error::UnknownEntityAlias("x".to_string())
        );
        assert_eq!(
            parse("p from projects p order by q.title").unwrap_err(),
            Error::UnknownEntityAlias("q".to_string())
        );
    }

    #[test]
    fn test_clause_order_is_enforced() {
        // where after order is not a valid continuation of the order phase
        assert_eq!(
            parse("p from projects p order by p.title where p.id == 1").unwrap_err(),
            Error::SyntaxError(35)
        );
    }
}
