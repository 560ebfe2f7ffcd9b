//! XQL tokenizer using logos
//!
//! The raw logos scan performs maximal munch; its lexemes are then mapped to
//! positioned [`Token`]s and a closing [`TokenType::Stop`] token is appended.

use logos::Logos;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;
use xql_core::{Error, Result, Value};

/// Token classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenType {
    // Identifiers and literals
    Unknown,
    Constant,
    Parameter,
    Entity,
    Alias,
    Property,
    Null,
    False,
    True,
    Stop,

    // Keywords
    KwFrom,
    KwJoin,
    KwWhere,
    KwFilter,
    KwOrder,
    KwBy,
    KwLeft,
    KwRight,
    KwInner,
    KwOuter,
    KwAsc,
    KwDesc,
    KwOn,

    // Operators
    OpAdd,
    OpSub,
    OpMul,
    OpDiv,
    OpMod,
    OpAnd,
    OpOr,
    OpNot,
    OpEq,
    OpNe,
    OpGt,
    OpGe,
    OpLt,
    OpLe,
    OpLike,

    // Separators
    SpDot,
    SpComma,
    SpColon,
    SpOpen,
    SpClose,
}

impl TokenType {
    /// Returns true for keyword tokens
    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            TokenType::KwFrom
                | TokenType::KwJoin
                | TokenType::KwWhere
                | TokenType::KwFilter
                | TokenType::KwOrder
                | TokenType::KwBy
                | TokenType::KwLeft
                | TokenType::KwRight
                | TokenType::KwInner
                | TokenType::KwOuter
                | TokenType::KwAsc
                | TokenType::KwDesc
                | TokenType::KwOn
        )
    }

    /// Returns true for binary operators usable between two operands
    pub fn is_binary_operator(self) -> bool {
        matches!(
            self,
            TokenType::OpAdd
                | TokenType::OpSub
                | TokenType::OpMul
                | TokenType::OpDiv
                | TokenType::OpMod
                | TokenType::OpAnd
                | TokenType::OpOr
                | TokenType::OpEq
                | TokenType::OpNe
                | TokenType::OpGt
                | TokenType::OpGe
                | TokenType::OpLt
                | TokenType::OpLe
                | TokenType::OpLike
        )
    }

    /// Returns true for literal tokens
    pub fn is_literal(self) -> bool {
        matches!(
            self,
            TokenType::Constant | TokenType::Null | TokenType::True | TokenType::False
        )
    }

    /// Canonical name, e.g. `ID_ALIAS` or `KW_FROM`
    pub fn name(self) -> &'static str {
        match self {
            TokenType::Unknown => "ID_UNKNOWN",
            TokenType::Constant => "ID_CONSTANT",
            TokenType::Parameter => "ID_PARAMETER",
            TokenType::Entity => "ID_ENTITY",
            TokenType::Alias => "ID_ALIAS",
            TokenType::Property => "ID_PROPERTY",
            TokenType::Null => "ID_NULL",
            TokenType::False => "ID_FALSE",
            TokenType::True => "ID_TRUE",
            TokenType::Stop => "ID_STOP",
            TokenType::KwFrom => "KW_FROM",
            TokenType::KwJoin => "KW_JOIN",
            TokenType::KwWhere => "KW_WHERE",
            TokenType::KwFilter => "KW_FILTER",
            TokenType::KwOrder => "KW_ORDER",
            TokenType::KwBy => "KW_BY",
            TokenType::KwLeft => "KW_LEFT",
            TokenType::KwRight => "KW_RIGHT",
            TokenType::KwInner => "KW_INNER",
            TokenType::KwOuter => "KW_OUTER",
            TokenType::KwAsc => "KW_ASC",
            TokenType::KwDesc => "KW_DESC",
            TokenType::KwOn => "KW_ON",
            TokenType::OpAdd => "OP_ADD",
            TokenType::OpSub => "OP_SUB",
            TokenType::OpMul => "OP_MUL",
            TokenType::OpDiv => "OP_DIV",
            TokenType::OpMod => "OP_MOD",
            TokenType::OpAnd => "OP_AND",
            TokenType::OpOr => "OP_OR",
            TokenType::OpNot => "OP_NOT",
            TokenType::OpEq => "OP_EQ",
            TokenType::OpNe => "OP_NE",
            TokenType::OpGt => "OP_GT",
            TokenType::OpGe => "OP_GE",
            TokenType::OpLt => "OP_LT",
            TokenType::OpLe => "OP_LE",
            TokenType::OpLike => "OP_LIKE",
            TokenType::SpDot => "SP_DOT",
            TokenType::SpComma => "SP_COMMA",
            TokenType::SpColon => "SP_COLON",
            TokenType::SpOpen => "SP_OPEN",
            TokenType::SpClose => "SP_CLOSE",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A positioned token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Classification
    pub kind: TokenType,

    /// Source text; string constants keep their quotes
    pub text: String,

    /// Byte offset in the source
    pub position: usize,
}

impl Token {
    /// Create a token
    pub fn new(kind: TokenType, text: impl Into<String>, position: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            position,
        }
    }

    /// Copy of this token under a new classification
    pub fn reclassified(&self, kind: TokenType) -> Self {
        Self {
            kind,
            text: self.text.clone(),
            position: self.position,
        }
    }

    /// Literal value of a constant, null or boolean token
    pub fn value(&self) -> Option<Value> {
        match self.kind {
            TokenType::Null => Some(Value::Null),
            TokenType::True => Some(Value::Boolean(true)),
            TokenType::False => Some(Value::Boolean(false)),
            TokenType::Constant => Some(constant_value(&self.text)),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})@{}", self.kind, self.text, self.position)
    }
}

/// Raw lexemes produced by the logos scan
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
enum Lexeme {
    // Keywords
    #[token("from", ignore(ascii_case))]
    From,

    #[token("join", ignore(ascii_case))]
    Join,

    #[token("where", ignore(ascii_case))]
    Where,

    #[token("filter", ignore(ascii_case))]
    Filter,

    #[token("order", ignore(ascii_case))]
    Order,

    #[token("by", ignore(ascii_case))]
    By,

    #[token("left", ignore(ascii_case))]
    Left,

    #[token("right", ignore(ascii_case))]
    Right,

    #[token("inner", ignore(ascii_case))]
    Inner,

    #[token("outer", ignore(ascii_case))]
    Outer,

    #[token("asc", ignore(ascii_case))]
    #[token("ascending", ignore(ascii_case))]
    Asc,

    #[token("desc", ignore(ascii_case))]
    #[token("descending", ignore(ascii_case))]
    Desc,

    #[token("on", ignore(ascii_case))]
    On,

    #[token("and", ignore(ascii_case))]
    #[token("&&")]
    And,

    #[token("or", ignore(ascii_case))]
    #[token("||")]
    Or,

    #[token("not", ignore(ascii_case))]
    #[token("!")]
    Not,

    #[token("like", ignore(ascii_case))]
    #[token("%%")]
    Like,

    #[token("null", ignore(ascii_case))]
    Null,

    #[token("true", ignore(ascii_case))]
    True,

    #[token("false", ignore(ascii_case))]
    False,

    // Operators
    #[token("+")]
    Add,

    #[token("-")]
    Sub,

    #[token("*")]
    Mul,

    #[token("/")]
    Div,

    #[token("%")]
    Mod,

    #[token("=")]
    #[token("==")]
    Eq,

    #[token("!=")]
    #[token("<>")]
    Ne,

    #[token(">")]
    Gt,

    #[token(">=")]
    Ge,

    #[token("<")]
    Lt,

    #[token("<=")]
    Le,

    // Separators
    #[token(".")]
    Dot,

    #[token(",")]
    Comma,

    #[token(":")]
    Colon,

    #[token("(")]
    Open,

    #[token(")")]
    Close,

    // Literals
    #[regex(r"[0-9]+")]
    Integer,

    #[regex(r"[0-9]+\.[0-9]+")]
    Float,

    #[regex(r"'([^'\\]|\\.)*'")]
    String,

    // Identifiers
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Identifier,
}

impl Lexeme {
    fn token_type(self) -> TokenType {
        match self {
            Lexeme::From => TokenType::KwFrom,
            Lexeme::Join => TokenType::KwJoin,
            Lexeme::Where => TokenType::KwWhere,
            Lexeme::Filter => TokenType::KwFilter,
            Lexeme::Order => TokenType::KwOrder,
            Lexeme::By => TokenType::KwBy,
            Lexeme::Left => TokenType::KwLeft,
            Lexeme::Right => TokenType::KwRight,
            Lexeme::Inner => TokenType::KwInner,
            Lexeme::Outer => TokenType::KwOuter,
            Lexeme::Asc => TokenType::KwAsc,
            Lexeme::Desc => TokenType::KwDesc,
            Lexeme::On => TokenType::KwOn,
            Lexeme::And => TokenType::OpAnd,
            Lexeme::Or => TokenType::OpOr,
            Lexeme::Not => TokenType::OpNot,
            Lexeme::Like => TokenType::OpLike,
            Lexeme::Null => TokenType::Null,
            Lexeme::True => TokenType::True,
            Lexeme::False => TokenType::False,
            Lexeme::Add => TokenType::OpAdd,
            Lexeme::Sub => TokenType::OpSub,
            Lexeme::Mul => TokenType::OpMul,
            Lexeme::Div => TokenType::OpDiv,
            Lexeme::Mod => TokenType::OpMod,
            Lexeme::Eq => TokenType::OpEq,
            Lexeme::Ne => TokenType::OpNe,
            Lexeme::Gt => TokenType::OpGt,
            Lexeme::Ge => TokenType::OpGe,
            Lexeme::Lt => TokenType::OpLt,
            Lexeme::Le => TokenType::OpLe,
            Lexeme::Dot => TokenType::SpDot,
            Lexeme::Comma => TokenType::SpComma,
            Lexeme::Colon => TokenType::SpColon,
            Lexeme::Open => TokenType::SpOpen,
            Lexeme::Close => TokenType::SpClose,
            Lexeme::Integer | Lexeme::Float | Lexeme::String => TokenType::Constant,
            Lexeme::Identifier => TokenType::Unknown,
        }
    }
}

/// Tokenize an XQL string.
///
/// The returned sequence always ends with a [`TokenType::Stop`] token.
pub fn tokenize(xql: &str) -> Result<Vec<Token>> {
    let mut lexer = Lexeme::lexer(xql);
    let mut tokens = Vec::new();
    let mut open_brackets = Vec::new();

    while let Some(lexeme) = lexer.next() {
        let span = lexer.span();
        let lexeme = match lexeme {
            Ok(lexeme) => lexeme,
            Err(()) if lexer.slice().starts_with('\'') => {
                return Err(Error::UnclosedSingleQuote(span.start));
            }
            Err(()) => return Err(Error::SyntaxError(span.start)),
        };

        match lexeme {
            Lexeme::Open => open_brackets.push(span.start),
            Lexeme::Close => {
                if open_brackets.pop().is_none() {
                    return Err(Error::UnpairedBracket(span.start));
                }
            }
            _ => {}
        }

        tokens.push(Token::new(lexeme.token_type(), lexer.slice(), span.start));
    }

    if let Some(position) = open_brackets.pop() {
        return Err(Error::UnpairedBracket(position));
    }

    tokens.push(Token::new(TokenType::Stop, "", xql.len()));
    trace!("Tokenized {} tokens from {} bytes", tokens.len(), xql.len());
    Ok(tokens)
}

/// Value of a numeric or quoted constant
fn constant_value(text: &str) -> Value {
    if let Some(inner) = text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        let mut unescaped = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    unescaped.push(escaped);
                }
            } else {
                unescaped.push(c);
            }
        }
        return Value::String(unescaped);
    }
    if let Ok(i) = text.parse::<i64>() {
        return Value::Integer(i);
    }
    match text.parse::<f64>() {
        Ok(f) => Value::Float(f),
        Err(_) => Value::String(text.to_string()),
    }
}
