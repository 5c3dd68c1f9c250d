//! Token types for the formula lexer.

use std::fmt;

use super::error::Position;

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text the token was read from.
    pub lexeme: String,
    pub pos: Position,
}

/// The kind of token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Keywords
    If,
    Else,
    True,
    False,

    // Literals
    Ident(String),
    Number(f64),
    /// Duration in minutes (`72min`, `1h 30min`).
    Duration(f64),
    /// `21-May`: day and month number.
    Date { day: u32, month: u32 },
    Str(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Gt,
    Lt,
    Ge,
    Le,
    EqEq,
    NotEq,
    AndAnd,
    OrOr,
    Bang,
    At,

    // Delimiters
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,

    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::If => f.write_str("'if'"),
            TokenKind::Else => f.write_str("'else'"),
            TokenKind::True => f.write_str("'true'"),
            TokenKind::False => f.write_str("'false'"),
            TokenKind::Ident(name) => write!(f, "identifier '{name}'"),
            TokenKind::Number(n) => write!(f, "number {n}"),
            TokenKind::Duration(m) => write!(f, "duration {m}min"),
            TokenKind::Date { day, month } => write!(f, "date {day}-{month}"),
            TokenKind::Str(s) => write!(f, "string \"{s}\""),
            TokenKind::Plus => f.write_str("'+'"),
            TokenKind::Minus => f.write_str("'-'"),
            TokenKind::Star => f.write_str("'*'"),
            TokenKind::Slash => f.write_str("'/'"),
            TokenKind::Gt => f.write_str("'>'"),
            TokenKind::Lt => f.write_str("'<'"),
            TokenKind::Ge => f.write_str("'>='"),
            TokenKind::Le => f.write_str("'<='"),
            TokenKind::EqEq => f.write_str("'=='"),
            TokenKind::NotEq => f.write_str("'!='"),
            TokenKind::AndAnd => f.write_str("'&&'"),
            TokenKind::OrOr => f.write_str("'||'"),
            TokenKind::Bang => f.write_str("'!'"),
            TokenKind::At => f.write_str("'@'"),
            TokenKind::LParen => f.write_str("'('"),
            TokenKind::RParen => f.write_str("')'"),
            TokenKind::LBrace => f.write_str("'{'"),
            TokenKind::RBrace => f.write_str("'}'"),
            TokenKind::Comma => f.write_str("','"),
            TokenKind::Eof => f.write_str("end of input"),
        }
    }
}
