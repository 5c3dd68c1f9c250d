//! Error types for compiling, linking and evaluating formulas.

use std::fmt;

use chrono::NaiveDate;
use thiserror::Error;

use super::names::Arity;

/// A location in formula source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// Character offset from the start of the source.
    pub offset: usize,
    pub line: usize,
    pub col: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("[{pos}] unexpected character '{ch}'")]
    UnexpectedChar { ch: char, pos: Position },

    #[error("[{pos}] unterminated block comment")]
    UnterminatedComment { pos: Position },

    #[error("[{pos}] unterminated string literal")]
    UnterminatedString { pos: Position },

    #[error("[{pos}] invalid number '{text}'")]
    InvalidNumber { text: String, pos: Position },

    #[error("[{pos}] unknown duration unit '{unit}' (use min or h)")]
    UnknownUnit { unit: String, pos: Position },

    #[error("[{pos}] invalid date literal '{text}'")]
    InvalidDate { text: String, pos: Position },
}

impl LexError {
    pub fn position(&self) -> Position {
        match self {
            LexError::UnexpectedChar { pos, .. }
            | LexError::UnterminatedComment { pos }
            | LexError::UnterminatedString { pos }
            | LexError::InvalidNumber { pos, .. }
            | LexError::UnknownUnit { pos, .. }
            | LexError::InvalidDate { pos, .. } => *pos,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("[{pos}] expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        pos: Position,
    },

    #[error("[{pos}] {fn_name}() takes {expected} arguments, got {got}")]
    ArityMismatch {
        fn_name: String,
        expected: Arity,
        got: usize,
        pos: Position,
    },

    #[error("[{pos}] duration '{literal}' is too large")]
    DurationOutOfRange { literal: String, pos: Position },
}

impl ParseError {
    pub fn position(&self) -> Position {
        match self {
            ParseError::UnexpectedToken { pos, .. }
            | ParseError::ArityMismatch { pos, .. }
            | ParseError::DurationOutOfRange { pos, .. } => *pos,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("[{pos}] unknown primitive '{name}'")]
    UnknownPrimitive { name: String, pos: Position },

    #[error("[{pos}] unknown function '{name}'")]
    UnknownFunction { name: String, pos: Position },

    #[error("[{pos}] {function}(): unknown direction '{name}'")]
    UnknownDirection {
        name: String,
        function: String,
        pos: Position,
    },

    #[error("[{pos}] {function}(): unknown base '{name}'")]
    UnknownBase {
        name: String,
        function: String,
        pos: Position,
    },

    #[error("[{pos}] direction '{name}' is only valid as a function argument")]
    MisplacedDirection { name: String, pos: Position },

    #[error("[{pos}] base '{name}' is only valid as a function argument")]
    MisplacedBase { name: String, pos: Position },

    #[error("[{pos}] {function}(): {what} {value} is outside {range}")]
    OutOfRange {
        function: String,
        what: &'static str,
        value: f64,
        range: &'static str,
        pos: Position,
    },

    #[error("[{pos}] {function}() does not accept direction '{direction}' (use before_visible_sunrise, after_visible_sunset, before_geometric_sunrise or after_geometric_sunset)")]
    DirectionNotAllowed {
        direction: String,
        function: String,
        pos: Position,
    },

    #[error("[{pos}] type mismatch: {message}")]
    TypeMismatch { message: String, pos: Position },

    #[error("[{pos}] conditional branches differ: {then_type} vs {else_type}")]
    BranchMismatch {
        then_type: String,
        else_type: String,
        pos: Position,
    },

    #[error("formula must produce a time, found {found}")]
    NotATime { found: String },

    #[error("[{pos}] unknown reference '@{name}'")]
    UnknownReference { name: String, pos: Position },

    #[error("[{pos}] formula '{name}' references itself")]
    SelfReference { name: String, pos: Position },
}

impl ValidationError {
    pub fn position(&self) -> Option<Position> {
        match self {
            ValidationError::NotATime { .. } => None,
            ValidationError::UnknownPrimitive { pos, .. }
            | ValidationError::UnknownFunction { pos, .. }
            | ValidationError::UnknownDirection { pos, .. }
            | ValidationError::UnknownBase { pos, .. }
            | ValidationError::MisplacedDirection { pos, .. }
            | ValidationError::MisplacedBase { pos, .. }
            | ValidationError::OutOfRange { pos, .. }
            | ValidationError::DirectionNotAllowed { pos, .. }
            | ValidationError::TypeMismatch { pos, .. }
            | ValidationError::BranchMismatch { pos, .. }
            | ValidationError::UnknownReference { pos, .. }
            | ValidationError::SelfReference { pos, .. } => Some(*pos),
        }
    }
}

/// Any error raised while turning source text into a compiled formula.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl CompileError {
    pub fn position(&self) -> Option<Position> {
        match self {
            CompileError::Lex(e) => Some(e.position()),
            CompileError::Parse(e) => Some(e.position()),
            CompileError::Validation(e) => e.position(),
        }
    }
}

/// Link-time errors over a set of formulas.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("reference cycle: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("unknown formula '{name}'")]
    Unknown { name: String },
}

/// Runtime failure of one formula against one context.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("{primitive} does not occur on {date} at latitude {lat}")]
    NoSolarEvent {
        primitive: String,
        date: NaiveDate,
        lat: f64,
    },

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("undefined base '{0}'")]
    UndefinedBase(String),

    #[error("undefined reference '@{0}'")]
    UndefinedReference(String),

    #[error("{day}-{month} does not exist in {year}")]
    InvalidDate { day: u32, month: u32, year: i32 },

    #[error("invalid interval: end {end} is not after start {start}")]
    InvalidInterval { start: String, end: String },

    #[error("{0}")]
    Domain(String),
}

/// Errors building an evaluation context.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContextError {
    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),

    #[error("latitude {0} is outside -90..=90")]
    Latitude(f64),

    #[error("longitude {0} is outside -180..=180")]
    Longitude(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_display_shows_path() {
        let e = ResolveError::Cycle {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(e.to_string(), "reference cycle: a -> b -> a");
    }

    #[test]
    fn compile_error_carries_position() {
        let pos = Position {
            offset: 4,
            line: 1,
            col: 5,
        };
        let e: CompileError = LexError::UnexpectedChar { ch: '$', pos }.into();
        assert_eq!(e.position(), Some(pos));
        assert_eq!(e.to_string(), "[1:5] unexpected character '$'");
    }

    #[test]
    fn arity_message() {
        let e = ParseError::ArityMismatch {
            fn_name: "solar".into(),
            expected: Arity::Exact(2),
            got: 1,
            pos: Position::default(),
        };
        assert_eq!(e.to_string(), "[0:0] solar() takes 2 arguments, got 1");
    }
}
