//! Abstract syntax tree for formulas.
//!
//! Words are classified by the parser into primitives, bases, directions
//! and condition variables. Words that match nothing stay as
//! [`Expr::Ident`] and unknown function names as [`Callee::Unknown`], so
//! the validator can report every one of them in a single pass.

use std::fmt;

use chrono::TimeDelta;

use super::error::Position;
use super::names::{Base, ConditionVar, Direction, Function, Primitive};

/// An expression together with where it starts in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub expr: Expr,
    pub pos: Position,
}

impl Node {
    pub fn new(expr: Expr, pos: Position) -> Self {
        Self { expr, pos }
    }

    /// Visit this node and every descendant, parents first.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Node)) {
        visit(self);
        match &self.expr {
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.walk(visit);
                }
            }
            Expr::Base(BaseRef::Custom(start, end)) => {
                start.walk(visit);
                end.walk(visit);
            }
            Expr::Binary { lhs, rhs, .. } => {
                lhs.walk(visit);
                rhs.walk(visit);
            }
            Expr::Unary { operand, .. } => operand.walk(visit),
            Expr::Conditional {
                cond,
                then,
                otherwise,
            } => {
                cond.walk(visit);
                then.walk(visit);
                otherwise.walk(visit);
            }
            _ => {}
        }
    }

    /// Keys of every `@reference` in this tree, in source order.
    pub fn references(&self) -> Vec<&str> {
        let mut refs = Vec::new();
        self.walk(&mut |node| {
            if let Expr::Reference(name) = &node.expr {
                refs.push(name.as_str());
            }
        });
        refs
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Duration(TimeDelta),
    /// Day and month; the year comes from the evaluation context.
    Date { day: u32, month: u32 },
    String(String),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Callee {
    Builtin(Function),
    Unknown(String),
}

impl fmt::Display for Callee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callee::Builtin(func) => write!(f, "{func}"),
            Callee::Unknown(name) => f.write_str(name),
        }
    }
}

/// A day-boundary definition, valid only as a function argument.
#[derive(Debug, Clone, PartialEq)]
pub enum BaseRef {
    Named(Base),
    Custom(Box<Node>, Box<Node>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    NotEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Gt => ">",
            BinaryOp::Lt => "<",
            BinaryOp::Ge => ">=",
            BinaryOp::Le => "<=",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Gt
                | BinaryOp::Lt
                | BinaryOp::Ge
                | BinaryOp::Le
                | BinaryOp::Eq
                | BinaryOp::NotEq
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Primitive(Primitive),
    /// A word that names nothing the language knows.
    Ident(String),
    Call {
        callee: Callee,
        args: Vec<Node>,
    },
    Reference(String),
    Binary {
        op: BinaryOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Node>,
    },
    Conditional {
        cond: Box<Node>,
        then: Box<Node>,
        otherwise: Box<Node>,
    },
    Base(BaseRef),
    Direction(Direction),
    Condition(ConditionVar),
}
