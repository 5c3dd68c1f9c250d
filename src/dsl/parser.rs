//! Parser for the formula language.
//!
//! Recursive descent with one function per precedence level, lowest first:
//! `||`, `&&`, comparison, `+ -`, `* /`, unary `! -`, primary. Function
//! arity is checked here; name resolution problems are left for the
//! validator so they can be reported together.

use super::ast::{BaseRef, BinaryOp, Callee, Expr, Literal, Node, UnaryOp};
use super::error::{ParseError, Position};
use super::names::{Arity, Base, ConditionVar, Direction, Function, Primitive};
use super::token::{Token, TokenKind};
use crate::time;

/// Parse a complete token stream into a single expression.
pub fn parse(tokens: Vec<Token>) -> Result<Node, ParseError> {
    Parser::new(tokens).parse()
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last(), Some(t) if t.kind == TokenKind::Eof) {
            let pos = tokens.last().map(|t| t.pos).unwrap_or_default();
            tokens.push(Token {
                kind: TokenKind::Eof,
                lexeme: String::new(),
                pos,
            });
        }
        Self { tokens, pos: 0 }
    }

    pub fn parse(&mut self) -> Result<Node, ParseError> {
        let node = self.parse_expr()?;
        if !self.is_at_end() {
            return Err(self.unexpected("end of formula"));
        }
        Ok(node)
    }

    fn parse_expr(&mut self) -> Result<Node, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Node, ParseError> {
        let mut lhs = self.parse_and()?;
        while self.check(&TokenKind::OrOr) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Node, ParseError> {
        let mut lhs = self.parse_comparison()?;
        while self.check(&TokenKind::AndAnd) {
            self.advance();
            let rhs = self.parse_comparison()?;
            lhs = binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Node, ParseError> {
        let lhs = self.parse_additive()?;
        let op = match self.peek().kind {
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Ge => BinaryOp::Ge,
            TokenKind::Le => BinaryOp::Le,
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::NotEq => BinaryOp::NotEq,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_additive()?;
        Ok(binary(op, lhs, rhs))
    }

    fn parse_additive(&mut self) -> Result<Node, ParseError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Node, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_unary(&mut self) -> Result<Node, ParseError> {
        let pos = self.peek().pos;
        match self.peek().kind {
            TokenKind::Bang => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Node::new(
                    Expr::Unary {
                        op: UnaryOp::Not,
                        operand: Box::new(operand),
                    },
                    pos,
                ))
            }
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_unary()?;
                // Fold negative literals so `-16.1` stays a constant.
                let expr = match operand.expr {
                    Expr::Literal(Literal::Number(n)) => Expr::Literal(Literal::Number(-n)),
                    Expr::Literal(Literal::Duration(d)) => Expr::Literal(Literal::Duration(-d)),
                    expr => Expr::Unary {
                        op: UnaryOp::Neg,
                        operand: Box::new(Node::new(expr, operand.pos)),
                    },
                };
                Ok(Node::new(expr, pos))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Node, ParseError> {
        let token = self.peek().clone();
        let pos = token.pos;
        let expr = match token.kind {
            TokenKind::Number(n) => {
                self.advance();
                Expr::Literal(Literal::Number(n))
            }
            TokenKind::Duration(m) => {
                let duration = time::minutes(m).ok_or_else(|| ParseError::DurationOutOfRange {
                    literal: token.lexeme.clone(),
                    pos,
                })?;
                self.advance();
                Expr::Literal(Literal::Duration(duration))
            }
            TokenKind::Date { day, month } => {
                self.advance();
                Expr::Literal(Literal::Date { day, month })
            }
            TokenKind::Str(s) => {
                self.advance();
                Expr::Literal(Literal::String(s))
            }
            TokenKind::True => {
                self.advance();
                Expr::Literal(Literal::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                Expr::Literal(Literal::Bool(false))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                return Ok(inner);
            }
            TokenKind::At => {
                self.advance();
                let name = self.expect_ident("formula key after '@'")?;
                Expr::Reference(name)
            }
            TokenKind::If => return self.parse_conditional(),
            TokenKind::Ident(name) => {
                self.advance();
                if self.check(&TokenKind::LParen) {
                    self.parse_call(name, pos)?
                } else {
                    classify_word(name)
                }
            }
            _ => return Err(self.unexpected("an expression")),
        };
        Ok(Node::new(expr, pos))
    }

    /// `if (cond) { expr } else { expr }`, with `else if` chains.
    fn parse_conditional(&mut self) -> Result<Node, ParseError> {
        let pos = self.peek().pos;
        self.expect(TokenKind::If, "'if'")?;
        self.expect(TokenKind::LParen, "'(' after 'if'")?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen, "')' after condition")?;
        let then = self.parse_block()?;
        self.expect(TokenKind::Else, "'else' (every 'if' needs an 'else' branch)")?;
        let otherwise = if self.check(&TokenKind::If) {
            self.parse_conditional()?
        } else {
            self.parse_block()?
        };
        Ok(Node::new(
            Expr::Conditional {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
            pos,
        ))
    }

    fn parse_block(&mut self) -> Result<Node, ParseError> {
        self.expect(TokenKind::LBrace, "'{'")?;
        let inner = self.parse_expr()?;
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(inner)
    }

    fn parse_call(&mut self, name: String, pos: Position) -> Result<Expr, ParseError> {
        let args = self.parse_args()?;

        if name == "custom" {
            let arity = Arity::Exact(2);
            check_arity(&name, arity, args.len(), pos)?;
            let mut it = args.into_iter();
            return match (it.next(), it.next()) {
                (Some(start), Some(end)) => {
                    Ok(Expr::Base(BaseRef::Custom(Box::new(start), Box::new(end))))
                }
                _ => Err(ParseError::ArityMismatch {
                    fn_name: name,
                    expected: arity,
                    got: 0,
                    pos,
                }),
            };
        }

        let callee = match Function::from_name(&name) {
            Some(function) => {
                check_arity(&name, function.arity(), args.len(), pos)?;
                Callee::Builtin(function)
            }
            None => Callee::Unknown(name),
        };
        Ok(Expr::Call { callee, args })
    }

    fn parse_args(&mut self) -> Result<Vec<Node>, ParseError> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut args = Vec::new();
        if self.check(&TokenKind::RParen) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if self.check(&TokenKind::Comma) {
                self.advance();
                continue;
            }
            self.expect(TokenKind::RParen, "',' or ')'")?;
            return Ok(args);
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> &Token {
        let token = &self.tokens[self.pos];
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<&Token, ParseError> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_ident(&mut self, expected: &str) -> Result<String, ParseError> {
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let t = self.peek();
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: t.kind.to_string(),
            pos: t.pos,
        }
    }
}

fn binary(op: BinaryOp, lhs: Node, rhs: Node) -> Node {
    let pos = lhs.pos;
    Node::new(
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        pos,
    )
}

fn check_arity(name: &str, arity: Arity, got: usize, pos: Position) -> Result<(), ParseError> {
    if arity.accepts(got) {
        Ok(())
    } else {
        Err(ParseError::ArityMismatch {
            fn_name: name.to_string(),
            expected: arity,
            got,
            pos,
        })
    }
}

/// Resolve a bare word against each vocabulary in turn.
fn classify_word(name: String) -> Expr {
    if let Some(p) = Primitive::from_name(&name) {
        Expr::Primitive(p)
    } else if let Some(b) = Base::from_name(&name) {
        Expr::Base(BaseRef::Named(b))
    } else if let Some(d) = Direction::from_name(&name) {
        Expr::Direction(d)
    } else if let Some(v) = ConditionVar::from_name(&name) {
        Expr::Condition(v)
    } else {
        Expr::Ident(name)
    }
}
