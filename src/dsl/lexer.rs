//! Lexer for the formula language.
//!
//! Converts source text into a stream of [`Token`]s. Whitespace and
//! comments (`// line` and `/* block */`) are skipped; any character the
//! language does not use is an error, never silently dropped.

use super::error::{LexError, Position};
use super::names::month_from_name;
use super::token::{Token, TokenKind};

/// Tokenize `source` in one call.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).tokenize()
}

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_trivia()?;

            if self.is_at_end() {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    lexeme: String::new(),
                    pos: self.position(),
                });
                break;
            }

            let start = self.position();
            let ch = self.peek();

            let kind = match ch {
                '(' => self.single_char(TokenKind::LParen),
                ')' => self.single_char(TokenKind::RParen),
                '{' => self.single_char(TokenKind::LBrace),
                '}' => self.single_char(TokenKind::RBrace),
                ',' => self.single_char(TokenKind::Comma),
                '+' => self.single_char(TokenKind::Plus),
                '-' => self.single_char(TokenKind::Minus),
                '*' => self.single_char(TokenKind::Star),
                '/' => self.single_char(TokenKind::Slash),
                '@' => self.single_char(TokenKind::At),
                '>' => self.one_or_two('=', TokenKind::Gt, TokenKind::Ge),
                '<' => self.one_or_two('=', TokenKind::Lt, TokenKind::Le),
                '!' => self.one_or_two('=', TokenKind::Bang, TokenKind::NotEq),
                '=' => self.pair('=', TokenKind::EqEq, start)?,
                '&' => self.pair('&', TokenKind::AndAnd, start)?,
                '|' => self.pair('|', TokenKind::OrOr, start)?,
                '"' => self.lex_string(start)?,
                '0'..='9' => self.lex_number(start)?,
                '.' if self.peek_next().is_some_and(|c| c.is_ascii_digit()) => {
                    self.lex_number(start)?
                }
                'a'..='z' | 'A'..='Z' | '_' => self.lex_ident_or_keyword(),
                _ => return Err(LexError::UnexpectedChar { ch, pos: start }),
            };

            let lexeme = self.chars[start.offset..self.pos].iter().collect();
            tokens.push(Token {
                kind,
                lexeme,
                pos: start,
            });
        }

        Ok(tokens)
    }

    fn position(&self) -> Position {
        Position {
            offset: self.pos,
            line: self.line,
            col: self.col,
        }
    }

    fn peek(&self) -> char {
        self.chars[self.pos]
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> char {
        let ch = self.chars[self.pos];
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        ch
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn restore(&mut self, saved: Position) {
        self.pos = saved.offset;
        self.line = saved.line;
        self.col = saved.col;
    }

    /// Skip whitespace and comments until a token starts.
    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            while !self.is_at_end() && self.peek().is_whitespace() {
                self.advance();
            }
            if self.is_at_end() || self.peek() != '/' {
                return Ok(());
            }
            match self.peek_next() {
                Some('/') => {
                    while !self.is_at_end() && self.peek() != '\n' {
                        self.advance();
                    }
                }
                Some('*') => {
                    let start = self.position();
                    self.advance();
                    self.advance();
                    loop {
                        if self.is_at_end() {
                            return Err(LexError::UnterminatedComment { pos: start });
                        }
                        if self.peek() == '*' && self.peek_next() == Some('/') {
                            self.advance();
                            self.advance();
                            break;
                        }
                        self.advance();
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn single_char(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    /// `>` vs `>=` style operators.
    fn one_or_two(&mut self, second: char, one: TokenKind, two: TokenKind) -> TokenKind {
        self.advance();
        if !self.is_at_end() && self.peek() == second {
            self.advance();
            two
        } else {
            one
        }
    }

    /// Operators that only exist doubled: `==`, `&&`, `||`.
    fn pair(&mut self, second: char, kind: TokenKind, start: Position) -> Result<TokenKind, LexError> {
        let first = self.advance();
        if !self.is_at_end() && self.peek() == second {
            self.advance();
            Ok(kind)
        } else {
            Err(LexError::UnexpectedChar {
                ch: first,
                pos: start,
            })
        }
    }

    fn lex_string(&mut self, start: Position) -> Result<TokenKind, LexError> {
        self.advance(); // opening quote
        let mut s = String::new();
        while !self.is_at_end() && self.peek() != '"' {
            if self.peek() == '\n' {
                break;
            }
            s.push(self.advance());
        }
        if self.is_at_end() || self.peek() != '"' {
            return Err(LexError::UnterminatedString { pos: start });
        }
        self.advance(); // closing quote
        Ok(TokenKind::Str(s))
    }

    fn read_digits(&mut self) -> String {
        let mut s = String::new();
        while !self.is_at_end() && self.peek().is_ascii_digit() {
            s.push(self.advance());
        }
        s
    }

    fn read_letters(&mut self) -> String {
        let mut s = String::new();
        while !self.is_at_end() && self.peek().is_ascii_alphabetic() {
            s.push(self.advance());
        }
        s
    }

    /// Numbers, durations (`72min`, `1.5h`, `1h 30min`) and dates (`21-May`).
    fn lex_number(&mut self, start: Position) -> Result<TokenKind, LexError> {
        let mut text = self.read_digits();
        let is_integer = self.is_at_end() || self.peek() != '.';
        if !is_integer {
            text.push(self.advance());
            text.push_str(&self.read_digits());
        }

        let value: f64 = text.parse().map_err(|_| LexError::InvalidNumber {
            text: text.clone(),
            pos: start,
        })?;

        if is_integer && self.peek_date_suffix() {
            return self.lex_date(&text, start);
        }

        if self.is_at_end() || !self.peek().is_ascii_alphabetic() {
            return Ok(TokenKind::Number(value));
        }

        let unit_pos = self.position();
        let unit = self.read_letters();
        let minutes = match unit_minutes(&unit) {
            Some(scale) => value * scale,
            None => {
                return Err(LexError::UnknownUnit {
                    unit,
                    pos: unit_pos,
                })
            }
        };

        if unit_minutes(&unit) == Some(60.0) {
            if let Some(extra) = self.lex_trailing_minutes() {
                return Ok(TokenKind::Duration(minutes + extra));
            }
        }

        Ok(TokenKind::Duration(minutes))
    }

    /// The `30min` of `1h 30min`, if present.
    fn lex_trailing_minutes(&mut self) -> Option<f64> {
        let saved = self.position();
        while !self.is_at_end() && matches!(self.peek(), ' ' | '\t') {
            self.advance();
        }
        let digits = self.read_digits();
        let unit = self.read_letters();
        let followed_by_word = !self.is_at_end()
            && (self.peek().is_ascii_alphanumeric() || self.peek() == '_');
        if !digits.is_empty() && unit_minutes(&unit) == Some(1.0) && !followed_by_word {
            if let Ok(m) = digits.parse::<f64>() {
                return Some(m);
            }
        }
        self.restore(saved);
        None
    }

    /// A `-` followed by a month name.
    fn peek_date_suffix(&self) -> bool {
        if self.is_at_end() || self.peek() != '-' {
            return false;
        }
        let mut word = String::new();
        let mut i = 1;
        while let Some(c) = self.peek_at(i) {
            if !c.is_ascii_alphabetic() {
                break;
            }
            word.push(c);
            i += 1;
        }
        word.len() >= 3 && month_from_name(&word).is_some()
    }

    fn lex_date(&mut self, day_text: &str, start: Position) -> Result<TokenKind, LexError> {
        self.advance(); // '-'
        let month_name = self.read_letters();
        let text = format!("{day_text}-{month_name}");
        let invalid = || LexError::InvalidDate {
            text: text.clone(),
            pos: start,
        };

        let month = month_from_name(&month_name).ok_or_else(invalid)?;
        let day: u32 = day_text.parse().map_err(|_| invalid())?;
        if day_text.len() > 2 || day == 0 || day > days_in_month(month) {
            return Err(invalid());
        }
        Ok(TokenKind::Date { day, month })
    }

    fn lex_ident_or_keyword(&mut self) -> TokenKind {
        let mut s = String::new();
        while !self.is_at_end() && (self.peek().is_ascii_alphanumeric() || self.peek() == '_') {
            s.push(self.advance());
        }

        match s.as_str() {
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ => TokenKind::Ident(s),
        }
    }
}

/// Minutes per unit for duration suffixes.
fn unit_minutes(unit: &str) -> Option<f64> {
    match unit {
        "min" | "mins" | "minute" | "minutes" => Some(1.0),
        "h" | "hr" | "hrs" | "hour" | "hours" => Some(60.0),
        _ => None,
    }
}

/// Longest a month can be; February allows the 29th.
fn days_in_month(month: u32) -> u32 {
    match month {
        2 => 29,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}
