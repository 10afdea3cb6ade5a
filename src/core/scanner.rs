use std::fmt;
use unicode_xid::UnicodeXID;
use crate::consts::{BUILTINS, KEYWORDS};
use TokenKind::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Number,
    Str,
    Ident,
    Keyword,
    Builtin,
    Op,
    Sep,
    EoF,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanError {
    UnexpectedChar { ch: char, line: usize, col: usize },
    UnterminatedString { line: usize, col: usize },
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::UnexpectedChar { ch, line, col } => {
                write!(f, "Unexpected character {:?} at line {}, column {}", ch, line, col)
            }
            ScanError::UnterminatedString { line, col } => {
                write!(f, "Unterminated string literal at line {}, column {}", line, col)
            }
        }
    }
}

#[derive(Debug)]
pub struct Scanner<'a> {
    input: &'a str,
    tokens: Vec<Token<'a>>,
    start: usize,
    current: usize,
    line: usize,
    col: usize,
    start_line: usize,
    start_col: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            tokens: Vec::with_capacity(128),
            start: 0,
            current: 0,
            line: 1,
            col: 1,
            start_line: 1,
            start_col: 1,
        }
    }

    pub fn start(mut self) -> Result<Vec<Token<'a>>, ScanError> {
        while !self.is_eof() {
            self.start = self.current;
            self.start_line = self.line;
            self.start_col = self.col;
            self.consume()?;
        }
        self.tokens.push(Token {
            kind: EoF,
            lexeme: "",
            line: self.line,
            col: self.col,
        });
        Ok(self.tokens)
    }

    fn consume(&mut self) -> Result<(), ScanError> {
        let c = self.advance();
        match c {
            ' ' | '\t' | '\r' | '\n' => {}
            '(' | ')' | '{' | '}' | '[' | ']' | ';' | ',' | '.' => self.push(Sep),
            '/' => self.handle_slash(),
            // a sign directly followed by a digit is part of a number literal,
            // matching longest-match-first tokenization
            '+' | '-' if self.peek().is_ascii_digit() => self.handle_number(),
            '+' | '-' | '&' | '|' | '=' | '!' | '<' | '>' => return self.handle_operator(c),
            '*' | '%' => self.push(Op),
            '"' | '\'' => return self.handle_string(c),
            _ if c.is_ascii_digit() => self.handle_number(),
            _ if UnicodeXID::is_xid_start(c) || c == '_' => self.handle_ident(),
            _ => {
                return Err(ScanError::UnexpectedChar {
                    ch: c,
                    line: self.start_line,
                    col: self.start_col,
                })
            }
        }
        Ok(())
    }

    fn handle_operator(&mut self, c: char) -> Result<(), ScanError> {
        let doubled = matches!(
            (c, self.peek()),
            ('+', '+')
                | ('-', '-')
                | ('&', '&')
                | ('|', '|')
                | ('=', '=')
                | ('!', '=')
                | ('<', '=')
                | ('>', '=')
        );
        if doubled {
            self.advance();
            self.push(Op);
            return Ok(());
        }
        // `&` and `|` only exist doubled
        if c == '&' || c == '|' {
            return Err(ScanError::UnexpectedChar {
                ch: c,
                line: self.start_line,
                col: self.start_col,
            });
        }
        self.push(Op);
        Ok(())
    }

    fn handle_slash(&mut self) {
        match self.peek() {
            '/' => {
                while !self.is_eof() && self.peek() != '\n' {
                    self.advance();
                }
            }
            '*' => {
                self.advance();
                while !self.is_eof() {
                    if self.peek() == '*' && self.peek_next() == '/' {
                        self.advance();
                        self.advance();
                        break;
                    }
                    self.advance();
                }
            }
            _ => self.push(Op),
        }
    }

    fn handle_string(&mut self, quote: char) -> Result<(), ScanError> {
        while !self.is_eof() && self.peek() != quote {
            if self.peek() == '\\' {
                self.advance();
                if self.is_eof() {
                    break;
                }
            }
            self.advance();
        }
        if self.is_eof() {
            return Err(ScanError::UnterminatedString {
                line: self.start_line,
                col: self.start_col,
            });
        }
        self.advance();
        self.push(Str);
        Ok(())
    }

    fn handle_number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }
        self.push(Number);
    }

    fn handle_ident(&mut self) {
        while UnicodeXID::is_xid_continue(self.peek()) {
            self.advance();
        }
        let lexeme = &self.input[self.start..self.current];
        let kind = if KEYWORDS.contains(&lexeme) {
            Keyword
        } else if BUILTINS.contains(&lexeme) {
            Builtin
        } else {
            Ident
        };
        self.push(kind);
    }

    fn push(&mut self, kind: TokenKind) {
        self.tokens.push(Token {
            kind,
            lexeme: &self.input[self.start..self.current],
            line: self.start_line,
            col: self.start_col,
        });
    }

    fn advance(&mut self) -> char {
        let c = self.peek();
        self.current += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        c
    }

    fn peek(&self) -> char {
        self.input[self.current..].chars().next().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        self.input[self.current..].chars().nth(1).unwrap_or('\0')
    }

    fn is_eof(&self) -> bool {
        self.current >= self.input.len()
    }
}
