use std::fmt;
use smallvec::SmallVec;
use crate::core::scanner::{Token, TokenKind};
use crate::core::types::Qualifier;

#[derive(Debug, Clone, PartialEq)]
pub enum NumberLit {
    Int(i64),
    Float(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr<'a> {
    Number { value: NumberLit },
    /// string contents with the quotes stripped, escapes still raw
    Str { raw: &'a str },
    Bool { value: bool },
    Null,
    Var { name: Token<'a> },
    Unary { op: Token<'a>, operand: Box<Expr<'a>> },
    Binary { op: Token<'a>, lhs: Box<Expr<'a>>, rhs: Box<Expr<'a>> },
    Call { callee: Token<'a>, args: Vec<Expr<'a>> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt<'a> {
    VarDecl {
        qualifier: Qualifier,
        name: Token<'a>,
        init: Option<Expr<'a>>,
    },
    Assign {
        name: Token<'a>,
        value: Expr<'a>,
    },
    Fn {
        name: Token<'a>,
        params: SmallVec<[Token<'a>; 4]>,
        body: Vec<Stmt<'a>>,
    },
    Return {
        value: Expr<'a>,
    },
    Call {
        callee: Token<'a>,
        args: Vec<Expr<'a>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    Expected { expected: String, found: String, line: usize },
    Unexpected { found: String, line: usize },
    InvalidNumber { literal: String, line: usize },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Expected { expected, found, line } => {
                write!(f, "Expected {}, got {} at line {}", expected, found, line)
            }
            ParseError::Unexpected { found, line } => {
                write!(f, "Unexpected token {} at line {}", found, line)
            }
            ParseError::InvalidNumber { literal, line } => {
                write!(f, "Number literal '{}' out of range at line {}", literal, line)
            }
        }
    }
}

fn precedence(op: &str) -> Option<u8> {
    match op {
        "||" => Some(1),
        "&&" => Some(2),
        "==" | "!=" | "<" | ">" | "<=" | ">=" => Some(3),
        "+" | "-" => Some(4),
        "*" | "/" | "%" => Some(5),
        _ => None,
    }
}

#[derive(Debug)]
pub struct Parser<'t, 'a> {
    tokens: &'t [Token<'a>],
    current: usize,
}

impl<'t, 'a> Parser<'t, 'a> {
    pub fn new(tokens: &'t [Token<'a>]) -> Self {
        Self { tokens, current: 0 }
    }

    pub fn start(&mut self) -> Result<Vec<Stmt<'a>>, ParseError> {
        let mut stmts = Vec::new();
        while !self.is_at_end() {
            stmts.push(self.statement()?);
        }
        Ok(stmts)
    }

    //
    // parse statements
    //

    fn statement(&mut self) -> Result<Stmt<'a>, ParseError> {
        let token = self.peek();
        match token.kind {
            TokenKind::Keyword => match token.lexeme {
                "let" | "mut" | "const" => self.var_decl(),
                "fn" => self.function_def(),
                "return" => self.return_stmt(),
                _ => Err(self.unexpected()),
            },
            TokenKind::Ident | TokenKind::Builtin => {
                if self.peek_next().lexeme == "(" {
                    self.call_stmt()
                } else if self.peek_next().lexeme == "=" {
                    self.assignment()
                } else {
                    Err(self.unexpected())
                }
            }
            _ => Err(self.unexpected()),
        }
    }

    fn var_decl(&mut self) -> Result<Stmt<'a>, ParseError> {
        let kind = self.advance();
        let qualifier = match kind.lexeme {
            "mut" => Qualifier::Mut,
            "const" => Qualifier::Const,
            _ => Qualifier::Let,
        };
        let name = self.consume_kind(TokenKind::Ident, "an identifier")?;
        let init = if self.match_op("=") {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume_sep(";")?;
        Ok(Stmt::VarDecl { qualifier, name, init })
    }

    fn assignment(&mut self) -> Result<Stmt<'a>, ParseError> {
        let name = self.consume_kind(TokenKind::Ident, "an identifier")?;
        self.consume_op("=")?;
        let value = self.expression()?;
        self.consume_sep(";")?;
        Ok(Stmt::Assign { name, value })
    }

    fn function_def(&mut self) -> Result<Stmt<'a>, ParseError> {
        self.advance();
        let name = self.consume_kind(TokenKind::Ident, "an identifier")?;
        self.consume_sep("(")?;
        let mut params = SmallVec::new();
        if !self.check_sep(")") {
            params.push(self.consume_kind(TokenKind::Ident, "a parameter name")?);
            while self.match_sep(",") {
                params.push(self.consume_kind(TokenKind::Ident, "a parameter name")?);
            }
        }
        self.consume_sep(")")?;
        self.consume_sep("{")?;
        let mut body = Vec::new();
        while !self.check_sep("}") && !self.is_at_end() {
            body.push(self.statement()?);
        }
        self.consume_sep("}")?;
        Ok(Stmt::Fn { name, params, body })
    }

    fn return_stmt(&mut self) -> Result<Stmt<'a>, ParseError> {
        self.advance();
        let value = self.expression()?;
        self.consume_sep(";")?;
        Ok(Stmt::Return { value })
    }

    fn call_stmt(&mut self) -> Result<Stmt<'a>, ParseError> {
        let callee = self.advance();
        let args = self.arguments()?;
        self.consume_sep(";")?;
        Ok(Stmt::Call { callee, args })
    }

    //
    // parse expressions
    //

    fn expression(&mut self) -> Result<Expr<'a>, ParseError> {
        self.binary(0)
    }

    fn binary(&mut self, min_prec: u8) -> Result<Expr<'a>, ParseError> {
        let mut expr = self.primary()?;
        loop {
            let token = self.peek();
            if token.kind != TokenKind::Op {
                break;
            }
            let prec = match precedence(token.lexeme) {
                Some(prec) if prec >= min_prec => prec,
                _ => break,
            };
            let op = self.advance();
            let rhs = self.binary(prec + 1)?;
            expr = Expr::Binary {
                op,
                lhs: Box::new(expr),
                rhs: Box::new(rhs),
            };
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr<'a>, ParseError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number => {
                self.advance();
                let value = if token.lexeme.contains('.') {
                    match token.lexeme.parse::<f64>() {
                        Ok(v) => NumberLit::Float(v),
                        Err(_) => {
                            return Err(ParseError::InvalidNumber {
                                literal: token.lexeme.to_string(),
                                line: token.line,
                            })
                        }
                    }
                } else {
                    match token.lexeme.parse::<i64>() {
                        Ok(v) => NumberLit::Int(v),
                        Err(_) => {
                            return Err(ParseError::InvalidNumber {
                                literal: token.lexeme.to_string(),
                                line: token.line,
                            })
                        }
                    }
                };
                Ok(Expr::Number { value })
            }
            TokenKind::Str => {
                self.advance();
                Ok(Expr::Str {
                    raw: &token.lexeme[1..token.lexeme.len() - 1],
                })
            }
            TokenKind::Keyword if token.lexeme == "true" || token.lexeme == "false" => {
                self.advance();
                Ok(Expr::Bool { value: token.lexeme == "true" })
            }
            TokenKind::Keyword if token.lexeme == "null" => {
                self.advance();
                Ok(Expr::Null)
            }
            TokenKind::Ident | TokenKind::Builtin => {
                let name = self.advance();
                if self.check_sep("(") {
                    let args = self.arguments()?;
                    Ok(Expr::Call { callee: name, args })
                } else {
                    Ok(Expr::Var { name })
                }
            }
            TokenKind::Sep if token.lexeme == "(" => {
                self.advance();
                let expr = self.expression()?;
                self.consume_sep(")")?;
                Ok(expr)
            }
            TokenKind::Op if matches!(token.lexeme, "+" | "-" | "!" | "++" | "--") => {
                let op = self.advance();
                let operand = self.primary()?;
                Ok(Expr::Unary {
                    op,
                    operand: Box::new(operand),
                })
            }
            _ => Err(self.expected("an expression")),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr<'a>>, ParseError> {
        self.consume_sep("(")?;
        let mut args = Vec::new();
        if !self.check_sep(")") {
            args.push(self.expression()?);
            while self.match_sep(",") {
                args.push(self.expression()?);
            }
        }
        self.consume_sep(")")?;
        Ok(args)
    }

    //
    // parser helpers
    //

    fn peek(&self) -> &Token<'a> {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn peek_next(&self) -> &Token<'a> {
        &self.tokens[(self.current + 1).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token<'a> {
        let token = self.peek().clone();
        if !self.is_at_end() {
            self.current += 1;
        }
        token
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::EoF
    }

    fn check_sep(&self, sep: &str) -> bool {
        let token = self.peek();
        token.kind == TokenKind::Sep && token.lexeme == sep
    }

    fn match_sep(&mut self, sep: &str) -> bool {
        if self.check_sep(sep) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_op(&mut self, op: &str) -> bool {
        let token = self.peek();
        if token.kind == TokenKind::Op && token.lexeme == op {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume_sep(&mut self, sep: &str) -> Result<Token<'a>, ParseError> {
        if self.check_sep(sep) {
            Ok(self.advance())
        } else {
            Err(self.expected(&format!("'{}'", sep)))
        }
    }

    fn consume_op(&mut self, op: &str) -> Result<Token<'a>, ParseError> {
        let token = self.peek();
        if token.kind == TokenKind::Op && token.lexeme == op {
            Ok(self.advance())
        } else {
            Err(self.expected(&format!("'{}'", op)))
        }
    }

    fn consume_kind(&mut self, kind: TokenKind, expected: &str) -> Result<Token<'a>, ParseError> {
        if self.peek().kind == kind {
            Ok(self.advance())
        } else {
            Err(self.expected(expected))
        }
    }

    fn found_desc(&self) -> String {
        let token = self.peek();
        if token.kind == TokenKind::EoF {
            "end of input".to_string()
        } else {
            format!("'{}'", token.lexeme)
        }
    }

    fn expected(&self, what: &str) -> ParseError {
        ParseError::Expected {
            expected: what.to_string(),
            found: self.found_desc(),
            line: self.peek().line,
        }
    }

    fn unexpected(&self) -> ParseError {
        ParseError::Unexpected {
            found: self.found_desc(),
            line: self.peek().line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scanner::Scanner;

    fn parse(input: &str) -> Result<Vec<Stmt<'_>>, ParseError> {
        let tokens = Scanner::new(input).start().unwrap();
        let stmts = Parser::new(&tokens).start();
        stmts
    }

    fn single_init(input: &str) -> Expr<'_> {
        let mut stmts = parse(input).unwrap();
        match stmts.remove(0) {
            Stmt::VarDecl { init: Some(expr), .. } => expr,
            other => panic!("expected a declaration, got {:?}", other),
        }
    }

    fn op_of<'a>(expr: &Expr<'a>) -> &'a str {
        match expr {
            Expr::Binary { op, .. } => op.lexeme,
            other => panic!("expected a binary expression, got {:?}", other),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let expr = single_init("let x = 2 + 3 * 4;");
        assert_eq!(op_of(&expr), "+");
        if let Expr::Binary { rhs, .. } = expr {
            assert_eq!(op_of(&rhs), "*");
        }
    }

    #[test]
    fn subtraction_associates_left() {
        let expr = single_init("let x = 10 - 2 - 3;");
        assert_eq!(op_of(&expr), "-");
        if let Expr::Binary { lhs, rhs, .. } = expr {
            assert_eq!(op_of(&lhs), "-");
            assert_eq!(*rhs, Expr::Number { value: NumberLit::Int(3) });
        }
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let expr = single_init("let x = 1 || 0 && 0;");
        assert_eq!(op_of(&expr), "||");
        if let Expr::Binary { rhs, .. } = expr {
            assert_eq!(op_of(&rhs), "&&");
        }
    }

    #[test]
    fn unary_binds_to_the_next_primary_only() {
        let expr = single_init("let x = -y + 1;");
        assert_eq!(op_of(&expr), "+");
        if let Expr::Binary { lhs, .. } = expr {
            assert!(matches!(*lhs, Expr::Unary { .. }));
        }
    }

    #[test]
    fn parenthesized_expression_returns_the_inner_node() {
        let expr = single_init("let x = (1 + 2) * 3;");
        assert_eq!(op_of(&expr), "*");
        if let Expr::Binary { lhs, .. } = expr {
            assert_eq!(op_of(&lhs), "+");
        }
    }

    #[test]
    fn declaration_without_initializer() {
        let stmts = parse("let x;").unwrap();
        assert!(matches!(
            &stmts[0],
            Stmt::VarDecl { qualifier: Qualifier::Let, init: None, .. }
        ));
    }

    #[test]
    fn function_definition_shape() {
        let stmts = parse("fn add(a, b) { return a + b; }").unwrap();
        match &stmts[0] {
            Stmt::Fn { name, params, body } => {
                assert_eq!(name.lexeme, "add");
                assert_eq!(params.len(), 2);
                assert_eq!(params[1].lexeme, "b");
                assert!(matches!(body[0], Stmt::Return { .. }));
            }
            other => panic!("expected a function definition, got {:?}", other),
        }
    }

    #[test]
    fn call_statement_with_arguments() {
        let stmts = parse("print(1, \"two\", x);").unwrap();
        match &stmts[0] {
            Stmt::Call { callee, args } => {
                assert_eq!(callee.lexeme, "print");
                assert_eq!(args.len(), 3);
                assert_eq!(args[1], Expr::Str { raw: "two" });
            }
            other => panic!("expected a call statement, got {:?}", other),
        }
    }

    #[test]
    fn missing_semicolon_fails_fast() {
        let err = parse("let x = 1").unwrap_err();
        assert_eq!(
            err,
            ParseError::Expected {
                expected: "';'".to_string(),
                found: "end of input".to_string(),
                line: 1,
            }
        );
    }

    #[test]
    fn assignment_to_a_builtin_name_is_rejected() {
        let err = parse("print = 5;").unwrap_err();
        assert!(matches!(err, ParseError::Expected { .. }));
    }

    #[test]
    fn bare_identifier_statement_is_rejected() {
        let err = parse("x;").unwrap_err();
        assert_eq!(
            err,
            ParseError::Unexpected { found: "'x'".to_string(), line: 1 }
        );
    }

    #[test]
    fn unparsed_keywords_are_rejected() {
        assert!(parse("while 1 { }").is_err());
        assert!(parse("if x { }").is_err());
    }

    #[test]
    fn integer_literal_out_of_range() {
        let err = parse("let x = 99999999999999999999;").unwrap_err();
        assert!(matches!(err, ParseError::InvalidNumber { .. }));
    }
}
