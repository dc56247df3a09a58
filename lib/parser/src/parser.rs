mod expr;
mod stmt;

pub use expr::Expr;
pub use stmt::{Placeholder, Stmt};

use errors::{Diagnostic, Diagnostics};
use scanner::{Token, TokenKind};
use value::Value;

use TokenKind::*;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ParseErrorType {
    #[error("Expect expression.")]
    ExpectedExpression,
    #[error("Expect '(' after '{0}'.")]
    ExpectedLeftParen(&'static str),
    #[error("Expect ')' after {0}.")]
    ExpectedRightParen(&'static str),
    #[error("Expect ';' after {0}.")]
    ExpectedSemicolon(&'static str),
    #[error("Expect variable name.")]
    ExpectedVariableName,
    #[error("Expect '}}' after block.")]
    ExpectedRightBrace,
    #[error("Invalid assignment target.")]
    InvalidAssignmentTarget,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("[line {}] Error at {}: {error}", .token.line, .token.location())]
pub struct ParseError {
    error: ParseErrorType,
    token: Token,
}

impl ParseError {
    fn new(error: ParseErrorType, token: Token) -> Self {
        Self { error, token }
    }
}

impl From<ParseError> for Diagnostic {
    fn from(e: ParseError) -> Self {
        Diagnostic::compile(e.token.line, e.token.location(), e.error)
    }
}

pub type Result<T> = std::result::Result<T, ParseError>;

/// Parses `tokens` into a list of declarations.
///
/// Every declaration is kept: the ones that failed to parse are `None`, and
/// their errors are reported to `diagnostics`.
pub fn parse(tokens: Vec<Token>, diagnostics: &mut Diagnostics) -> Vec<Option<Stmt>> {
    Parser::new(tokens, diagnostics).parse()
}

#[derive(Debug)]
pub struct Parser<'d> {
    tokens: Vec<Token>,
    current: usize,
    diagnostics: &'d mut Diagnostics,
}

impl<'d> Parser<'d> {
    pub fn new(mut tokens: Vec<Token>, diagnostics: &'d mut Diagnostics) -> Self {
        if tokens.last().map(|t| t.kind) != Some(Eof) {
            let line = tokens.last().map(|t| t.line).unwrap_or_default();
            tokens.push(Token::new(Eof, "", line));
        }
        Self { tokens, current: 0, diagnostics }
    }

    pub fn parse(mut self) -> Vec<Option<Stmt>> {
        let mut stmts = Vec::new();
        while !self.is_at_end() {
            stmts.push(self.declaration());
        }
        stmts
    }

    /// The recovery boundary: a failed declaration is reported, the parser
    /// skips ahead to the next statement and `None` takes the declaration's place.
    fn declaration(&mut self) -> Option<Stmt> {
        let result = if self.match_token(Var).is_some() {
            self.var_declaration()
        } else {
            self.statement()
        };

        match result {
            Ok(stmt) => {
                log::debug!("Parsed declaration: {}", stmt);
                Some(stmt)
            }
            Err(e) => {
                log::trace!("Hit error: {:?}, syncing...", e);
                self.diagnostics.report(e);
                self.synchronize();
                None
            }
        }
    }

    fn var_declaration(&mut self) -> Result<Stmt> {
        let name = self.consume(Identifier, ParseErrorType::ExpectedVariableName)?;

        let initializer = match self.match_token(Equal) {
            Some(_) => Some(self.expression()?),
            None => None,
        };

        self.consume(Semicolon, ParseErrorType::ExpectedSemicolon("variable declaration"))?;

        Ok(Stmt::Var { name, initializer })
    }

    fn statement(&mut self) -> Result<Stmt> {
        if self.match_token(Print).is_some() {
            return self.print_statement();
        }

        if self.match_token(LeftBrace).is_some() {
            return self.block();
        }

        if self.match_token(If).is_some() {
            return self.if_statement();
        }

        if self.match_token(While).is_some() {
            return self.while_statement();
        }

        self.expression_statement()
    }

    fn while_statement(&mut self) -> Result<Stmt> {
        self.consume(LeftParen, ParseErrorType::ExpectedLeftParen("while"))?;
        let condition = self.expression()?;
        self.consume(RightParen, ParseErrorType::ExpectedRightParen("condition"))?;

        let body = Box::new(self.statement()?);

        Ok(Stmt::While { condition, body })
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        self.consume(LeftParen, ParseErrorType::ExpectedLeftParen("if"))?;
        let condition = self.expression()?;
        self.consume(RightParen, ParseErrorType::ExpectedRightParen("if condition"))?;

        let then_branch = Box::new(self.statement()?);

        // Each branch is exactly one statement, so an `else` always belongs
        // to the innermost `if` still waiting for one.
        let else_branch = match self.match_token(Else) {
            Some(_) => Some(Box::new(self.statement()?)),
            None => None,
        };

        Ok(Stmt::If { condition, then_branch, else_branch })
    }

    fn block(&mut self) -> Result<Stmt> {
        let mut stmts = Vec::new();

        while !self.check(RightBrace) && !self.is_at_end() {
            stmts.push(self.declaration());
        }

        self.consume(RightBrace, ParseErrorType::ExpectedRightBrace)?;
        Ok(Stmt::Block(stmts))
    }

    fn print_statement(&mut self) -> Result<Stmt> {
        let value = self.expression()?;
        self.consume(Semicolon, ParseErrorType::ExpectedSemicolon("value"))?;
        Ok(Stmt::Print(value))
    }

    fn expression_statement(&mut self) -> Result<Stmt> {
        let expr = self.expression()?;
        self.consume(Semicolon, ParseErrorType::ExpectedSemicolon("expression"))?;
        Ok(Stmt::Expression(expr))
    }

    fn expression(&mut self) -> Result<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr> {
        let expr = self.or()?;

        if let Some(equals) = self.match_token(Equal) {
            let value = Box::new(self.assignment()?);

            return match expr {
                Expr::Variable(name) => Ok(Expr::Assign { name, value }),
                expr => {
                    // Reported, but the parser isn't confused: no need to synchronize.
                    self.diagnostics
                        .report(ParseError::new(ParseErrorType::InvalidAssignmentTarget, equals));
                    Ok(expr)
                }
            };
        }

        Ok(expr)
    }

    fn or(&mut self) -> Result<Expr> {
        let mut expr = self.and()?;

        while let Some(operator) = self.match_token(Or) {
            let right = self.and()?;
            expr = Expr::logical(expr, operator, right);
        }

        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut expr = self.equality()?;

        while let Some(operator) = self.match_token(And) {
            let right = self.equality()?;
            expr = Expr::logical(expr, operator, right);
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr> {
        let mut expr = self.comparison()?;

        while let Some(operator) = self.match_any(&[BangEqual, EqualEqual]) {
            let right = self.comparison()?;
            expr = Expr::binary(expr, operator, right);
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr> {
        let mut expr = self.term()?;

        while let Some(operator) = self.match_any(&[Greater, GreaterEqual, Less, LessEqual]) {
            let right = self.term()?;
            expr = Expr::binary(expr, operator, right);
        }
        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr> {
        let mut expr = self.factor()?;

        while let Some(operator) = self.match_any(&[Minus, Plus]) {
            let right = self.factor()?;
            expr = Expr::binary(expr, operator, right);
        }
        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr> {
        let mut expr = self.unary()?;

        while let Some(operator) = self.match_any(&[Slash, Star]) {
            let right = self.unary()?;
            expr = Expr::binary(expr, operator, right);
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr> {
        if let Some(operator) = self.match_any(&[Bang, Minus]) {
            let right = Box::new(self.unary()?);
            return Ok(Expr::Unary { operator, right });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr> {
        let kind = self.peek().kind;
        let expr = match kind {
            False => Expr::Literal(Value::Bool(false)),
            True => Expr::Literal(Value::Bool(true)),
            Nil => Expr::Literal(Value::Nil),
            Number | Str => Expr::Literal(self.peek().literal.clone()),
            Identifier => Expr::Variable(self.peek().clone()),
            LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.consume(RightParen, ParseErrorType::ExpectedRightParen("expression"))?;
                return Ok(Expr::Grouping(Box::new(expr)));
            }
            _ => {
                return Err(ParseError::new(
                    ParseErrorType::ExpectedExpression,
                    self.peek().clone(),
                ))
            }
        };

        self.advance();
        Ok(expr)
    }

    /// Discards tokens until just after a `;` or right before a token that
    /// starts a new statement.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().kind == Semicolon {
                return;
            }

            if self.peek().kind.starts_statement() {
                return;
            }

            log::trace!("Syncing... skipping {:?}", self.peek());
            self.advance();
        }
    }
}

// Helpers
impl<'d> Parser<'d> {
    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == Eof
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.is_at_end() && self.peek().kind == kind
    }

    /// Moves past the current token (never past `Eof`) and returns it.
    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.is_at_end() {
            self.current += 1;
        }
        token
    }

    fn match_token(&mut self, kind: TokenKind) -> Option<Token> {
        self.check(kind).then(|| self.advance())
    }

    fn match_any(&mut self, kinds: &[TokenKind]) -> Option<Token> {
        kinds.iter().find_map(|kind| self.match_token(*kind))
    }

    fn consume(&mut self, kind: TokenKind, error: ParseErrorType) -> Result<Token> {
        match self.match_token(kind) {
            Some(token) => Ok(token),
            None => Err(ParseError::new(error, self.peek().clone())),
        }
    }
}
