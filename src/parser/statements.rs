//! Statement parsing: let, return, blocks, expression statements.

use crate::ast::*;
use crate::lexer::TokenKind;

use super::core::{ParseResult, Parser};

impl Parser {
    pub(crate) fn statement(&mut self) -> ParseResult<Stmt> {
        match self.peek().kind {
            TokenKind::Let => self.let_statement(),
            TokenKind::Return => self.return_statement(),
            _ => self.expression_statement(),
        }
    }

    fn let_statement(&mut self) -> ParseResult<Stmt> {
        let let_token = self.advance();
        let (name, _) = self.expect_identifier()?;
        self.expect(&TokenKind::Equal)?;
        let value = self.expression()?;
        self.match_token(&TokenKind::Semicolon);

        let span = let_token.span.merge(&self.previous_span());
        Ok(Stmt::new(StmtKind::Let { name, value }, span))
    }

    fn return_statement(&mut self) -> ParseResult<Stmt> {
        let return_token = self.advance();
        let value = self.expression()?;
        self.match_token(&TokenKind::Semicolon);

        let span = return_token.span.merge(&self.previous_span());
        Ok(Stmt::new(StmtKind::Return(value), span))
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.expression()?;
        self.match_token(&TokenKind::Semicolon);

        let span = expr.span.merge(&self.previous_span());
        Ok(Stmt::new(StmtKind::Expression(expr), span))
    }

    /// Parse a braced block: { statements }.
    pub(crate) fn block(&mut self) -> ParseResult<Stmt> {
        let open = self.expect(&TokenKind::LeftBrace)?;

        let mut statements = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            statements.push(self.statement()?);
        }
        self.expect(&TokenKind::RightBrace)?;

        let span = open.span.merge(&self.previous_span());
        Ok(Stmt::new(StmtKind::Block(statements), span))
    }
}
