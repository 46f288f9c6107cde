//! Expression parsing using Pratt precedence.

use crate::ast::*;
use crate::error::ParserError;
use crate::lexer::TokenKind;
use crate::span::Span;

use super::core::{ParseResult, Parser};
use super::precedence::{get_precedence, Precedence};

impl Parser {
    pub(crate) fn expression(&mut self) -> ParseResult<Expr> {
        self.parse_precedence(Precedence::Assign)
    }

    pub(crate) fn parse_precedence(&mut self, min_precedence: Precedence) -> ParseResult<Expr> {
        let mut left = self.parse_prefix()?;

        while !self.is_at_end() {
            let precedence = get_precedence(&self.peek().kind);
            if precedence < min_precedence {
                break;
            }

            left = self.parse_infix(left, precedence)?;
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> ParseResult<Expr> {
        if self.is_at_end() {
            return Err(ParserError::unexpected_eof(self.peek().span));
        }

        let token = self.advance();
        let start_span = token.span;

        match &token.kind {
            TokenKind::IntLiteral(n) => Ok(Expr::new(ExprKind::IntegerLiteral(*n), start_span)),
            TokenKind::StringLiteral(s) => {
                Ok(Expr::new(ExprKind::StringLiteral(s.clone()), start_span))
            }
            TokenKind::True => Ok(Expr::new(ExprKind::BooleanLiteral(true), start_span)),
            TokenKind::False => Ok(Expr::new(ExprKind::BooleanLiteral(false), start_span)),

            TokenKind::Identifier(name) => {
                Ok(Expr::new(ExprKind::Identifier(name.clone()), start_span))
            }

            TokenKind::LeftParen => {
                let expr = self.expression()?;
                self.expect(&TokenKind::RightParen)?;
                Ok(expr)
            }

            TokenKind::Minus => self.parse_prefix_operator(PrefixOp::Minus, start_span),
            TokenKind::Bang => self.parse_prefix_operator(PrefixOp::Bang, start_span),

            TokenKind::If => self.parse_if(start_span),
            TokenKind::While => self.parse_while(start_span),
            TokenKind::Fn => self.parse_function(start_span),

            TokenKind::LeftBracket => self.parse_array(start_span),
            TokenKind::LeftBrace => self.parse_hash(start_span),

            found => Err(ParserError::unexpected_token(
                "an expression",
                found.to_string(),
                start_span,
            )),
        }
    }

    fn parse_prefix_operator(&mut self, operator: PrefixOp, start_span: Span) -> ParseResult<Expr> {
        let operand = self.parse_precedence(Precedence::Prefix)?;
        let span = start_span.merge(&operand.span);
        Ok(Expr::new(
            ExprKind::Prefix {
                operator,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn parse_infix(&mut self, left: Expr, precedence: Precedence) -> ParseResult<Expr> {
        let token = self.advance();

        let operator = match &token.kind {
            TokenKind::Plus => InfixOp::Add,
            TokenKind::Minus => InfixOp::Subtract,
            TokenKind::Star => InfixOp::Multiply,
            TokenKind::Slash => InfixOp::Divide,
            TokenKind::Percent => InfixOp::Modulo,
            TokenKind::EqualEqual => InfixOp::Equal,
            TokenKind::BangEqual => InfixOp::NotEqual,
            TokenKind::Less => InfixOp::Less,
            TokenKind::LessEqual => InfixOp::LessEqual,
            TokenKind::Greater => InfixOp::Greater,
            TokenKind::GreaterEqual => InfixOp::GreaterEqual,
            TokenKind::Equal => InfixOp::Assign,
            TokenKind::LeftParen => return self.parse_call(left),
            TokenKind::LeftBracket => return self.parse_index(left),
            found => {
                return Err(ParserError::unexpected_token(
                    "an operator",
                    found.to_string(),
                    token.span,
                ))
            }
        };

        // Assignment is right-associative; everything else binds left.
        let right = if operator == InfixOp::Assign {
            self.parse_precedence(precedence)?
        } else {
            self.parse_precedence(precedence.next())?
        };

        let span = left.span.merge(&right.span);
        Ok(Expr::new(
            ExprKind::Infix {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            },
            span,
        ))
    }

    fn parse_call(&mut self, callee: Expr) -> ParseResult<Expr> {
        let mut arguments = Vec::new();

        if !self.check(&TokenKind::RightParen) {
            loop {
                arguments.push(self.expression()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightParen)?;

        let span = callee.span.merge(&self.previous_span());
        Ok(Expr::new(
            ExprKind::Call {
                callee: Box::new(callee),
                arguments,
            },
            span,
        ))
    }

    fn parse_index(&mut self, object: Expr) -> ParseResult<Expr> {
        let index = self.expression()?;
        self.expect(&TokenKind::RightBracket)?;

        let span = object.span.merge(&self.previous_span());
        Ok(Expr::new(
            ExprKind::Index {
                object: Box::new(object),
                index: Box::new(index),
            },
            span,
        ))
    }

    fn parse_if(&mut self, start_span: Span) -> ParseResult<Expr> {
        self.expect(&TokenKind::LeftParen)?;
        let condition = self.expression()?;
        self.expect(&TokenKind::RightParen)?;

        let consequence = self.block()?;
        let alternative = if self.match_token(&TokenKind::Else) {
            Some(Box::new(self.block()?))
        } else {
            None
        };

        let span = start_span.merge(&self.previous_span());
        Ok(Expr::new(
            ExprKind::If {
                condition: Box::new(condition),
                consequence: Box::new(consequence),
                alternative,
            },
            span,
        ))
    }

    fn parse_while(&mut self, start_span: Span) -> ParseResult<Expr> {
        self.expect(&TokenKind::LeftParen)?;
        let condition = self.expression()?;
        self.expect(&TokenKind::RightParen)?;

        let body = self.block()?;

        let span = start_span.merge(&self.previous_span());
        Ok(Expr::new(
            ExprKind::While {
                condition: Box::new(condition),
                body: Box::new(body),
            },
            span,
        ))
    }

    fn parse_function(&mut self, start_span: Span) -> ParseResult<Expr> {
        self.expect(&TokenKind::LeftParen)?;

        let mut parameters = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                let (name, span) = self.expect_identifier()?;
                parameters.push(Parameter { name, span });
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightParen)?;

        let body = self.block()?;

        let span = start_span.merge(&self.previous_span());
        Ok(Expr::new(
            ExprKind::Function {
                parameters,
                body: Box::new(body),
            },
            span,
        ))
    }

    fn parse_array(&mut self, start_span: Span) -> ParseResult<Expr> {
        let mut elements = Vec::new();

        if !self.check(&TokenKind::RightBracket) {
            loop {
                elements.push(self.expression()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightBracket)?;

        let span = start_span.merge(&self.previous_span());
        Ok(Expr::new(ExprKind::Array(elements), span))
    }

    fn parse_hash(&mut self, start_span: Span) -> ParseResult<Expr> {
        let mut pairs = Vec::new();

        if !self.check(&TokenKind::RightBrace) {
            loop {
                let key = self.expression()?;
                self.expect(&TokenKind::Colon)?;
                let value = self.expression()?;
                pairs.push((key, value));
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightBrace)?;

        let span = start_span.merge(&self.previous_span());
        Ok(Expr::new(ExprKind::Hash(pairs), span))
    }
}
