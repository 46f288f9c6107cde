//! Error types for all phases of the Pebble pipeline.

use crate::span::Span;
use thiserror::Error;

/// Lexer errors.
#[derive(Debug, Error)]
pub enum LexerError {
    #[error("Unexpected character '{0}' at {1}")]
    UnexpectedChar(char, Span),

    #[error("Unterminated string at {0}")]
    UnterminatedString(Span),

    #[error("Invalid escape sequence '\\{0}' at {1}")]
    InvalidEscape(char, Span),

    #[error("Invalid integer literal '{0}' at {1}")]
    InvalidNumber(String, Span),
}

impl LexerError {
    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedChar(_, span) => *span,
            Self::UnterminatedString(span) => *span,
            Self::InvalidEscape(_, span) => *span,
            Self::InvalidNumber(_, span) => *span,
        }
    }
}

/// Parser errors.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("Unexpected token {found}, expected {expected} at {span}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("Unexpected end of input at {0}")]
    UnexpectedEof(Span),

    #[error("{message} at {span}")]
    General { message: String, span: Span },
}

impl ParserError {
    pub fn unexpected_token(
        expected: impl Into<String>,
        found: impl Into<String>,
        span: Span,
    ) -> Self {
        Self::UnexpectedToken {
            expected: expected.into(),
            found: found.into(),
            span,
        }
    }

    pub fn unexpected_eof(span: Span) -> Self {
        Self::UnexpectedEof(span)
    }

    pub fn general(message: impl Into<String>, span: Span) -> Self {
        Self::General {
            message: message.into(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedToken { span, .. } => *span,
            Self::UnexpectedEof(span) => *span,
            Self::General { span, .. } => *span,
        }
    }
}

impl From<LexerError> for ParserError {
    fn from(err: LexerError) -> Self {
        Self::General {
            message: err.to_string(),
            span: err.span(),
        }
    }
}

/// Bytecode compilation errors. Compilation aborts on the first one;
/// no partial bytecode is produced.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("unknown operator {operator} at {span}")]
    UnknownOperator { operator: String, span: Span },

    #[error("undefined variable {name} at {span}")]
    UndefinedVariable { name: String, span: Span },

    #[error("assignment target is not an identifier at {0}")]
    AssignmentTargetNotIdentifier(Span),
}

impl CompileError {
    pub fn undefined_variable(name: impl Into<String>, span: Span) -> Self {
        Self::UndefinedVariable {
            name: name.into(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::UnknownOperator { span, .. } => *span,
            Self::UndefinedVariable { span, .. } => *span,
            Self::AssignmentTargetNotIdentifier(span) => *span,
        }
    }
}

/// Runtime errors raised by the virtual machine. Bytecode carries no
/// source locations, so these report operand types and counts instead
/// of spans. Each halts execution immediately.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("opcode {0} undefined")]
    OpcodeUndefined(u8),

    #[error("stack overflow")]
    StackOverflow,

    #[error("division by zero")]
    DivisionByZero,

    #[error("modulo by zero")]
    ModuloByZero,

    #[error("unsupported types for binary operation: {left} {right}")]
    UnsupportedBinaryTypes {
        left: &'static str,
        right: &'static str,
    },

    #[error("unsupported type for negation: {0}")]
    UnsupportedUnaryType(&'static str),

    #[error("unknown string operator: {0}")]
    UnknownStringOperator(String),

    #[error("unusable as hash key: {0}")]
    NotHashable(&'static str),

    #[error("index operator not supported: {0}")]
    IndexUnsupported(&'static str),

    #[error("calling non-function: {0}")]
    NotCallable(&'static str),

    #[error("wrong number of arguments: want={want}, got={got}")]
    ArityMismatch { want: usize, got: usize },

    #[error("{name}: {message}")]
    Builtin { name: &'static str, message: String },
}

impl RuntimeError {
    pub fn builtin(name: &'static str, message: impl Into<String>) -> Self {
        Self::Builtin {
            name,
            message: message.into(),
        }
    }
}

/// A unified error type for all phases.
#[derive(Debug, Error)]
pub enum PebbleError {
    #[error("Lexer error: {0}")]
    Lexer(#[from] LexerError),

    #[error("Parser error: {0}")]
    Parser(#[from] ParserError),

    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
