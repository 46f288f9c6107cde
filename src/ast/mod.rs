//! Abstract Syntax Tree for Pebble.

pub mod expr;
pub mod stmt;

pub use expr::{Expr, ExprKind, InfixOp, Parameter, PrefixOp};
pub use stmt::{Program, Stmt, StmtKind};
