use std::fmt::{self, Display, Formatter};

use itertools::Itertools;
use scanner::Token;

use crate::Expr;

/// A statement that failed to parse is kept as `None`, so blocks (like the
/// top-level program) hold `Option<Stmt>`s.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expression(Expr),
    Print(Expr),
    Var { name: Token, initializer: Option<Expr> },
    Block(Vec<Option<Stmt>>),
    If { condition: Expr, then_branch: Box<Stmt>, else_branch: Option<Box<Stmt>> },
    While { condition: Expr, body: Box<Stmt> },
}

/// Renders a possibly-missing statement for the AST dump.
pub struct Placeholder<'s>(pub &'s Option<Stmt>);

impl Display for Placeholder<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(stmt) => write!(f, "{}", stmt),
            None => write!(f, "<error>"),
        }
    }
}

impl Display for Stmt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Expression(expr) => write!(f, "(expr {})", expr),
            Stmt::Print(expr) => write!(f, "(print {})", expr),
            Stmt::Var { name, initializer: Some(initializer) } => {
                write!(f, "(var {} {})", name, initializer)
            }
            Stmt::Var { name, initializer: None } => write!(f, "(var {})", name),
            Stmt::Block(stmts) if stmts.is_empty() => write!(f, "(block)"),
            Stmt::Block(stmts) => {
                write!(f, "(block {})", stmts.iter().map(Placeholder).join(" "))
            }
            Stmt::If { condition, then_branch, else_branch: Some(else_branch) } => {
                write!(f, "(if {} {} {})", condition, then_branch, else_branch)
            }
            Stmt::If { condition, then_branch, else_branch: None } => {
                write!(f, "(if {} {})", condition, then_branch)
            }
            Stmt::While { condition, body } => write!(f, "(while {} {})", condition, body),
        }
    }
}
