#![allow(clippy::module_inception)]

use std::fmt::Display;

use crate::{
    ast::ast::Ast,
    compiler::compiler::{compile, CompilerOptions},
    errors::errors::Error,
    iloc::iloc::Program,
    type_checker::type_checker::check_program,
};

pub mod ast;
pub mod compiler;
pub mod errors;
pub mod iloc;
pub mod type_checker;

/// Source position of a node: `Position(line, column)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position(pub u32, pub u32);

impl Position {
    pub fn null() -> Self {
        Position(0, 0)
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.0, self.1)
    }
}

/// Type checks `ast` and, only when checking succeeds, lowers it to ILOC.
///
/// The generator is never invoked on a tree that failed checking.
pub fn compile_program(ast: &Ast, options: CompilerOptions) -> Result<Program, Error> {
    check_program(ast)?;
    Ok(compile(ast, options))
}

/// Renders a semantic error the way the driver reports it.
pub fn display_error(error: &Error) -> String {
    format!(
        "Semantic error: {} at {} ({})",
        error.message(),
        error.get_position(),
        error.get_tip()
    )
}
