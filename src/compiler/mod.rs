//! Code generation module for the compiler.
//!
//! This module lowers a type-checked AST into an ILOC program. It handles:
//!
//! - Stack frames, call sequences and the program preamble
//! - Lowering of expressions into fresh virtual registers
//! - Lowering of declarations and control flow
//! - Memory locations of globals, locals and parameters

pub mod compiler;
pub mod expr;
pub mod memory;
pub mod stmt;

#[cfg(test)]
mod tests;
