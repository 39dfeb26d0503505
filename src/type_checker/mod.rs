//! Type checking and semantic analysis module.
//!
//! This module performs type checking and semantic analysis on the AST.
//! It validates the tree in place while:
//!
//! - Verifying type correctness of expressions and statements
//! - Resolving variable, vector, function and class references
//! - Checking function arity and argument types
//! - Managing scopes through the scope store
//! - Stamping implicit numeric coercions on the nodes that need them
//!
//! Checking is fail-fast: the first error is returned unchanged.

pub mod scope;
pub mod type_checker;
