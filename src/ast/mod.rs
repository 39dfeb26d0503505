/// AST (Abstract Syntax Tree) module
/// Contains all definitions related to the AST structure
///
/// Submodules:
/// - ast: The node arena, node kinds and sibling iteration
/// - expressions: Operators and variable references
/// - statements: Declaration helpers (fields, parameters)
/// - types: Definitions for type representations in the AST
pub mod ast;
pub mod expressions;
pub mod statements;
pub mod types;
