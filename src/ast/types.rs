//! Type representations shared by the checker and the generator.
//!
//! A [`Type`] is what a declaration names or an expression evaluates to.
//! Equality is nominal for custom (class) types and structural for the
//! builtins, which is exactly what the derived `PartialEq` gives.

use std::fmt::Display;

/// Name-less discriminant of a [`Type`], used for coercion stamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Int,
    Float,
    Char,
    Bool,
    String,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Float,
    Char,
    Bool,
    String,
    Custom(String),
}

impl Type {
    pub fn kind(&self) -> TypeKind {
        match self {
            Type::Int => TypeKind::Int,
            Type::Float => TypeKind::Float,
            Type::Char => TypeKind::Char,
            Type::Bool => TypeKind::Bool,
            Type::String => TypeKind::String,
            Type::Custom(_) => TypeKind::Custom,
        }
    }

    /// Whether the type takes part in numeric promotion.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Bool | Type::Int | Type::Float)
    }

    pub fn custom(name: &str) -> Self {
        Type::Custom(name.to_string())
    }
}

impl Display for TypeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeKind::Int => write!(f, "int"),
            TypeKind::Float => write!(f, "float"),
            TypeKind::Char => write!(f, "char"),
            TypeKind::Bool => write!(f, "bool"),
            TypeKind::String => write!(f, "string"),
            TypeKind::Custom => write!(f, "custom"),
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Custom(name) => write!(f, "{}", name),
            other => write!(f, "{}", other.kind()),
        }
    }
}
