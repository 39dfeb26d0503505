use crate::Position;

use super::types::Type;

/// Access modifier written on a class field. Checking ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessScope {
    Private,
    Public,
    Protected,
    #[default]
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub scope: AccessScope,
    pub ty: Type,
    pub identifier: String,
}

impl Field {
    pub fn new(ty: Type, identifier: &str) -> Self {
        Field {
            scope: AccessScope::None,
            ty,
            identifier: identifier.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub position: Position,
    pub is_const: bool,
    pub ty: Type,
    pub identifier: String,
}

impl Param {
    pub fn new(ty: Type, identifier: &str) -> Self {
        Param {
            position: Position::null(),
            is_const: false,
            ty,
            identifier: identifier.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftDirection {
    Left,
    Right,
}
