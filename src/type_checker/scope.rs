//! Scope store used for name resolution while checking.
//!
//! Frames are kept in an explicit stack; the bottom frame holds the
//! globals and is never popped. Lookups walk from the innermost frame
//! outwards, so an inner declaration shadows an outer one.

use std::collections::HashMap;

use log::trace;

use crate::{
    ast::{
        statements::{Field, Param},
        types::Type,
    },
    errors::errors::{Error, ErrorImpl},
    Position,
};

/// Semantic role of an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nature {
    Variable,
    Vector,
    Function,
    Class,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub nature: Nature,
    pub ty: Option<Type>,
    /// Size in bytes; `None` while a string has no known length.
    pub size: Option<u32>,
    pub params: Vec<Param>,
    pub fields: Vec<Field>,
    pub position: Position,
}

impl Symbol {
    pub fn new(nature: Nature, ty: Option<Type>, size: Option<u32>, position: Position) -> Self {
        Symbol {
            nature,
            ty,
            size,
            params: vec![],
            fields: vec![],
            position,
        }
    }

    pub fn field(&self, identifier: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.identifier == identifier)
    }
}

#[derive(Debug)]
pub struct ScopeStore {
    frames: Vec<HashMap<String, Symbol>>,
    return_symbol: Option<Symbol>,
    dot_symbol: Option<Symbol>,
}

impl Default for ScopeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStore {
    pub fn new() -> Self {
        ScopeStore {
            frames: vec![HashMap::new()],
            return_symbol: None,
            dot_symbol: None,
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push_scope(&mut self) {
        self.frames.push(HashMap::new());
        trace!("pushed scope, depth {}", self.frames.len());
    }

    /// Drops the innermost frame and every symbol declared in it.
    pub fn pop_scope(&mut self) {
        if self.frames.len() > 1 {
            let frame = self.frames.pop();
            trace!(
                "popped scope with {} symbols, depth {}",
                frame.map_or(0, |f| f.len()),
                self.frames.len()
            );
        }
    }

    /// Binds `name` in the innermost frame. Callers reject same-scope
    /// redeclarations themselves through [`Self::get_symbol_current_scope`].
    pub fn add_symbol(&mut self, name: &str, symbol: Symbol) {
        trace!("binding `{}` as {:?} ({:?})", name, symbol.nature, symbol.ty);
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.to_string(), symbol);
        }
    }

    pub fn get_symbol(&self, name: &str) -> Option<&Symbol> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    pub fn get_symbol_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        self.frames.iter_mut().rev().find_map(|frame| frame.get_mut(name))
    }

    pub fn get_symbol_current_scope(&self, name: &str) -> Option<&Symbol> {
        self.frames.last().and_then(|frame| frame.get(name))
    }

    pub fn set_return(&mut self, symbol: Symbol) {
        self.return_symbol = Some(symbol);
    }

    pub fn clear_return(&mut self) {
        self.return_symbol = None;
    }

    /// Declared return of the function being checked.
    pub fn get_return(&self, position: Position) -> Result<&Symbol, Error> {
        self.return_symbol
            .as_ref()
            .ok_or_else(|| Error::new(ErrorImpl::ReturnOutsideFunction, position))
    }

    pub fn set_dot(&mut self, symbol: Symbol) {
        self.dot_symbol = Some(symbol);
    }

    pub fn get_dot(&self) -> Option<&Symbol> {
        self.dot_symbol.as_ref()
    }

    pub fn clear_dot(&mut self) {
        self.dot_symbol = None;
    }

    /// Storage size of a value of type `ty`, `None` for strings.
    ///
    /// Custom types take the size recorded on their class symbol.
    pub fn size_for_type(&self, ty: &Type, position: Position) -> Result<Option<u32>, Error> {
        match ty {
            Type::Int => Ok(Some(4)),
            Type::Float => Ok(Some(8)),
            Type::Char | Type::Bool => Ok(Some(1)),
            Type::String => Ok(None),
            Type::Custom(name) => match self.get_symbol(name) {
                Some(symbol) if symbol.nature == Nature::Class => Ok(symbol.size),
                _ => Err(Error::new(
                    ErrorImpl::IdentifierNotDeclared { identifier: name.clone() },
                    position,
                )),
            },
        }
    }
}
