use std::collections::HashMap;

use log::trace;

use crate::iloc::iloc::Register;

/// Where a word of storage lives: `base + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub base: Register,
    pub offset: i32,
}

impl Location {
    pub fn global(offset: i32) -> Self {
        Location {
            base: Register::RBSS,
            offset,
        }
    }

    pub fn local(offset: i32) -> Self {
        Location {
            base: Register::RFP,
            offset,
        }
    }
}

/// What a name is bound to while lowering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Word(Location),
    /// A class-typed variable; each field `name.field` has its own word.
    Record(String),
}

/// Memory locations of every name visible while lowering, mirroring the
/// checker's scopes. The bottom frame holds globals.
#[derive(Debug)]
pub struct MemoryStore {
    frames: Vec<HashMap<String, Slot>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            frames: vec![HashMap::new()],
        }
    }

    pub fn push_frame(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub fn pop_frame(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    pub fn bind(&mut self, name: &str, location: Location) {
        trace!("`{}` lives at {}{:+}", name, location.base, location.offset);
        self.insert(name, Slot::Word(location));
    }

    pub fn bind_record(&mut self, name: &str, class: &str) {
        trace!("`{}` is a record of class `{}`", name, class);
        self.insert(name, Slot::Record(class.to_string()));
    }

    fn insert(&mut self, name: &str, slot: Slot) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.to_string(), slot);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Slot> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    /// Class of `name` when it is bound to a record.
    pub fn record_class(&self, name: &str) -> Option<&str> {
        match self.lookup(name) {
            Some(Slot::Record(class)) => Some(class.as_str()),
            _ => None,
        }
    }

    /// # Panics
    ///
    /// Panics when `name` is not bound to a single word; the checker
    /// guarantees every use is declared first.
    pub fn location(&self, name: &str) -> Location {
        match self.lookup(name) {
            Some(Slot::Word(location)) => *location,
            Some(Slot::Record(class)) => panic!("`{}` is a whole `{}` record, not a word", name, class),
            None => panic!("no memory location for `{}`", name),
        }
    }
}
