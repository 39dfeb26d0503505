//! ILOC instruction stream.
//!
//! This module defines the target representation produced by the code
//! generator:
//!
//! - Virtual and special registers
//! - Labels
//! - The closed mnemonic set and its textual printer
//! - The append-only program, with the single preamble patch

pub mod iloc;
