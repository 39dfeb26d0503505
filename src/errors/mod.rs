//! Error types and error handling for the semantic checker.
//!
//! This module defines the closed set of semantic errors. It includes:
//!
//! - Error structures with source position information
//! - One variant per diagnostic the checker can raise
//! - The fixed message the driver prints for each variant
//! - Helpful error messages and suggestions
//!
//! Code generation has no error channel; it panics on inconsistencies.

pub mod errors;
