// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Resolution and validation for the Oberst front end
//!
//! This crate turns parsed compilation units into a fully resolved,
//! type-checked code model: module graph building, the declaration pass,
//! type resolution with generic instantiation, constant folding, the
//! expression and statement checker, and the final validator.

pub mod resolve;

pub use resolve::*;
