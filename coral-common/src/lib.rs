//! Shared primitives used by all `coral` crates.
//!
//! This crate is intentionally minimal and dependency-light, so it can sit at the bottom of the
//! dependency graph.

pub mod clock;
pub mod config;
pub mod error;
