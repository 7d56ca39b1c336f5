//! Storage engine and command dispatch shared by the server binary.
//!
//! The data-structure layer (incremental hash index, order-statistic AVL tree, TTL heap) is
//! built over index-based arenas instead of raw pointer graphs; back-references are stored as
//! plain ids and kept current by the structures themselves.

pub mod arena;
pub mod avl;
pub mod command;
pub mod containers;
pub mod dispatch;
pub mod hash;
pub mod heap;
pub mod keyspace;
pub mod reclaim;
pub mod wire;
pub mod zset;
