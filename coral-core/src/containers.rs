//! Hot-path container aliases.
//!
//! Container choices stay centralized here so allocator/container upgrades touch one place
//! instead of every call site.

use hashbrown::HashMap as HbMap;

/// Hot-path hash map used by the command registry.
pub type HotMap<K, V> = HbMap<K, V>;
