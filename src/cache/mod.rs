//! Caches shared by the engine functions

pub mod pattern_cache;

pub use pattern_cache::{CacheStats, PatternCache};
