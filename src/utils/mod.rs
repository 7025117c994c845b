//! Utility helpers: keyed once-initialise caches.
pub mod cache;

pub use cache::{cache_key, OnceCache};
