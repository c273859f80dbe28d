pub mod aside;
pub mod keys;
pub mod store;

pub use aside::CacheAside;
pub use store::{CacheStore, MemoryCacheStore, RedisCacheStore};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
