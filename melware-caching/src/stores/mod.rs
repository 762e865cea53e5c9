//! Cache store implementations

pub mod inmemory;

#[cfg(feature = "redis")]
pub mod redis;

pub use inmemory::InMemoryStore;

#[cfg(feature = "redis")]
pub use self::redis::RedisStore;
