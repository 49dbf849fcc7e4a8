//! Query result caching for the guildbot data layer.
//!
//! A bounded, time-aware key-value store sitting in front of the SQLite pool:
//!
//! - **TTL**: every entry carries its own time-to-live; expired entries are never
//!   returned and are purged lazily or by an explicit [`Cache::cleanup`] pass.
//! - **LRU eviction**: inserting a new key into a full cache evicts the entry with the
//!   oldest access.
//! - **Pattern invalidation**: `*`-globs or regular expressions drop whole key families
//!   after a write.
//!
//! # Examples
//!
//! ```
//! use guildbot_cache::{Cache, CacheConfig, CacheKey};
//! use guildbot_core::GuildId;
//! use std::time::Duration;
//!
//! let config = CacheConfig::builder()
//!     .max_size(1000)
//!     .default_ttl(Duration::from_secs(300))
//!     .build()
//!     .unwrap();
//!
//! let cache = Cache::new(config);
//! let key = CacheKey::Quote { guild_id: GuildId::new(42), quote_id: 7 }.to_string();
//! cache.set(key.clone(), "Ship it.".to_string());
//!
//! assert_eq!(cache.get(&key), Some("Ship it.".to_string()));
//! assert_eq!(cache.invalidate_glob("quote:42:*").unwrap(), 1);
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod key;
pub mod pattern;

pub use cache::{cached, Cache, CachedResult};
pub use config::{CacheConfig, CacheConfigBuilder};
pub use error::CacheError;
pub use key::CacheKey;
pub use pattern::KeyPattern;
