//! SQLite storage layer for guildbot.
//!
//! This crate provides:
//! - A fixed-size connection pool with a FIFO wait queue and idle retirement
//! - Typed statement parameters and JSON-shaped result rows
//! - [`DataStore`], the cache-aside access path combining the pool, the query cache and
//!   the performance monitor
//!
//! # Example
//!
//! ```no_run
//! use guildbot_storage::{ConnectionPool, PoolConfig, QueryMethod};
//!
//! # async fn example() -> Result<(), guildbot_storage::PoolError> {
//! let pool = ConnectionPool::new("sqlite://guildbot.db", PoolConfig::default()).await?;
//! let rows = pool
//!     .exec_query("SELECT * FROM quotes WHERE guild_id = ?", &[42i64.into()], QueryMethod::All)
//!     .await?
//!     .into_rows();
//! println!("{} quotes", rows.len());
//! pool.close().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod pool;
pub mod query;
pub mod store;

pub use config::{PoolConfig, PoolConfigBuilder};
pub use error::PoolError;
pub use pool::{ConnectionPool, PooledConnection};
pub use query::{QueryMethod, QueryOutput, Record, RunResult, SqlParam};
pub use store::DataStore;
