use guildbot_core::GuildId;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CacheError;
use crate::pattern::KeyPattern;

/// Cache key namespace for the data the bot caches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheKey {
    /// A page of a guild's quotes.
    QuoteList { guild_id: GuildId, page: usize, limit: usize },

    /// A single quote.
    Quote { guild_id: GuildId, quote_id: i64 },

    /// Custom cache key for any other data.
    Custom(String),
}

impl CacheKey {
    /// Pattern covering every quote entry (lists and single quotes) of a guild.
    ///
    /// A plain glob would also hit other guilds' list pages, so this is anchored.
    pub fn guild_quotes_pattern(guild_id: GuildId) -> Result<KeyPattern, CacheError> {
        KeyPattern::regex(&format!("^quote(_list)?:{}:", guild_id))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::QuoteList { guild_id, page, limit } => {
                write!(f, "quote_list:{}:{}:{}", guild_id, page, limit)
            }
            CacheKey::Quote { guild_id, quote_id } => write!(f, "quote:{}:{}", guild_id, quote_id),
            CacheKey::Custom(key) => write!(f, "custom:{}", key),
        }
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.to_string()
    }
}
