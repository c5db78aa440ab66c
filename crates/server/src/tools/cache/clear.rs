//! cache_clear tool implementation.
//!
//! Drops one page, pages older than an age, or everything.

use std::time::Duration;

use mailcache_core::Error;
use mailcache_core::cache::{CacheKey, EmailCache};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Parameters for the cache_clear tool.
///
/// With neither field set the whole cache is cleared.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheClearParams {
    /// Drop only this page.
    #[serde(default)]
    pub key: Option<CacheKey>,

    /// Drop pages cached more than this many seconds ago.
    #[serde(default)]
    pub older_than_secs: Option<u64>,
}

/// Output from the cache_clear tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheClearOutput {
    /// Number of pages dropped.
    pub cleared: usize,
    /// Pages left in the cache.
    pub remaining: usize,
}

/// Implementation of the cache_clear tool.
pub fn clear_impl(cache: &EmailCache, params: CacheClearParams) -> Result<CallToolResult, McpError> {
    let before = cache.len();

    let cleared = match (params.key, params.older_than_secs) {
        (Some(_), Some(_)) => {
            return Err(Error::InvalidInput("Specify at most one of key or older_than_secs".to_string()).into());
        }
        (Some(key), None) => {
            cache.clear(Some(&key));
            before - cache.len()
        }
        (None, Some(secs)) => match Instant::now().checked_sub(Duration::from_secs(secs)) {
            Some(cutoff) => cache.invalidate_older_than(cutoff),
            None => 0,
        },
        (None, None) => {
            cache.clear(None);
            before
        }
    };

    let output = CacheClearOutput { cleared, remaining: cache.len() };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
