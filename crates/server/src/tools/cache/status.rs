//! cache_status tool implementation.
//!
//! Reports page count, current ceiling and memory pressure.

use mailcache_core::cache::{EmailCache, MemoryPressure};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Output from the cache_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatusOutput {
    /// Pages currently cached.
    pub size: usize,
    /// Current page ceiling.
    pub max_size: usize,
    /// Pressure level as of the last sample.
    pub memory_pressure: MemoryPressure,
    /// Prefetches waiting to run.
    pub pending_prefetches: usize,
}

/// Implementation of the cache_status tool.
pub fn status_impl(cache: &EmailCache) -> Result<CallToolResult, McpError> {
    let output = CacheStatusOutput {
        size: cache.len(),
        max_size: cache.max_cache_size(),
        memory_pressure: cache.memory_status(),
        pending_prefetches: cache.pending_prefetches(),
    };

    Ok(CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(&output).unwrap_or_default(),
    )]))
}
