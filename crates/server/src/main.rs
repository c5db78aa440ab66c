//! mailcache server entry point.
//!
//! This is the main binary that boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use mailcache_client::GmailClient;
use mailcache_core::cache::default_probe;
use mailcache_core::{AppConfig, EmailCache, MailboxService};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        max_cache_size = config.max_cache_size,
        cache_ttl_ms = config.cache_ttl_ms,
        "Starting mailcache server on stdio transport"
    );

    let cache = EmailCache::new(config.cache_settings(), default_probe());

    let service = match GmailClient::from_app_config(&config) {
        Ok(client) => Some(Arc::new(MailboxService::new(
            Arc::new(client),
            Arc::clone(&cache),
            config.lookahead_delay(),
        ))),
        Err(e) => {
            tracing::warn!(error = %e, "Gmail provider unavailable; mailbox tools disabled");
            None
        }
    };

    let handler = handler::MailcacheServer::new(Arc::clone(&cache), service);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;
    cache.stop_memory_monitoring();

    Ok(())
}
