//! Cache-related MCP tools.
//!
//! This module provides tools for inspecting and clearing the page cache.

pub mod clear;
pub mod status;

pub use clear::{CacheClearParams, clear_impl};
pub use status::status_impl;
