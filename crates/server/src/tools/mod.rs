//! MCP tool implementations.
//!
//! This module contains all tools exposed by the mailcache server.

pub mod cache;
pub mod labels;
pub mod mail_get;
pub mod mail_modify;
pub mod mailbox_list;

pub use labels::{LabelCreateParams, LabelsListParams, create_impl, labels_impl};
pub use mail_get::{MailGetParams, get_impl};
pub use mail_modify::{MailModifyParams, modify_impl};
pub use mailbox_list::{MailboxListParams, list_impl};

#[cfg(test)]
pub(crate) mod testing;
