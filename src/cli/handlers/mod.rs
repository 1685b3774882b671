//! CLI command handlers.

pub mod catalog;
pub mod chat;
pub mod memory;
pub mod utility;
