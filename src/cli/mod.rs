//! Command-line interface module.
//!
//! This module provides the CLI functionality for:
//! - Model blob discovery
//! - Single-prompt and interactive generation
//! - Host information

pub mod commands;
pub mod handlers;

pub use handlers::{handle_chat, handle_generate, handle_info, handle_scan, handle_scan_with};
