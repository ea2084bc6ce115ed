//! Gmail MCP Server Library
//!
//! A Model Context Protocol (MCP) server for Gmail with a built-in OAuth
//! installed-app flow. Provides tools for reading, sending, labelling and
//! filtering email via the Gmail API.

pub mod auth;
pub mod config;
pub mod error;
pub mod gmail;
pub mod mcp;

pub use config::Config;
pub use error::{GmailMcpError, Result};
