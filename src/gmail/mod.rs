//! Gmail API module
//!
//! REST client, resource types, and the helpers the tools build on.

pub mod batch;
pub mod client;
pub mod compose;
pub mod filters;
pub mod labels;
pub mod mime;
pub mod types;

pub use client::GmailClient;
