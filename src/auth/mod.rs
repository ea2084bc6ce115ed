//! OAuth credential handling
//!
//! - `credentials`: client secrets and the token file
//! - `session`: the single in-memory credential and its refresh logic
//! - `flow`: interactive authentication through a local callback listener

pub mod credentials;
pub mod flow;
pub mod session;

pub use credentials::{CredentialStore, OAuthKeys, StoredCredentials};
pub use flow::{AuthFlow, FlowOptions, FlowState};
pub use session::Session;
