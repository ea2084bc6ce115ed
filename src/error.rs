//! Error types for the Gmail MCP server
//!
//! Startup problems (`Config`, `Auth`) are fatal in `main`. Everything raised
//! while serving a tool call is caught at the dispatch boundary and returned
//! to the host as text.

use thiserror::Error;

/// Main error type for the Gmail MCP server
#[derive(Error, Debug)]
pub enum GmailMcpError {
    /// Missing or malformed configuration / OAuth keys
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Invalid, expired or revoked credentials
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// The OAuth callback port is taken
    #[error("Port {port} is already in use; free it or stop the application using it")]
    PortInUse { port: u16 },

    /// No OAuth callback arrived in time
    #[error("Authentication timed out: no response received within {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Bad tool arguments
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The Gmail service rejected a request
    #[error("{0}")]
    Remote(#[from] RemoteError),

    /// MCP protocol errors
    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create config directory {path}: {source}")]
    DirCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("OAuth keys file not found: {path}")]
    KeysFileNotFound { path: String },

    #[error("Invalid OAuth keys file {path}: expected 'installed' or 'web' credentials ({message})")]
    InvalidKeys { path: String, message: String },
}

/// OAuth authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("No credentials found at {path}; run the 'auth' command first")]
    CredentialsNotFound { path: String },

    #[error("Stored credentials are invalid or expired; run the 'auth' command again")]
    InvalidCredentials,

    #[error("Refresh token was rejected: {message}")]
    RefreshRejected { message: String },

    #[error("No refresh token available")]
    NoRefreshToken,

    #[error("Token exchange failed: {message}")]
    TokenExchangeFailed { message: String },

    #[error("{reason}")]
    Denied { reason: String },

    #[error("No authorization code provided")]
    NoAuthCode,

    #[error("OAuth callback error: {message}")]
    CallbackError { message: String },
}

/// Errors returned by the Gmail REST API, already put in context
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("{resource} with ID \"{id}\" not found")]
    NotFound { resource: &'static str, id: String },

    #[error("Label \"{name}\" already exists. Please use a different name")]
    LabelAlreadyExists { name: String },

    #[error("Cannot delete system label with ID \"{label_id}\"")]
    SystemLabel { label_id: String },

    #[error("Invalid filter criteria or action: {message}")]
    InvalidFilter { message: String },

    #[error("Rate limited while trying to {action}")]
    RateLimited { action: String },

    #[error("Failed to {action} ({status}): {message}")]
    RequestFailed {
        action: String,
        status: u16,
        message: String,
    },

    #[error("Failed to {action}: {message}")]
    UnexpectedResponse { action: String, message: String },
}

/// Tool argument errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid arguments: {message}")]
    InvalidArguments { message: String },

    #[error("Recipient email address is invalid: {email}")]
    InvalidEmail { email: String },

    #[error("{field} is required for {template} template")]
    MissingTemplateParameter {
        field: &'static str,
        template: &'static str,
    },

    #[error("File does not exist: {path}")]
    FileNotFound { path: String },

    #[error("Invalid {name}: {message}")]
    InvalidData { name: &'static str, message: String },
}

/// MCP protocol errors
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },
}

/// Result type alias for Gmail MCP operations
pub type Result<T> = std::result::Result<T, GmailMcpError>;

impl From<validator::ValidationErrors> for ValidationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ValidationError::InvalidArguments {
            message: errors.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for GmailMcpError {
    fn from(errors: validator::ValidationErrors) -> Self {
        GmailMcpError::Validation(errors.into())
    }
}
