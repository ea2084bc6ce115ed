//! Interactive browser-based OAuth flow
//!
//! A short-lived local listener receives Google's redirect. The axum handler
//! only forwards the query to the flow, which decides the outcome, performs
//! the code exchange and sends back the page the browser shows.

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::session::Session;
use crate::config::oauth;
use crate::error::{AuthError, GmailMcpError, Result};

/// How long the listener gets to finish in-flight responses before it is aborted
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Progress of one authentication attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    AwaitingCode,
    AwaitingTokenExchange,
    Complete,
    Failed(String),
}

/// Listener settings for the flow
#[derive(Debug, Clone)]
pub struct FlowOptions {
    pub port: u16,
    pub timeout: Duration,
    pub open_browser: bool,
}

impl FlowOptions {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            timeout: oauth::AUTH_TIMEOUT,
            open_browser: true,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn open_browser(mut self, open_browser: bool) -> Self {
        self.open_browser = open_browser;
        self
    }
}

/// Query string Google appends to the redirect URI
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
}

type CallbackReply = (StatusCode, Html<String>);

/// One browser hit on the callback endpoint, waiting for its page
pub struct CallbackEvent {
    pub query: CallbackQuery,
    pub reply: oneshot::Sender<CallbackReply>,
}

/// Router serving the callback endpoint
pub fn callback_router(events: mpsc::Sender<CallbackEvent>) -> Router {
    Router::new()
        .route(oauth::CALLBACK_PATH, get(handle_callback))
        .with_state(events)
}

async fn handle_callback(
    State(events): State<mpsc::Sender<CallbackEvent>>,
    Query(query): Query<CallbackQuery>,
) -> CallbackReply {
    let (reply, page) = oneshot::channel();
    if events.send(CallbackEvent { query, reply }).await.is_err() {
        return (
            StatusCode::GONE,
            html_page("Authentication already finished", "You can close this window."),
        );
    }
    page.await.unwrap_or_else(|_| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            html_page("Authentication failed", "The authentication flow has stopped."),
        )
    })
}

fn html_page(title: &str, message: &str) -> Html<String> {
    Html(format!(
        "<html><body><h1>{}</h1><p>{}</p></body></html>",
        escape_html(title),
        escape_html(message)
    ))
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Runs one interactive authentication against a session
pub struct AuthFlow<'a> {
    session: &'a Session,
    options: FlowOptions,
    state: FlowState,
}

impl<'a> AuthFlow<'a> {
    pub fn new(session: &'a Session, options: FlowOptions) -> Self {
        Self {
            session,
            options,
            state: FlowState::AwaitingCode,
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    /// Bind the listener, send the user to Google and wait for the redirect.
    ///
    /// The listener is released on every exit path.
    pub async fn run(&mut self) -> Result<()> {
        let listener = bind(self.options.port).await?;
        let (events_tx, mut events_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let server = tokio::spawn(async move {
            axum::serve(listener, callback_router(events_tx))
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        self.state = FlowState::AwaitingCode;
        let auth_url = self.session.authorization_url();
        eprintln!("\nPlease visit this URL to authenticate:");
        eprintln!("{}\n", auth_url);

        if self.options.open_browser {
            if let Err(e) = open::that(&auth_url) {
                tracing::warn!(error = %e, "Could not open browser automatically");
                eprintln!("Please open the URL manually.");
            }
        }

        tracing::info!(port = self.options.port, "Waiting for authentication callback");

        let result = match tokio::time::timeout(self.options.timeout, events_rx.recv()).await {
            Err(_) => Err(GmailMcpError::Timeout {
                seconds: self.options.timeout.as_secs(),
            }),
            Ok(None) => Err(AuthError::CallbackError {
                message: "callback listener stopped unexpectedly".to_string(),
            }
            .into()),
            Ok(Some(event)) => self.handle_event(event).await,
        };

        drop(events_rx);
        let _ = shutdown_tx.send(());
        stop_server(server).await;

        self.state = match &result {
            Ok(()) => FlowState::Complete,
            Err(e) => FlowState::Failed(e.to_string()),
        };
        result
    }

    async fn handle_event(&mut self, event: CallbackEvent) -> Result<()> {
        let CallbackEvent { query, reply } = event;

        if let Some(error) = query.error {
            let reason = if error == "access_denied" {
                "Authentication was denied".to_string()
            } else {
                format!("Authentication failed: {}", error)
            };
            let _ = reply.send((
                StatusCode::BAD_REQUEST,
                html_page("Authentication failed", &reason),
            ));
            return Err(AuthError::Denied { reason }.into());
        }

        let Some(code) = query.code.filter(|c| !c.is_empty()) else {
            let _ = reply.send((
                StatusCode::BAD_REQUEST,
                html_page("Authentication failed", "No authorization code provided."),
            ));
            return Err(AuthError::NoAuthCode.into());
        };

        self.state = FlowState::AwaitingTokenExchange;
        tracing::info!("Received authorization code, exchanging for tokens");

        match self.session.exchange_code(&code).await {
            Ok(()) => {
                let _ = reply.send((
                    StatusCode::OK,
                    html_page(
                        "Authentication successful!",
                        "You can close this window and return to the application.",
                    ),
                ));
                tracing::info!("Authentication completed successfully");
                Ok(())
            }
            Err(e) => {
                let mut message = format!("Token exchange failed: {}", e);
                if message.contains("invalid_grant") {
                    message.push_str(
                        " The authorization code may have expired or been used already; run the auth command again.",
                    );
                }
                let _ = reply.send((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    html_page("Authentication failed", &message),
                ));
                Err(e)
            }
        }
    }
}

async fn bind(port: u16) -> Result<tokio::net::TcpListener> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::AddrInUse => GmailMcpError::PortInUse { port },
            _ => GmailMcpError::Io(e),
        })
}

async fn stop_server(mut server: JoinHandle<std::io::Result<()>>) {
    match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
        Ok(Ok(Err(e))) => tracing::warn!(error = %e, "Callback listener exited with an error"),
        Ok(_) => {}
        Err(_) => {
            tracing::warn!("Callback listener did not stop in time, aborting");
            server.abort();
        }
    }
}
