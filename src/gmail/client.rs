//! Gmail API client
//!
//! Thin `reqwest` layer over the Gmail REST API. Every call goes through
//! [`GmailClient::execute`], which attaches the session's bearer token and
//! turns non-success statuses into a [`RemoteError`] that names the
//! operation.

use std::sync::Arc;

use futures::future::try_join_all;
use reqwest::{Method, RequestBuilder, Response, StatusCode};

use crate::auth::Session;
use crate::config::gmail::{API_BASE_URL, USER_ID};
use crate::error::{GmailMcpError, RemoteError, Result};
use crate::gmail::batch::{process_batches, BatchOutcome};
use crate::gmail::filters::FilterManager;
use crate::gmail::labels::LabelManager;
use crate::gmail::types::*;

/// Describes an API call for error reporting
#[derive(Debug, Clone, Copy)]
pub(crate) struct ErrorContext<'a> {
    action: &'a str,
    resource: Option<(&'static str, &'a str)>,
    invalid_filter_on_400: bool,
    label_name: Option<&'a str>,
}

impl<'a> ErrorContext<'a> {
    pub(crate) fn new(action: &'a str) -> Self {
        Self {
            action,
            resource: None,
            invalid_filter_on_400: false,
            label_name: None,
        }
    }

    /// 404 means this resource doesn't exist
    pub(crate) fn resource(mut self, kind: &'static str, id: &'a str) -> Self {
        self.resource = Some((kind, id));
        self
    }

    /// 400 means the filter definition was rejected
    pub(crate) fn filter_definition(mut self) -> Self {
        self.invalid_filter_on_400 = true;
        self
    }

    /// A name conflict means the label already exists
    pub(crate) fn label_name(mut self, name: &'a str) -> Self {
        self.label_name = Some(name);
        self
    }

    fn to_error(self, status: StatusCode, body: String) -> RemoteError {
        if status == StatusCode::NOT_FOUND {
            if let Some((resource, id)) = self.resource {
                return RemoteError::NotFound {
                    resource,
                    id: id.to_string(),
                };
            }
        }

        if let Some(name) = self.label_name {
            if status == StatusCode::CONFLICT || body.contains("exists") {
                return RemoteError::LabelAlreadyExists {
                    name: name.to_string(),
                };
            }
        }

        match status {
            StatusCode::BAD_REQUEST if self.invalid_filter_on_400 => {
                RemoteError::InvalidFilter { message: body }
            }
            StatusCode::TOO_MANY_REQUESTS => RemoteError::RateLimited {
                action: self.action.to_string(),
            },
            _ => RemoteError::RequestFailed {
                action: self.action.to_string(),
                status: status.as_u16(),
                message: body,
            },
        }
    }
}

/// Gmail API client
pub struct GmailClient {
    http_client: reqwest::Client,
    session: Arc<Session>,
    /// `{api base}/users/me`
    user_url: String,
}

impl GmailClient {
    pub fn new(session: Arc<Session>) -> Self {
        Self::with_base_url(session, API_BASE_URL)
    }

    /// Client against a different API root (used by tests)
    pub fn with_base_url(session: Arc<Session>, base_url: &str) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            session,
            user_url: format!("{}/users/{}", base_url.trim_end_matches('/'), USER_ID),
        }
    }

    pub fn labels(&self) -> LabelManager<'_> {
        LabelManager::new(self)
    }

    pub fn filters(&self) -> FilterManager<'_> {
        FilterManager::new(self)
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}/{}", self.user_url, path))
    }

    /// Authorize and send a request, mapping failures through `context`
    pub(crate) async fn execute(
        &self,
        request: RequestBuilder,
        context: ErrorContext<'_>,
    ) -> Result<Response> {
        let token = self.session.access_token().await?;
        let response = request.bearer_auth(token).send().await?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        tracing::debug!(action = context.action, %status, body = %text, "Gmail API call failed");
        Err(context.to_error(status, text).into())
    }

    // ==================== Message Operations ====================

    pub async fn send_message(&self, message: &RawMessage) -> Result<Message> {
        let request = self.request(Method::POST, "messages/send").json(message);
        let response = self.execute(request, ErrorContext::new("send email")).await?;
        Ok(response.json().await?)
    }

    pub async fn create_draft(&self, message: RawMessage) -> Result<Draft> {
        let body = CreateDraftRequest { message };
        let request = self.request(Method::POST, "drafts").json(&body);
        let response = self.execute(request, ErrorContext::new("create draft")).await?;
        Ok(response.json().await?)
    }

    /// Full message including the MIME tree
    pub async fn get_message(&self, message_id: &str) -> Result<Message> {
        let request = self
            .request(Method::GET, &format!("messages/{}", message_id))
            .query(&[("format", "full")]);
        let context = ErrorContext::new("get message").resource("Message", message_id);
        Ok(self.execute(request, context).await?.json().await?)
    }

    /// Message with only the Subject/From/Date headers
    pub async fn get_message_metadata(&self, message_id: &str) -> Result<Message> {
        let request = self
            .request(Method::GET, &format!("messages/{}", message_id))
            .query(&[
                ("format", "metadata"),
                ("metadataHeaders", "Subject"),
                ("metadataHeaders", "From"),
                ("metadataHeaders", "Date"),
            ]);
        let context = ErrorContext::new("get message").resource("Message", message_id);
        Ok(self.execute(request, context).await?.json().await?)
    }

    pub async fn list_messages(&self, query: &str, max_results: u32) -> Result<MessageList> {
        let max_results = max_results.to_string();
        let request = self
            .request(Method::GET, "messages")
            .query(&[("q", query), ("maxResults", max_results.as_str())]);
        let response = self.execute(request, ErrorContext::new("search messages")).await?;
        Ok(response.json().await?)
    }

    /// List matching messages and fetch their metadata concurrently
    pub async fn search_messages(&self, query: &str, max_results: u32) -> Result<Vec<Message>> {
        let list = self.list_messages(query, max_results).await?;
        tracing::debug!(query, hits = list.messages.len(), "Search returned");

        try_join_all(
            list.messages
                .iter()
                .map(|m| self.get_message_metadata(&m.id)),
        )
        .await
    }

    pub async fn modify_message(
        &self,
        message_id: &str,
        changes: &ModifyMessageRequest,
    ) -> Result<Message> {
        let request = self
            .request(Method::POST, &format!("messages/{}/modify", message_id))
            .json(changes);
        let context = ErrorContext::new("modify message").resource("Message", message_id);
        Ok(self.execute(request, context).await?.json().await?)
    }

    /// Permanently delete a message (it does not go to Trash)
    pub async fn delete_message(&self, message_id: &str) -> Result<()> {
        let request = self.request(Method::DELETE, &format!("messages/{}", message_id));
        let context = ErrorContext::new("delete message").resource("Message", message_id);
        self.execute(request, context).await?;
        Ok(())
    }

    pub async fn get_attachment(
        &self,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<AttachmentData> {
        let request = self.request(
            Method::GET,
            &format!("messages/{}/attachments/{}", message_id, attachment_id),
        );
        let context = ErrorContext::new("get attachment").resource("Attachment", attachment_id);
        Ok(self.execute(request, context).await?.json().await?)
    }

    // ==================== Batch Operations ====================

    /// Apply the same label changes to many messages
    pub async fn batch_modify_messages(
        &self,
        message_ids: Vec<String>,
        changes: &ModifyMessageRequest,
        batch_size: usize,
    ) -> BatchOutcome<String, String> {
        process_batches(message_ids, batch_size, |chunk| async move {
            try_join_all(chunk.iter().map(|id| self.modify_message(id, changes))).await?;
            Ok::<_, GmailMcpError>(chunk)
        })
        .await
    }

    /// Permanently delete many messages
    pub async fn batch_delete_messages(
        &self,
        message_ids: Vec<String>,
        batch_size: usize,
    ) -> BatchOutcome<String, String> {
        process_batches(message_ids, batch_size, |chunk| async move {
            try_join_all(chunk.iter().map(|id| self.delete_message(id))).await?;
            Ok::<_, GmailMcpError>(chunk)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context_mapping() {
        let ctx = ErrorContext::new("get filter").resource("Filter", "f1");
        assert!(matches!(
            ctx.to_error(StatusCode::NOT_FOUND, String::new()),
            RemoteError::NotFound { resource: "Filter", .. }
        ));
        assert!(matches!(
            ctx.to_error(StatusCode::TOO_MANY_REQUESTS, String::new()),
            RemoteError::RateLimited { .. }
        ));

        let create = ErrorContext::new("create filter").filter_definition();
        assert!(matches!(
            create.to_error(StatusCode::BAD_REQUEST, "bad".to_string()),
            RemoteError::InvalidFilter { .. }
        ));
        assert!(matches!(
            create.to_error(StatusCode::NOT_FOUND, "gone".to_string()),
            RemoteError::RequestFailed { status: 404, .. }
        ));
    }

    #[test]
    fn test_label_conflict_mapping() {
        let ctx = ErrorContext::new("create label").label_name("Work");
        let err = ctx.to_error(StatusCode::CONFLICT, "Label name exists or conflicts".to_string());
        assert_eq!(
            err.to_string(),
            "Label \"Work\" already exists. Please use a different name"
        );
    }
}
