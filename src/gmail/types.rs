//! Gmail REST resource types
//!
//! Field names follow the Gmail API JSON (camelCase). Types that also appear
//! in tool arguments derive `JsonSchema`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A Gmail message part (MIME part)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    /// Part ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_id: Option<String>,

    /// MIME type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Non-empty for attachments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Part headers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<Header>,

    /// Part body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<MessagePartBody>,

    /// Child parts of a multipart/* node
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<MessagePart>,
}

impl MessagePart {
    /// First header with the given name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    pub fn is_mime(&self, mime_type: &str) -> bool {
        self.mime_type
            .as_deref()
            .is_some_and(|m| m.eq_ignore_ascii_case(mime_type))
    }
}

/// A message header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    /// Header name
    pub name: String,
    /// Header value
    pub value: String,
}

/// Body of a message part
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MessagePartBody {
    /// Set when the content must be fetched separately
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<String>,

    /// Declared size in bytes
    #[serde(default)]
    pub size: i64,

    /// Base64url-encoded data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// A Gmail message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message ID
    pub id: String,

    /// Thread ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    /// Label IDs applied to this message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub label_ids: Vec<String>,

    /// Short part of the message text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,

    /// Parsed MIME structure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<MessagePart>,

    /// Internal date (epoch millis, as a string)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_date: Option<String>,
}

impl Message {
    /// Top-level header value, empty when absent
    pub fn header(&self, name: &str) -> &str {
        self.payload
            .as_ref()
            .and_then(|p| p.header(name))
            .unwrap_or("")
    }
}

/// Response of `messages.list`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MessageList {
    /// Message references
    #[serde(default)]
    pub messages: Vec<MessageRef>,

    /// Token for the next page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,

    /// Estimated total number of results
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_size_estimate: Option<u32>,
}

/// Message entry in a list response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    /// Message ID
    pub id: String,

    /// Thread ID
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// Whether a label is owned by Gmail or by the user
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LabelType {
    System,
    User,
}

impl LabelType {
    pub fn as_str(self) -> &'static str {
        match self {
            LabelType::System => "system",
            LabelType::User => "user",
        }
    }
}

/// A Gmail label
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    /// Label ID
    pub id: String,

    /// Display name
    pub name: String,

    /// Owner of the label
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub label_type: Option<LabelType>,

    /// Visibility in the message list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_list_visibility: Option<MessageListVisibility>,

    /// Visibility in the label list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_list_visibility: Option<LabelListVisibility>,

    /// Total messages with the label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages_total: Option<i64>,

    /// Unread messages with the label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages_unread: Option<i64>,

    /// Label color
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<LabelColor>,
}

impl Label {
    pub fn is_system(&self) -> bool {
        self.label_type == Some(LabelType::System)
    }
}

/// Label color
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelColor {
    /// Text color, hex string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,

    /// Background color, hex string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
}

/// Response of `labels.list`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LabelList {
    /// Labels
    #[serde(default)]
    pub labels: Vec<Label>,
}

/// Body of `labels.create` and `labels.patch`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LabelChanges {
    /// New display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Visibility in the message list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_list_visibility: Option<MessageListVisibility>,

    /// Visibility in the label list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_list_visibility: Option<LabelListVisibility>,
}

/// Body of `messages.modify` and the per-message calls of batch modify
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModifyMessageRequest {
    /// Label IDs to add
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_label_ids: Option<Vec<String>>,

    /// Label IDs to remove
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_label_ids: Option<Vec<String>>,
}

/// Gmail filter criteria
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    /// Sender email address(es) to match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    /// Recipient email address(es) to match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,

    /// Subject text to match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Gmail search query (e.g., 'has:attachment')
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    /// Text that must NOT be present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negated_query: Option<String>,

    /// Whether to match emails with attachments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_attachment: Option<bool>,

    /// Whether to exclude chat messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_chats: Option<bool>,

    /// Email size in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,

    /// Size comparison operator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_comparison: Option<SizeComparison>,
}

/// How `size` is compared
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SizeComparison {
    Unspecified,
    Smaller,
    Larger,
}

/// Gmail filter action
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FilterAction {
    /// Label IDs to add to matching emails
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_label_ids: Option<Vec<String>>,

    /// Label IDs to remove from matching emails
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_label_ids: Option<Vec<String>>,

    /// Email address to forward matching emails to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward: Option<String>,
}

/// A Gmail filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    /// Filter ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Matching criteria
    #[serde(default)]
    pub criteria: FilterCriteria,

    /// Action taken on matching messages
    #[serde(default)]
    pub action: FilterAction,
}

/// Response of `settings.filters.list`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FilterList {
    /// Filters
    #[serde(default)]
    pub filter: Vec<Filter>,
}

/// Response of `drafts.create`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Draft {
    /// Draft ID
    pub id: String,

    /// Draft message
    #[serde(default)]
    pub message: Option<Message>,
}

/// Raw message upload, used by send and by draft creation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    /// RFC 822 message, base64url without padding
    pub raw: String,

    /// Thread to add the message to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

/// Body of `drafts.create`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDraftRequest {
    /// Message to store as a draft
    pub message: RawMessage,
}

/// Response of `messages.attachments.get`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentData {
    /// Size in bytes
    #[serde(default)]
    pub size: i64,

    /// Base64url-encoded content
    #[serde(default)]
    pub data: Option<String>,
}

/// Visibility of messages with a label in the message list
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MessageListVisibility {
    #[default]
    Show,
    Hide,
}

/// Visibility of a label in the label list
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub enum LabelListVisibility {
    #[default]
    #[serde(rename = "labelShow")]
    Show,
    #[serde(rename = "labelShowIfUnread")]
    ShowIfUnread,
    #[serde(rename = "labelHide")]
    Hide,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_headers() {
        let json = r#"{
            "id": "123",
            "threadId": "456",
            "payload": {"headers": [{"name": "SUBJECT", "value": "Hi"}]}
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.thread_id.as_deref(), Some("456"));
        assert_eq!(msg.header("Subject"), "Hi");
        assert_eq!(msg.header("From"), "");
    }

    #[test]
    fn test_label_type() {
        let json = r#"{"id":"INBOX","name":"INBOX","type":"system","labelListVisibility":"labelHide"}"#;
        let label: Label = serde_json::from_str(json).unwrap();
        assert!(label.is_system());
        assert_eq!(label.label_list_visibility, Some(LabelListVisibility::Hide));
    }

    #[test]
    fn test_label_changes_skip_empty_fields() {
        let changes = LabelChanges {
            name: Some("Work".to_string()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&changes).unwrap(),
            serde_json::json!({"name": "Work"})
        );
    }

    #[test]
    fn test_filter_criteria_camel_case() {
        let criteria = FilterCriteria {
            size: Some(1024),
            size_comparison: Some(SizeComparison::Larger),
            has_attachment: Some(true),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&criteria).unwrap(),
            serde_json::json!({"hasAttachment": true, "size": 1024, "sizeComparison": "larger"})
        );
    }
}
