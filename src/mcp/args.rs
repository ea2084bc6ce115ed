//! Tool argument types
//!
//! Each tool's input is a struct that derives `Deserialize` (parsing),
//! `JsonSchema` (the schema advertised in `tools/list`) and `Validate`
//! (constraints serde can't express). Doc comments become schema
//! descriptions.

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

use crate::error::{Result, ValidationError};
use crate::gmail::compose::MimeType;
use crate::gmail::filters::{FilterTemplate, TemplateParameters};
use crate::gmail::types::{FilterAction, FilterCriteria, LabelListVisibility, MessageListVisibility};

/// Deserialize and validate tool arguments; a missing object counts as `{}`
pub fn parse<T>(args: Value) -> Result<T>
where
    T: DeserializeOwned + Validate,
{
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };

    let parsed: T = serde_json::from_value(args).map_err(|e| ValidationError::InvalidArguments {
        message: e.to_string(),
    })?;
    parsed.validate()?;
    Ok(parsed)
}

/// JSON Schema for an argument type
pub fn input_schema<T: JsonSchema>() -> Value {
    serde_json::to_value(schema_for!(T))
        .unwrap_or_else(|_| serde_json::json!({ "type": "object" }))
}

/// Tools that take no arguments
#[derive(Debug, Default, Deserialize, JsonSchema, Validate)]
pub struct NoArgs {}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailArgs {
    /// List of recipient email addresses
    #[validate(length(min = 1))]
    pub to: Vec<String>,

    /// Email subject
    pub subject: String,

    /// Email body content (used for text/plain or when htmlBody not provided)
    pub body: String,

    /// HTML version of the email body
    pub html_body: Option<String>,

    /// Email content type
    pub mime_type: Option<MimeType>,

    /// List of CC recipients
    pub cc: Option<Vec<String>>,

    /// List of BCC recipients
    pub bcc: Option<Vec<String>>,

    /// Thread ID to reply to
    pub thread_id: Option<String>,

    /// Message ID being replied to
    pub in_reply_to: Option<String>,

    /// List of file paths to attach to the email
    pub attachments: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MessageIdArgs {
    /// ID of the email message
    #[validate(length(min = 1))]
    pub message_id: String,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SearchEmailsArgs {
    /// Gmail search query (e.g., 'from:example@gmail.com')
    pub query: String,

    /// Maximum number of results to return
    #[validate(range(min = 1, max = 500))]
    pub max_results: Option<u32>,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ModifyEmailArgs {
    /// ID of the email message to modify
    #[validate(length(min = 1))]
    pub message_id: String,

    /// List of label IDs to apply (superseded by addLabelIds)
    pub label_ids: Option<Vec<String>>,

    /// List of label IDs to add to the message
    pub add_label_ids: Option<Vec<String>>,

    /// List of label IDs to remove from the message
    pub remove_label_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BatchModifyEmailsArgs {
    /// List of message IDs to modify
    #[validate(length(min = 1))]
    pub message_ids: Vec<String>,

    /// List of label IDs to add to all messages
    pub add_label_ids: Option<Vec<String>>,

    /// List of label IDs to remove from all messages
    pub remove_label_ids: Option<Vec<String>>,

    /// Number of messages to process in each batch (default: 50)
    #[validate(range(min = 1, max = 1000))]
    pub batch_size: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BatchDeleteEmailsArgs {
    /// List of message IDs to delete
    #[validate(length(min = 1))]
    pub message_ids: Vec<String>,

    /// Number of messages to process in each batch (default: 50)
    #[validate(range(min = 1, max = 1000))]
    pub batch_size: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LabelNameArgs {
    /// Name of the label
    #[validate(length(min = 1))]
    pub name: String,

    /// Visibility of messages with this label in the message list
    pub message_list_visibility: Option<MessageListVisibility>,

    /// Visibility of the label in the label list
    pub label_list_visibility: Option<LabelListVisibility>,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLabelArgs {
    /// ID of the label to update
    #[validate(length(min = 1))]
    pub id: String,

    /// New name for the label
    pub name: Option<String>,

    /// Visibility of messages with this label in the message list
    pub message_list_visibility: Option<MessageListVisibility>,

    /// Visibility of the label in the label list
    pub label_list_visibility: Option<LabelListVisibility>,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LabelIdArgs {
    /// ID of the label
    #[validate(length(min = 1))]
    pub id: String,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateFilterArgs {
    /// Criteria for matching emails
    pub criteria: FilterCriteria,

    /// Actions to perform on matching emails
    pub action: FilterAction,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FilterIdArgs {
    /// ID of the filter
    #[validate(length(min = 1))]
    pub filter_id: String,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FilterFromTemplateArgs {
    /// Pre-defined filter template to use
    pub template: FilterTemplate,

    /// Template-specific parameters
    #[serde(default)]
    pub parameters: TemplateParameters,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DownloadAttachmentArgs {
    /// ID of the email message containing the attachment
    #[validate(length(min = 1))]
    pub message_id: String,

    /// ID of the attachment to download
    #[validate(length(min = 1))]
    pub attachment_id: String,

    /// Filename to save as (defaults to the original name)
    pub filename: Option<String>,

    /// Directory to save the attachment to (defaults to the current directory)
    pub save_path: Option<String>,
}
