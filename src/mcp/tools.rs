//! MCP Tool definitions and handlers
//!
//! Every tool parses its arguments into a typed struct from [`args`], talks
//! to Gmail through [`GmailClient`], and renders a text result. Errors are
//! turned into error results in exactly one place, [`ToolHandler::call_tool`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value;

use crate::config::gmail::{DEFAULT_BATCH_SIZE, DEFAULT_MAX_RESULTS};
use crate::error::{GmailMcpError, McpError, RemoteError, Result};
use crate::gmail::batch::SummaryLabels;
use crate::gmail::client::GmailClient;
use crate::gmail::compose::{encode_raw_message, reject_line_breaks, OutgoingEmail};
use crate::gmail::mime::{decode_base64url, PartArena};
use crate::gmail::types::{Filter, Label, LabelChanges, ModifyMessageRequest, RawMessage};
use crate::mcp::args::{self, *};
use crate::mcp::types::{CallToolResult, Tool};

/// Tool handler
pub struct ToolHandler {
    gmail_client: Arc<GmailClient>,
}

impl ToolHandler {
    /// Create a new tool handler
    pub fn new(gmail_client: Arc<GmailClient>) -> Self {
        Self { gmail_client }
    }

    /// List all available tools
    pub fn list_tools(&self) -> Vec<Tool> {
        vec![
            tool_def::<SendEmailArgs>("send_email", "Sends a new email"),
            tool_def::<SendEmailArgs>("draft_email", "Create a new email draft"),
            tool_def::<MessageIdArgs>("read_email", "Retrieves the content of a specific email"),
            tool_def::<SearchEmailsArgs>("search_emails", "Searches for emails using Gmail search syntax"),
            tool_def::<ModifyEmailArgs>("modify_email", "Modifies email labels (move to different folders)"),
            tool_def::<MessageIdArgs>("delete_email", "Permanently deletes an email"),
            tool_def::<NoArgs>("list_email_labels", "Retrieves all available Gmail labels"),
            tool_def::<BatchModifyEmailsArgs>("batch_modify_emails", "Modifies labels for multiple emails in batches"),
            tool_def::<BatchDeleteEmailsArgs>("batch_delete_emails", "Permanently deletes multiple emails in batches"),
            tool_def::<LabelNameArgs>("create_label", "Creates a new Gmail label"),
            tool_def::<UpdateLabelArgs>("update_label", "Updates an existing Gmail label"),
            tool_def::<LabelIdArgs>("delete_label", "Deletes a Gmail label"),
            tool_def::<LabelNameArgs>("get_or_create_label", "Gets an existing label by name or creates it if it doesn't exist"),
            tool_def::<CreateFilterArgs>("create_filter", "Creates a new Gmail filter with custom criteria and actions"),
            tool_def::<NoArgs>("list_filters", "Retrieves all Gmail filters"),
            tool_def::<FilterIdArgs>("get_filter", "Gets details of a specific Gmail filter"),
            tool_def::<FilterIdArgs>("delete_filter", "Deletes a Gmail filter"),
            tool_def::<FilterFromTemplateArgs>("create_filter_from_template", "Creates a filter using a pre-defined template for common scenarios"),
            tool_def::<DownloadAttachmentArgs>("download_attachment", "Downloads an email attachment to a specified location"),
        ]
    }

    /// Call a tool by name; failures become error results, never protocol errors
    pub async fn call_tool(&self, name: &str, args: Value) -> CallToolResult {
        tracing::info!(tool = name, "Tool call");

        match self.dispatch(name, args).await {
            Ok(text) => CallToolResult::text(text),
            Err(e) => {
                tracing::warn!(tool = name, error = %e, "Tool call failed");
                CallToolResult::error(e.to_string())
            }
        }
    }

    async fn dispatch(&self, name: &str, args: Value) -> Result<String> {
        match name {
            "send_email" => self.handle_send_email(args::parse(args)?, false).await,
            "draft_email" => self.handle_send_email(args::parse(args)?, true).await,
            "read_email" => self.handle_read_email(args::parse(args)?).await,
            "search_emails" => self.handle_search_emails(args::parse(args)?).await,
            "modify_email" => self.handle_modify_email(args::parse(args)?).await,
            "delete_email" => self.handle_delete_email(args::parse(args)?).await,
            "list_email_labels" => self.handle_list_labels().await,
            "batch_modify_emails" => self.handle_batch_modify(args::parse(args)?).await,
            "batch_delete_emails" => self.handle_batch_delete(args::parse(args)?).await,
            "create_label" => self.handle_create_label(args::parse(args)?).await,
            "update_label" => self.handle_update_label(args::parse(args)?).await,
            "delete_label" => self.handle_delete_label(args::parse(args)?).await,
            "get_or_create_label" => self.handle_get_or_create_label(args::parse(args)?).await,
            "create_filter" => self.handle_create_filter(args::parse(args)?).await,
            "list_filters" => self.handle_list_filters().await,
            "get_filter" => self.handle_get_filter(args::parse(args)?).await,
            "delete_filter" => self.handle_delete_filter(args::parse(args)?).await,
            "create_filter_from_template" => {
                self.handle_create_filter_from_template(args::parse(args)?).await
            }
            "download_attachment" => self
                .handle_download_attachment(args::parse(args)?)
                .await
                .map_err(download_failed),
            _ => Err(McpError::UnknownTool {
                name: name.to_string(),
            }
            .into()),
        }
    }

    // ==================== Message Tools ====================

    async fn handle_send_email(&self, args: SendEmailArgs, draft: bool) -> Result<String> {
        if let Some(ref thread_id) = args.thread_id {
            reject_line_breaks("threadId", thread_id)?;
        }

        let email = OutgoingEmail {
            to: args.to,
            subject: args.subject,
            body: args.body,
            html_body: args.html_body,
            mime_type: args.mime_type.unwrap_or_default(),
            cc: args.cc.unwrap_or_default(),
            bcc: args.bcc.unwrap_or_default(),
            in_reply_to: args.in_reply_to,
            attachments: args
                .attachments
                .unwrap_or_default()
                .into_iter()
                .map(PathBuf::from)
                .collect(),
        };

        let message = RawMessage {
            raw: encode_raw_message(&email.render()?),
            thread_id: args.thread_id,
        };

        if draft {
            let draft = self.gmail_client.create_draft(message).await?;
            Ok(format!("Email draft created successfully with ID: {}", draft.id))
        } else {
            let sent = self.gmail_client.send_message(&message).await?;
            Ok(format!("Email sent successfully with ID: {}", sent.id))
        }
    }

    async fn handle_read_email(&self, args: MessageIdArgs) -> Result<String> {
        let message = self.gmail_client.get_message(&args.message_id).await?;

        let mut text = format!(
            "Thread ID: {}\nSubject: {}\nFrom: {}\nTo: {}\nDate: {}\n\n",
            message.thread_id.as_deref().unwrap_or_default(),
            message.header("subject"),
            message.header("from"),
            message.header("to"),
            message.header("date"),
        );

        let Some(payload) = message.payload.as_ref() else {
            return Ok(text);
        };

        let arena = PartArena::build(payload);
        let content = arena.content();
        if content.is_html_only() {
            text.push_str(
                "[Note: This email is HTML-formatted. Plain text version not available.]\n\n",
            );
        }
        text.push_str(content.body());

        let attachments = arena.attachments();
        if !attachments.is_empty() {
            let lines: Vec<String> = attachments
                .iter()
                .map(|a| {
                    format!(
                        "- {} ({}, {} KB, ID: {})",
                        a.filename,
                        a.mime_type,
                        (a.size as f64 / 1024.0).round() as i64,
                        a.id
                    )
                })
                .collect();
            text.push_str(&format!(
                "\n\nAttachments ({}):\n{}",
                attachments.len(),
                lines.join("\n")
            ));
        }

        Ok(text)
    }

    async fn handle_search_emails(&self, args: SearchEmailsArgs) -> Result<String> {
        let messages = self
            .gmail_client
            .search_messages(&args.query, args.max_results.unwrap_or(DEFAULT_MAX_RESULTS))
            .await?;

        if messages.is_empty() {
            return Ok("No emails found matching the query.".to_string());
        }

        Ok(messages
            .iter()
            .map(|m| {
                format!(
                    "ID: {}\nSubject: {}\nFrom: {}\nDate: {}\n",
                    m.id,
                    m.header("subject"),
                    m.header("from"),
                    m.header("date")
                )
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn handle_modify_email(&self, args: ModifyEmailArgs) -> Result<String> {
        let changes = ModifyMessageRequest {
            add_label_ids: args.add_label_ids.or(args.label_ids),
            remove_label_ids: args.remove_label_ids,
        };

        self.gmail_client
            .modify_message(&args.message_id, &changes)
            .await?;
        Ok(format!("Email {} labels updated successfully", args.message_id))
    }

    async fn handle_delete_email(&self, args: MessageIdArgs) -> Result<String> {
        self.gmail_client.delete_message(&args.message_id).await?;
        Ok(format!("Email {} deleted successfully", args.message_id))
    }

    async fn handle_batch_modify(&self, args: BatchModifyEmailsArgs) -> Result<String> {
        let changes = ModifyMessageRequest {
            add_label_ids: args.add_label_ids,
            remove_label_ids: args.remove_label_ids,
        };

        let outcome = self
            .gmail_client
            .batch_modify_messages(
                args.message_ids,
                &changes,
                args.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            )
            .await;
        Ok(outcome.summary(SummaryLabels::MODIFY))
    }

    async fn handle_batch_delete(&self, args: BatchDeleteEmailsArgs) -> Result<String> {
        let outcome = self
            .gmail_client
            .batch_delete_messages(
                args.message_ids,
                args.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            )
            .await;
        Ok(outcome.summary(SummaryLabels::DELETE))
    }

    async fn handle_download_attachment(&self, args: DownloadAttachmentArgs) -> Result<String> {
        let attachment = self
            .gmail_client
            .get_attachment(&args.message_id, &args.attachment_id)
            .await?;

        let data = attachment
            .data
            .ok_or_else(|| RemoteError::UnexpectedResponse {
                action: DOWNLOAD_ACTION.to_string(),
                message: "No attachment data received".to_string(),
            })?;
        let bytes = decode_base64url(&data)?;

        let filename = match args.filename {
            Some(name) => name,
            None => {
                let message = self.gmail_client.get_message(&args.message_id).await?;
                message
                    .payload
                    .as_ref()
                    .and_then(|p| PartArena::build(p).find_attachment_filename(&args.attachment_id))
                    .unwrap_or_default()
            }
        };
        let filename = safe_file_name(&filename, &args.attachment_id);

        let save_dir = match args.save_path {
            Some(path) => PathBuf::from(path),
            None => std::env::current_dir()?,
        };
        tokio::fs::create_dir_all(&save_dir).await?;

        let full_path = save_dir.join(&filename);
        tokio::fs::write(&full_path, &bytes).await?;
        tracing::info!(path = %full_path.display(), bytes = bytes.len(), "Attachment saved");

        Ok(format!(
            "Attachment downloaded successfully:\nFile: {}\nSize: {} bytes\nSaved to: {}",
            filename,
            bytes.len(),
            full_path.display()
        ))
    }

    // ==================== Label Tools ====================

    async fn handle_list_labels(&self) -> Result<String> {
        let result = self.gmail_client.labels().list().await?;

        let entries = |labels: &[Label]| {
            labels
                .iter()
                .map(|l| format!("ID: {}\nName: {}\n", l.id, l.name))
                .collect::<Vec<_>>()
                .join("\n")
        };

        Ok(format!(
            "Found {} labels ({} system, {} user):\n\nSystem Labels:\n{}\nUser Labels:\n{}",
            result.total(),
            result.system.len(),
            result.user.len(),
            entries(&result.system),
            entries(&result.user)
        ))
    }

    async fn handle_create_label(&self, args: LabelNameArgs) -> Result<String> {
        let label = self
            .gmail_client
            .labels()
            .create(
                &args.name,
                args.message_list_visibility,
                args.label_list_visibility,
            )
            .await?;
        Ok(format!("Label created successfully:\n{}", describe_label(&label)))
    }

    async fn handle_update_label(&self, args: UpdateLabelArgs) -> Result<String> {
        let changes = LabelChanges {
            name: args.name,
            message_list_visibility: args.message_list_visibility,
            label_list_visibility: args.label_list_visibility,
        };

        let label = self.gmail_client.labels().update(&args.id, &changes).await?;
        Ok(format!("Label updated successfully:\n{}", describe_label(&label)))
    }

    async fn handle_delete_label(&self, args: LabelIdArgs) -> Result<String> {
        let label = self.gmail_client.labels().delete(&args.id).await?;
        Ok(format!("Label \"{}\" deleted successfully.", label.name))
    }

    async fn handle_get_or_create_label(&self, args: LabelNameArgs) -> Result<String> {
        let (label, created) = self
            .gmail_client
            .labels()
            .get_or_create(
                &args.name,
                args.message_list_visibility,
                args.label_list_visibility,
            )
            .await?;

        let action = if created { "created new" } else { "found existing" };
        Ok(format!(
            "Successfully {} label:\n{}",
            action,
            describe_label(&label)
        ))
    }

    // ==================== Filter Tools ====================

    async fn handle_create_filter(&self, args: CreateFilterArgs) -> Result<String> {
        let filter = self
            .gmail_client
            .filters()
            .create(args.criteria, args.action)
            .await?;
        Ok(format!("Filter created successfully:\n{}", describe_filter(&filter)))
    }

    async fn handle_list_filters(&self) -> Result<String> {
        let filters = self.gmail_client.filters().list().await?;

        if filters.is_empty() {
            return Ok("No filters found.".to_string());
        }

        let entries: Vec<String> = filters
            .iter()
            .map(|f| format!("{}\n", describe_filter(f)))
            .collect();
        Ok(format!(
            "Found {} filters:\n\n{}",
            filters.len(),
            entries.join("\n")
        ))
    }

    async fn handle_get_filter(&self, args: FilterIdArgs) -> Result<String> {
        let filter = self.gmail_client.filters().get(&args.filter_id).await?;
        Ok(format!("Filter details:\n{}", describe_filter(&filter)))
    }

    async fn handle_delete_filter(&self, args: FilterIdArgs) -> Result<String> {
        self.gmail_client.filters().delete(&args.filter_id).await?;
        Ok(format!("Filter \"{}\" deleted successfully.", args.filter_id))
    }

    async fn handle_create_filter_from_template(
        &self,
        args: FilterFromTemplateArgs,
    ) -> Result<String> {
        let template = args.template.name();
        let (criteria, action) = args.template.build(&args.parameters)?;
        let filter = self.gmail_client.filters().create(criteria, action).await?;

        Ok(format!(
            "Filter created from template '{}':\nID: {}\nTemplate used: {}",
            template,
            filter.id.as_deref().unwrap_or_default(),
            template
        ))
    }
}

// ==================== Helper Functions ====================

const DOWNLOAD_ACTION: &str = "download attachment";

/// Download failures all read "Failed to download attachment: ..."
fn download_failed(error: GmailMcpError) -> GmailMcpError {
    match error {
        GmailMcpError::Remote(RemoteError::UnexpectedResponse { .. }) => error,
        other => RemoteError::UnexpectedResponse {
            action: DOWNLOAD_ACTION.to_string(),
            message: other.to_string(),
        }
        .into(),
    }
}

fn tool_def<T: JsonSchema>(name: &str, description: &str) -> Tool {
    Tool {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema: args::input_schema::<T>(),
    }
}

fn describe_label(label: &Label) -> String {
    format!(
        "ID: {}\nName: {}\nType: {}",
        label.id,
        label.name,
        label.label_type.map(|t| t.as_str()).unwrap_or("unknown")
    )
}

fn describe_filter(filter: &Filter) -> String {
    format!(
        "ID: {}\nCriteria: {}\nActions: {}",
        filter.id.as_deref().unwrap_or_default(),
        describe_fields(&filter.criteria),
        describe_fields(&filter.action)
    )
}

/// `key: value` pairs of a serialized object; empty lists are left out
fn describe_fields<T: Serialize>(value: &T) -> String {
    let Ok(Value::Object(fields)) = serde_json::to_value(value) else {
        return String::new();
    };

    fields
        .iter()
        .filter_map(|(key, value)| {
            let rendered = match value {
                Value::Null => return None,
                Value::Array(items) if items.is_empty() => return None,
                Value::Array(items) => items
                    .iter()
                    .map(plain)
                    .collect::<Vec<_>>()
                    .join(", "),
                other => plain(other),
            };
            Some(format!("{}: {}", key, rendered))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Strip directories from a name taken from an email; fall back to the attachment ID
fn safe_file_name(name: &str, attachment_id: &str) -> String {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("attachment-{}", attachment_id))
}
