//! Filter management for Gmail
//!
//! CRUD over `settings/filters` plus the named filter templates.

use reqwest::Method;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::gmail::labels::{IMPORTANT, INBOX, UNREAD};
use crate::error::{Result, ValidationError};
use crate::gmail::client::{ErrorContext, GmailClient};
use crate::gmail::types::{Filter, FilterAction, FilterCriteria, FilterList, SizeComparison};

/// Filter operations, borrowed from a [`GmailClient`]
pub struct FilterManager<'a> {
    client: &'a GmailClient,
}

impl<'a> FilterManager<'a> {
    pub fn new(client: &'a GmailClient) -> Self {
        Self { client }
    }

    /// Create a new Gmail filter
    pub async fn create(&self, criteria: FilterCriteria, action: FilterAction) -> Result<Filter> {
        let filter = Filter {
            id: None,
            criteria,
            action,
        };

        let request = self
            .client
            .request(Method::POST, "settings/filters")
            .json(&filter);
        let context = ErrorContext::new("create filter").filter_definition();
        let created: Filter = self.client.execute(request, context).await?.json().await?;

        tracing::info!(filter_id = ?created.id, "Filter created");
        Ok(created)
    }

    /// List all Gmail filters
    pub async fn list(&self) -> Result<Vec<Filter>> {
        let request = self.client.request(Method::GET, "settings/filters");
        let text = self
            .client
            .execute(request, ErrorContext::new("list filters"))
            .await?
            .text()
            .await?;

        // The API answers `{}` (or nothing) when there are no filters
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let filter_list: FilterList = serde_json::from_str(&text)?;
        Ok(filter_list.filter)
    }

    pub async fn get(&self, filter_id: &str) -> Result<Filter> {
        let request = self
            .client
            .request(Method::GET, &format!("settings/filters/{}", filter_id));
        let context = ErrorContext::new("get filter").resource("Filter", filter_id);
        Ok(self.client.execute(request, context).await?.json().await?)
    }

    pub async fn delete(&self, filter_id: &str) -> Result<()> {
        let request = self
            .client
            .request(Method::DELETE, &format!("settings/filters/{}", filter_id));
        let context = ErrorContext::new("delete filter").resource("Filter", filter_id);
        self.client.execute(request, context).await?;

        tracing::info!(filter_id, "Filter deleted");
        Ok(())
    }
}

/// Pre-defined filters for common scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum FilterTemplate {
    FromSender,
    WithSubject,
    WithAttachments,
    LargeEmails,
    ContainingText,
    MailingList,
}

/// Template parameters; which ones are required depends on the template
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplateParameters {
    /// Sender email (for fromSender template)
    pub sender_email: Option<String>,

    /// Subject text (for withSubject template)
    pub subject_text: Option<String>,

    /// Text to search for (for containingText template)
    pub search_text: Option<String>,

    /// Mailing list identifier (for mailingList template)
    pub list_identifier: Option<String>,

    /// Size threshold in bytes (for largeEmails template)
    pub size_in_bytes: Option<i64>,

    /// Label IDs to apply
    pub label_ids: Option<Vec<String>>,

    /// Whether to archive (skip inbox)
    pub archive: Option<bool>,

    /// Whether to mark as read
    pub mark_as_read: Option<bool>,

    /// Whether to mark as important
    pub mark_important: Option<bool>,
}

impl FilterTemplate {
    pub fn name(self) -> &'static str {
        match self {
            Self::FromSender => "fromSender",
            Self::WithSubject => "withSubject",
            Self::WithAttachments => "withAttachments",
            Self::LargeEmails => "largeEmails",
            Self::ContainingText => "containingText",
            Self::MailingList => "mailingList",
        }
    }

    /// Expand the template into filter criteria and action
    pub fn build(self, params: &TemplateParameters) -> Result<(FilterCriteria, FilterAction)> {
        let label_ids = params.label_ids.clone();
        let remove_if = |flag: bool, label: &str| flag.then(|| vec![label.to_string()]);

        let built = match self {
            Self::FromSender => (
                FilterCriteria {
                    from: Some(self.require(&params.sender_email, "senderEmail")?),
                    ..Default::default()
                },
                FilterAction {
                    add_label_ids: label_ids,
                    remove_label_ids: remove_if(params.archive.unwrap_or(false), INBOX),
                    ..Default::default()
                },
            ),
            Self::WithSubject => (
                FilterCriteria {
                    subject: Some(self.require(&params.subject_text, "subjectText")?),
                    ..Default::default()
                },
                FilterAction {
                    add_label_ids: label_ids,
                    remove_label_ids: remove_if(params.mark_as_read.unwrap_or(false), UNREAD),
                    ..Default::default()
                },
            ),
            Self::WithAttachments => (
                FilterCriteria {
                    has_attachment: Some(true),
                    ..Default::default()
                },
                FilterAction {
                    add_label_ids: label_ids,
                    ..Default::default()
                },
            ),
            Self::LargeEmails => {
                let size = match params.size_in_bytes {
                    Some(size) if size > 0 => size,
                    _ => return Err(self.missing("sizeInBytes")),
                };
                (
                    FilterCriteria {
                        size: Some(size),
                        size_comparison: Some(SizeComparison::Larger),
                        ..Default::default()
                    },
                    FilterAction {
                        add_label_ids: label_ids,
                        ..Default::default()
                    },
                )
            }
            Self::ContainingText => {
                let text = self.require(&params.search_text, "searchText")?;
                let mut add = label_ids.unwrap_or_default();
                if params.mark_important.unwrap_or(false) {
                    add.push(IMPORTANT.to_string());
                }
                (
                    FilterCriteria {
                        query: Some(format!("\"{}\"", text)),
                        ..Default::default()
                    },
                    FilterAction {
                        add_label_ids: (!add.is_empty()).then_some(add),
                        ..Default::default()
                    },
                )
            }
            Self::MailingList => {
                let list = self.require(&params.list_identifier, "listIdentifier")?;
                (
                    FilterCriteria {
                        query: Some(format!("list:{} OR subject:[{}]", list, list)),
                        ..Default::default()
                    },
                    FilterAction {
                        add_label_ids: label_ids,
                        remove_label_ids: remove_if(params.archive.unwrap_or(true), INBOX),
                        ..Default::default()
                    },
                )
            }
        };

        Ok(built)
    }

    fn require(self, value: &Option<String>, field: &'static str) -> Result<String> {
        match value.as_deref() {
            Some(v) if !v.is_empty() => Ok(v.to_string()),
            _ => Err(self.missing(field)),
        }
    }

    fn missing(self, field: &'static str) -> crate::error::GmailMcpError {
        ValidationError::MissingTemplateParameter {
            field,
            template: self.name(),
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GmailMcpError;

    #[test]
    fn test_from_sender() {
        let params = TemplateParameters {
            sender_email: Some("test@example.com".to_string()),
            label_ids: Some(vec!["Label_1".to_string()]),
            archive: Some(true),
            ..Default::default()
        };
        let (criteria, action) = FilterTemplate::FromSender.build(&params).unwrap();

        assert_eq!(criteria.from.as_deref(), Some("test@example.com"));
        assert_eq!(action.add_label_ids, Some(vec!["Label_1".to_string()]));
        assert_eq!(action.remove_label_ids, Some(vec!["INBOX".to_string()]));
    }

    #[test]
    fn test_from_sender_keeps_inbox_by_default() {
        let params = TemplateParameters {
            sender_email: Some("a@b.c".to_string()),
            ..Default::default()
        };
        let (_, action) = FilterTemplate::FromSender.build(&params).unwrap();
        assert_eq!(action.remove_label_ids, None);
    }

    #[test]
    fn test_mailing_list_archives_by_default() {
        let params = TemplateParameters {
            list_identifier: Some("devs".to_string()),
            ..Default::default()
        };
        let (criteria, action) = FilterTemplate::MailingList.build(&params).unwrap();

        assert_eq!(criteria.query.as_deref(), Some("list:devs OR subject:[devs]"));
        assert_eq!(action.remove_label_ids, Some(vec!["INBOX".to_string()]));
    }

    #[test]
    fn test_large_emails_is_always_larger() {
        let params = TemplateParameters {
            size_in_bytes: Some(1024 * 1024),
            ..Default::default()
        };
        let (criteria, _) = FilterTemplate::LargeEmails.build(&params).unwrap();
        assert_eq!(criteria.size, Some(1024 * 1024));
        assert_eq!(criteria.size_comparison, Some(SizeComparison::Larger));

        let zero = TemplateParameters {
            size_in_bytes: Some(0),
            ..Default::default()
        };
        assert!(FilterTemplate::LargeEmails.build(&zero).is_err());
    }

    #[test]
    fn test_containing_text_marks_important() {
        let params = TemplateParameters {
            search_text: Some("invoice".to_string()),
            mark_important: Some(true),
            ..Default::default()
        };
        let (criteria, action) = FilterTemplate::ContainingText.build(&params).unwrap();
        assert_eq!(criteria.query.as_deref(), Some("\"invoice\""));
        assert_eq!(action.add_label_ids, Some(vec!["IMPORTANT".to_string()]));
    }

    #[test]
    fn test_with_subject_and_attachments() {
        let params = TemplateParameters {
            subject_text: Some("[JIRA]".to_string()),
            mark_as_read: Some(true),
            ..Default::default()
        };
        let (criteria, action) = FilterTemplate::WithSubject.build(&params).unwrap();
        assert_eq!(criteria.subject.as_deref(), Some("[JIRA]"));
        assert_eq!(action.remove_label_ids, Some(vec!["UNREAD".to_string()]));

        let (criteria, _) = FilterTemplate::WithAttachments
            .build(&TemplateParameters::default())
            .unwrap();
        assert_eq!(criteria.has_attachment, Some(true));
    }

    #[test]
    fn test_missing_parameter() {
        let err = FilterTemplate::WithSubject
            .build(&TemplateParameters::default())
            .unwrap_err();
        assert!(matches!(err, GmailMcpError::Validation(_)));
        assert_eq!(
            err.to_string(),
            "Validation error: subjectText is required for withSubject template"
        );
    }

    #[test]
    fn test_template_names_match_serde() {
        let parsed: FilterTemplate = serde_json::from_str("\"mailingList\"").unwrap();
        assert_eq!(parsed, FilterTemplate::MailingList);
        assert_eq!(
            serde_json::to_value(FilterTemplate::LargeEmails).unwrap(),
            serde_json::json!(FilterTemplate::LargeEmails.name())
        );
    }
}
