//! Outgoing message construction
//!
//! Messages without attachments are assembled by hand as plain RFC 822 text.
//! Messages with attachments are built with `mail-builder`, which takes care
//! of multipart/mixed layout and transfer encodings.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use lettre::message::Mailbox;
use mail_builder::headers::address::Address;
use mail_builder::MessageBuilder;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};

/// Body layout requested by the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum MimeType {
    #[default]
    #[serde(rename = "text/plain")]
    TextPlain,
    #[serde(rename = "text/html")]
    TextHtml,
    #[serde(rename = "multipart/alternative")]
    MultipartAlternative,
}

/// Everything needed to render one outgoing message
#[derive(Debug, Clone, Default)]
pub struct OutgoingEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    pub html_body: Option<String>,
    pub mime_type: MimeType,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub in_reply_to: Option<String>,
    pub attachments: Vec<PathBuf>,
}

impl OutgoingEmail {
    /// Both a text and an HTML rendition will be sent
    fn is_alternative(&self) -> bool {
        self.html_body.is_some() && self.mime_type != MimeType::TextPlain
    }

    fn html_or_body(&self) -> &str {
        self.html_body.as_deref().unwrap_or(&self.body)
    }

    /// The replied-to Message-ID without its angle brackets
    fn reply_id(&self) -> Option<&str> {
        self.in_reply_to
            .as_deref()
            .map(|id| id.trim().trim_start_matches('<').trim_end_matches('>'))
            .filter(|id| !id.is_empty())
    }

    /// Validate recipients and render the RFC 822 message
    pub fn render(&self) -> Result<Vec<u8>> {
        validate_recipients(self.to.iter().chain(&self.cc).chain(&self.bcc))?;
        if let Some(ref in_reply_to) = self.in_reply_to {
            reject_line_breaks("inReplyTo", in_reply_to)?;
        }

        if self.attachments.is_empty() {
            Ok(self.render_simple().into_bytes())
        } else {
            self.render_with_attachments()
        }
    }

    fn render_simple(&self) -> String {
        let mut lines = vec![format!("To: {}", self.to.join(", "))];

        if !self.cc.is_empty() {
            lines.push(format!("Cc: {}", self.cc.join(", ")));
        }
        if !self.bcc.is_empty() {
            lines.push(format!("Bcc: {}", self.bcc.join(", ")));
        }

        lines.push(format!("Subject: {}", encode_mime_header(&self.subject)));

        if let Some(id) = self.reply_id() {
            lines.push(format!("In-Reply-To: <{}>", id));
            lines.push(format!("References: <{}>", id));
        }

        lines.push("MIME-Version: 1.0".to_string());

        if self.is_alternative() {
            let boundary = format!("----=_NextPart_{}", generate_boundary());
            lines.push(format!(
                "Content-Type: multipart/alternative; boundary=\"{}\"",
                boundary
            ));
            lines.push(String::new());
            push_text_part(&mut lines, Some(&boundary), "text/plain", &self.body);
            push_text_part(&mut lines, Some(&boundary), "text/html", self.html_or_body());
            lines.push(format!("--{}--", boundary));
        } else if self.mime_type == MimeType::TextHtml {
            push_text_part(&mut lines, None, "text/html", self.html_or_body());
        } else {
            push_text_part(&mut lines, None, "text/plain", &self.body);
        }

        lines.join("\r\n")
    }

    fn render_with_attachments(&self) -> Result<Vec<u8>> {
        let mut builder = MessageBuilder::new()
            .to(address_list(&self.to)?)
            .subject(self.subject.as_str());

        if !self.cc.is_empty() {
            builder = builder.cc(address_list(&self.cc)?);
        }
        if !self.bcc.is_empty() {
            builder = builder.bcc(address_list(&self.bcc)?);
        }
        if let Some(id) = self.reply_id() {
            builder = builder.in_reply_to(id).references(id);
        }

        builder = if self.is_alternative() {
            builder
                .text_body(self.body.as_str())
                .html_body(self.html_or_body())
        } else if self.mime_type == MimeType::TextHtml {
            builder.html_body(self.html_or_body())
        } else {
            builder.text_body(self.body.as_str())
        };

        for path in &self.attachments {
            let attachment = load_attachment(path)?;
            builder = builder.attachment(attachment.mime_type, attachment.filename, attachment.data);
        }

        Ok(builder.write_to_vec()?)
    }
}

fn push_text_part(lines: &mut Vec<String>, boundary: Option<&str>, mime: &str, content: &str) {
    if let Some(boundary) = boundary {
        lines.push(format!("--{}", boundary));
    }
    lines.push(format!("Content-Type: {}; charset=UTF-8", mime));
    lines.push("Content-Transfer-Encoding: 7bit".to_string());
    lines.push(String::new());
    lines.push(content.to_string());
    if boundary.is_some() {
        lines.push(String::new());
    }
}

/// Every address must parse as a mailbox (`a@b.c` or `Name <a@b.c>`)
pub fn validate_recipients<'a>(addresses: impl IntoIterator<Item = &'a String>) -> Result<()> {
    for email in addresses {
        if email.parse::<Mailbox>().is_err() {
            return Err(ValidationError::InvalidEmail {
                email: email.clone(),
            }
            .into());
        }
    }
    Ok(())
}

/// Split each recipient into display name and address for `mail-builder`
fn address_list(addresses: &[String]) -> Result<Address<'static>> {
    let mut list = Vec::with_capacity(addresses.len());
    for email in addresses {
        let mailbox: Mailbox = email.parse().map_err(|_| ValidationError::InvalidEmail {
            email: email.clone(),
        })?;
        list.push(Address::new_address(mailbox.name, mailbox.email.to_string()));
    }
    Ok(Address::new_list(list))
}

/// Header values supplied by the caller must stay on one line
pub fn reject_line_breaks(name: &'static str, value: &str) -> Result<()> {
    if value.contains(['\r', '\n']) {
        return Err(ValidationError::InvalidData {
            name,
            message: "must not contain line breaks".to_string(),
        }
        .into());
    }
    Ok(())
}

/// Encode text for a MIME header (RFC 2047) when it isn't plain ASCII
pub fn encode_mime_header(text: &str) -> String {
    if text.chars().all(|c| c.is_ascii() && c != '\r' && c != '\n') {
        return text.to_string();
    }
    format!(
        "=?UTF-8?B?{}?=",
        base64::engine::general_purpose::STANDARD.encode(text.as_bytes())
    )
}

/// Encode a rendered message for the Gmail API (base64url, no padding)
pub fn encode_raw_message(message: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(message)
}

fn generate_boundary() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("{:x}", timestamp)
}

/// A file read from disk, ready to attach
#[derive(Debug, Clone)]
pub struct AttachmentFile {
    pub filename: String,
    pub mime_type: &'static str,
    pub data: Vec<u8>,
}

/// Read an attachment and guess its MIME type from the extension
pub fn load_attachment(path: &Path) -> Result<AttachmentFile> {
    if !path.is_file() {
        return Err(ValidationError::FileNotFound {
            path: path.display().to_string(),
        }
        .into());
    }

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "attachment".to_string());

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let mime_type = match extension.as_deref() {
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("xls") => "application/vnd.ms-excel",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("txt") => "text/plain",
        Some("html") | Some("htm") => "text/html",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    };

    Ok(AttachmentFile {
        filename,
        mime_type,
        data: std::fs::read(path)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GmailMcpError;

    fn email() -> OutgoingEmail {
        OutgoingEmail {
            to: vec!["test@example.com".to_string()],
            subject: "Test Subject".to_string(),
            body: "Test body".to_string(),
            ..Default::default()
        }
    }

    fn rendered(email: &OutgoingEmail) -> String {
        String::from_utf8(email.render().unwrap()).unwrap()
    }

    #[test]
    fn test_plain_message() {
        let message = rendered(&email());
        assert!(message.contains("To: test@example.com\r\n"));
        assert!(message.contains("Subject: Test Subject\r\n"));
        assert!(message.contains("Content-Type: text/plain; charset=UTF-8"));
        assert!(message.ends_with("\r\n\r\nTest body"));
    }

    #[test]
    fn test_alternative_message() {
        let message = rendered(&OutgoingEmail {
            html_body: Some("<p>Hi</p>".to_string()),
            mime_type: MimeType::MultipartAlternative,
            cc: vec!["Copy <cc@example.com>".to_string()],
            in_reply_to: Some("<abc@mail.gmail.com>".to_string()),
            ..email()
        });
        assert!(message.contains("Content-Type: multipart/alternative; boundary="));
        assert!(message.contains("Cc: Copy <cc@example.com>"));
        assert!(message.contains("References: <abc@mail.gmail.com>"));
        assert!(message.contains("<p>Hi</p>"));
        assert!(message.contains("Test body"));
    }

    #[test]
    fn test_html_body_ignored_for_plain_mime() {
        let message = rendered(&OutgoingEmail {
            html_body: Some("<p>Hi</p>".to_string()),
            ..email()
        });
        assert!(!message.contains("<p>Hi</p>"));
    }

    #[test]
    fn test_invalid_recipient() {
        let err = OutgoingEmail {
            bcc: vec!["not-an-email".to_string()],
            ..email()
        }
        .render()
        .unwrap_err();
        assert!(matches!(
            err,
            GmailMcpError::Validation(ValidationError::InvalidEmail { .. })
        ));
    }

    #[test]
    fn test_message_with_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "attached text").unwrap();

        let message = rendered(&OutgoingEmail {
            attachments: vec![path],
            ..email()
        });
        assert!(message.contains("multipart/mixed"));
        assert!(message.contains("notes.txt"));
        assert!(message.contains("Test Subject"));
    }

    #[test]
    fn test_attachment_message_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        let message = rendered(&OutgoingEmail {
            to: vec!["Jane Doe <jane@example.com>".to_string()],
            cc: vec![
                "Copy <cc@example.com>".to_string(),
                "second@example.com".to_string(),
            ],
            bcc: vec!["hidden@example.com".to_string()],
            in_reply_to: Some("<abc@mail.gmail.com>".to_string()),
            attachments: vec![path],
            ..email()
        });
        assert!(message.contains("To: \"Jane Doe\" <jane@example.com>\r\n"));
        assert!(message.contains("Cc: \"Copy\" <cc@example.com>, <second@example.com>\r\n"));
        assert!(message.contains("Bcc: <hidden@example.com>\r\n"));
        assert!(message.contains("In-Reply-To: <abc@mail.gmail.com>\r\n"));
        assert!(message.contains("References: <abc@mail.gmail.com>\r\n"));
        assert!(!message.contains("<<"));
        assert!(!message.contains("<Jane Doe"));
        assert!(message.contains("application/pdf"));
    }

    #[test]
    fn test_bare_reply_id_gets_brackets() {
        let message = rendered(&OutgoingEmail {
            in_reply_to: Some("abc@mail.gmail.com".to_string()),
            ..email()
        });
        assert!(message.contains("In-Reply-To: <abc@mail.gmail.com>\r\n"));
        assert!(message.contains("References: <abc@mail.gmail.com>\r\n"));
    }

    #[test]
    fn test_reply_id_with_line_break_is_rejected() {
        for attachments in [vec![], vec![PathBuf::from("/definitely/not/here.pdf")]] {
            let err = OutgoingEmail {
                in_reply_to: Some("<abc@x>\r\nBcc: victim@example.com".to_string()),
                attachments,
                ..email()
            }
            .render()
            .unwrap_err();
            assert!(matches!(
                err,
                GmailMcpError::Validation(ValidationError::InvalidData {
                    name: "inReplyTo",
                    ..
                })
            ));
        }
    }

    #[test]
    fn test_reject_line_breaks() {
        assert!(reject_line_breaks("threadId", "18c2f0a1b2").is_ok());
        assert!(reject_line_breaks("threadId", "a\nb").is_err());
        assert!(reject_line_breaks("threadId", "a\rb").is_err());
    }

    #[test]
    fn test_missing_attachment() {
        let err = OutgoingEmail {
            attachments: vec![PathBuf::from("/definitely/not/here.pdf")],
            ..email()
        }
        .render()
        .unwrap_err();
        assert!(matches!(
            err,
            GmailMcpError::Validation(ValidationError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_encode_mime_header() {
        assert_eq!(encode_mime_header("Hello World"), "Hello World");
        let encoded = encode_mime_header("Héllo Wörld");
        assert!(encoded.starts_with("=?UTF-8?B?"));
        assert!(encoded.ends_with("?="));
    }

    #[test]
    fn test_encode_raw_message_is_unpadded_url_safe() {
        let encoded = encode_raw_message(b"subject?>>");
        assert!(!encoded.contains('='));
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
    }
}
