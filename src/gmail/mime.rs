//! MIME tree traversal for Gmail message payloads
//!
//! The payload is flattened once into a [`PartArena`] (document pre-order,
//! explicit stack), and every query below walks that arena instead of
//! recursing, so arbitrarily deep trees cannot overflow the stack.

use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;

use crate::error::{Result, ValidationError};
use crate::gmail::types::MessagePart;

/// Decode base64url data from the Gmail API, tolerating padding and the
/// standard alphabet
pub fn decode_base64url(data: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(data)
        .or_else(|_| URL_SAFE.decode(data))
        .or_else(|_| STANDARD.decode(data))
        .map_err(|e| {
            ValidationError::InvalidData {
                name: "base64 data",
                message: e.to_string(),
            }
            .into()
        })
}

/// One node of the flattened tree
#[derive(Debug, Clone, Copy)]
pub struct PartNode<'m> {
    pub part: &'m MessagePart,
    pub parent: Option<usize>,
    pub depth: usize,
}

/// A message tree flattened in pre-order; indexes are stable for the arena's lifetime
#[derive(Debug)]
pub struct PartArena<'m> {
    nodes: Vec<PartNode<'m>>,
}

impl<'m> PartArena<'m> {
    pub fn build(root: &'m MessagePart) -> Self {
        let mut nodes = Vec::new();
        let mut stack = vec![(root, None, 0usize)];

        while let Some((part, parent, depth)) = stack.pop() {
            let index = nodes.len();
            nodes.push(PartNode {
                part,
                parent,
                depth,
            });
            // reversed so the first child is visited next
            for child in part.parts.iter().rev() {
                stack.push((child, Some(index), depth + 1));
            }
        }

        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PartNode<'m>> {
        self.nodes.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PartNode<'m>> {
        self.nodes.iter()
    }

    /// Text and HTML bodies, each the concatenation of every matching part
    pub fn content(&self) -> EmailContent {
        let mut content = EmailContent::default();

        for node in &self.nodes {
            let part = node.part;
            let Some(data) = part.body.as_ref().and_then(|b| b.data.as_deref()) else {
                continue;
            };

            let target = if part.is_mime("text/plain") {
                &mut content.text
            } else if part.is_mime("text/html") {
                &mut content.html
            } else {
                continue;
            };

            match decode_base64url(data) {
                Ok(bytes) => target.push_str(&String::from_utf8_lossy(&bytes)),
                Err(e) => tracing::debug!(
                    part_id = ?part.part_id,
                    error = %e,
                    "Skipping undecodable body part"
                ),
            }
        }

        content
    }

    /// Every part that refers to a separately stored attachment
    pub fn attachments(&self) -> Vec<AttachmentInfo> {
        self.nodes
            .iter()
            .filter_map(|node| {
                let part = node.part;
                let body = part.body.as_ref()?;
                let id = body.attachment_id.as_ref()?;
                Some(AttachmentInfo {
                    id: id.clone(),
                    filename: filename_or_default(part, id),
                    mime_type: part
                        .mime_type
                        .clone()
                        .unwrap_or_else(|| "application/octet-stream".to_string()),
                    size: body.size,
                })
            })
            .collect()
    }

    /// Filename of the part carrying `attachment_id`
    pub fn find_attachment_filename(&self, attachment_id: &str) -> Option<String> {
        self.nodes.iter().find_map(|node| {
            let body = node.part.body.as_ref()?;
            (body.attachment_id.as_deref() == Some(attachment_id))
                .then(|| filename_or_default(node.part, attachment_id))
        })
    }
}

fn filename_or_default(part: &MessagePart, attachment_id: &str) -> String {
    match part.filename.as_deref() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("attachment-{}", attachment_id),
    }
}

/// Extracted email content
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailContent {
    pub text: String,
    pub html: String,
}

impl EmailContent {
    /// Only an HTML rendition exists
    pub fn is_html_only(&self) -> bool {
        self.text.is_empty() && !self.html.is_empty()
    }

    /// Plain text when present, HTML otherwise
    pub fn body(&self) -> &str {
        if self.text.is_empty() {
            &self.html
        } else {
            &self.text
        }
    }
}

/// Attachment metadata found in a message tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentInfo {
    pub id: String,
    pub filename: String,
    pub mime_type: String,
    /// Declared size in bytes
    pub size: i64,
}
