//! Label management for Gmail

use reqwest::Method;

use crate::error::{RemoteError, Result};
use crate::gmail::client::{ErrorContext, GmailClient};
use crate::gmail::types::{
    Label, LabelChanges, LabelList, LabelListVisibility, LabelType, MessageListVisibility,
};

/// Label operations, borrowed from a [`GmailClient`]
pub struct LabelManager<'a> {
    client: &'a GmailClient,
}

impl<'a> LabelManager<'a> {
    pub fn new(client: &'a GmailClient) -> Self {
        Self { client }
    }

    /// Create a new label, visible in both lists unless told otherwise
    pub async fn create(
        &self,
        name: &str,
        message_list_visibility: Option<MessageListVisibility>,
        label_list_visibility: Option<LabelListVisibility>,
    ) -> Result<Label> {
        let body = LabelChanges {
            name: Some(name.to_string()),
            message_list_visibility: Some(message_list_visibility.unwrap_or_default()),
            label_list_visibility: Some(label_list_visibility.unwrap_or_default()),
        };

        let request = self.client.request(Method::POST, "labels").json(&body);
        let context = ErrorContext::new("create label").label_name(name);
        let label: Label = self.client.execute(request, context).await?.json().await?;

        tracing::info!(label_id = %label.id, name, "Label created");
        Ok(label)
    }

    /// Update an existing label; fails with "not found" before sending anything
    pub async fn update(&self, label_id: &str, changes: &LabelChanges) -> Result<Label> {
        self.get(label_id).await?;

        let request = self
            .client
            .request(Method::PATCH, &format!("labels/{}", label_id))
            .json(changes);
        let context = ErrorContext::new("update label").resource("Label", label_id);
        Ok(self.client.execute(request, context).await?.json().await?)
    }

    /// Delete a user label, returning what was deleted.
    ///
    /// System labels are refused without issuing the delete call.
    pub async fn delete(&self, label_id: &str) -> Result<Label> {
        let label = self.get(label_id).await?;

        if label.is_system() {
            return Err(RemoteError::SystemLabel {
                label_id: label_id.to_string(),
            }
            .into());
        }

        let request = self
            .client
            .request(Method::DELETE, &format!("labels/{}", label_id));
        let context = ErrorContext::new("delete label").resource("Label", label_id);
        self.client.execute(request, context).await?;

        tracing::info!(label_id, name = %label.name, "Label deleted");
        Ok(label)
    }

    pub async fn get(&self, label_id: &str) -> Result<Label> {
        let request = self
            .client
            .request(Method::GET, &format!("labels/{}", label_id));
        let context = ErrorContext::new("get label").resource("Label", label_id);
        Ok(self.client.execute(request, context).await?.json().await?)
    }

    /// List all labels, split by owner
    pub async fn list(&self) -> Result<LabelListResult> {
        let request = self.client.request(Method::GET, "labels");
        let label_list: LabelList = self
            .client
            .execute(request, ErrorContext::new("list labels"))
            .await?
            .json()
            .await?;

        Ok(LabelListResult::new(label_list.labels))
    }

    /// Find a label by name (case-insensitive)
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Label>> {
        let result = self.list().await?;
        let name_lower = name.to_lowercase();

        Ok(result
            .all
            .into_iter()
            .find(|l| l.name.to_lowercase() == name_lower))
    }

    /// Return the label named `name`, creating it if none exists.
    ///
    /// The flag is true when the label was created by this call.
    pub async fn get_or_create(
        &self,
        name: &str,
        message_list_visibility: Option<MessageListVisibility>,
        label_list_visibility: Option<LabelListVisibility>,
    ) -> Result<(Label, bool)> {
        if let Some(label) = self.find_by_name(name).await? {
            return Ok((label, false));
        }

        let label = self
            .create(name, message_list_visibility, label_list_visibility)
            .await?;
        Ok((label, true))
    }
}

/// Result of listing labels
#[derive(Debug, Clone)]
pub struct LabelListResult {
    pub all: Vec<Label>,
    pub system: Vec<Label>,
    pub user: Vec<Label>,
}

impl LabelListResult {
    pub fn new(all: Vec<Label>) -> Self {
        let of_type = |t: LabelType| -> Vec<Label> {
            all.iter()
                .filter(|l| l.label_type == Some(t))
                .cloned()
                .collect()
        };
        let system = of_type(LabelType::System);
        let user = of_type(LabelType::User);
        Self { all, system, user }
    }

    /// System plus user labels (untyped entries are not counted)
    pub fn total(&self) -> usize {
        self.system.len() + self.user.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(id: &str, label_type: Option<LabelType>) -> Label {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "name": id,
            "type": label_type,
        }))
        .unwrap()
    }

    #[test]
    fn test_label_list_result_split() {
        let result = LabelListResult::new(vec![
            label("INBOX", Some(LabelType::System)),
            label("Label_1", Some(LabelType::User)),
            label("Label_2", Some(LabelType::User)),
            label("odd", None),
        ]);
        assert_eq!(result.system.len(), 1);
        assert_eq!(result.user.len(), 2);
        assert_eq!(result.total(), 3);
        assert_eq!(result.all.len(), 4);
    }
}
