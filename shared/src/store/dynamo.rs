use super::codec::{complaint_from_item, complaint_key, complaint_to_item, department_key, owner_key, Item};
use super::{ChangeHub, ChangeKind, ComplaintChange, ComplaintStore, ComplaintUpdate};
use crate::error::StoreError;
use crate::types::Complaint;
use async_trait::async_trait;
use aws_sdk_dynamodb::error::{DisplayErrorContext, SdkError};
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client as DynamoClient;
use std::collections::HashMap;
use tokio::sync::broadcast;

/// Complaints stored in the single application table.
pub struct DynamoComplaintStore {
    client: DynamoClient,
    table_name: String,
    owner_index: String,
    department_index: String,
    hub: ChangeHub,
}

impl DynamoComplaintStore {
    pub fn new(
        client: DynamoClient,
        table_name: impl Into<String>,
        owner_index: impl Into<String>,
        department_index: impl Into<String>,
    ) -> Self {
        Self {
            client,
            table_name: table_name.into(),
            owner_index: owner_index.into(),
            department_index: department_index.into(),
            hub: ChangeHub::new(),
        }
    }

    /// Run a paginated index query and decode every complaint it returns.
    async fn query_index(
        &self,
        index_name: &str,
        key_name: &str,
        key_value: String,
        newest_first: bool,
    ) -> Result<Vec<Complaint>, StoreError> {
        let mut complaints = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let result = self
                .client
                .query()
                .table_name(&self.table_name)
                .index_name(index_name)
                .key_condition_expression("#key = :key")
                .expression_attribute_names("#key", key_name)
                .expression_attribute_values(":key", AttributeValue::S(key_value.clone()))
                .scan_index_forward(!newest_first)
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| backend_error("query", e))?;

            for item in result.items() {
                match complaint_from_item(item) {
                    Ok(complaint) => complaints.push(complaint),
                    Err(e) => tracing::warn!("Skipping complaint item on {}: {}", index_name, e),
                }
            }

            match result.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        Ok(complaints)
    }
}

#[async_trait]
impl ComplaintStore for DynamoComplaintStore {
    async fn create(&self, complaint: &Complaint) -> Result<(), StoreError> {
        let item = complaint_to_item(complaint);

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(PK)")
            .send()
            .await
            .map_err(|e| backend_error("put_item", e))?;

        tracing::info!("Complaint {} stored for department {}", complaint.id, complaint.department);
        self.hub.publish(ChangeKind::Created, complaint.redacted());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Complaint>, StoreError> {
        let pk = complaint_key(id);

        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(pk.clone()))
            .key("SK", AttributeValue::S(pk))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| backend_error("get_item", e))?;

        result.item().map(complaint_from_item).transpose()
    }

    async fn update(&self, id: &str, update: ComplaintUpdate) -> Result<Complaint, StoreError> {
        let pk = complaint_key(id);

        let (attribute, value) = match &update {
            ComplaintUpdate::Status(status) => ("status", status.as_str().to_string()),
            ComplaintUpdate::Reply(reply) => ("reply", reply.clone()),
        };

        let mut expr_names = HashMap::new();
        expr_names.insert("#field".to_string(), attribute.to_string());

        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(pk.clone()))
            .key("SK", AttributeValue::S(pk))
            .update_expression("SET #field = :value")
            .condition_expression("attribute_exists(PK)")
            .set_expression_attribute_names(Some(expr_names))
            .expression_attribute_values(":value", AttributeValue::S(value))
            .return_values(ReturnValue::AllNew)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(SdkError::ServiceError(e))
                if matches!(e.err(), UpdateItemError::ConditionalCheckFailedException(_)) =>
            {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Err(e) => return Err(backend_error("update_item", e)),
        };

        let attributes = output
            .attributes()
            .ok_or_else(|| StoreError::Malformed(format!("update of {} returned no attributes", id)))?;
        let complaint = complaint_from_item(attributes)?;

        tracing::info!("Complaint {} updated ({})", id, attribute);
        self.hub.publish(ChangeKind::Updated, complaint.clone());
        Ok(complaint)
    }

    async fn query_by_owner(&self, user_id: &str) -> Result<Vec<Complaint>, StoreError> {
        self.query_index(&self.owner_index, "GSI1PK", owner_key(user_id), false)
            .await
    }

    async fn query_by_department(&self, department: &str) -> Result<Vec<Complaint>, StoreError> {
        self.query_index(&self.department_index, "GSI2PK", department_key(department), true)
            .await
    }

    fn changes(&self) -> broadcast::Receiver<ComplaintChange> {
        self.hub.subscribe()
    }
}

fn backend_error<E, R>(operation: &str, e: SdkError<E, R>) -> StoreError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = format!("{}", DisplayErrorContext(&e));
    tracing::error!("DynamoDB {} failed: {}", operation, message);
    StoreError::Backend(message)
}
