use super::{sort_newest_first, ChangeHub, ChangeKind, ComplaintChange, ComplaintStore, ComplaintUpdate};
use crate::error::StoreError;
use crate::types::Complaint;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

/// In-process complaint collection.
#[derive(Debug, Default)]
pub struct MemoryComplaintStore {
    complaints: RwLock<HashMap<String, Complaint>>,
    hub: ChangeHub,
}

impl MemoryComplaintStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.complaints.read().await.len()
    }
}

#[async_trait]
impl ComplaintStore for MemoryComplaintStore {
    async fn create(&self, complaint: &Complaint) -> Result<(), StoreError> {
        let stored = complaint.redacted();
        let mut complaints = self.complaints.write().await;
        complaints.insert(stored.id.clone(), stored.clone());
        // Published under the lock so change order matches write order.
        self.hub.publish(ChangeKind::Created, stored);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Complaint>, StoreError> {
        Ok(self.complaints.read().await.get(id).cloned())
    }

    async fn update(&self, id: &str, update: ComplaintUpdate) -> Result<Complaint, StoreError> {
        let mut complaints = self.complaints.write().await;
        let complaint = complaints
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        match update {
            ComplaintUpdate::Status(status) => complaint.status = status,
            ComplaintUpdate::Reply(reply) => complaint.reply = Some(reply),
        }
        let updated = complaint.clone();
        self.hub.publish(ChangeKind::Updated, updated.clone());
        Ok(updated)
    }

    async fn query_by_owner(&self, user_id: &str) -> Result<Vec<Complaint>, StoreError> {
        Ok(self
            .complaints
            .read()
            .await
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn query_by_department(&self, department: &str) -> Result<Vec<Complaint>, StoreError> {
        let mut complaints: Vec<Complaint> = self
            .complaints
            .read()
            .await
            .values()
            .filter(|c| c.department == department)
            .cloned()
            .collect();
        sort_newest_first(&mut complaints);
        Ok(complaints)
    }

    fn changes(&self) -> broadcast::Receiver<ComplaintChange> {
        self.hub.subscribe()
    }
}
