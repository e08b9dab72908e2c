//! Document store adapter for the complaints collection.
//!
//! Two backends implement [`ComplaintStore`]: DynamoDB for deployments and an
//! in-memory map for embedding and tests. Both publish every successful write
//! to a [`ChangeHub`] so live department feeds can follow the collection.

pub mod codec;
pub mod dynamo;
pub mod memory;

use crate::error::StoreError;
use crate::types::{Complaint, Status};
use async_trait::async_trait;
use tokio::sync::broadcast;

pub use dynamo::DynamoComplaintStore;
pub use memory::MemoryComplaintStore;

pub(crate) const CHANGE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
}

/// A complaint as it looks after a successful write.
#[derive(Debug, Clone)]
pub struct ComplaintChange {
    pub kind: ChangeKind,
    pub complaint: Complaint,
}

/// Point update applied to a single complaint.
#[derive(Debug, Clone, PartialEq)]
pub enum ComplaintUpdate {
    Status(Status),
    Reply(String),
}

#[async_trait]
pub trait ComplaintStore: Send + Sync {
    async fn create(&self, complaint: &Complaint) -> Result<(), StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Complaint>, StoreError>;

    /// Apply `update` and return the record as stored afterwards.
    /// Fails with [`StoreError::NotFound`] instead of creating a record.
    async fn update(&self, id: &str, update: ComplaintUpdate) -> Result<Complaint, StoreError>;

    async fn query_by_owner(&self, user_id: &str) -> Result<Vec<Complaint>, StoreError>;

    /// Complaints of a department, newest first.
    async fn query_by_department(&self, department: &str) -> Result<Vec<Complaint>, StoreError>;

    fn changes(&self) -> broadcast::Receiver<ComplaintChange>;
}

/// Fan-out of complaint writes to live subscribers.
#[derive(Debug, Clone)]
pub struct ChangeHub {
    tx: broadcast::Sender<ComplaintChange>,
}

impl ChangeHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANGE_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, kind: ChangeKind, complaint: Complaint) {
        // No receivers is the common case outside the triage view.
        let _ = self.tx.send(ComplaintChange { kind, complaint });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ComplaintChange> {
        self.tx.subscribe()
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Newest first. Ties keep a stable order by id.
pub fn sort_newest_first(complaints: &mut [Complaint]) {
    complaints.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}
