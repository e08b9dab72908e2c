use crate::store::ChangeKind;
use crate::types::Complaint;
use serde::Serialize;

/// Message pushed to faculty connections of a department
#[derive(Debug, Serialize)]
pub struct BroadcastMessage {
    pub r#type: &'static str,
    pub complaint: Complaint,
}

impl BroadcastMessage {
    /// The complaint is redacted before it leaves the backend.
    pub fn for_change(kind: ChangeKind, complaint: &Complaint) -> Self {
        let r#type = match kind {
            ChangeKind::Created => "complaint_created",
            ChangeKind::Updated => "complaint_updated",
        };
        Self {
            r#type,
            complaint: complaint.redacted(),
        }
    }
}
