//! Complaint lifecycle: submission, role-scoped retrieval, triage updates and
//! the live department feed.

use crate::error::{ComplaintError, StoreError};
use crate::navigation::authorize_triage;
use crate::session::Session;
use crate::store::{sort_newest_first, ComplaintChange, ComplaintStore, ComplaintUpdate};
use crate::types::{Category, Complaint, Status, StatusFilter};
use futures::Stream;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

const FEED_BUFFER: usize = 16;

#[derive(Clone)]
pub struct ComplaintService {
    store: Arc<dyn ComplaintStore>,
}

impl ComplaintService {
    pub fn new(store: Arc<dyn ComplaintStore>) -> Self {
        Self { store }
    }

    pub async fn submit(
        &self,
        session: &Session,
        message: &str,
        category: Category,
        anonymous: bool,
    ) -> Result<Complaint, ComplaintError> {
        if message.trim().is_empty() {
            return Err(ComplaintError::Validation(
                "Complaint message cannot be empty".to_string(),
            ));
        }

        let user = &session.user;
        let complaint = Complaint {
            id: uuid::Uuid::new_v4().to_string(),
            message: message.to_string(),
            category,
            department: user.department.clone(),
            created_at: chrono::Utc::now(),
            status: Status::Pending,
            user_id: user.user_id.clone(),
            is_anonymous: anonymous,
            email: if anonymous { None } else { Some(user.email.clone()) },
            reply: None,
            section: user.section.clone(),
            year: user.year.clone(),
        };

        self.store.create(&complaint).await?;
        tracing::info!(
            "Complaint {} submitted to {} (anonymous: {})",
            complaint.id,
            complaint.department,
            anonymous
        );
        Ok(complaint)
    }

    /// The caller's own complaints, in no particular order.
    pub async fn list_own(&self, session: &Session) -> Result<Vec<Complaint>, ComplaintError> {
        Ok(self.store.query_by_owner(session.user_id()).await?)
    }

    /// One-shot department listing for the triage view, newest first.
    pub async fn department_snapshot(
        &self,
        session: &Session,
        department: &str,
        filter: StatusFilter,
    ) -> Result<Vec<Complaint>, ComplaintError> {
        authorize_triage(session, department)?;
        let complaints = self.store.query_by_department(department).await?;
        Ok(filter.apply(redact_for_department(complaints, department)))
    }

    /// Live department listing. The first item is the current snapshot; each
    /// later write to a complaint of the department yields a new one.
    pub async fn list_by_department(
        &self,
        session: &Session,
        department: &str,
    ) -> Result<ComplaintFeed, ComplaintError> {
        authorize_triage(session, department)?;

        // Subscribe before the initial read so no write falls in between.
        let changes = self.store.changes();
        let initial = self.store.query_by_department(department).await?;

        let (tx, rx) = mpsc::channel(FEED_BUFFER);
        let task = tokio::spawn(run_department_feed(
            Arc::clone(&self.store),
            department.to_string(),
            initial,
            changes,
            tx,
        ));

        tracing::info!("Live feed opened for department {}", department);
        Ok(ComplaintFeed { rx, task })
    }

    /// Fresh read of one complaint, for its owner or its department's faculty.
    pub async fn get(&self, session: &Session, id: &str) -> Result<Complaint, ComplaintError> {
        let complaint = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| ComplaintError::NotFound(id.to_string()))?;

        if complaint.user_id == session.user.user_id {
            return Ok(complaint);
        }
        if authorize_triage(session, &complaint.department).is_ok() {
            return Ok(complaint.redacted());
        }
        // Indistinguishable from a missing id.
        Err(ComplaintError::NotFound(id.to_string()))
    }

    pub async fn set_status(
        &self,
        session: &Session,
        id: &str,
        status: Status,
    ) -> Result<Complaint, ComplaintError> {
        self.apply_update(session, id, ComplaintUpdate::Status(status))
            .await
    }

    /// Overwrites any earlier reply.
    pub async fn set_reply(
        &self,
        session: &Session,
        id: &str,
        reply: &str,
    ) -> Result<Complaint, ComplaintError> {
        self.apply_update(session, id, ComplaintUpdate::Reply(reply.to_string()))
            .await
    }

    async fn apply_update(
        &self,
        session: &Session,
        id: &str,
        update: ComplaintUpdate,
    ) -> Result<Complaint, ComplaintError> {
        if !session.user.is_faculty() {
            return Err(ComplaintError::AccessDenied);
        }

        let existing = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| ComplaintError::NotFound(id.to_string()))?;
        authorize_triage(session, &existing.department)?;

        let updated = self.store.update(id, update).await.map_err(|e| match e {
            StoreError::NotFound(id) => ComplaintError::NotFound(id),
            other => {
                tracing::error!("Failed to update complaint {}: {}", id, other);
                ComplaintError::Update(other)
            }
        })?;
        Ok(updated.redacted())
    }
}

fn redact_for_department(complaints: Vec<Complaint>, department: &str) -> Vec<Complaint> {
    complaints
        .into_iter()
        .filter(|c| c.department == department)
        .map(|c| c.redacted())
        .collect()
}

fn snapshot(complaints: &HashMap<String, Complaint>) -> Vec<Complaint> {
    let mut list: Vec<Complaint> = complaints.values().cloned().collect();
    sort_newest_first(&mut list);
    list
}

async fn run_department_feed(
    store: Arc<dyn ComplaintStore>,
    department: String,
    initial: Vec<Complaint>,
    mut changes: broadcast::Receiver<ComplaintChange>,
    tx: mpsc::Sender<Vec<Complaint>>,
) {
    let mut complaints: HashMap<String, Complaint> = redact_for_department(initial, &department)
        .into_iter()
        .map(|c| (c.id.clone(), c))
        .collect();

    if tx.send(snapshot(&complaints)).await.is_err() {
        return;
    }

    loop {
        match changes.recv().await {
            Ok(change) => {
                if change.complaint.department != department {
                    continue;
                }
                let complaint = change.complaint.redacted();
                complaints.insert(complaint.id.clone(), complaint);
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(
                    "Feed for {} skipped {} changes, resynchronizing",
                    department,
                    skipped
                );
                match store.query_by_department(&department).await {
                    Ok(fresh) => {
                        complaints = redact_for_department(fresh, &department)
                            .into_iter()
                            .map(|c| (c.id.clone(), c))
                            .collect();
                    }
                    Err(e) => {
                        tracing::error!("Resync for {} failed: {}", department, e);
                        continue;
                    }
                }
            }
            Err(RecvError::Closed) => break,
        }

        if tx.send(snapshot(&complaints)).await.is_err() {
            break;
        }
    }

    tracing::info!("Live feed closed for department {}", department);
}

/// Live, cancellable sequence of department snapshots.
///
/// Dropping the feed cancels it as well.
pub struct ComplaintFeed {
    rx: mpsc::Receiver<Vec<Complaint>>,
    task: JoinHandle<()>,
}

impl ComplaintFeed {
    /// Next snapshot, or `None` once the feed has ended.
    pub async fn next_snapshot(&mut self) -> Option<Vec<Complaint>> {
        self.rx.recv().await
    }

    /// Stop the feed. Snapshots already delivered stay readable, nothing new arrives.
    pub fn unsubscribe(&mut self) {
        self.rx.close();
        self.task.abort();
    }
}

impl Stream for ComplaintFeed {
    type Item = Vec<Complaint>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for ComplaintFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}
