//! GROVE Events - Notification Payloads and Emitter Boundary
//!
//! Turns a committed [`PostMutation`] into the payloads the external event
//! bus receives and hands them to a [`NotificationEmitter`]. Delivery,
//! retries and transport belong to the emitter implementation.
//!
//! # Payloads
//!
//! One [`Notification`] per path the post is filed under, addressed by
//! `<kind>:<path>$<id>`:
//!
//! | mutation             | event    | extra fields         |
//! |----------------------|----------|----------------------|
//! | created              | `create` |                      |
//! | updated              | `update` | `changed_attributes` |
//! | restored             | `update` | `changed_attributes` |
//! | soft deleted         | `delete` | `soft_deleted: true` |
//! | edited while deleted | `delete` | `soft_deleted: true` |
//! | destroyed            | `delete` |                      |

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use grove_core::{
    EventKind, GroveError, GroveResult, MutationKind, Notification, PostMutation, StorageError,
};

// ============================================================================
// PAYLOAD CONSTRUCTION
// ============================================================================

/// Build every notification for one committed mutation.
pub fn notifications_for(mutation: &PostMutation) -> Vec<Notification> {
    let post = &mutation.post;
    let (event, changed_attributes, soft_deleted) = match mutation.kind {
        MutationKind::Created => (EventKind::Create, None, None),
        MutationKind::Updated | MutationKind::Restored => {
            (EventKind::Update, Some(mutation.changes.clone()), None)
        }
        MutationKind::SoftDeleted => (EventKind::Delete, None, Some(true)),
        MutationKind::Destroyed => (EventKind::Delete, None, None),
    };
    let attributes = post.attributes_for_export();

    post.paths
        .iter()
        .map(|path| Notification {
            uid: post.uid_for_path(path),
            event,
            attributes: attributes.clone(),
            changed_attributes: changed_attributes.clone(),
            soft_deleted,
        })
        .collect()
}

// ============================================================================
// EMITTER TRAIT
// ============================================================================

/// Boundary to the external event bus.
#[async_trait]
pub trait NotificationEmitter: Send + Sync {
    /// Hand one payload to the transport.
    async fn emit(&self, notification: &Notification) -> GroveResult<()>;
}

/// Delivery summary for one mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Emit every payload for `mutation`.
///
/// Failures are logged and counted, never returned: the mutation has already
/// committed and redelivery is the transport's concern.
pub async fn publish<E>(emitter: &E, mutation: &PostMutation) -> PublishReport
where
    E: NotificationEmitter + ?Sized,
{
    let mut report = PublishReport::default();
    for notification in notifications_for(mutation) {
        match emitter.emit(&notification).await {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                tracing::warn!(
                    uid = %notification.uid,
                    event = ?notification.event,
                    error = %e,
                    "notification emission failed"
                );
                report.failed += 1;
            }
        }
    }
    report
}

// ============================================================================
// EMITTERS
// ============================================================================

/// Collects notifications in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryEmitter {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl InMemoryEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything emitted so far, in order.
    pub fn notifications(&self) -> Vec<Notification> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    /// Drain everything emitted so far.
    pub fn take(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|mut sent| std::mem::take(&mut *sent))
            .unwrap_or_default()
    }
}

#[async_trait]
impl NotificationEmitter for InMemoryEmitter {
    async fn emit(&self, notification: &Notification) -> GroveResult<()> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| GroveError::Storage(StorageError::LockPoisoned))?;
        sent.push(notification.clone());
        Ok(())
    }
}

/// Writes each notification to the tracing pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEmitter;

#[async_trait]
impl NotificationEmitter for TracingEmitter {
    async fn emit(&self, notification: &Notification) -> GroveResult<()> {
        let payload = serde_json::to_string(notification).map_err(|e| {
            GroveError::Storage(StorageError::Serialization {
                entity_type: grove_core::EntityType::Post,
                reason: e.to_string(),
            })
        })?;
        tracing::info!(
            uid = %notification.uid,
            event = ?notification.event,
            payload = %payload,
            "post notification"
        );
        Ok(())
    }
}
