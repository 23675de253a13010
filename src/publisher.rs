//! Change fanout to live chart viewers.
//!
//! Subscribers register interest per patient and receive minimal change
//! notifications over bounded channels. Delivery is at-least-once and
//! fire-and-forget from the writer's side: a slow or disconnected viewer
//! never blocks or fails a write. A viewer that was offline re-fetches
//! full state on reconnect instead of replaying missed events.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::enums::{ChangeKind, ChangedEntity};

/// Per-subscriber channel capacity. A viewer that falls this far behind
/// loses notifications and is expected to re-fetch.
const CHANNEL_CAPACITY: usize = 64;

/// Minimal change notification. Subscribers re-fetch authoritative state
/// rather than trust any payload, so there is nothing else to carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeNotification {
    pub patient_id: Uuid,
    pub entity: ChangedEntity,
    pub entity_id: Uuid,
    pub change_kind: ChangeKind,
}

/// Fanout registry keyed by patient id.
///
/// Notifications for the same record arrive in write order because every
/// publish happens after its write, under the registry lock. Ordering
/// across different records is not guaranteed.
#[derive(Default)]
pub struct ChangePublisher {
    subscribers: Mutex<HashMap<Uuid, Vec<mpsc::Sender<ChangeNotification>>>>,
}

impl ChangePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live viewer of one patient's chart.
    pub fn subscribe(&self, patient_id: Uuid) -> mpsc::Receiver<ChangeNotification> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subs.entry(patient_id).or_default().push(tx);
        rx
    }

    /// Deliver a notification to every subscriber of the affected patient.
    /// Closed channels are pruned; full channels drop the message.
    pub fn publish(&self, note: ChangeNotification) {
        let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        let Some(channels) = subs.get_mut(&note.patient_id) else {
            return;
        };

        channels.retain(|tx| match tx.try_send(note.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(patient_id = %note.patient_id, "Subscriber channel full, dropping notification");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });

        if channels.is_empty() {
            subs.remove(&note.patient_id);
        }
    }

    pub fn subscriber_count(&self, patient_id: &Uuid) -> usize {
        let subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subs.get(patient_id).map(Vec::len).unwrap_or(0)
    }
}
