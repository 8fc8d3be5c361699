//! Upload slots
//!
//! A request that needs file bytes is parked here under a fresh slot id
//! until the matching HTTP upload arrives. Slots are popped at most once and
//! expire after a configurable time to live.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use huddle_core::{Message, Snowflake};
use huddle_service::services::PreparedProfile;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::protocol::EventType;

/// How often expired slots are swept
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// The partially built result waiting for its files
#[derive(Debug, Clone)]
pub enum PendingUpload {
    /// A message announced with `attachmentCount > 0`
    MessageSend(Message),
    /// A profile change carrying a new avatar
    UserUpdate(PreparedProfile),
}

#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub session_id: Uuid,
    pub seq: Option<String>,
    pub upload: PendingUpload,
    created: Instant,
}

impl PendingRequest {
    pub fn new(session_id: Uuid, seq: Option<String>, upload: PendingUpload) -> Self {
        Self {
            session_id,
            seq,
            upload,
            created: Instant::now(),
        }
    }

    /// Type of the request that created the slot
    pub fn kind(&self) -> EventType {
        match self.upload {
            PendingUpload::MessageSend(_) => EventType::MessageSendRequest,
            PendingUpload::UserUpdate(_) => EventType::UserUpdateRequest,
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.created.elapsed() >= ttl
    }
}

pub struct PendingUploads {
    slots: Mutex<HashMap<Snowflake, PendingRequest>>,
    ttl: Duration,
}

impl PendingUploads {
    pub fn new(ttl: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn insert(&self, slot: Snowflake, request: PendingRequest) {
        self.slots.lock().insert(slot, request);
    }

    /// Remove and return the slot. Expired slots are discarded.
    pub fn pop(&self, slot: Snowflake) -> Option<PendingRequest> {
        let request = self.slots.lock().remove(&slot)?;
        if request.is_expired(self.ttl) {
            tracing::debug!(slot = %slot, "Upload slot expired");
            return None;
        }
        Some(request)
    }

    /// Drop every expired slot, returning how many were removed.
    pub fn sweep(&self) -> usize {
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|_, request| !request.is_expired(self.ttl));
        before - slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sweep every `period` until `shutdown` fires.
    pub async fn run_sweeper(&self, period: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = self.sweep();
                    if removed > 0 {
                        tracing::debug!(removed, "Expired upload slots swept");
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for PendingUploads {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingUploads")
            .field("slots", &self.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}
