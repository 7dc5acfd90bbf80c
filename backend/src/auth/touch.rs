//! Best-effort `last_interaction` refresh
//!
//! Requests hand touches to a detached worker and never wait for them. The
//! worker drains the queue and logs every store failure. Touches still
//! queued when the process dies are lost; the session then looks slightly
//! older than it is, which only brings inactivity reaping forward.

use crate::repositories::SessionStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

struct TouchRequest {
    session_id: String,
    at: DateTime<Utc>,
}

/// Handle to the touch worker; cloning shares the queue
#[derive(Clone)]
pub struct SessionToucher {
    queue: mpsc::Sender<TouchRequest>,
}

impl SessionToucher {
    /// Spawn the worker on the current tokio runtime
    pub fn spawn(store: Arc<dyn SessionStore>, capacity: usize) -> Self {
        let (queue, mut requests) = mpsc::channel::<TouchRequest>(capacity.max(1));

        tokio::spawn(async move {
            while let Some(request) = requests.recv().await {
                if let Err(e) = store.touch(&request.session_id, request.at).await {
                    warn!(error = %e, "Failed to refresh session interaction time");
                }
            }
            debug!("Session touch worker stopped");
        });

        Self { queue }
    }

    /// Queue a touch without waiting
    pub fn dispatch(&self, session_id: &str, at: DateTime<Utc>) {
        let request = TouchRequest {
            session_id: session_id.to_string(),
            at,
        };

        match self.queue.try_send(request) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => debug!("Touch queue full, dropping session touch"),
            Err(TrySendError::Closed(_)) => warn!("Session touch worker is not running"),
        }
    }
}
