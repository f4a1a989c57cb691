use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use serde_json::{json, Value};
use shared::{
    error::ErrorCode,
    protocol::{ChannelMessage, FileListing, FilesResponse, REQUEST_PRINTER_FILES},
};
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ClientError;

pub const FILE_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Correlates `request_printer_files` emits with their asynchronous
/// `printer_files_response` replies by request id.
#[derive(Clone, Default)]
pub struct FileRequests {
    pending: Arc<Mutex<HashMap<String, oneshot::Sender<FilesResponse>>>>,
}

pub struct PendingListing {
    pub request_id: String,
    rx: oneshot::Receiver<FilesResponse>,
}

impl PendingListing {
    /// The channel event that asks the controller for this listing.
    pub fn request_message(&self) -> ChannelMessage {
        ChannelMessage::new(REQUEST_PRINTER_FILES, json!({ "request_id": self.request_id }))
    }
}

impl FileRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self) -> PendingListing {
        let request_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(request_id.clone(), tx);
        }
        PendingListing { request_id, rx }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().map(|pending| pending.len()).unwrap_or(0)
    }

    /// Routes a `printer_files_response` payload. Returns false when nobody is
    /// waiting for it.
    pub fn handle_response(&self, data: &Value) -> bool {
        let response = match serde_json::from_value::<FilesResponse>(data.clone()) {
            Ok(response) => response,
            Err(err) => {
                debug!(error = %err, "files: malformed listing response");
                return false;
            }
        };
        let sender = self
            .pending
            .lock()
            .ok()
            .and_then(|mut pending| pending.remove(&response.request_id));
        match sender {
            Some(tx) => tx.send(response).is_ok(),
            None => {
                debug!(request_id = %response.request_id, "files: dropping late or unknown response");
                false
            }
        }
    }

    pub async fn wait(
        &self,
        listing: PendingListing,
        timeout: Duration,
    ) -> Result<FileListing, ClientError> {
        let PendingListing { request_id, rx } = listing;
        let outcome = tokio::time::timeout(timeout, rx).await;
        match outcome {
            Ok(Ok(response)) if response.success => Ok(response.listing),
            Ok(Ok(response)) => Err(ClientError::rejected(
                ErrorCode::Rejected,
                response
                    .message
                    .unwrap_or_else(|| "file listing failed".to_string()),
            )),
            Ok(Err(_)) => Err(ClientError::Channel("file listing request dropped".into())),
            Err(_) => {
                self.forget(&request_id);
                warn!(%request_id, "files: listing request timed out");
                Err(ClientError::Timeout("printer file listing"))
            }
        }
    }

    pub(crate) fn forget(&self, request_id: &str) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(request_id);
        }
    }
}

#[cfg(test)]
#[path = "tests/files_tests.rs"]
mod tests;
