//! Pull transport: on-demand "next message batch" requests.
//!
//! The typing surface does not rely on push delivery for stream content; it
//! asks the server to advance and hands back the full snapshot the server
//! returns. The first request fires immediately, every later one after the
//! configured interval.

use std::time::Duration;

use futures_util::future::BoxFuture;
use tracing::warn;

use crate::api::ApiClient;
use crate::transport::{SnapshotSource, SourceEvent};

/// Pull-based snapshot provider for one room.
pub struct PollingRequester {
    api: ApiClient,
    room_id: u64,
    interval: Duration,
    first: bool,
}

impl PollingRequester {
    pub fn new(api: ApiClient, room_id: u64, interval: Duration) -> Self {
        PollingRequester {
            api,
            room_id,
            interval,
            first: true,
        }
    }

    /// Adjust the request cadence. The controller slows the cadence when the
    /// server answers from cache.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl SnapshotSource for PollingRequester {
    fn next_event(&mut self) -> BoxFuture<'_, Option<SourceEvent>> {
        Box::pin(async move {
            if self.first {
                self.first = false;
            } else {
                tokio::time::sleep(self.interval).await;
            }
            match self.api.next_message_batch(self.room_id).await {
                Ok(snapshot) => Some(SourceEvent::Snapshot(snapshot)),
                Err(e) => {
                    // A failed request is an empty snapshot: the controller
                    // treats it as a no-op and the next tick retries.
                    warn!(room_id = self.room_id, error = %e, "next-batch request failed");
                    Some(SourceEvent::Snapshot(Vec::new()))
                }
            }
        })
    }
}
