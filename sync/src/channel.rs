//! In-process transport between edge outboxes and the cloud merge.
//!
//! [`SyncChannel::new`] returns a [`SyncClient`] for the edge side and a
//! [`SyncHandle`] for the cloud side. [`serve_channel`] drains the handle,
//! processing each batch on its own task so batches for different
//! elections merge in parallel.

use crate::{CloudSync, SyncError, SyncResult, VoteSyncBatch};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Channel buffer size for batch submissions.
const CHANNEL_BUFFER: usize = 64;

/// One batch submission awaiting its result.
#[derive(Debug)]
pub struct SyncRequest {
    pub batch: VoteSyncBatch,
    pub reply: oneshot::Sender<Result<SyncResult, SyncError>>,
}

/// Edge-side sender. Cheap to clone; one per edge node is typical.
#[derive(Clone, Debug)]
pub struct SyncClient {
    request_tx: mpsc::Sender<SyncRequest>,
}

/// Cloud-side receiver of batch submissions.
#[derive(Debug)]
pub struct SyncHandle {
    pub request_rx: mpsc::Receiver<SyncRequest>,
}

pub struct SyncChannel;

impl SyncChannel {
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (SyncClient, SyncHandle) {
        let (request_tx, request_rx) = mpsc::channel(CHANNEL_BUFFER);
        (SyncClient { request_tx }, SyncHandle { request_rx })
    }
}

impl SyncClient {
    /// Submit a batch and wait for the cloud's answer.
    pub async fn submit(&self, batch: VoteSyncBatch) -> Result<SyncResult, SyncError> {
        let (reply, response) = oneshot::channel();
        self.request_tx
            .send(SyncRequest { batch, reply })
            .await
            .map_err(|_| SyncError::ChannelClosed)?;
        response.await.map_err(|_| SyncError::ChannelClosed)?
    }
}

/// Serve batch submissions from `handle` until `shutdown` fires or every
/// client is dropped.
pub fn serve_channel(
    mut handle: SyncHandle,
    cloud: Arc<CloudSync>,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                request = handle.request_rx.recv() => {
                    let Some(SyncRequest { batch, reply }) = request else {
                        debug!("all sync clients dropped");
                        break;
                    };
                    let cloud = Arc::clone(&cloud);
                    tokio::spawn(async move {
                        let result = cloud.process_batch(batch).await;
                        // The submitter may have given up waiting.
                        let _ = reply.send(result);
                    });
                }
                _ = shutdown.recv() => {
                    info!("sync channel server stopping");
                    break;
                }
            }
        }
    })
}
