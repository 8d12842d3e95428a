//! Isolated cluster worker.
//!
//! Every call spawns its own blocking task. The pixel list crosses into the
//! task as one message and the boxes come back as one message; the task
//! ends after replying. A worker that dies without replying fails the call,
//! there is no partial result.

use super::cluster_pixels;
use crate::engine::DiffPixel;
use crate::geometry::BoundingBox;
use crate::result::{VisregError, VisregResult};
use tokio::sync::oneshot;
use tracing::debug;

/// Clustering function run inside the worker
pub type ClusterFn = fn(&[DiffPixel], u32) -> Vec<BoundingBox>;

struct ClusterJob {
    pixels: Vec<DiffPixel>,
    proximity: u32,
}

/// Runs [`cluster_pixels`] off the caller's task
#[derive(Debug, Clone, Copy)]
pub struct ClusterWorker {
    cluster: ClusterFn,
}

impl Default for ClusterWorker {
    fn default() -> Self {
        Self {
            cluster: cluster_pixels,
        }
    }
}

impl ClusterWorker {
    /// Worker running the default clustering
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Worker running a custom clustering function
    #[must_use]
    pub const fn with_cluster_fn(cluster: ClusterFn) -> Self {
        Self { cluster }
    }

    /// Cluster `pixels` in a fresh worker and await its single result
    pub async fn run(
        &self,
        pixels: Vec<DiffPixel>,
        proximity: u32,
    ) -> VisregResult<Vec<BoundingBox>> {
        let cluster = self.cluster;
        let pixel_count = pixels.len();
        let (input_tx, input_rx) = oneshot::channel::<ClusterJob>();
        let (output_tx, output_rx) = oneshot::channel::<Vec<BoundingBox>>();

        let handle = tokio::task::spawn_blocking(move || {
            let Ok(job) = input_rx.blocking_recv() else {
                return;
            };
            let boxes = cluster(&job.pixels, job.proximity);
            let _ = output_tx.send(boxes);
        });

        input_tx
            .send(ClusterJob { pixels, proximity })
            .map_err(|_| VisregError::cluster_worker("worker exited before receiving input"))?;

        match output_rx.await {
            Ok(boxes) => {
                debug!(
                    pixels = pixel_count,
                    boxes = boxes.len(),
                    proximity,
                    "diff pixels clustered"
                );
                Ok(boxes)
            }
            Err(_) => {
                let reason = match handle.await {
                    Err(e) if e.is_panic() => "worker panicked".to_string(),
                    Err(e) => format!("worker aborted: {e}"),
                    Ok(()) => "worker exited without a result".to_string(),
                };
                Err(VisregError::cluster_worker(reason))
            }
        }
    }
}
