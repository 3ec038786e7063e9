//! Pose Notification Handler
//!
//! Runs on the transport's delivery path, so it only decodes and hands
//! the pose to an unbounded channel drained by the host loop.

use crate::domain::models::{Header, PoseStamped, Time};
use crate::infrastructure::bluetooth::protocol::{self, DecodeError};
use crate::infrastructure::bluetooth::transport::NotificationCallback;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, trace, warn};

#[derive(Debug, Default)]
pub struct NotificationStats {
    forwarded: AtomicU64,
    rejected: AtomicU64,
}

impl NotificationStats {
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

pub struct NotificationHandler {
    pose_sink: mpsc::UnboundedSender<PoseStamped>,
    frame_id: String,
    raw_data_logging: bool,
    stats: Arc<NotificationStats>,
}

impl NotificationHandler {
    pub fn new(pose_sink: mpsc::UnboundedSender<PoseStamped>, frame_id: String) -> Self {
        Self {
            pose_sink,
            frame_id,
            raw_data_logging: false,
            stats: Arc::new(NotificationStats::default()),
        }
    }

    pub fn with_raw_data_logging(mut self, enabled: bool) -> Self {
        self.raw_data_logging = enabled;
        self
    }

    pub fn stats(&self) -> Arc<NotificationStats> {
        self.stats.clone()
    }

    /// Decode one payload and forward it. Errors are logged, never propagated.
    pub fn handle(&self, payload: &[u8]) {
        if self.raw_data_logging {
            trace!("Raw packet: {:02X?}", payload);
        }

        match self.convert(payload) {
            Ok(msg) => {
                if self.pose_sink.send(msg).is_err() {
                    warn!("Pose sink closed, dropping pose");
                    return;
                }
                self.stats.forwarded.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                error!("Failed to decode pose notification: {}", e);
            }
        }
    }

    fn convert(&self, payload: &[u8]) -> Result<PoseStamped, DecodeError> {
        let pose = protocol::decode_pose(payload)?;
        Ok(PoseStamped {
            header: Header {
                stamp: Time::now(),
                frame_id: self.frame_id.clone(),
            },
            pose: protocol::pose_to_host(&pose),
        })
    }

    pub fn into_callback(self) -> NotificationCallback {
        Box::new(move |payload| self.handle(payload))
    }
}
