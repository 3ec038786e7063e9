//! Host Middleware
//!
//! The robot-side pub/sub system the bridge talks to. It delivers
//! velocity commands and accepts stamped poses.
//!
//! - [`ipc`] - local-socket JSON-lines transport
//! - [`event_loop`] - cooperative driver for sampler, inbound commands and pose flushing

use crate::domain::models::{PoseStamped, Twist};
use async_trait::async_trait;
use thiserror::Error;

pub mod event_loop;
pub mod ipc;
#[cfg(test)]
pub mod mock;

pub use event_loop::HostEventLoop;
pub use ipc::{IpcHost, IpcHostConfig};

#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid host message: {0}")]
    Message(#[from] serde_json::Error),
}

#[async_trait]
pub trait HostMiddleware: Send {
    /// Next inbound velocity command. `None` once no more can arrive.
    async fn next_command(&mut self) -> Option<Twist>;

    /// Queue a pose for publication without waiting on subscribers
    fn publish_pose(&mut self, pose: &PoseStamped) -> Result<(), HostError>;
}
