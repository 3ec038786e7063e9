//! In-memory host middleware for loop tests

use crate::domain::models::{PoseStamped, Twist};
use crate::infrastructure::host::{HostError, HostMiddleware};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub struct MockHost {
    inbound: mpsc::UnboundedReceiver<Twist>,
    published: Arc<Mutex<Vec<PoseStamped>>>,
}

/// Handles the test keeps: a command publisher and the list of published poses
pub struct MockHostHandle {
    pub commands: mpsc::UnboundedSender<Twist>,
    pub published: Arc<Mutex<Vec<PoseStamped>>>,
}

impl MockHost {
    pub fn new() -> (Self, MockHostHandle) {
        let (commands, inbound) = mpsc::unbounded_channel();
        let published = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                inbound,
                published: published.clone(),
            },
            MockHostHandle {
                commands,
                published,
            },
        )
    }
}

impl MockHostHandle {
    pub fn published(&self) -> Vec<PoseStamped> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl HostMiddleware for MockHost {
    async fn next_command(&mut self) -> Option<Twist> {
        self.inbound.recv().await
    }

    fn publish_pose(&mut self, pose: &PoseStamped) -> Result<(), HostError> {
        self.published.lock().unwrap().push(pose.clone());
        Ok(())
    }
}
