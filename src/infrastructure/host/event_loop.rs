use crate::domain::command::{CommandRegister, CommandSampler};
use crate::domain::models::PoseStamped;
use crate::infrastructure::host::HostMiddleware;
use crate::infrastructure::shutdown::ShutdownSignal;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Drives host-side dispatch alongside the BLE session.
///
/// Each wakeup handles exactly one of: a sampler tick, an inbound command
/// or a pose waiting to be published, then yields back to the runtime.
pub struct HostEventLoop<H: HostMiddleware> {
    host: H,
    register: CommandRegister,
    sampler: CommandSampler,
    poses: mpsc::UnboundedReceiver<PoseStamped>,
    period: Duration,
}

impl<H: HostMiddleware> HostEventLoop<H> {
    pub fn new(
        host: H,
        register: CommandRegister,
        sampler: CommandSampler,
        poses: mpsc::UnboundedReceiver<PoseStamped>,
        period: Duration,
    ) -> Self {
        Self {
            host,
            register,
            sampler,
            poses,
            period,
        }
    }

    pub async fn run(mut self, shutdown: ShutdownSignal) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut subscribed = true;

        info!("Host event loop started, sampling every {:?}", self.period);

        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = ticker.tick() => self.sampler.sample_and_enqueue(),
                twist = self.host.next_command(), if subscribed => match twist {
                    Some(twist) => {
                        debug!("Received command: {:?}", twist);
                        self.register.set(twist.into());
                    }
                    None => {
                        warn!("Command subscription closed, holding last command");
                        subscribed = false;
                    }
                },
                Some(pose) = self.poses.recv() => {
                    if let Err(e) = self.host.publish_pose(&pose) {
                        error!("Failed to publish pose: {}", e);
                    }
                }
            }
        }

        info!("Host event loop stopped");
    }
}
