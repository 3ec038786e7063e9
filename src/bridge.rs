//! Bridge supervisor
//!
//! Wires the register, queue and pose channel between the two loops and
//! runs them side by side. Whichever loop exits first stops the other.

use crate::domain::command::{command_queue, CommandReceiver, CommandRegister, CommandSampler};
use crate::domain::models::SessionState;
use crate::domain::settings::BridgeConfig;
use crate::error::BridgeError;
use crate::infrastructure::bluetooth::notification::NotificationHandler;
use crate::infrastructure::bluetooth::transport::BleCentral;
use crate::infrastructure::bluetooth::{BleSession, SessionConfig};
use crate::infrastructure::host::{HostEventLoop, HostMiddleware};
use crate::infrastructure::shutdown::ShutdownSignal;
use tokio::sync::{mpsc, watch};
use tracing::info;

pub struct Bridge<C: BleCentral, H: HostMiddleware> {
    session: BleSession<C>,
    host_loop: HostEventLoop<H>,
    commands: CommandReceiver,
    handler: NotificationHandler,
}

impl<C: BleCentral, H: HostMiddleware> Bridge<C, H> {
    pub fn new(central: C, host: H, config: &BridgeConfig) -> Self {
        let register = CommandRegister::new();
        let (queue, commands) = command_queue();
        let (pose_tx, pose_rx) = mpsc::unbounded_channel();

        let handler = NotificationHandler::new(pose_tx, config.frame_id.clone())
            .with_raw_data_logging(config.raw_data_logging);

        let session = BleSession::new(
            central,
            SessionConfig {
                service_uuid: config.service_uuid,
                char_uuid: config.char_uuid,
                discovery_timeout: config.discovery_timeout,
            },
        );

        let host_loop = HostEventLoop::new(
            host,
            register.clone(),
            CommandSampler::new(register, queue),
            pose_rx,
            config.sample_period,
        );

        Self {
            session,
            host_loop,
            commands,
            handler,
        }
    }

    pub fn session_state(&self) -> watch::Receiver<SessionState> {
        self.session.state()
    }

    /// Run both loops until shutdown or a fatal session error
    pub async fn run(self, shutdown: ShutdownSignal) -> Result<(), BridgeError> {
        let Bridge {
            session,
            host_loop,
            commands,
            handler,
        } = self;

        let ble = async {
            let result = session.run(commands, handler, shutdown.clone()).await;
            shutdown.trigger();
            result
        };
        let host = async {
            host_loop.run(shutdown.clone()).await;
            shutdown.trigger();
        };

        let (result, ()) = tokio::join!(ble, host);
        info!("Bridge stopped");
        result
    }
}
