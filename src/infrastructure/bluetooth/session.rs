//! BLE Session Loop
//!
//! Owns the single GATT connection for the lifetime of the bridge:
//!
//! ```text
//! Discovering ──▶ Connecting ──▶ Subscribing ──▶ Active
//!      │               │               │            │
//!      └───────────────┴───────┬───────┴────────────┘
//!                              ▼
//!                          Terminated
//! ```
//!
//! Discovery, connection and subscription failures are fatal. Write
//! failures in `Active` are logged and the next command is written.
//! Every path into `Terminated` disconnects an established link.

use crate::domain::command::CommandReceiver;
use crate::domain::models::SessionState;
use crate::error::BridgeError;
use crate::infrastructure::bluetooth::notification::NotificationHandler;
use crate::infrastructure::bluetooth::protocol;
use crate::infrastructure::bluetooth::transport::{BleCentral, BleLink};
use crate::infrastructure::shutdown::ShutdownSignal;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub service_uuid: Uuid,
    pub char_uuid: Uuid,
    pub discovery_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            service_uuid: protocol::SERVICE_UUID,
            char_uuid: protocol::CHAR_UUID,
            discovery_timeout: Some(Duration::from_secs(10)),
        }
    }
}

pub struct BleSession<C: BleCentral> {
    central: C,
    config: SessionConfig,
    state_tx: watch::Sender<SessionState>,
}

impl<C: BleCentral> BleSession<C> {
    pub fn new(central: C, config: SessionConfig) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Discovering);
        Self {
            central,
            config,
            state_tx,
        }
    }

    /// Observe state transitions
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: SessionState) {
        self.state_tx.send_replace(state);
    }

    /// Run the session until shutdown, queue closure or a fatal error
    pub async fn run(
        mut self,
        mut commands: CommandReceiver,
        handler: NotificationHandler,
        shutdown: ShutdownSignal,
    ) -> Result<(), BridgeError> {
        let service = self.config.service_uuid;
        let characteristic = self.config.char_uuid;
        let stats = handler.stats();

        self.set_state(SessionState::Discovering);
        let discovered = tokio::select! {
            result = self.central.discover(service, self.config.discovery_timeout) => result,
            _ = shutdown.wait() => {
                self.set_state(SessionState::Terminated);
                return Ok(());
            }
        };
        let device = match discovered {
            Ok(Some(device)) => device,
            Ok(None) => {
                error!("Failed to find device advertising {}", service);
                self.set_state(SessionState::Terminated);
                return Err(BridgeError::DeviceNotFound(service));
            }
            Err(e) => {
                error!("BLE scan failed: {}", e);
                self.set_state(SessionState::Terminated);
                return Err(BridgeError::Discovery(e));
            }
        };

        self.set_state(SessionState::Connecting);
        info!("Connecting to {:?}", device);
        // Not raced against shutdown: a half-finished connect would leave
        // an OS-level connection with no link to release it
        let mut link = match self.central.connect(device, service).await {
            Ok(link) => link,
            Err(e) => {
                error!("Connection failed: {}", e);
                self.set_state(SessionState::Terminated);
                return Err(BridgeError::Connect(e));
            }
        };
        info!("Connected to device");

        let result = if shutdown.is_triggered() {
            info!("Shutdown requested while connecting");
            Ok(())
        } else {
            self.set_state(SessionState::Subscribing);
            let subscribed = tokio::select! {
                result = link.subscribe(characteristic, handler.into_callback()) => result,
                _ = shutdown.wait() => Ok(()),
            };
            match subscribed {
                Ok(()) if shutdown.is_triggered() => Ok(()),
                Ok(()) => {
                    self.set_state(SessionState::Active);
                    Self::write_commands(&mut link, characteristic, &mut commands, &shutdown)
                        .await;
                    Ok(())
                }
                Err(e) => {
                    error!("Failed to enable notifications: {}", e);
                    Err(BridgeError::Subscribe(e))
                }
            }
        };

        if let Err(e) = link.disconnect().await {
            warn!("Disconnect failed: {}", e);
        }
        info!(
            "Session ended: {} poses forwarded, {} notifications rejected",
            stats.forwarded(),
            stats.rejected()
        );
        self.set_state(SessionState::Terminated);
        result
    }

    async fn write_commands(
        link: &mut C::Link,
        characteristic: Uuid,
        commands: &mut CommandReceiver,
        shutdown: &ShutdownSignal,
    ) {
        if !commands.is_empty() {
            debug!("{} commands queued before the link was ready", commands.len());
        }
        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    if !commands.is_empty() {
                        info!("Dropping {} queued commands", commands.len());
                    }
                    info!("Shutdown requested, leaving write loop");
                    return;
                }
                command = commands.pop() => {
                    let Some(command) = command else {
                        info!("Command queue closed, leaving write loop");
                        return;
                    };
                    let frame = protocol::encode_command(&command);
                    if let Err(e) = link.write_without_response(characteristic, &frame).await {
                        error!("Command write failed: {}", e);
                    }
                }
            }
        }
    }
}
