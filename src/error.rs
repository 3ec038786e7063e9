use crate::infrastructure::bluetooth::transport::TransportError;
use thiserror::Error;
use uuid::Uuid;

/// Errors that end the bridge. Everything else is logged where it happens.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("No device advertising service {0} was found")]
    DeviceNotFound(Uuid),

    #[error("Discovery failed: {0}")]
    Discovery(#[source] TransportError),

    #[error("Connection failed: {0}")]
    Connect(#[source] TransportError),

    #[error("Notification subscription failed: {0}")]
    Subscribe(#[source] TransportError),
}
