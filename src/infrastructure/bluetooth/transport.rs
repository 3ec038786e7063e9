//! BLE Transport Traits
//!
//! The session only needs a handful of central-role operations. Each
//! platform backend implements them on top of its native stack.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Callback invoked for every notification on a subscribed characteristic
pub type NotificationCallback = Box<dyn Fn(&[u8]) + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("No Bluetooth adapter found")]
    NoAdapter,

    #[error("Characteristic {0} not found")]
    CharacteristicNotFound(Uuid),

    #[cfg(any(windows, test))]
    #[error("GATT operation failed: {0}")]
    Gatt(String),

    #[cfg(not(windows))]
    #[error(transparent)]
    Btleplug(#[from] btleplug::Error),

    #[cfg(windows)]
    #[error(transparent)]
    Windows(#[from] windows::core::Error),
}

/// Central-role entry point: finds and connects to peripherals
#[async_trait]
pub trait BleCentral: Send {
    type Device: Send + std::fmt::Debug;
    type Link: BleLink;

    /// Scan for a peripheral advertising `service`.
    ///
    /// Returns `Ok(None)` when the scan ends without a match, which only
    /// happens when a `timeout` is given.
    async fn discover(
        &mut self,
        service: Uuid,
        timeout: Option<Duration>,
    ) -> Result<Option<Self::Device>, TransportError>;

    /// Open a GATT connection and resolve the characteristics of `service`
    async fn connect(
        &mut self,
        device: Self::Device,
        service: Uuid,
    ) -> Result<Self::Link, TransportError>;
}

/// An established GATT connection
#[async_trait]
pub trait BleLink: Send {
    async fn subscribe(
        &mut self,
        characteristic: Uuid,
        callback: NotificationCallback,
    ) -> Result<(), TransportError>;

    /// Write without waiting for a peripheral acknowledgement
    async fn write_without_response(
        &mut self,
        characteristic: Uuid,
        data: &[u8],
    ) -> Result<(), TransportError>;

    async fn disconnect(&mut self) -> Result<(), TransportError>;
}

/// Finish connection setup. When `setup` failed, `disconnect` runs before
/// the error is returned so the peripheral is not left connected.
pub async fn disconnect_on_error<T, F>(
    setup: Result<T, TransportError>,
    disconnect: F,
) -> Result<T, TransportError>
where
    F: Future<Output = Result<(), TransportError>>,
{
    if setup.is_err() {
        if let Err(e) = disconnect.await {
            warn!("Disconnect after failed setup failed: {}", e);
        }
    }
    setup
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_failed_setup_disconnects() {
        let disconnected = AtomicBool::new(false);
        let result: Result<(), _> = disconnect_on_error(
            Err(TransportError::Gatt("service discovery failed".to_string())),
            async {
                disconnected.store(true, Ordering::SeqCst);
                Ok(())
            },
        )
        .await;

        assert!(matches!(result, Err(TransportError::Gatt(msg)) if msg == "service discovery failed"));
        assert!(disconnected.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_successful_setup_keeps_connection() {
        let disconnected = AtomicBool::new(false);
        let result = disconnect_on_error(Ok(7), async {
            disconnected.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert!(!disconnected.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_disconnect_error_does_not_mask_setup_error() {
        let result: Result<(), _> = disconnect_on_error(
            Err(TransportError::CharacteristicNotFound(Uuid::nil())),
            async { Err(TransportError::NoAdapter) },
        )
        .await;

        assert!(matches!(result, Err(TransportError::CharacteristicNotFound(_))));
    }
}
