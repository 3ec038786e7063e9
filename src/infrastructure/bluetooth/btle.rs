//! btleplug backend (Linux / macOS)

use crate::infrastructure::bluetooth::transport::{
    disconnect_on_error, BleCentral, BleLink, NotificationCallback, TransportError,
};
use async_trait::async_trait;
use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(200);

pub struct BtleCentral {
    adapter: Adapter,
}

impl BtleCentral {
    /// Use the first adapter the platform reports
    pub async fn new() -> Result<Self, TransportError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(TransportError::NoAdapter)?;
        Ok(Self { adapter })
    }

    async fn scan(
        &self,
        service: Uuid,
        timeout: Option<Duration>,
    ) -> Result<Option<Peripheral>, TransportError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            for peripheral in self.adapter.peripherals().await? {
                if advertises(&peripheral, service).await? {
                    return Ok(Some(peripheral));
                }
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Ok(None);
            }
            tokio::time::sleep(SCAN_POLL_INTERVAL).await;
        }
    }
}

async fn advertises(peripheral: &Peripheral, service: Uuid) -> Result<bool, TransportError> {
    let Some(props) = peripheral.properties().await? else {
        return Ok(false);
    };
    Ok(props.services.contains(&service))
}

#[async_trait]
impl BleCentral for BtleCentral {
    type Device = Peripheral;
    type Link = BtleLink;

    async fn discover(
        &mut self,
        service: Uuid,
        timeout: Option<Duration>,
    ) -> Result<Option<Peripheral>, TransportError> {
        info!("Starting BLE scan for service UUID: {}", service);
        self.adapter
            .start_scan(ScanFilter {
                services: vec![service],
            })
            .await?;

        let found = self.scan(service, timeout).await;

        if let Err(e) = self.adapter.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }

        let found = found?;
        match &found {
            Some(peripheral) => info!("Found device: {:?}", peripheral.id()),
            None => warn!("BLE scan timed out for service {}", service),
        }
        Ok(found)
    }

    async fn connect(
        &mut self,
        peripheral: Peripheral,
        service: Uuid,
    ) -> Result<BtleLink, TransportError> {
        peripheral.connect().await?;
        let discovered = peripheral.discover_services().await.map_err(TransportError::from);
        disconnect_on_error(discovered, async {
            peripheral.disconnect().await.map_err(TransportError::from)
        })
        .await?;

        let characteristics: Vec<Characteristic> = peripheral
            .characteristics()
            .into_iter()
            .filter(|c| c.service_uuid == service)
            .collect();
        info!("Found {} characteristics", characteristics.len());

        Ok(BtleLink {
            peripheral,
            characteristics,
            notify_task: None,
        })
    }
}

pub struct BtleLink {
    peripheral: Peripheral,
    characteristics: Vec<Characteristic>,
    notify_task: Option<JoinHandle<()>>,
}

impl BtleLink {
    fn characteristic(&self, uuid: Uuid) -> Result<&Characteristic, TransportError> {
        self.characteristics
            .iter()
            .find(|c| c.uuid == uuid)
            .ok_or(TransportError::CharacteristicNotFound(uuid))
    }
}

#[async_trait]
impl BleLink for BtleLink {
    async fn subscribe(
        &mut self,
        uuid: Uuid,
        callback: NotificationCallback,
    ) -> Result<(), TransportError> {
        let characteristic = self.characteristic(uuid)?.clone();
        let mut notifications = self.peripheral.notifications().await?;
        self.peripheral.subscribe(&characteristic).await?;

        self.notify_task = Some(tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                if notification.uuid == uuid {
                    callback(&notification.value);
                }
            }
            debug!("Notification stream ended");
        }));

        info!("Notifications enabled successfully");
        Ok(())
    }

    async fn write_without_response(
        &mut self,
        uuid: Uuid,
        data: &[u8],
    ) -> Result<(), TransportError> {
        let characteristic = self.characteristic(uuid)?;
        self.peripheral
            .write(characteristic, data, WriteType::WithoutResponse)
            .await?;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        if let Some(task) = self.notify_task.take() {
            task.abort();
        }
        self.peripheral.disconnect().await?;
        info!("Disconnected from device");
        Ok(())
    }
}
