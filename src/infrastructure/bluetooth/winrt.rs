//! WinRT backend (Windows)
//!
//! Discovery uses an advertisement watcher, GATT access goes through
//! `BluetoothLEDevice`.

use crate::infrastructure::bluetooth::transport::{
    disconnect_on_error, BleCentral, BleLink, NotificationCallback, TransportError,
};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use windows::core::GUID;
use windows::Devices::Bluetooth::Advertisement::{
    BluetoothLEAdvertisementReceivedEventArgs, BluetoothLEAdvertisementWatcher,
    BluetoothLEScanningMode,
};
use windows::Devices::Bluetooth::BluetoothLEDevice;
use windows::Devices::Bluetooth::GenericAttributeProfile::{
    GattCharacteristic, GattClientCharacteristicConfigurationDescriptorValue,
    GattCommunicationStatus, GattValueChangedEventArgs, GattWriteOption,
};
use windows::Foundation::TypedEventHandler;
use windows::Storage::Streams::{DataReader, DataWriter};

fn to_guid(uuid: Uuid) -> GUID {
    GUID::from_u128(uuid.as_u128())
}

#[derive(Default)]
pub struct WinrtCentral;

impl WinrtCentral {
    pub async fn new() -> Result<Self, TransportError> {
        Ok(Self)
    }
}

/// Stops the watcher however discovery ends
struct WatcherGuard(BluetoothLEAdvertisementWatcher);

impl Drop for WatcherGuard {
    fn drop(&mut self) {
        info!("Stopping BLE scan...");
        let _ = self.0.Stop();
    }
}

#[async_trait]
impl BleCentral for WinrtCentral {
    type Device = u64;
    type Link = WinrtLink;

    async fn discover(
        &mut self,
        service: Uuid,
        timeout: Option<Duration>,
    ) -> Result<Option<u64>, TransportError> {
        info!("Starting BLE scan for service UUID: {}", service);

        let watcher = BluetoothLEAdvertisementWatcher::new()?;
        watcher.SetScanningMode(BluetoothLEScanningMode::Active)?;

        let (found_tx, mut found_rx) = mpsc::unbounded_channel();
        let target_uuid = to_guid(service);

        let handler = TypedEventHandler::new(
            move |_: windows::core::Ref<BluetoothLEAdvertisementWatcher>,
                  args: windows::core::Ref<BluetoothLEAdvertisementReceivedEventArgs>| {
                if let Some(args) = args.as_ref() {
                    let service_uuids = args.Advertisement()?.ServiceUuids()?;
                    for i in 0..service_uuids.Size()? {
                        if service_uuids.GetAt(i)? == target_uuid {
                            let _ = found_tx.send(args.BluetoothAddress()?);
                            break;
                        }
                    }
                }
                Ok(())
            },
        );

        watcher.Received(&handler)?;
        watcher.Start()?;
        let _guard = WatcherGuard(watcher);

        let address = match timeout {
            Some(timeout) => tokio::time::timeout(timeout, found_rx.recv())
                .await
                .ok()
                .flatten(),
            None => found_rx.recv().await,
        };

        match address {
            Some(address) => info!("Found device: {:#X}", address),
            None => warn!("BLE scan timed out for service {}", service),
        }
        Ok(address)
    }

    async fn connect(&mut self, address: u64, service: Uuid) -> Result<WinrtLink, TransportError> {
        info!("Connecting to Bluetooth device: {:#X}", address);
        let device = BluetoothLEDevice::FromBluetoothAddressAsync(address)?.await?;
        info!("Device connected: {:?}", device.Name()?);

        let characteristics = disconnect_on_error(
            service_characteristics(&device, service).await,
            async { device.Close().map_err(TransportError::from) },
        )
        .await?;

        Ok(WinrtLink {
            device,
            characteristics,
        })
    }
}

/// Resolve the characteristics of `service` on a connected device
async fn service_characteristics(
    device: &BluetoothLEDevice,
    service: Uuid,
) -> Result<Vec<GattCharacteristic>, TransportError> {
    let services_result = device
        .GetGattServicesForUuidAsync(to_guid(service))?
        .await?;
    if services_result.Status()? != GattCommunicationStatus::Success {
        return Err(TransportError::Gatt(format!(
            "Failed to get GATT services: {:?}",
            services_result.Status()?
        )));
    }

    let services = services_result.Services()?;
    if services.Size()? == 0 {
        return Err(TransportError::Gatt("Rover service not found".to_string()));
    }
    let gatt_service = services.GetAt(0)?;

    let access_status = gatt_service.RequestAccessAsync()?.await?;
    debug!("Service access status: {:?}", access_status);

    let chars_result = gatt_service.GetCharacteristicsAsync()?.await?;
    if chars_result.Status()? != GattCommunicationStatus::Success {
        return Err(TransportError::Gatt("Failed to get characteristics".to_string()));
    }

    let list = chars_result.Characteristics()?;
    let mut characteristics = Vec::new();
    for i in 0..list.Size()? {
        characteristics.push(list.GetAt(i)?);
    }
    info!("Found {} characteristics", characteristics.len());
    Ok(characteristics)
}

pub struct WinrtLink {
    device: BluetoothLEDevice,
    characteristics: Vec<GattCharacteristic>,
}

impl WinrtLink {
    fn characteristic(&self, uuid: Uuid) -> Result<&GattCharacteristic, TransportError> {
        let guid = to_guid(uuid);
        self.characteristics
            .iter()
            .find(|c| c.Uuid().map(|u| u == guid).unwrap_or(false))
            .ok_or(TransportError::CharacteristicNotFound(uuid))
    }
}

#[async_trait]
impl BleLink for WinrtLink {
    async fn subscribe(
        &mut self,
        uuid: Uuid,
        callback: NotificationCallback,
    ) -> Result<(), TransportError> {
        let characteristic = self.characteristic(uuid)?.clone();

        let handler = TypedEventHandler::new(
            move |_: windows::core::Ref<GattCharacteristic>,
                  args: windows::core::Ref<GattValueChangedEventArgs>| {
                if let Some(args) = args.as_ref() {
                    let reader = DataReader::FromBuffer(&args.CharacteristicValue()?)?;
                    let mut bytes = vec![0u8; reader.UnconsumedBufferLength()? as usize];
                    reader.ReadBytes(&mut bytes)?;
                    callback(&bytes);
                }
                Ok(())
            },
        );
        characteristic.ValueChanged(&handler)?;

        let status = characteristic
            .WriteClientCharacteristicConfigurationDescriptorAsync(
                GattClientCharacteristicConfigurationDescriptorValue::Notify,
            )?
            .await?;
        if status != GattCommunicationStatus::Success {
            return Err(TransportError::Gatt(format!(
                "Notification subscription returned status: {:?}",
                status
            )));
        }

        info!("Notifications enabled successfully");
        Ok(())
    }

    async fn write_without_response(
        &mut self,
        uuid: Uuid,
        data: &[u8],
    ) -> Result<(), TransportError> {
        let characteristic = self.characteristic(uuid)?.clone();

        let writer = DataWriter::new()?;
        writer.WriteBytes(data)?;
        let buffer = writer.DetachBuffer()?;

        let status = characteristic
            .WriteValueWithOptionAsync(&buffer, GattWriteOption::WriteWithoutResponse)?
            .await?;
        if status != GattCommunicationStatus::Success {
            return Err(TransportError::Gatt(format!(
                "Write returned status: {:?}",
                status
            )));
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.characteristics.clear();
        self.device.Close()?;
        info!("Disconnected from device");
        Ok(())
    }
}
