//! BLE Scanner Module
//!
//! Device discovery on the first system adapter via btleplug.

use crate::infrastructure::bluetooth::transport::TransportError;
use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// A peripheral seen during a scan.
#[derive(Debug, Clone)]
pub struct ScannedDevice {
    pub identity: String,
    pub name: Option<String>,
    pub rssi: Option<i16>,
    pub peripheral: Peripheral,
}

/// BLE scanner bound to one adapter
#[derive(Clone)]
pub struct BleScanner {
    adapter: Adapter,
    window: Duration,
}

impl BleScanner {
    /// Open the default adapter. Fails with [`TransportError::NoAdapter`] when
    /// the host has no Bluetooth.
    pub async fn open(window: Duration) -> Result<Self, TransportError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(TransportError::NoAdapter)?;
        Ok(Self { adapter, window })
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Scan for one window and return devices advertising `service`,
    /// strongest signal first.
    pub async fn scan(&self, service: Uuid) -> Result<Vec<ScannedDevice>, TransportError> {
        info!("Scanning {:?} for service {}", self.window, service);
        self.adapter
            .start_scan(ScanFilter {
                services: vec![service],
            })
            .await?;
        tokio::time::sleep(self.window).await;

        let peripherals = self.adapter.peripherals().await;
        let stop = self.adapter.stop_scan().await;
        let peripherals = peripherals?;
        stop?;

        let mut devices = Vec::new();
        for peripheral in peripherals {
            let Some(props) = peripheral.properties().await? else {
                continue;
            };
            // Some backends ignore the scan filter; check again.
            if !props.services.contains(&service) {
                continue;
            }
            devices.push(ScannedDevice {
                identity: peripheral.address().to_string(),
                name: props.local_name,
                rssi: props.rssi,
                peripheral,
            });
        }

        devices.sort_by_key(|d| std::cmp::Reverse(d.rssi.unwrap_or(i16::MIN)));
        debug!("Scan found {} matching devices", devices.len());
        Ok(devices)
    }

    /// Look for a known device among peripherals the adapter has seen,
    /// scanning once if it is not cached.
    pub async fn find(&self, identity: &str, service: Uuid) -> Result<ScannedDevice, TransportError> {
        for peripheral in self.adapter.peripherals().await? {
            if peripheral.address().to_string() == identity {
                let name = peripheral
                    .properties()
                    .await?
                    .and_then(|p| p.local_name);
                return Ok(ScannedDevice {
                    identity: identity.to_string(),
                    name,
                    rssi: None,
                    peripheral,
                });
            }
        }

        self.scan(service)
            .await?
            .into_iter()
            .find(|d| d.identity == identity)
            .ok_or_else(|| TransportError::DeviceNotFound(identity.to_string()))
    }
}
