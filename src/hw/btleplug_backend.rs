use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CharPropFlags, Manager as _, Peripheral as _, PeripheralProperties, ScanFilter,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tokio::runtime::Handle;
use tokio::sync::{Mutex, OnceCell, mpsc};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, instrument, trace};

use super::assigned;
use super::discovery::{DiscoveryEvent, RawCharacteristic, RawDescriptor, RawService};
use super::filter::DeviceFilter;
use super::hardware::{GattConnection, HardwareClient, send_event};
use super::model::{FoundDevice, ScanOptions};
use crate::error::InteractionError;
use crate::profile::{GattUuid, Property, PropertySet};

const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(250);

const PROPERTY_FLAGS: [(CharPropFlags, Property); 8] = [
    (CharPropFlags::BROADCAST, Property::Broadcast),
    (CharPropFlags::READ, Property::Read),
    (
        CharPropFlags::WRITE_WITHOUT_RESPONSE,
        Property::WriteWithoutResponse,
    ),
    (CharPropFlags::WRITE, Property::Write),
    (CharPropFlags::NOTIFY, Property::Notify),
    (CharPropFlags::INDICATE, Property::Indicate),
    (CharPropFlags::AUTHENTICATED_SIGNED_WRITES, Property::SignedWrite),
    (CharPropFlags::EXTENDED_PROPERTIES, Property::Extended),
];

/// Hardware backend backed by `btleplug`.
#[derive(Debug, Default)]
pub(crate) struct BtleplugBackend {
    manager: OnceCell<Manager>,
    peripherals: Mutex<HashMap<String, Peripheral>>,
}

impl BtleplugBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    async fn manager(&self) -> Result<&Manager, InteractionError> {
        self.manager
            .get_or_try_init(|| async { Manager::new().await.map_err(InteractionError::from) })
            .await
    }

    #[instrument(skip(self), level = "trace")]
    async fn adapters(&self) -> Result<Vec<AdapterHandle>, InteractionError> {
        let adapters = self.manager().await?.adapters().await?;
        if adapters.is_empty() {
            return Err(InteractionError::NoAdapters);
        }

        let mut handles = Vec::with_capacity(adapters.len());
        for adapter in adapters {
            let name = adapter.adapter_info().await?;
            handles.push(AdapterHandle { adapter, name });
        }
        Ok(handles)
    }

    /// Starts scanning on every adapter. Dropping the guard stops the scan.
    async fn start_scan(adapters: &[AdapterHandle]) -> Result<ScanGuard, InteractionError> {
        let mut guard = ScanGuard::default();
        for handle in adapters {
            handle.adapter.start_scan(ScanFilter::default()).await?;
            guard.scanning.push(handle.clone());
        }
        Ok(guard)
    }

    /// Polls every adapter once, returning each peripheral that currently has properties.
    async fn poll(
        adapters: &[AdapterHandle],
    ) -> Result<Vec<(Peripheral, FoundDevice)>, InteractionError> {
        let mut seen = Vec::new();
        for handle in adapters {
            for peripheral in handle.adapter.peripherals().await? {
                let Some(properties) = peripheral.properties().await? else {
                    continue;
                };
                let device = found_device(&handle.name, &peripheral, properties);
                seen.push((peripheral, device));
            }
        }
        Ok(seen)
    }
}

#[async_trait]
impl HardwareClient for BtleplugBackend {
    #[instrument(skip(self), level = "debug", fields(duration = ?options.duration()))]
    async fn scan(&self, options: &ScanOptions) -> Result<Vec<FoundDevice>, InteractionError> {
        let adapters = self.adapters().await?;
        info!(adapter_count = adapters.len(), "starting BLE scan");
        let scan = Self::start_scan(&adapters).await?;

        let deadline = Instant::now() + options.duration();
        let mut found = BTreeMap::new();
        let result = loop {
            match Self::poll(&adapters).await {
                Ok(seen) => {
                    for (_peripheral, device) in seen {
                        if found.len() < options.max_results()
                            || found.contains_key(device.device_id())
                        {
                            found.insert(device.device_id().to_string(), device);
                        }
                    }
                }
                Err(error) => break Err(error),
            }
            if found.len() >= options.max_results() || Instant::now() >= deadline {
                break Ok(());
            }
            sleep(SCAN_POLL_INTERVAL.min(deadline.saturating_duration_since(Instant::now())))
                .await;
        };

        scan.stop().await;
        result?;
        debug!(found = found.len(), "scan finished");
        Ok(found.into_values().collect())
    }

    #[instrument(skip(self), level = "debug", fields(name = filter.name()))]
    async fn find_first(&self, filter: &DeviceFilter) -> Result<FoundDevice, InteractionError> {
        let adapters = self.adapters().await?;
        info!(adapter_count = adapters.len(), "scanning for matching peripheral");
        let scan = Self::start_scan(&adapters).await?;

        let matched = loop {
            let seen = match Self::poll(&adapters).await {
                Ok(seen) => seen,
                Err(error) => {
                    scan.stop().await;
                    return Err(error);
                }
            };
            let hit = seen.into_iter().find(|(_peripheral, device)| {
                let accepted = filter.matches(device.local_name(), device.manufacturer_data());
                if !accepted && filter.matches_name(device.local_name()) {
                    trace!(
                        device_id = device.device_id(),
                        "name matched but manufacturer suffix did not"
                    );
                }
                accepted
            });
            if let Some(hit) = hit {
                break hit;
            }
            sleep(SCAN_POLL_INTERVAL).await;
        };

        scan.stop().await;
        let (peripheral, device) = matched;
        info!(device_id = device.device_id(), "found matching peripheral");
        self.peripherals
            .lock()
            .await
            .insert(device.device_id().to_string(), peripheral);
        Ok(device)
    }

    #[instrument(skip(self), level = "debug", fields(device_id = device.device_id()))]
    async fn connect(
        &self,
        device: &FoundDevice,
    ) -> Result<Box<dyn GattConnection>, InteractionError> {
        let peripheral = self
            .peripherals
            .lock()
            .await
            .get(device.device_id())
            .cloned()
            .ok_or_else(|| InteractionError::UnknownPeripheral {
                device_id: device.device_id().to_string(),
            })?;

        if !peripheral.is_connected().await? {
            peripheral.connect().await?;
        }
        info!("connected to peripheral");

        Ok(Box::new(RealConnection {
            device: device.clone(),
            peripheral,
        }))
    }
}

#[derive(Debug, Clone)]
struct AdapterHandle {
    adapter: Adapter,
    name: String,
}

/// Adapters with a scan in progress.
///
/// A guard dropped without [`ScanGuard::stop`], e.g. when a connect timeout
/// cancels `find_first`, stops the scans on a background task.
#[derive(Debug, Default)]
struct ScanGuard {
    scanning: Vec<AdapterHandle>,
}

impl ScanGuard {
    async fn stop(mut self) {
        stop_scans(std::mem::take(&mut self.scanning)).await;
    }
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        if self.scanning.is_empty() {
            return;
        }
        let scanning = std::mem::take(&mut self.scanning);
        match Handle::try_current() {
            Ok(runtime) => {
                debug!(adapters = scanning.len(), "scan cancelled, stopping adapters");
                runtime.spawn(stop_scans(scanning));
            }
            Err(_) => debug!("no runtime left to stop adapter scans"),
        }
    }
}

async fn stop_scans(adapters: Vec<AdapterHandle>) {
    for handle in adapters {
        if let Err(error) = handle.adapter.stop_scan().await {
            debug!(?error, adapter = %handle.name, "failed to stop adapter scan cleanly");
        }
    }
}

#[derive(Debug)]
struct RealConnection {
    device: FoundDevice,
    peripheral: Peripheral,
}

#[async_trait]
impl GattConnection for RealConnection {
    fn device(&self) -> &FoundDevice {
        &self.device
    }

    #[instrument(skip_all, level = "debug", fields(device_id = self.device.device_id()))]
    async fn discover(&self, events: mpsc::Sender<DiscoveryEvent>) -> Result<(), InteractionError> {
        self.peripheral
            .discover_services()
            .await
            .map_err(|error| InteractionError::ServiceDiscovery {
                device_id: self.device.device_id().to_string(),
                reason: error.to_string(),
            })?;

        let services = self.peripheral.services();
        let raw_services = services
            .iter()
            .map(|service| {
                let uuid = GattUuid::from(service.uuid);
                RawService {
                    uuid,
                    name: assigned::service_name(&uuid).map(str::to_string),
                }
            })
            .collect();
        send_event(&events, DiscoveryEvent::ServicesDiscovered(raw_services)).await?;

        for service in &services {
            let service_uuid = GattUuid::from(service.uuid);
            let characteristics = service
                .characteristics
                .iter()
                .map(|characteristic| {
                    let uuid = GattUuid::from(characteristic.uuid);
                    RawCharacteristic {
                        uuid,
                        name: assigned::characteristic_name(&uuid).map(str::to_string),
                        properties: property_set(characteristic.properties),
                    }
                })
                .collect();
            send_event(
                &events,
                DiscoveryEvent::CharacteristicsDiscovered {
                    service: service_uuid,
                    characteristics,
                },
            )
            .await?;

            for characteristic in &service.characteristics {
                let descriptors = characteristic
                    .descriptors
                    .iter()
                    .map(|descriptor| {
                        let uuid = GattUuid::from(descriptor.uuid);
                        RawDescriptor {
                            uuid,
                            name: assigned::descriptor_name(&uuid).map(str::to_string),
                        }
                    })
                    .collect();
                send_event(
                    &events,
                    DiscoveryEvent::DescriptorsDiscovered {
                        service: service_uuid,
                        characteristic: GattUuid::from(characteristic.uuid),
                        descriptors,
                    },
                )
                .await?;
            }
        }

        send_event(&events, DiscoveryEvent::Completed).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn disconnect(self: Box<Self>) -> Result<(), InteractionError> {
        if self.peripheral.is_connected().await? {
            self.peripheral.disconnect().await?;
        }
        Ok(())
    }
}

fn found_device(
    adapter_name: &str,
    peripheral: &Peripheral,
    properties: PeripheralProperties,
) -> FoundDevice {
    let manufacturer_data = manufacturer_data(&properties);
    let device = FoundDevice::new(
        adapter_name.to_string(),
        peripheral.id().to_string(),
        properties.local_name,
        properties.rssi,
    );
    match manufacturer_data {
        Some(data) => device.with_manufacturer_data(data),
        None => device,
    }
}

/// Rebuilds the advertised manufacturer-specific data field: company id
/// (little-endian) followed by the payload. The lowest company id wins when a
/// peripheral advertises several.
fn manufacturer_data(properties: &PeripheralProperties) -> Option<Vec<u8>> {
    let (company_id, payload) = properties
        .manufacturer_data
        .iter()
        .min_by_key(|(company_id, _payload)| **company_id)?;
    let mut data = Vec::with_capacity(payload.len() + 2);
    data.extend_from_slice(&company_id.to_le_bytes());
    data.extend_from_slice(payload);
    Some(data)
}

fn property_set(flags: CharPropFlags) -> PropertySet {
    PROPERTY_FLAGS
        .iter()
        .filter(|(flag, _property)| flags.contains(*flag))
        .map(|(_flag, property)| *property)
        .collect()
}
