use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use bon::Builder;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

use super::assigned;
use super::discovery::{DiscoveryEvent, RawCharacteristic, RawDescriptor, RawService};
use super::filter::DeviceFilter;
use super::hardware::{GattConnection, HardwareClient, send_event};
use super::model::{FoundDevice, ScanOptions};
use crate::error::{FixtureError, InteractionError};
use crate::profile::{Characteristic, Device, GattUuid, Property, PropertySet, Service};

const CLIENT_CHARACTERISTIC_CONFIGURATION: GattUuid = GattUuid::from_u16(0x2902);

/// Parsed fake scan fixture records.
#[derive(Debug, Clone, derive_more::Into)]
pub(crate) struct ScanFixture {
    devices: Vec<FoundDevice>,
}

impl FromStr for ScanFixture {
    type Err = FixtureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let devices = parse_scan_fixture(value)?;
        Ok(Self { devices })
    }
}

/// Settings for constructing a fake hardware backend.
#[derive(Debug, Builder)]
pub(crate) struct FakeBackendConfig {
    scan_fixture: ScanFixture,
    /// GATT layout served by every fake peripheral; defaults to a heart-rate sensor.
    profile: Option<Device>,
    /// Service whose characteristic discovery fails.
    failing_service: Option<GattUuid>,
    /// Characteristic whose descriptor discovery fails.
    failing_descriptors: Option<GattUuid>,
    #[builder(default)]
    discovery_delay: Duration,
}

/// Fake backend used in tests and non-hardware environments.
#[derive(Debug)]
pub(crate) struct FakeBackend {
    devices: Vec<FoundDevice>,
    profile: Device,
    failing_service: Option<GattUuid>,
    failing_descriptors: Option<GattUuid>,
    discovery_delay: Duration,
}

impl FakeBackend {
    /// Creates a fake backend from explicit settings.
    pub(crate) fn new(config: FakeBackendConfig) -> Self {
        Self {
            devices: config.scan_fixture.into(),
            profile: config.profile.unwrap_or_else(default_profile),
            failing_service: config.failing_service,
            failing_descriptors: config.failing_descriptors,
            discovery_delay: config.discovery_delay,
        }
    }

    async fn wait_for_advertisements(&self) {
        if !self.discovery_delay.is_zero() {
            sleep(self.discovery_delay).await;
        }
    }
}

#[async_trait]
impl HardwareClient for FakeBackend {
    async fn scan(&self, options: &ScanOptions) -> Result<Vec<FoundDevice>, InteractionError> {
        self.wait_for_advertisements().await;

        let mut found: Vec<FoundDevice> = Vec::new();
        for device in &self.devices {
            if found.len() >= options.max_results() {
                break;
            }
            if !found
                .iter()
                .any(|seen| seen.device_id() == device.device_id())
            {
                found.push(device.clone());
            }
        }
        found.sort_by(|left, right| left.device_id().cmp(right.device_id()));
        Ok(found)
    }

    async fn find_first(&self, filter: &DeviceFilter) -> Result<FoundDevice, InteractionError> {
        self.wait_for_advertisements().await;

        self.devices
            .iter()
            .find(|device| filter.matches(device.local_name(), device.manufacturer_data()))
            .cloned()
            .ok_or_else(|| InteractionError::NoMatchingFixtureDevice {
                name: filter.name().to_string(),
            })
    }

    async fn connect(
        &self,
        device: &FoundDevice,
    ) -> Result<Box<dyn GattConnection>, InteractionError> {
        Ok(Box::new(FakeConnection {
            device: device.clone(),
            profile: self.profile.clone(),
            failing_service: self.failing_service,
            failing_descriptors: self.failing_descriptors,
        }))
    }
}

#[derive(Debug)]
struct FakeConnection {
    device: FoundDevice,
    profile: Device,
    failing_service: Option<GattUuid>,
    failing_descriptors: Option<GattUuid>,
}

#[async_trait]
impl GattConnection for FakeConnection {
    fn device(&self) -> &FoundDevice {
        &self.device
    }

    #[instrument(skip_all, level = "debug", fields(device_id = self.device.device_id()))]
    async fn discover(&self, events: mpsc::Sender<DiscoveryEvent>) -> Result<(), InteractionError> {
        let services = self
            .profile
            .services()
            .iter()
            .map(|service| RawService {
                uuid: service.id(),
                name: supplied_name(service.name()),
            })
            .collect();
        send_event(&events, DiscoveryEvent::ServicesDiscovered(services)).await?;

        for service in self.profile.services() {
            if self.failing_service == Some(service.id()) {
                debug!(service = %service.id(), "failing characteristic discovery");
                send_event(
                    &events,
                    DiscoveryEvent::CharacteristicDiscoveryFailed {
                        service: service.id(),
                        reason: "simulated discovery failure".to_string(),
                    },
                )
                .await?;
                continue;
            }

            let characteristics = service
                .characteristics()
                .iter()
                .map(|characteristic| RawCharacteristic {
                    uuid: characteristic.id(),
                    name: supplied_name(characteristic.name()),
                    properties: characteristic.properties(),
                })
                .collect();
            send_event(
                &events,
                DiscoveryEvent::CharacteristicsDiscovered {
                    service: service.id(),
                    characteristics,
                },
            )
            .await?;

            for characteristic in service.characteristics() {
                let event = if self.failing_descriptors == Some(characteristic.id()) {
                    debug!(characteristic = %characteristic.id(), "failing descriptor discovery");
                    DiscoveryEvent::DescriptorDiscoveryFailed {
                        service: service.id(),
                        characteristic: characteristic.id(),
                        reason: "simulated descriptor failure".to_string(),
                    }
                } else {
                    DiscoveryEvent::DescriptorsDiscovered {
                        service: service.id(),
                        characteristic: characteristic.id(),
                        descriptors: descriptors_for(characteristic),
                    }
                };
                send_event(&events, event).await?;
            }
        }

        send_event(&events, DiscoveryEvent::Completed).await
    }

    async fn disconnect(self: Box<Self>) -> Result<(), InteractionError> {
        debug!(device_id = self.device.device_id(), "fake peripheral disconnected");
        Ok(())
    }
}

fn supplied_name(name: &str) -> Option<String> {
    (!name.is_empty()).then(|| name.to_string())
}

/// Notifying characteristics carry a client configuration descriptor, as on real hardware.
fn descriptors_for(characteristic: &Characteristic) -> Vec<RawDescriptor> {
    let properties = characteristic.properties();
    if properties.contains(Property::Notify) || properties.contains(Property::Indicate) {
        vec![RawDescriptor {
            uuid: CLIENT_CHARACTERISTIC_CONFIGURATION,
            name: assigned::descriptor_name(&CLIENT_CHARACTERISTIC_CONFIGURATION)
                .map(str::to_string),
        }]
    } else {
        Vec::new()
    }
}

/// A heart-rate sensor with an unnamed battery service.
fn default_profile() -> Device {
    let heart_rate = Service::new("Heart Rate", GattUuid::from_u16(0x180D))
        .with_characteristic(Characteristic::new(
            "Heart Rate Measurement",
            GattUuid::from_u16(0x2A37),
            PropertySet::empty().with(Property::Notify),
        ))
        .and_then(|service| {
            service.with_characteristic(Characteristic::new(
                "",
                GattUuid::from_u16(0x2A38),
                PropertySet::empty().with(Property::Read),
            ))
        });
    let battery = Service::new("", GattUuid::from_u16(0x180F)).with_characteristic(
        Characteristic::new(
            "",
            GattUuid::from_u16(0x2A19),
            PropertySet::empty()
                .with(Property::Read)
                .with(Property::Notify),
        ),
    );

    heart_rate
        .and_then(|heart_rate| Device::new("Fake Sensor").with_service(heart_rate))
        .and_then(|device| battery.and_then(|battery| device.with_service(battery)))
        .unwrap_or_else(|error| {
            warn!(%error, "default fake profile is inconsistent, serving an empty device");
            Device::new("Fake Sensor")
        })
}

fn parse_scan_fixture(raw_fixture: &str) -> Result<Vec<FoundDevice>, FixtureError> {
    if raw_fixture.trim().is_empty() {
        return Err(FixtureError::EmptyFixture);
    }

    raw_fixture
        .split(';')
        .map(parse_scan_record)
        .collect::<Result<Vec<_>, _>>()
}

fn parse_scan_record(raw_record: &str) -> Result<FoundDevice, FixtureError> {
    let fields: Vec<&str> = raw_record.split('|').map(str::trim).collect();
    if !matches!(fields.len(), 4 | 5) {
        return Err(FixtureError::InvalidRecordFieldCount);
    }
    if fields.iter().any(|field| field.is_empty()) {
        return Err(FixtureError::EmptyRecordField);
    }

    let local_name = (fields[2] != "-").then(|| fields[2].to_string());
    let rssi = if fields[3] == "-" {
        None
    } else {
        Some(fields[3].parse::<i16>()?)
    };

    let device = FoundDevice::new(
        fields[0].to_string(),
        fields[1].to_string(),
        local_name,
        rssi,
    );
    match fields.get(4) {
        Some(value) => {
            let data = hex::decode(value).map_err(|_| FixtureError::InvalidManufacturerData {
                value: (*value).to_string(),
            })?;
            Ok(device.with_manufacturer_data(data))
        }
        None => Ok(device),
    }
}
