use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, instrument, trace, warn};

use crate::profile::{Characteristic, Device, GattUuid, PropertySet, Service, UuidNames};

/// Capacity of the channel between a connection's discovery task and the accumulator.
pub(crate) const DISCOVERY_CHANNEL_CAPACITY: usize = 16;

/// A service handle reported by the connection.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RawService {
    pub uuid: GattUuid,
    pub name: Option<String>,
}

/// A characteristic handle reported by the connection.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RawCharacteristic {
    pub uuid: GattUuid,
    pub name: Option<String>,
    pub properties: PropertySet,
}

/// A descriptor handle reported by the connection.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct RawDescriptor {
    pub uuid: GattUuid,
    pub name: Option<String>,
}

/// Discovery progress for one connection, in the order it happened.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum DiscoveryEvent {
    ServicesDiscovered(Vec<RawService>),
    CharacteristicsDiscovered {
        service: GattUuid,
        characteristics: Vec<RawCharacteristic>,
    },
    CharacteristicDiscoveryFailed {
        service: GattUuid,
        reason: String,
    },
    DescriptorsDiscovered {
        service: GattUuid,
        characteristic: GattUuid,
        descriptors: Vec<RawDescriptor>,
    },
    DescriptorDiscoveryFailed {
        service: GattUuid,
        characteristic: GattUuid,
        reason: String,
    },
    /// Every discovered service has been processed.
    Completed,
}

/// The observed device produced by a finished discovery.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct DiscoveredProfile {
    device: Device,
    #[serde(serialize_with = "serialize_descriptors")]
    descriptors: BTreeMap<(GattUuid, GattUuid), Vec<RawDescriptor>>,
    skipped_services: Vec<GattUuid>,
}

impl DiscoveredProfile {
    #[must_use]
    pub fn device(&self) -> &Device {
        &self.device
    }

    #[must_use]
    pub fn into_device(self) -> Device {
        self.device
    }

    /// Descriptors discovered under a characteristic, for display.
    #[must_use]
    pub fn descriptors(&self, service: &GattUuid, characteristic: &GattUuid) -> &[RawDescriptor] {
        self.descriptors
            .get(&(*service, *characteristic))
            .map_or(&[][..], Vec::as_slice)
    }

    /// Services kept without characteristics because their discovery failed.
    #[must_use]
    pub fn skipped_services(&self) -> &[GattUuid] {
        &self.skipped_services
    }
}

fn serialize_descriptors<S>(
    descriptors: &BTreeMap<(GattUuid, GattUuid), Vec<RawDescriptor>>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    #[derive(Serialize)]
    struct Entry<'a> {
        service: GattUuid,
        characteristic: GattUuid,
        descriptors: &'a [RawDescriptor],
    }

    serializer.collect_seq(
        descriptors
            .iter()
            .map(|((service, characteristic), descriptors)| Entry {
                service: *service,
                characteristic: *characteristic,
                descriptors,
            }),
    )
}

/// Folds discovery events into an observed [`Device`].
///
/// Service order follows the `ServicesDiscovered` event and characteristic
/// order follows each `CharacteristicsDiscovered` event. Failures for one
/// service never abort discovery of the others.
#[derive(Debug)]
pub struct DiscoveryAccumulator<'a> {
    device: Device,
    service_names: &'a UuidNames,
    characteristic_names: &'a UuidNames,
    descriptors: BTreeMap<(GattUuid, GattUuid), Vec<RawDescriptor>>,
    pending: BTreeSet<GattUuid>,
    skipped_services: Vec<GattUuid>,
    completed: bool,
}

impl<'a> DiscoveryAccumulator<'a> {
    #[must_use]
    pub fn new(
        device_name: impl Into<String>,
        service_names: &'a UuidNames,
        characteristic_names: &'a UuidNames,
    ) -> Self {
        Self {
            device: Device::new(device_name),
            service_names,
            characteristic_names,
            descriptors: BTreeMap::new(),
            pending: BTreeSet::new(),
            skipped_services: Vec::new(),
            completed: false,
        }
    }

    /// Returns whether a `Completed` event has been applied.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Applies one event. Events after `Completed` are ignored.
    pub fn apply(&mut self, event: DiscoveryEvent) {
        if self.completed {
            trace!(?event, "ignoring event after discovery completed");
            return;
        }

        match event {
            DiscoveryEvent::ServicesDiscovered(services) => self.add_services(services),
            DiscoveryEvent::CharacteristicsDiscovered {
                service,
                characteristics,
            } => self.add_characteristics(service, characteristics),
            DiscoveryEvent::CharacteristicDiscoveryFailed { service, reason } => {
                if self.pending.remove(&service) {
                    warn!(%service, %reason, "characteristic discovery failed, skipping service");
                    self.skipped_services.push(service);
                } else {
                    debug!(%service, %reason, "ignoring failure for unknown or finished service");
                }
            }
            DiscoveryEvent::DescriptorsDiscovered {
                service,
                characteristic,
                descriptors,
            } => {
                let known = self
                    .device
                    .find_service(&service)
                    .and_then(|found| found.find_characteristic(&characteristic))
                    .is_some();
                if known {
                    self.descriptors
                        .entry((service, characteristic))
                        .or_default()
                        .extend(descriptors);
                } else {
                    debug!(%service, %characteristic, "ignoring descriptors for unknown characteristic");
                }
            }
            DiscoveryEvent::DescriptorDiscoveryFailed {
                service,
                characteristic,
                reason,
            } => {
                warn!(%service, %characteristic, %reason, "descriptor discovery failed");
            }
            DiscoveryEvent::Completed => self.complete(),
        }
    }

    /// Drains `events` until `Completed` arrives or every sender is dropped.
    #[instrument(skip_all, level = "debug", fields(device = self.device.name()))]
    pub async fn consume(mut self, mut events: mpsc::Receiver<DiscoveryEvent>) -> DiscoveredProfile {
        while let Some(event) = events.recv().await {
            self.apply(event);
            if self.completed {
                break;
            }
        }
        if !self.completed {
            debug!("discovery channel closed before completion");
        }
        self.finish()
    }

    /// Finalizes the observed device.
    #[must_use]
    pub fn finish(mut self) -> DiscoveredProfile {
        self.complete();
        debug!(
            services = self.device.service_count(),
            skipped = self.skipped_services.len(),
            "discovery finished"
        );
        DiscoveredProfile {
            device: self.device,
            descriptors: self.descriptors,
            skipped_services: self.skipped_services,
        }
    }

    fn complete(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        let unfinished = std::mem::take(&mut self.pending);
        for service in self
            .device
            .services()
            .iter()
            .map(Service::id)
            .filter(|service| unfinished.contains(service))
            .collect::<Vec<_>>()
        {
            warn!(%service, "no characteristics reported, skipping service");
            self.skipped_services.push(service);
        }
    }

    fn add_services(&mut self, services: Vec<RawService>) {
        for raw in services {
            let name = self.service_names.resolve(raw.name.as_deref(), &raw.uuid);
            match self.device.push_service(Service::new(name, raw.uuid)) {
                Ok(()) => {
                    self.pending.insert(raw.uuid);
                }
                Err(error) => debug!(%error, "ignoring duplicate service"),
            }
        }
    }

    fn add_characteristics(&mut self, service: GattUuid, characteristics: Vec<RawCharacteristic>) {
        if !self.pending.remove(&service) {
            debug!(%service, "ignoring characteristics for unknown or finished service");
            return;
        }
        let Some(target) = self.device.find_service_mut(&service) else {
            return;
        };
        for raw in characteristics {
            let name = self
                .characteristic_names
                .resolve(raw.name.as_deref(), &raw.uuid);
            if let Err(error) =
                target.push_characteristic(Characteristic::new(name, raw.uuid, raw.properties))
            {
                debug!(%error, "ignoring duplicate characteristic");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::profile::Property;

    const HEART_RATE: GattUuid = GattUuid::from_u16(0x180D);
    const BATTERY: GattUuid = GattUuid::from_u16(0x180F);
    const MEASUREMENT: GattUuid = GattUuid::from_u16(0x2A37);
    const CCCD: GattUuid = GattUuid::from_u16(0x2902);

    fn raw_service(uuid: GattUuid, name: Option<&str>) -> RawService {
        RawService {
            uuid,
            name: name.map(str::to_string),
        }
    }

    fn raw_characteristic(uuid: GattUuid, properties: PropertySet) -> RawCharacteristic {
        RawCharacteristic {
            uuid,
            name: None,
            properties,
        }
    }

    #[test]
    fn accumulates_services_and_characteristics_in_event_order() {
        let service_names: UuidNames = [(HEART_RATE, "Heart Rate From Table")].into_iter().collect();
        let characteristic_names: UuidNames =
            [(MEASUREMENT, "Heart Rate Measurement")].into_iter().collect();
        let mut accumulator = DiscoveryAccumulator::new("Sensor", &service_names, &characteristic_names);

        accumulator.apply(DiscoveryEvent::ServicesDiscovered(vec![
            raw_service(HEART_RATE, Some("Heart Rate")),
            raw_service(BATTERY, None),
        ]));
        accumulator.apply(DiscoveryEvent::CharacteristicsDiscovered {
            service: HEART_RATE,
            characteristics: vec![raw_characteristic(
                MEASUREMENT,
                PropertySet::empty().with(Property::Notify),
            )],
        });
        accumulator.apply(DiscoveryEvent::DescriptorsDiscovered {
            service: HEART_RATE,
            characteristic: MEASUREMENT,
            descriptors: vec![RawDescriptor {
                uuid: CCCD,
                name: Some("Client Characteristic Configuration".to_string()),
            }],
        });
        accumulator.apply(DiscoveryEvent::CharacteristicsDiscovered {
            service: BATTERY,
            characteristics: Vec::new(),
        });
        accumulator.apply(DiscoveryEvent::Completed);
        let profile = accumulator.finish();

        let device = profile.device();
        assert_eq!("Sensor", device.name());
        let names: Vec<&str> = device.services().iter().map(Service::name).collect();
        assert_eq!(vec!["Heart Rate", ""], names);
        let measurement = &device.services()[0].characteristics()[0];
        assert_eq!("Heart Rate Measurement", measurement.name());
        assert_eq!(1, profile.descriptors(&HEART_RATE, &MEASUREMENT).len());
        assert!(profile.skipped_services().is_empty());
    }

    #[test]
    fn failed_characteristic_discovery_keeps_empty_service() {
        let names = UuidNames::default();
        let mut accumulator = DiscoveryAccumulator::new("Sensor", &names, &names);

        accumulator.apply(DiscoveryEvent::ServicesDiscovered(vec![
            raw_service(HEART_RATE, None),
            raw_service(BATTERY, None),
        ]));
        accumulator.apply(DiscoveryEvent::CharacteristicDiscoveryFailed {
            service: HEART_RATE,
            reason: "att error".to_string(),
        });
        accumulator.apply(DiscoveryEvent::CharacteristicsDiscovered {
            service: BATTERY,
            characteristics: vec![raw_characteristic(
                GattUuid::from_u16(0x2A19),
                PropertySet::empty().with(Property::Read),
            )],
        });
        accumulator.apply(DiscoveryEvent::Completed);
        let profile = accumulator.finish();

        assert_eq!(2, profile.device().service_count());
        assert_eq!(0, profile.device().services()[0].characteristic_count());
        assert_eq!(1, profile.device().services()[1].characteristic_count());
        assert_eq!(vec![HEART_RATE], profile.skipped_services());
    }

    #[test]
    fn failed_descriptor_discovery_keeps_characteristic() {
        let names = UuidNames::default();
        let mut accumulator = DiscoveryAccumulator::new("Sensor", &names, &names);
        let location = GattUuid::from_u16(0x2A38);

        accumulator.apply(DiscoveryEvent::ServicesDiscovered(vec![raw_service(
            HEART_RATE, None,
        )]));
        accumulator.apply(DiscoveryEvent::CharacteristicsDiscovered {
            service: HEART_RATE,
            characteristics: vec![
                raw_characteristic(MEASUREMENT, PropertySet::empty().with(Property::Notify)),
                raw_characteristic(location, PropertySet::empty().with(Property::Read)),
            ],
        });
        accumulator.apply(DiscoveryEvent::DescriptorDiscoveryFailed {
            service: HEART_RATE,
            characteristic: MEASUREMENT,
            reason: "att error".to_string(),
        });
        accumulator.apply(DiscoveryEvent::DescriptorsDiscovered {
            service: HEART_RATE,
            characteristic: location,
            descriptors: vec![RawDescriptor {
                uuid: GattUuid::from_u16(0x2901),
                name: None,
            }],
        });
        accumulator.apply(DiscoveryEvent::Completed);
        let profile = accumulator.finish();

        let service = &profile.device().services()[0];
        assert_eq!(2, service.characteristic_count());
        assert!(profile.descriptors(&HEART_RATE, &MEASUREMENT).is_empty());
        assert_eq!(1, profile.descriptors(&HEART_RATE, &location).len());
        assert!(profile.skipped_services().is_empty());
    }

    #[test]
    fn ignores_unknown_and_repeated_events() {
        let names = UuidNames::default();
        let mut accumulator = DiscoveryAccumulator::new("Sensor", &names, &names);

        accumulator.apply(DiscoveryEvent::ServicesDiscovered(vec![
            raw_service(HEART_RATE, None),
            raw_service(HEART_RATE, None),
        ]));
        accumulator.apply(DiscoveryEvent::CharacteristicsDiscovered {
            service: BATTERY,
            characteristics: vec![raw_characteristic(MEASUREMENT, PropertySet::empty())],
        });
        accumulator.apply(DiscoveryEvent::CharacteristicsDiscovered {
            service: HEART_RATE,
            characteristics: vec![
                raw_characteristic(MEASUREMENT, PropertySet::empty().with(Property::Notify)),
                raw_characteristic(MEASUREMENT, PropertySet::empty().with(Property::Read)),
            ],
        });
        accumulator.apply(DiscoveryEvent::CharacteristicsDiscovered {
            service: HEART_RATE,
            characteristics: vec![raw_characteristic(
                GattUuid::from_u16(0x2A38),
                PropertySet::empty(),
            )],
        });
        let profile = accumulator.finish();

        assert_eq!(1, profile.device().service_count());
        let service = &profile.device().services()[0];
        assert_eq!(1, service.characteristic_count());
        assert_eq!(
            PropertySet::empty().with(Property::Notify),
            service.characteristics()[0].properties()
        );
    }

    #[test]
    fn services_without_characteristics_event_are_skipped_on_completion() {
        let names = UuidNames::default();
        let mut accumulator = DiscoveryAccumulator::new("Sensor", &names, &names);

        accumulator.apply(DiscoveryEvent::ServicesDiscovered(vec![raw_service(
            BATTERY, None,
        )]));
        accumulator.apply(DiscoveryEvent::Completed);
        assert!(accumulator.is_completed());

        let profile = accumulator.finish();
        assert_eq!(vec![BATTERY], profile.skipped_services());
    }

    #[tokio::test]
    async fn consume_stops_at_completed() {
        let names = UuidNames::default();
        let (sender, receiver) = mpsc::channel(DISCOVERY_CHANNEL_CAPACITY);
        sender
            .send(DiscoveryEvent::ServicesDiscovered(vec![raw_service(
                HEART_RATE, None,
            )]))
            .await
            .expect("event should be sent");
        sender
            .send(DiscoveryEvent::CharacteristicsDiscovered {
                service: HEART_RATE,
                characteristics: Vec::new(),
            })
            .await
            .expect("event should be sent");
        sender
            .send(DiscoveryEvent::Completed)
            .await
            .expect("event should be sent");

        let profile = DiscoveryAccumulator::new("Sensor", &names, &names)
            .consume(receiver)
            .await;

        assert_eq!(1, profile.device().service_count());
        assert!(profile.skipped_services().is_empty());
        drop(sender);
    }
}
