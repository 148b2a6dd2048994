use std::fmt::{self, Display, Formatter};

use serde::Serialize;
use tracing::{debug, instrument};

use crate::profile::{Device, GattUuid, PropertySet};

/// One way in which an observed device falls short of its reference profile.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Discrepancy {
    MissingService {
        service: GattUuid,
    },
    CharacteristicCountMismatch {
        service: GattUuid,
        expected: usize,
        actual: usize,
    },
    MissingCharacteristic {
        service: GattUuid,
        characteristic: GattUuid,
    },
    PropertyMismatch {
        service: GattUuid,
        characteristic: GattUuid,
        expected: PropertySet,
        actual: PropertySet,
    },
    ServiceCountMismatch {
        expected: usize,
        actual: usize,
    },
}

impl Display for Discrepancy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingService { service } => write!(f, "service {service} is missing"),
            Self::CharacteristicCountMismatch {
                service,
                expected,
                actual,
            } => write!(
                f,
                "service {service} exposes {actual} characteristics, expected at least {expected}"
            ),
            Self::MissingCharacteristic {
                service,
                characteristic,
            } => write!(
                f,
                "characteristic {characteristic} is missing from service {service}"
            ),
            Self::PropertyMismatch {
                service,
                characteristic,
                expected,
                actual,
            } => write!(
                f,
                "characteristic {characteristic} in service {service} supports [{actual}], \
                 missing [{}]",
                expected.difference(actual)
            ),
            Self::ServiceCountMismatch { expected, actual } => write!(
                f,
                "device exposes {actual} services, expected at least {expected}"
            ),
        }
    }
}

/// The ordered result of checking an observed device against a reference.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct ConformanceReport {
    discrepancies: Vec<Discrepancy>,
}

impl ConformanceReport {
    #[must_use]
    pub fn discrepancies(&self) -> &[Discrepancy] {
        &self.discrepancies
    }

    /// Returns true when the observed device satisfies every reference requirement.
    #[must_use]
    pub fn matched(&self) -> bool {
        self.discrepancies.is_empty()
    }

    /// One line per discrepancy, or a single confirmation line when matched.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        if self.matched() {
            return vec!["device matches the reference profile".to_string()];
        }
        self.discrepancies.iter().map(ToString::to_string).collect()
    }
}

/// Checks `observed` against `reference`.
///
/// Extra services, characteristics and properties on the observed side are
/// tolerated. Services are matched by id, so reference order does not need to
/// follow discovery order.
#[must_use]
#[instrument(skip_all, fields(reference = reference.name(), observed = observed.name()))]
pub fn compare(reference: &Device, observed: &Device) -> ConformanceReport {
    let mut discrepancies = Vec::new();

    for reference_service in reference.services() {
        let service = reference_service.id();
        let Some(observed_service) = observed.find_service(&service) else {
            discrepancies.push(Discrepancy::MissingService { service });
            continue;
        };

        let expected = reference_service.characteristic_count();
        let actual = observed_service.characteristic_count();
        if actual < expected {
            discrepancies.push(Discrepancy::CharacteristicCountMismatch {
                service,
                expected,
                actual,
            });
        }

        for reference_characteristic in reference_service.characteristics() {
            let characteristic = reference_characteristic.id();
            match observed_service.find_characteristic(&characteristic) {
                None => discrepancies.push(Discrepancy::MissingCharacteristic {
                    service,
                    characteristic,
                }),
                Some(observed_characteristic)
                    if !observed_characteristic
                        .properties()
                        .is_superset(&reference_characteristic.properties()) =>
                {
                    discrepancies.push(Discrepancy::PropertyMismatch {
                        service,
                        characteristic,
                        expected: reference_characteristic.properties(),
                        actual: observed_characteristic.properties(),
                    });
                }
                Some(_) => {}
            }
        }
    }

    let expected = reference.service_count();
    let actual = observed.service_count();
    if actual < expected {
        discrepancies.push(Discrepancy::ServiceCountMismatch { expected, actual });
    }

    debug!(discrepancies = discrepancies.len(), "comparison finished");
    ConformanceReport { discrepancies }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::profile::{Characteristic, Property, Service};

    fn device(services: Vec<Service>) -> Device {
        services
            .into_iter()
            .try_fold(Device::new("Sensor"), Device::with_service)
            .expect("services should be distinct")
    }

    fn service(id: u16, characteristics: &[(u16, PropertySet)]) -> Service {
        characteristics
            .iter()
            .try_fold(
                Service::new("", GattUuid::from_u16(id)),
                |service, (characteristic, properties)| {
                    service.with_characteristic(Characteristic::new(
                        "",
                        GattUuid::from_u16(*characteristic),
                        *properties,
                    ))
                },
            )
            .expect("characteristics should be distinct")
    }

    fn props(properties: &[Property]) -> PropertySet {
        properties.iter().copied().collect()
    }

    #[test]
    fn identical_devices_match() {
        let reference = device(vec![
            service(0x180D, &[(0x2A37, props(&[Property::Notify]))]),
            service(0x180F, &[(0x2A19, props(&[Property::Read, Property::Notify]))]),
        ]);

        let report = compare(&reference, &reference.clone());

        assert!(report.matched());
        assert_eq!(vec!["device matches the reference profile"], report.lines());
    }

    #[test]
    fn missing_service_is_reported_with_service_count() {
        let reference = device(vec![
            service(0x180D, &[(0x2A37, props(&[Property::Notify]))]),
            service(0x180F, &[(0x2A19, props(&[Property::Read]))]),
        ]);
        let observed = device(vec![service(0x180D, &[(0x2A37, props(&[Property::Notify]))])]);

        let report = compare(&reference, &observed);

        assert_eq!(
            vec![
                Discrepancy::MissingService {
                    service: GattUuid::from_u16(0x180F)
                },
                Discrepancy::ServiceCountMismatch {
                    expected: 2,
                    actual: 1
                },
            ],
            report.discrepancies()
        );
    }

    #[test]
    fn missing_required_property_is_reported_once() {
        let reference = device(vec![service(
            0x180D,
            &[(0x2A39, props(&[Property::Read, Property::Write]))],
        )]);
        let observed = device(vec![service(0x180D, &[(0x2A39, props(&[Property::Read]))])]);

        let report = compare(&reference, &observed);

        assert_eq!(
            vec![Discrepancy::PropertyMismatch {
                service: GattUuid::from_u16(0x180D),
                characteristic: GattUuid::from_u16(0x2A39),
                expected: props(&[Property::Read, Property::Write]),
                actual: props(&[Property::Read]),
            }],
            report.discrepancies()
        );
        assert_eq!(
            vec![
                "characteristic 00002a39-0000-1000-8000-00805f9b34fb in service \
                 0000180d-0000-1000-8000-00805f9b34fb supports [read], missing [write]"
            ],
            report.lines()
        );
    }

    #[test]
    fn extra_properties_are_tolerated() {
        let reference = device(vec![service(0x180D, &[(0x2A37, props(&[Property::Notify]))])]);
        let observed = device(vec![service(
            0x180D,
            &[(0x2A37, props(&[Property::Read, Property::Notify]))],
        )]);

        assert!(compare(&reference, &observed).matched());
    }

    #[test]
    fn extra_services_and_characteristics_are_tolerated() {
        let reference = device(vec![service(0x180D, &[(0x2A37, props(&[Property::Notify]))])]);
        let observed = device(vec![
            service(0x180A, &[(0x2A29, props(&[Property::Read]))]),
            service(
                0x180D,
                &[
                    (0x2A37, props(&[Property::Notify])),
                    (0x2A38, props(&[Property::Read])),
                ],
            ),
        ]);

        assert!(compare(&reference, &observed).matched());
    }

    #[test]
    fn missing_characteristic_is_reported_with_count() {
        let reference = device(vec![service(
            0x180D,
            &[
                (0x2A37, props(&[Property::Notify])),
                (0x2A38, props(&[Property::Read])),
            ],
        )]);
        let observed = device(vec![service(0x180D, &[(0x2A37, props(&[Property::Notify]))])]);

        let report = compare(&reference, &observed);

        assert_eq!(
            vec![
                Discrepancy::CharacteristicCountMismatch {
                    service: GattUuid::from_u16(0x180D),
                    expected: 2,
                    actual: 1,
                },
                Discrepancy::MissingCharacteristic {
                    service: GattUuid::from_u16(0x180D),
                    characteristic: GattUuid::from_u16(0x2A38),
                },
            ],
            report.discrepancies()
        );
    }

    #[test]
    fn discrepancies_serialize_with_kind_tag() {
        let report = ConformanceReport {
            discrepancies: vec![Discrepancy::ServiceCountMismatch {
                expected: 2,
                actual: 1,
            }],
        };

        let json = serde_json::to_value(&report).expect("report should serialize");

        assert_eq!(
            serde_json::json!({
                "discrepancies": [
                    { "kind": "service_count_mismatch", "expected": 2, "actual": 1 }
                ]
            }),
            json
        );
    }
}
