use std::fmt::{self, Display, Formatter};

use enumset::{EnumSet, EnumSetType};
use serde::{Serialize, Serializer};
use strum_macros::{Display as StrumDisplay, EnumString};

use super::uuid::GattUuid;
use crate::error::ProfileError;

/// One capability flag of a GATT characteristic.
///
/// Variants are declared in the fixed order used by profile documents.
#[derive(Debug, EnumSetType, StrumDisplay)]
pub enum Property {
    #[strum(to_string = "broadcast")]
    Broadcast,
    #[strum(to_string = "read")]
    Read,
    #[strum(to_string = "write_without_response")]
    WriteWithoutResponse,
    #[strum(to_string = "write")]
    Write,
    #[strum(to_string = "notify")]
    Notify,
    #[strum(to_string = "indicate")]
    Indicate,
    #[strum(to_string = "signed_write")]
    SignedWrite,
    #[strum(to_string = "extended")]
    Extended,
}

/// Profile document field names keyed by property, in enumeration order.
const DOCUMENT_FIELDS: [(Property, &str); 8] = [
    (Property::Broadcast, "Broadcast"),
    (Property::Read, "Read"),
    (Property::WriteWithoutResponse, "WriteWithoutResponse"),
    (Property::Write, "Write"),
    (Property::Notify, "Notify"),
    (Property::Indicate, "Indicate"),
    (Property::SignedWrite, "SignedWrite"),
    (Property::Extended, "Extended"),
];

impl Property {
    /// Returns the element name used for this flag inside a `Properties` block.
    #[must_use]
    pub fn document_field(self) -> &'static str {
        DOCUMENT_FIELDS
            .iter()
            .find_map(|(property, field)| (*property == self).then_some(*field))
            .unwrap_or_default()
    }

    /// Resolves a `Properties` element name back to its flag.
    #[must_use]
    pub fn from_document_field(field: &str) -> Option<Self> {
        DOCUMENT_FIELDS
            .iter()
            .find_map(|(property, name)| (*name == field).then_some(*property))
    }
}

/// A set of characteristic property flags.
///
/// Equality is set equality; the order in which flags were added is irrelevant.
///
/// ```
/// use gattcheck::{Property, PropertySet};
///
/// let left: PropertySet = [Property::Write, Property::Read].into_iter().collect();
/// let right: PropertySet = [Property::Read, Property::Write].into_iter().collect();
/// assert_eq!(left, right);
/// assert_eq!("read,write", left.to_string());
/// ```
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash)]
pub struct PropertySet(EnumSet<Property>);

impl PropertySet {
    /// Creates an empty set.
    #[must_use]
    pub fn empty() -> Self {
        Self(EnumSet::new())
    }

    /// Returns a copy of this set with `property` added.
    #[must_use]
    pub fn with(mut self, property: Property) -> Self {
        self.0.insert(property);
        self
    }

    /// Adds a flag, returning whether it was newly inserted.
    pub fn insert(&mut self, property: Property) -> bool {
        self.0.insert(property)
    }

    #[must_use]
    pub fn contains(&self, property: Property) -> bool {
        self.0.contains(property)
    }

    /// Returns whether every flag in `other` is also in this set.
    #[must_use]
    pub fn is_superset(&self, other: &Self) -> bool {
        self.0.is_superset(other.0)
    }

    /// Returns the flags in this set that are absent from `other`.
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        Self(self.0.difference(other.0))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates flags in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = Property> + '_ {
        self.0.iter()
    }
}

impl FromIterator<Property> for PropertySet {
    fn from_iter<T: IntoIterator<Item = Property>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Display for PropertySet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let labels: Vec<String> = self.iter().map(|property| property.to_string()).collect();
        write!(f, "{}", labels.join(","))
    }
}

impl Serialize for PropertySet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(self.iter().map(|property| property.to_string()))
    }
}

/// How strongly a reference document requires a characteristic.
#[derive(
    Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, StrumDisplay, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Requirement {
    /// Every generated document uses this value.
    #[default]
    Mandatory,
    Optional,
    Excluded,
}

/// A characteristic of a GATT service.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Characteristic {
    name: String,
    id: GattUuid,
    properties: PropertySet,
    requirement: Requirement,
}

impl Characteristic {
    /// Creates a mandatory characteristic.
    #[must_use]
    pub fn new(name: impl Into<String>, id: GattUuid, properties: PropertySet) -> Self {
        Self {
            name: name.into(),
            id,
            properties,
            requirement: Requirement::Mandatory,
        }
    }

    #[must_use]
    pub fn with_requirement(mut self, requirement: Requirement) -> Self {
        self.requirement = requirement;
        self
    }

    /// Returns the human-readable name, which may be empty.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn id(&self) -> GattUuid {
        self.id
    }

    #[must_use]
    pub fn properties(&self) -> PropertySet {
        self.properties
    }

    #[must_use]
    pub fn requirement(&self) -> Requirement {
        self.requirement
    }
}

/// A GATT service and its characteristics, in discovery or document order.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Service {
    name: String,
    id: GattUuid,
    characteristics: Vec<Characteristic>,
}

impl Service {
    /// Creates a service with no characteristics.
    #[must_use]
    pub fn new(name: impl Into<String>, id: GattUuid) -> Self {
        Self {
            name: name.into(),
            id,
            characteristics: Vec::new(),
        }
    }

    /// Appends a characteristic to this service.
    ///
    /// # Errors
    ///
    /// Returns an error if a characteristic with the same id already exists.
    pub fn push_characteristic(
        &mut self,
        characteristic: Characteristic,
    ) -> Result<(), ProfileError> {
        if self.find_characteristic(&characteristic.id).is_some() {
            return Err(ProfileError::DuplicateCharacteristic {
                service: self.id,
                characteristic: characteristic.id,
            });
        }
        self.characteristics.push(characteristic);
        Ok(())
    }

    /// Builder-style variant of [`Service::push_characteristic`].
    ///
    /// # Errors
    ///
    /// Returns an error if a characteristic with the same id already exists.
    pub fn with_characteristic(
        mut self,
        characteristic: Characteristic,
    ) -> Result<Self, ProfileError> {
        self.push_characteristic(characteristic)?;
        Ok(self)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn id(&self) -> GattUuid {
        self.id
    }

    #[must_use]
    pub fn characteristics(&self) -> &[Characteristic] {
        &self.characteristics
    }

    #[must_use]
    pub fn characteristic_count(&self) -> usize {
        self.characteristics.len()
    }

    /// Finds a characteristic of this service by id.
    #[must_use]
    pub fn find_characteristic(&self, id: &GattUuid) -> Option<&Characteristic> {
        self.characteristics
            .iter()
            .find(|characteristic| characteristic.id == *id)
    }

    /// Returns the name when present, otherwise the UUID.
    #[must_use]
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            self.id.to_string()
        } else {
            self.name.clone()
        }
    }
}

/// The root of a GATT profile: one device and its services.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Device {
    name: String,
    services: Vec<Service>,
}

impl Device {
    /// Creates a device with no services.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            services: Vec::new(),
        }
    }

    /// Appends a service to this device.
    ///
    /// # Errors
    ///
    /// Returns an error if a service with the same id already exists.
    pub fn push_service(&mut self, service: Service) -> Result<(), ProfileError> {
        if self.find_service(&service.id).is_some() {
            return Err(ProfileError::DuplicateService {
                service: service.id,
            });
        }
        self.services.push(service);
        Ok(())
    }

    /// Builder-style variant of [`Device::push_service`].
    ///
    /// # Errors
    ///
    /// Returns an error if a service with the same id already exists.
    pub fn with_service(mut self, service: Service) -> Result<Self, ProfileError> {
        self.push_service(service)?;
        Ok(self)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn services(&self) -> &[Service] {
        &self.services
    }

    #[must_use]
    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    /// Finds a service by id.
    #[must_use]
    pub fn find_service(&self, id: &GattUuid) -> Option<&Service> {
        self.services.iter().find(|service| service.id == *id)
    }

    pub(crate) fn find_service_mut(&mut self, id: &GattUuid) -> Option<&mut Service> {
        self.services.iter_mut().find(|service| service.id == *id)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use enumset::EnumSet;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn set(properties: &[Property]) -> PropertySet {
        properties.iter().copied().collect()
    }

    #[test]
    fn document_fields_cover_every_property_in_order() {
        let from_table: Vec<Property> = DOCUMENT_FIELDS
            .iter()
            .map(|(property, _field)| *property)
            .collect();
        let declared: Vec<Property> = EnumSet::<Property>::all().iter().collect();
        assert_eq!(declared, from_table);

        for property in EnumSet::<Property>::all() {
            assert_eq!(
                Some(property),
                Property::from_document_field(property.document_field())
            );
        }
    }

    #[test]
    fn from_document_field_rejects_unknown_names() {
        assert_eq!(None, Property::from_document_field("read"));
        assert_eq!(None, Property::from_document_field("Reliable"));
    }

    #[rstest]
    #[case(&[], "none")]
    #[case(&[Property::Notify, Property::Read], "read,notify")]
    #[case(
        &[Property::Extended, Property::WriteWithoutResponse],
        "write_without_response,extended"
    )]
    fn property_set_displays_in_enumeration_order(
        #[case] properties: &[Property],
        #[case] expected: &str,
    ) {
        assert_eq!(expected, set(properties).to_string());
    }

    #[test]
    fn property_set_superset_and_difference() {
        let required = set(&[Property::Read, Property::Write]);
        let observed = set(&[Property::Read, Property::Notify]);

        assert!(!observed.is_superset(&required));
        assert_eq!(set(&[Property::Write]), required.difference(&observed));
        assert!(set(&[Property::Read, Property::Write, Property::Notify]).is_superset(&required));
    }

    #[test]
    fn property_set_serializes_as_labels() {
        let json = serde_json::to_string(&set(&[Property::Indicate, Property::Read]))
            .expect("property set should serialize");
        assert_eq!(r#"["read","indicate"]"#, json);
    }

    #[rstest]
    #[case("mandatory", Requirement::Mandatory)]
    #[case("Mandatory", Requirement::Mandatory)]
    #[case("OPTIONAL", Requirement::Optional)]
    #[case("excluded", Requirement::Excluded)]
    fn requirement_parses_case_insensitively(#[case] input: &str, #[case] expected: Requirement) {
        assert_eq!(Ok(expected), input.parse::<Requirement>());
    }

    #[test]
    fn push_service_rejects_duplicate_ids() {
        let mut device = Device::new("Sensor");
        device
            .push_service(Service::new("Heart Rate", GattUuid::from_u16(0x180D)))
            .expect("first service should be accepted");

        let result = device.push_service(Service::new("", GattUuid::from_u16(0x180D)));

        assert_matches!(result, Err(ProfileError::DuplicateService { service }) if service == GattUuid::from_u16(0x180D));
        assert_eq!(1, device.service_count());
    }

    #[test]
    fn push_characteristic_rejects_duplicate_ids() {
        let mut service = Service::new("Heart Rate", GattUuid::from_u16(0x180D));
        let characteristic = Characteristic::new(
            "Heart Rate Measurement",
            GattUuid::from_u16(0x2A37),
            set(&[Property::Notify]),
        );
        service
            .push_characteristic(characteristic.clone())
            .expect("first characteristic should be accepted");

        let result = service.push_characteristic(characteristic);

        assert_matches!(result, Err(ProfileError::DuplicateCharacteristic { .. }));
        assert_eq!(1, service.characteristic_count());
    }

    #[test]
    fn counts_follow_structure() {
        let service = Service::new("Heart Rate", GattUuid::from_u16(0x180D))
            .with_characteristic(Characteristic::new(
                "",
                GattUuid::from_u16(0x2A37),
                PropertySet::empty(),
            ))
            .and_then(|service| {
                service.with_characteristic(Characteristic::new(
                    "",
                    GattUuid::from_u16(0x2A38),
                    PropertySet::empty(),
                ))
            })
            .expect("distinct characteristics should be accepted");
        let device = Device::new("Sensor")
            .with_service(service)
            .and_then(|device| device.with_service(Service::new("", GattUuid::from_u16(0x180A))))
            .expect("distinct services should be accepted");

        assert_eq!(2, device.service_count());
        assert_eq!(2, device.services()[0].characteristic_count());
        assert_eq!(0, device.services()[1].characteristic_count());
        assert!(device.find_service(&GattUuid::from_u16(0x1800)).is_none());
        assert_eq!(
            Some(GattUuid::from_u16(0x2A38)),
            device.services()[0]
                .find_characteristic(&GattUuid::from_u16(0x2A38))
                .map(Characteristic::id)
        );
    }
}
