use std::fs;
use std::path::{Path, PathBuf};

use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, instrument};

use super::model::{Characteristic, Device, Property, PropertySet, Requirement, Service};
use super::uuid::GattUuid;
use crate::error::DocumentError;

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;
const ROOT_TAG: &str = "device";
const MANDATORY: &str = "Mandatory";
const EXCLUDED: &str = "Excluded";

#[derive(Debug, Serialize, Deserialize)]
struct DeviceNode {
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "service", default)]
    services: Vec<ServiceNode>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ServiceNode {
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "@uuid", alias = "@id")]
    uuid: String,
    #[serde(rename = "characteristic", default)]
    characteristics: Vec<CharacteristicNode>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CharacteristicNode {
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "@uuid", alias = "@id")]
    uuid: String,
    #[serde(rename = "Requirement", default)]
    requirement: Option<String>,
    #[serde(rename = "Properties", default)]
    properties: PropertyFields,
}

/// The eight `Mandatory`/`Excluded` fields of a `Properties` block.
#[derive(Debug, Default)]
struct PropertyFields(PropertySet);

impl Serialize for PropertyFields {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut fields = serializer.serialize_struct("Properties", 8)?;
        for property in enumset::EnumSet::<Property>::all() {
            let value = if self.0.contains(property) {
                MANDATORY
            } else {
                EXCLUDED
            };
            fields.serialize_field(property.document_field(), value)?;
        }
        fields.end()
    }
}

/// Decoding view of a `Properties` block; unknown children are skipped.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PropertyValues {
    #[serde(rename = "Broadcast")]
    broadcast: Option<String>,
    #[serde(rename = "Read")]
    read: Option<String>,
    #[serde(rename = "WriteWithoutResponse")]
    write_without_response: Option<String>,
    #[serde(rename = "Write")]
    write: Option<String>,
    #[serde(rename = "Notify")]
    notify: Option<String>,
    #[serde(rename = "Indicate")]
    indicate: Option<String>,
    #[serde(rename = "SignedWrite")]
    signed_write: Option<String>,
    #[serde(rename = "Extended")]
    extended: Option<String>,
}

impl PropertyValues {
    fn value(&self, property: Property) -> Option<&str> {
        let value = match property {
            Property::Broadcast => &self.broadcast,
            Property::Read => &self.read,
            Property::WriteWithoutResponse => &self.write_without_response,
            Property::Write => &self.write,
            Property::Notify => &self.notify,
            Property::Indicate => &self.indicate,
            Property::SignedWrite => &self.signed_write,
            Property::Extended => &self.extended,
        };
        value.as_deref()
    }
}

impl<'de> Deserialize<'de> for PropertyFields {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let values = PropertyValues::deserialize(deserializer)?;
        let properties = enumset::EnumSet::<Property>::all()
            .iter()
            .filter(|property| values.value(*property).map(str::trim) == Some(MANDATORY))
            .collect();
        Ok(Self(properties))
    }
}

/// Decodes a profile document into a device model.
///
/// UUIDs are canonicalised, absent property fields count as `Excluded`, and
/// unknown elements are ignored.
///
/// # Errors
///
/// Returns an error if the document is not well-formed, a UUID or
/// requirement is invalid, or an id is declared twice in the same scope.
#[instrument(skip(text), level = "debug", fields(len = text.len()))]
pub fn decode(text: &str) -> Result<Device, DocumentError> {
    let node: DeviceNode =
        quick_xml::de::from_str(text).map_err(|error| DocumentError::Malformed {
            message: error.to_string(),
        })?;

    let mut device = Device::new(node.name);
    for service_node in node.services {
        let mut service = Service::new(service_node.name, service_node.uuid.parse::<GattUuid>()?);
        for characteristic_node in service_node.characteristics {
            let requirement = match characteristic_node.requirement.as_deref().map(str::trim) {
                None | Some("") => Requirement::default(),
                Some(value) => value.parse::<Requirement>().map_err(|_| {
                    DocumentError::InvalidRequirement {
                        value: value.to_string(),
                    }
                })?,
            };
            service.push_characteristic(
                Characteristic::new(
                    characteristic_node.name,
                    characteristic_node.uuid.parse::<GattUuid>()?,
                    characteristic_node.properties.0,
                )
                .with_requirement(requirement),
            )?;
        }
        device.push_service(service)?;
    }

    debug!(
        device = device.name(),
        services = device.service_count(),
        "decoded profile document"
    );
    Ok(device)
}

/// Encodes a device model as a profile document.
///
/// The output is deterministic: services and characteristics keep their
/// stored order and property fields always follow the enumeration order.
///
/// # Errors
///
/// Returns an error if the serializer rejects the document.
pub fn encode(device: &Device) -> Result<String, DocumentError> {
    let node = DeviceNode {
        name: device.name().to_string(),
        services: device
            .services()
            .iter()
            .map(|service| ServiceNode {
                name: service.name().to_string(),
                uuid: service.id().to_string(),
                characteristics: service
                    .characteristics()
                    .iter()
                    .map(|characteristic| CharacteristicNode {
                        name: characteristic.name().to_string(),
                        uuid: characteristic.id().to_string(),
                        requirement: Some(characteristic.requirement().to_string()),
                        properties: PropertyFields(characteristic.properties()),
                    })
                    .collect(),
            })
            .collect(),
    };

    let mut body = String::new();
    let mut serializer = quick_xml::se::Serializer::with_root(&mut body, Some(ROOT_TAG))
        .map_err(|error| DocumentError::Encode {
            message: error.to_string(),
        })?;
    serializer.indent(' ', 4);
    node.serialize(serializer)
        .map_err(|error| DocumentError::Encode {
            message: error.to_string(),
        })?;

    Ok(format!("{XML_DECLARATION}\n{body}\n"))
}

/// Reads and decodes a profile document from disk.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid document.
pub fn load(path: &Path) -> Result<Device, DocumentError> {
    let text = fs::read_to_string(path).map_err(|source| DocumentError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    decode(&text)
}

/// Encodes `device` into `<output_dir>/<device name>.xml`, creating the directory if needed.
///
/// # Errors
///
/// Returns an error if encoding fails or the file cannot be written.
#[instrument(skip(device), level = "debug", fields(device = device.name()))]
pub fn store(output_dir: &Path, device: &Device) -> Result<PathBuf, DocumentError> {
    let document = encode(device)?;
    fs::create_dir_all(output_dir).map_err(|source| DocumentError::Write {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let path = output_dir.join(format!("{}.xml", file_stem(device.name())));
    fs::write(&path, document).map_err(|source| DocumentError::Write {
        path: path.clone(),
        source,
    })?;
    debug!(path = %path.display(), "wrote profile document");
    Ok(path)
}

fn file_stem(device_name: &str) -> String {
    let stem: String = device_name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if stem.is_empty() || stem.chars().all(|c| c == '.') {
        "device".to_string()
    } else {
        stem
    }
}
