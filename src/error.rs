use std::path::PathBuf;

use thiserror::Error;

use crate::profile::GattUuid;

/// Errors returned by BLE interaction operations.
#[derive(Debug, Error)]
pub enum InteractionError {
    #[error("BLE operation failed")]
    Ble(#[from] btleplug::Error),
    #[error("no BLE adapters were found")]
    NoAdapters,
    #[error("no device named `{name}` was found in the fake fixture")]
    NoMatchingFixtureDevice { name: String },
    #[error("device `{device_id}` is no longer known to the BLE adapter")]
    UnknownPeripheral { device_id: String },
    #[error("failed to discover services on `{device_id}`: {reason}")]
    ServiceDiscovery { device_id: String, reason: String },
    #[error("the discovery event channel closed before discovery completed")]
    DiscoveryChannelClosed,
    #[error(transparent)]
    Fixture(#[from] FixtureError),
}

/// Errors returned when parsing fake interaction fixtures.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("the fake discovery fixture is empty")]
    EmptyFixture,
    #[error("fixture records must contain four or five pipe-delimited fields")]
    InvalidRecordFieldCount,
    #[error("fixture records cannot contain empty mandatory fields")]
    EmptyRecordField,
    #[error("failed to parse RSSI value")]
    InvalidRssi(#[from] std::num::ParseIntError),
    #[error("manufacturer data `{value}` is not valid hexadecimal")]
    InvalidManufacturerData { value: String },
}

/// Errors raised while validating command-line configuration, before any radio activity.
#[derive(Debug, Error)]
pub enum CliConfigError {
    #[error("missing fake scan fixture while fake mode is enabled")]
    MissingFakeScanFixture,
    #[error("a device name is required")]
    EmptyDeviceName,
    #[error("device filter `{value}` is not valid hexadecimal")]
    MalformedFilter {
        value: String,
        source: hex::FromHexError,
    },
    #[error("device filter `{value}` must be exactly {expected} bytes")]
    InvalidFilterLength { value: String, expected: usize },
    #[error("scan duration must be at least {minimum:?}")]
    ScanDurationTooShort { minimum: std::time::Duration },
    #[error("failed to load fake profile")]
    FakeProfile(#[source] DocumentError),
}

/// Errors raised while building a profile model.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum ProfileError {
    #[error("`{value}` is not a valid GATT UUID")]
    InvalidUuid { value: String },
    #[error("service {service} is declared more than once")]
    DuplicateService { service: GattUuid },
    #[error("characteristic {characteristic} is declared more than once in service {service}")]
    DuplicateCharacteristic {
        service: GattUuid,
        characteristic: GattUuid,
    },
}

/// Errors raised by the profile document codec.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("malformed profile document: {message}")]
    Malformed { message: String },
    #[error("unknown characteristic requirement `{value}`")]
    InvalidRequirement { value: String },
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error("failed to encode profile document: {message}")]
    Encode { message: String },
    #[error("failed to read profile document `{path}`", path = path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write profile document `{path}`", path = path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Errors raised while loading a UUID name table.
#[derive(Debug, Error)]
pub enum UuidNameError {
    #[error("failed to open UUID name table `{path}`", path = path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse UUID name table")]
    Csv(#[from] csv::Error),
}

/// Errors returned by telemetry initialisation.
#[derive(Debug, Error)]
pub(crate) enum TelemetryError {
    #[error("failed to install tracing subscriber")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}
