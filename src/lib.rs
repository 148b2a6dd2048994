mod app;
mod cli;
mod conformance;
mod error;
mod hw;
mod profile;
mod session;
mod telemetry;
mod terminal;
mod utils;

pub use app::{fake_hardware_client, real_hardware_client, run, run_with_clients};
pub use cli::{
    Args, Command, CommandOutcome, CompareArgs, ConnectArgs, DEFAULT_CHARACTERISTIC_NAMES,
    DEFAULT_SERVICE_NAMES, FakeArgs, LogLevel, OutputFormat, ReadArgs, RunOptions, ScanArgs,
    TargetArgs,
};
pub use conformance::{ConformanceReport, Discrepancy, compare};
pub use error::{
    CliConfigError, DocumentError, FixtureError, InteractionError, ProfileError, UuidNameError,
};
pub use hw::{
    DEFAULT_MAX_SCAN_RESULTS, DEFAULT_SCAN_DURATION, DeviceFilter, DiscoveredProfile,
    DiscoveryAccumulator, DiscoveryEvent, FoundDevice, GattConnection, HardwareClient,
    MIN_SCAN_DURATION, RawCharacteristic, RawDescriptor, RawService, ScanOptions,
};
pub use profile::{
    Characteristic, Device, GattUuid, Property, PropertySet, Requirement, Service, UuidNames,
    decode as decode_document, encode as encode_document, load as load_document,
    store as store_document,
};
pub use session::{
    DEFAULT_CONNECT_TIMEOUT, Session, SessionMode, SessionOutcome, SessionState,
};
pub use terminal::{SystemTerminalClient, TerminalClient};
