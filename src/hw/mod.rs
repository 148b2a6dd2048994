mod assigned;
mod btleplug_backend;
mod discovery;
mod fake_backend;
mod filter;
mod hardware;
mod model;

pub(crate) use self::discovery::DISCOVERY_CHANNEL_CAPACITY;
pub use self::discovery::{
    DiscoveredProfile, DiscoveryAccumulator, DiscoveryEvent, RawCharacteristic, RawDescriptor,
    RawService,
};
pub(crate) use self::fake_backend::{FakeBackendConfig, ScanFixture};
pub use self::filter::DeviceFilter;
pub use self::hardware::{GattConnection, HardwareClient};
pub(crate) use self::hardware::{fake_hardware_client, real_hardware_client};
pub use self::model::{
    DEFAULT_MAX_SCAN_RESULTS, DEFAULT_SCAN_DURATION, FoundDevice, MIN_SCAN_DURATION, ScanOptions,
};
