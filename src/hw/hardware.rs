use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::info;

use super::btleplug_backend::BtleplugBackend;
use super::discovery::DiscoveryEvent;
use super::fake_backend::{FakeBackend, FakeBackendConfig};
use super::filter::DeviceFilter;
use super::model::{FoundDevice, ScanOptions};
use crate::error::InteractionError;

/// Builds a hardware client backed by `btleplug`.
///
/// The platform manager is created lazily on first use so that building the
/// client never touches the radio.
#[must_use]
pub(crate) fn real_hardware_client() -> Box<dyn HardwareClient> {
    Box::new(BtleplugBackend::new())
}

/// Builds a hardware client backed by fixture data.
#[must_use]
pub(crate) fn fake_hardware_client(config: FakeBackendConfig) -> Box<dyn HardwareClient> {
    info!("using fake BLE backend");
    Box::new(FakeBackend::new(config))
}

/// Finds and connects to BLE peripherals.
#[async_trait]
pub trait HardwareClient: Send + Sync {
    /// Lists peripherals seen within the scan window, de-duplicated by id.
    async fn scan(&self, options: &ScanOptions) -> Result<Vec<FoundDevice>, InteractionError>;

    /// Scans until the first peripheral accepted by `filter` appears.
    ///
    /// Real backends scan without a deadline; callers bound this with a timeout.
    async fn find_first(&self, filter: &DeviceFilter) -> Result<FoundDevice, InteractionError>;

    /// Connects to a peripheral returned by [`HardwareClient::find_first`].
    async fn connect(
        &self,
        device: &FoundDevice,
    ) -> Result<Box<dyn GattConnection>, InteractionError>;
}

/// A live connection able to report its GATT layout.
#[async_trait]
pub trait GattConnection: Send + Sync {
    fn device(&self) -> &FoundDevice;

    /// Walks services, characteristics and descriptors, sending one event per
    /// step and a final [`DiscoveryEvent::Completed`].
    ///
    /// # Errors
    ///
    /// Returns an error if service discovery fails as a whole or the receiver
    /// goes away. Failures scoped to one service are reported as events.
    async fn discover(&self, events: mpsc::Sender<DiscoveryEvent>) -> Result<(), InteractionError>;

    async fn disconnect(self: Box<Self>) -> Result<(), InteractionError>;
}

/// Sends one discovery event, mapping a dropped receiver to an error.
pub(crate) async fn send_event(
    events: &mpsc::Sender<DiscoveryEvent>,
    event: DiscoveryEvent,
) -> Result<(), InteractionError> {
    events
        .send(event)
        .await
        .map_err(|_closed| InteractionError::DiscoveryChannelClosed)
}
