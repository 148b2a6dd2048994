use std::time::Duration;

use derive_more::Display;
use owo_colors::OwoColorize;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{Instrument, Span, debug, info, info_span, instrument, warn};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::conformance::{self, ConformanceReport};
use crate::error::InteractionError;
use crate::hw::{
    DISCOVERY_CHANNEL_CAPACITY, DeviceFilter, DiscoveredProfile, DiscoveryAccumulator,
    FoundDevice, GattConnection, HardwareClient, ScanOptions,
};
use crate::profile::{Device, UuidNames};

/// Default bound on the scan-and-connect phase.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// What a session does once started.
#[derive(Debug, Clone)]
pub enum SessionMode {
    /// List nearby peripherals without connecting.
    Scan(ScanOptions),
    /// Connect and build the observed profile.
    Connect {
        filter: DeviceFilter,
        emit_document: bool,
    },
    /// Redisplay a decoded profile document.
    Read { document: Device },
    /// Connect and check the observed profile against a reference.
    Compare {
        filter: DeviceFilter,
        reference: Device,
    },
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Display)]
pub enum SessionState {
    #[display("idle")]
    Idle,
    #[display("scanning")]
    Scanning,
    #[display("connecting")]
    Connecting,
    #[display("discovering")]
    Discovering,
    #[display("reporting")]
    Reporting,
    #[display("emitting")]
    Emitting,
    #[display("terminal")]
    Terminal,
}

/// How a session ended.
#[derive(Debug)]
pub enum SessionOutcome {
    Scanned(Vec<FoundDevice>),
    Discovered {
        device: FoundDevice,
        profile: DiscoveredProfile,
        emit_document: bool,
    },
    Compared {
        device: FoundDevice,
        profile: DiscoveredProfile,
        reference: Device,
        report: ConformanceReport,
    },
    Document(Device),
    /// No matching peripheral was found and connected within the timeout.
    TimedOut { after: Duration },
}

/// One run of the tool against one peripheral.
///
/// A session owns everything that used to be process-wide: the mode, the
/// name tables, the connect timeout and the current state.
#[derive(Debug)]
pub struct Session {
    mode: SessionMode,
    service_names: UuidNames,
    characteristic_names: UuidNames,
    connect_timeout: Duration,
    state: SessionState,
    history: Vec<SessionState>,
}

impl Session {
    #[must_use]
    pub fn new(mode: SessionMode) -> Self {
        Self {
            mode,
            service_names: UuidNames::default(),
            characteristic_names: UuidNames::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            state: SessionState::Idle,
            history: vec![SessionState::Idle],
        }
    }

    /// Sets the tables used to name services and characteristics the device leaves unnamed.
    #[must_use]
    pub fn with_names(mut self, service_names: UuidNames, characteristic_names: UuidNames) -> Self {
        self.service_names = service_names;
        self.characteristic_names = characteristic_names;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    #[must_use]
    pub fn mode(&self) -> &SessionMode {
        &self.mode
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Every state entered so far, starting with `Idle`.
    #[must_use]
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    /// Drives the session to `Terminal`.
    ///
    /// # Errors
    ///
    /// Returns an error if BLE interaction fails. A connect timeout is an
    /// outcome, not an error.
    #[instrument(skip_all, level = "info", fields(mode = mode_name(&self.mode)))]
    pub async fn run(
        &mut self,
        hardware_client: &dyn HardwareClient,
    ) -> Result<SessionOutcome, InteractionError> {
        let result = match self.mode.clone() {
            SessionMode::Scan(options) => self.scan(hardware_client, &options).await,
            SessionMode::Read { document } => {
                self.transition(SessionState::Emitting);
                Ok(SessionOutcome::Document(document))
            }
            SessionMode::Connect {
                filter,
                emit_document,
            } => self
                .connect_and_discover(hardware_client, &filter)
                .await
                .map(|found| match found {
                    Some((device, profile)) => {
                        self.transition(if emit_document {
                            SessionState::Emitting
                        } else {
                            SessionState::Reporting
                        });
                        SessionOutcome::Discovered {
                            device,
                            profile,
                            emit_document,
                        }
                    }
                    None => SessionOutcome::TimedOut {
                        after: self.connect_timeout,
                    },
                }),
            SessionMode::Compare { filter, reference } => self
                .connect_and_discover(hardware_client, &filter)
                .await
                .map(|found| match found {
                    Some((device, profile)) => {
                        self.transition(SessionState::Reporting);
                        let report = conformance::compare(&reference, profile.device());
                        SessionOutcome::Compared {
                            device,
                            profile,
                            reference,
                            report,
                        }
                    }
                    None => SessionOutcome::TimedOut {
                        after: self.connect_timeout,
                    },
                }),
        };

        self.transition(SessionState::Terminal);
        result
    }

    async fn scan(
        &mut self,
        hardware_client: &dyn HardwareClient,
        options: &ScanOptions,
    ) -> Result<SessionOutcome, InteractionError> {
        self.transition(SessionState::Scanning);
        let devices = hardware_client
            .scan(options)
            .instrument(progress_span("Scanning for nearby devices"))
            .await?;
        info!(found = devices.len(), "scan complete");
        Ok(SessionOutcome::Scanned(devices))
    }

    /// Returns `None` when the scan-and-connect phase timed out.
    async fn connect_and_discover(
        &mut self,
        hardware_client: &dyn HardwareClient,
        filter: &DeviceFilter,
    ) -> Result<Option<(FoundDevice, DiscoveredProfile)>, InteractionError> {
        self.transition(SessionState::Scanning);
        let connect_timeout = self.connect_timeout;
        let span = progress_span(&format!("Scanning for {filter} and connecting"));
        let connected = timeout(
            connect_timeout,
            self.find_and_connect(hardware_client, filter)
                .instrument(span.clone()),
        )
        .await;
        let connection = match connected {
            Ok(Ok(connection)) => {
                span.pb_set_finish_message(&format!("{} Connected", "✓".green()));
                connection
            }
            Ok(Err(error)) => {
                span.pb_set_finish_message(&format!("{} Connection failed", "✗".red()));
                return Err(error);
            }
            Err(_elapsed) => {
                span.pb_set_finish_message(&format!("{} Timed out", "✗".red()));
                warn!(timeout = ?connect_timeout, "no matching device connected before timeout");
                return Ok(None);
            }
        };

        self.transition(SessionState::Discovering);
        let device = connection.device().clone();
        let device_name = device.local_name().unwrap_or(filter.name()).to_string();
        let discovered = self
            .discover(connection.as_ref(), device_name)
            .instrument(progress_span("Discovering services"))
            .await;

        if let Err(error) = connection.disconnect().await {
            debug!(%error, "failed to disconnect cleanly");
        }
        Ok(Some((device, discovered?)))
    }

    async fn find_and_connect(
        &mut self,
        hardware_client: &dyn HardwareClient,
        filter: &DeviceFilter,
    ) -> Result<Box<dyn GattConnection>, InteractionError> {
        let device = hardware_client.find_first(filter).await?;
        self.transition(SessionState::Connecting);
        hardware_client.connect(&device).await
    }

    async fn discover(
        &self,
        connection: &dyn GattConnection,
        device_name: String,
    ) -> Result<DiscoveredProfile, InteractionError> {
        let (sender, receiver) = mpsc::channel(DISCOVERY_CHANNEL_CAPACITY);
        let accumulator =
            DiscoveryAccumulator::new(device_name, &self.service_names, &self.characteristic_names);
        let (discovered, profile) =
            tokio::join!(connection.discover(sender), accumulator.consume(receiver));
        discovered?;
        Ok(profile)
    }

    fn transition(&mut self, next: SessionState) {
        info!(from = %self.state, to = %next, "session state changed");
        self.state = next;
        self.history.push(next);
    }
}

fn progress_span(message: &str) -> Span {
    let span = info_span!("progress");
    span.pb_set_message(message);
    span
}

fn mode_name(mode: &SessionMode) -> &'static str {
    match mode {
        SessionMode::Scan(_options) => "scan",
        SessionMode::Connect { .. } => "connect",
        SessionMode::Read { .. } => "read",
        SessionMode::Compare { .. } => "compare",
    }
}
