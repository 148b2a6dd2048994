use std::path::PathBuf;
use std::time::Duration;

use bon::Builder;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::level_filters::LevelFilter;

use crate::error::{CliConfigError, FixtureError};
use crate::hw::{
    DEFAULT_MAX_SCAN_RESULTS, DeviceFilter, FakeBackendConfig, ScanFixture, ScanOptions,
};
use crate::profile::{self, Device, GattUuid};
use crate::session::DEFAULT_CONNECT_TIMEOUT;

/// Default CSV table naming vendor services.
pub const DEFAULT_SERVICE_NAMES: &str = "CustomServices.csv";
/// Default CSV table naming vendor characteristics.
pub const DEFAULT_CHARACTERISTIC_NAMES: &str = "CustomCharacteristics.csv";

/// Command-line options for the GATT profile checker.
#[derive(Debug, Parser)]
#[command(
    name = "gattcheck",
    about = "Capture BLE GATT profiles and check devices against them."
)]
pub struct Args {
    /// Overrides `RUST_LOG` for this run.
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,
    /// Output format; defaults to `pretty` on a terminal and `json` otherwise.
    #[arg(long, global = true, value_enum)]
    output_format: Option<OutputFormat>,
    /// Bound on scanning for and connecting to the device (e.g. `15s`, `1m`).
    #[arg(long, global = true, value_parser = parse_duration, default_value = "15s")]
    connect_timeout: Duration,
    /// CSV table of vendor service names.
    #[arg(long, global = true, default_value = DEFAULT_SERVICE_NAMES)]
    service_names: PathBuf,
    /// CSV table of vendor characteristic names.
    #[arg(long, global = true, default_value = DEFAULT_CHARACTERISTIC_NAMES)]
    characteristic_names: PathBuf,
    /// Uses the fake BLE backend with fixture-driven discovery.
    #[arg(long, global = true)]
    fake: bool,
    /// Fake scan fixtures in the form `adapter|device_id|local_name|rssi[|manufacturer_hex];...`.
    #[arg(long, global = true, requires = "fake", required_if_eq("fake", "true"))]
    fake_scan: Option<ScanFixture>,
    /// Profile document served by fake peripherals.
    #[arg(long, global = true, requires = "fake")]
    fake_profile: Option<PathBuf>,
    /// Service whose characteristic discovery fails on fake peripherals.
    #[arg(long, global = true, requires = "fake")]
    fake_failing_service: Option<GattUuid>,
    /// Characteristic whose descriptor discovery fails on fake peripherals.
    #[arg(long, global = true, requires = "fake")]
    fake_failing_descriptors: Option<GattUuid>,
    /// Artificial fake scan delay (e.g. `250ms`, `2s`).
    #[arg(long, global = true, requires = "fake", value_parser = parse_duration)]
    fake_discovery_delay: Option<Duration>,
    #[command(subcommand)]
    command: Command,
}

impl Args {
    /// Creates argument values directly without CLI parsing.
    ///
    /// ```
    /// use gattcheck::{Args, Command, ReadArgs};
    ///
    /// let args = Args::new(Command::Read(ReadArgs::new("sensor.xml")));
    /// let _ = args;
    /// ```
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            log_level: None,
            output_format: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            service_names: PathBuf::from(DEFAULT_SERVICE_NAMES),
            characteristic_names: PathBuf::from(DEFAULT_CHARACTERISTIC_NAMES),
            fake: false,
            fake_scan: None,
            fake_profile: None,
            fake_failing_service: None,
            fake_failing_descriptors: None,
            fake_discovery_delay: None,
            command,
        }
    }

    #[must_use]
    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level
    }

    #[must_use]
    pub fn output_format(&self) -> Option<OutputFormat> {
        self.output_format
    }

    /// Collects run-wide settings, falling back to `default_format` when no
    /// output format was requested.
    #[must_use]
    pub fn run_options(&self, default_format: OutputFormat) -> RunOptions {
        RunOptions::builder()
            .maybe_log_level(self.log_level)
            .output_format(self.output_format.unwrap_or(default_format))
            .connect_timeout(self.connect_timeout)
            .service_names(self.service_names.clone())
            .characteristic_names(self.characteristic_names.clone())
            .build()
    }

    /// Splits parsed CLI arguments into command and optional fake-client settings.
    ///
    /// # Errors
    ///
    /// Returns an error if fake backend configuration is invalid.
    pub fn into_command_and_fake_args(self) -> anyhow::Result<(Command, Option<FakeArgs>)> {
        let Args {
            fake,
            fake_scan,
            fake_profile,
            fake_failing_service,
            fake_failing_descriptors,
            fake_discovery_delay,
            command,
            ..
        } = self;

        let fake_args = if fake {
            let Some(scan_fixture) = fake_scan else {
                return Err(CliConfigError::MissingFakeScanFixture.into());
            };
            let profile = fake_profile
                .map(|path| profile::load(&path))
                .transpose()
                .map_err(CliConfigError::FakeProfile)?;
            Some(FakeArgs {
                scan_fixture,
                profile,
                failing_service: fake_failing_service,
                failing_descriptors: fake_failing_descriptors,
                discovery_delay: fake_discovery_delay.unwrap_or(Duration::ZERO),
            })
        } else {
            None
        };

        Ok((command, fake_args))
    }
}

/// Settings shared by every command.
#[derive(Debug, Clone, Builder)]
pub struct RunOptions {
    log_level: Option<LogLevel>,
    #[builder(default = OutputFormat::Pretty)]
    output_format: OutputFormat,
    #[builder(default = DEFAULT_CONNECT_TIMEOUT)]
    connect_timeout: Duration,
    #[builder(default = PathBuf::from(DEFAULT_SERVICE_NAMES))]
    service_names: PathBuf,
    #[builder(default = PathBuf::from(DEFAULT_CHARACTERISTIC_NAMES))]
    characteristic_names: PathBuf,
}

impl RunOptions {
    #[must_use]
    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level
    }

    #[must_use]
    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    #[must_use]
    pub fn service_names(&self) -> &std::path::Path {
        &self.service_names
    }

    #[must_use]
    pub fn characteristic_names(&self) -> &std::path::Path {
        &self.characteristic_names
    }
}

/// Fake backend arguments for programmatic runs.
#[derive(Debug, Builder)]
pub struct FakeArgs {
    #[builder(with = |value: &str| -> std::result::Result<_, FixtureError> { value.parse() })]
    scan_fixture: ScanFixture,
    profile: Option<Device>,
    failing_service: Option<GattUuid>,
    failing_descriptors: Option<GattUuid>,
    #[builder(default)]
    discovery_delay: Duration,
}

impl FakeArgs {
    pub(crate) fn into_backend_config(self) -> FakeBackendConfig {
        let Self {
            scan_fixture,
            profile,
            failing_service,
            failing_descriptors,
            discovery_delay,
        } = self;

        FakeBackendConfig::builder()
            .scan_fixture(scan_fixture)
            .maybe_profile(profile)
            .maybe_failing_service(failing_service)
            .maybe_failing_descriptors(failing_descriptors)
            .discovery_delay(discovery_delay)
            .build()
    }
}

/// Supported CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List nearby BLE devices.
    Scan(ScanArgs),
    /// Connect to a device and print its GATT profile, optionally saving it as a document.
    Connect(ConnectArgs),
    /// Print the contents of a profile document.
    Read(ReadArgs),
    /// Connect to a device and check it against a profile document.
    Compare(CompareArgs),
}

#[derive(Debug, Clone, clap::Args)]
pub struct ScanArgs {
    /// How long to listen for advertisements (at least 1s).
    #[arg(long, value_parser = parse_duration, default_value = "12s")]
    duration: Duration,
    /// Stop after this many distinct devices.
    #[arg(long, default_value_t = DEFAULT_MAX_SCAN_RESULTS)]
    max_results: usize,
}

impl ScanArgs {
    #[must_use]
    pub fn new(duration: Duration, max_results: usize) -> Self {
        Self {
            duration,
            max_results,
        }
    }

    pub(crate) fn options(&self) -> Result<ScanOptions, CliConfigError> {
        ScanOptions::new(self.duration, self.max_results)
    }
}

/// Selects the device to connect to.
#[derive(Debug, Clone, clap::Args)]
pub struct TargetArgs {
    /// Advertised device name, matched case-insensitively.
    #[arg(long)]
    device: String,
    /// Last three bytes of the advertised manufacturer data as 6 hex digits.
    #[arg(long, value_name = "HEX")]
    id: Option<String>,
}

impl TargetArgs {
    #[must_use]
    pub fn new(device: impl Into<String>, id: Option<&str>) -> Self {
        Self {
            device: device.into(),
            id: id.map(str::to_string),
        }
    }

    pub(crate) fn filter(&self) -> Result<DeviceFilter, CliConfigError> {
        DeviceFilter::new(&self.device, self.id.as_deref())
    }
}

#[derive(Debug, Clone, clap::Args)]
pub struct ConnectArgs {
    #[command(flatten)]
    target: TargetArgs,
    /// Save the discovered profile as `<device name>.xml`.
    #[arg(long)]
    emit_document: bool,
    /// Directory for saved documents.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

impl ConnectArgs {
    #[must_use]
    pub fn new(target: TargetArgs, emit_document: bool, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            target,
            emit_document,
            output_dir: output_dir.into(),
        }
    }

    pub(crate) fn target(&self) -> &TargetArgs {
        &self.target
    }

    pub(crate) fn emit_document(&self) -> bool {
        self.emit_document
    }

    pub(crate) fn output_dir(&self) -> &std::path::Path {
        &self.output_dir
    }
}

#[derive(Debug, Clone, clap::Args)]
pub struct ReadArgs {
    /// Profile document to print.
    #[arg(long)]
    file: PathBuf,
}

impl ReadArgs {
    #[must_use]
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self { file: file.into() }
    }

    pub(crate) fn file(&self) -> &std::path::Path {
        &self.file
    }
}

#[derive(Debug, Clone, clap::Args)]
pub struct CompareArgs {
    #[command(flatten)]
    target: TargetArgs,
    /// Reference profile document.
    #[arg(long)]
    file: PathBuf,
}

impl CompareArgs {
    #[must_use]
    pub fn new(target: TargetArgs, file: impl Into<PathBuf>) -> Self {
        Self {
            target,
            file: file.into(),
        }
    }

    pub(crate) fn target(&self) -> &TargetArgs {
        &self.target
    }

    pub(crate) fn file(&self) -> &std::path::Path {
        &self.file
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub(crate) fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::ERROR,
            Self::Warn => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Tables and colour for people.
    Pretty,
    /// One JSON document per command.
    Json,
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime::parse_duration(value).map_err(|error| error.to_string())
}
