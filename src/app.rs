use std::io;

use anyhow::Result;
use tracing::instrument;

use crate::cli::{Command, CommandOutcome, FakeArgs, RunOptions};
use crate::hw::{
    HardwareClient, fake_hardware_client as build_fake_hardware_client,
    real_hardware_client as build_real_hardware_client,
};
use crate::telemetry;
use crate::terminal::{SystemTerminalClient, TerminalClient};

/// Creates a hardware client backed by the real BLE transport.
#[must_use]
pub fn real_hardware_client() -> Box<dyn HardwareClient> {
    build_real_hardware_client()
}

/// Creates a hardware client backed by fake BLE fixtures.
#[must_use]
pub fn fake_hardware_client(fake_args: FakeArgs) -> Box<dyn HardwareClient> {
    build_fake_hardware_client(fake_args.into_backend_config())
}

/// Runs the CLI command against the real process streams.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// use clap::Parser;
///
/// let args = gattcheck::Args::try_parse_from([
///     "gattcheck",
///     "--fake",
///     "--fake-scan",
///     "hci0|AA:BB:CC|Sensor|-43",
///     "scan",
///     "--duration",
///     "1s",
/// ])?;
/// let options = args.run_options(gattcheck::OutputFormat::Json);
/// let (command, maybe_fake_args) = args.into_command_and_fake_args()?;
/// let hardware_client = match maybe_fake_args {
///     Some(fake_args) => gattcheck::fake_hardware_client(fake_args),
///     None => gattcheck::real_hardware_client(),
/// };
/// let mut out = Vec::new();
/// let outcome = gattcheck::run(command, &mut out, hardware_client, options).await?;
/// assert_eq!(0, outcome.exit_code());
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, configuration is invalid,
/// BLE interaction fails, or output writing fails.
pub async fn run<W>(
    command: Command,
    out: &mut W,
    hardware_client: Box<dyn HardwareClient>,
    options: RunOptions,
) -> Result<CommandOutcome>
where
    W: io::Write,
{
    run_with_clients(
        command,
        out,
        &SystemTerminalClient,
        hardware_client,
        options,
    )
    .await
}

/// Runs the CLI command with injected clients.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// use clap::Parser;
///
/// struct FakeTerminal;
/// impl gattcheck::TerminalClient for FakeTerminal {
///     fn stdout_is_terminal(&self) -> bool { false }
///     fn stderr_is_terminal(&self) -> bool { false }
/// }
///
/// let args = gattcheck::Args::try_parse_from([
///     "gattcheck",
///     "--log-level",
///     "debug",
///     "--fake",
///     "--fake-scan",
///     "hci0|AA:BB:CC|Sensor|-43",
///     "connect",
///     "--device",
///     "sensor",
/// ])?;
/// let options = args.run_options(gattcheck::OutputFormat::Pretty);
/// let (command, maybe_fake_args) = args.into_command_and_fake_args()?;
/// let hardware_client = match maybe_fake_args {
///     Some(fake_args) => gattcheck::fake_hardware_client(fake_args),
///     None => gattcheck::real_hardware_client(),
/// };
/// let mut out = Vec::new();
/// gattcheck::run_with_clients(command, &mut out, &FakeTerminal, hardware_client, options)
///     .await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, configuration is invalid,
/// BLE interaction fails, or output writing fails.
#[instrument(
    skip(out, terminal_client, hardware_client, options),
    level = "info",
    fields(command = %command_name(&command), log_level = ?options.log_level())
)]
pub async fn run_with_clients<W>(
    command: Command,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    hardware_client: Box<dyn HardwareClient>,
    options: RunOptions,
) -> Result<CommandOutcome>
where
    W: io::Write,
{
    telemetry::initialise_tracing(
        "gattcheck",
        terminal_client.stderr_is_terminal(),
        options.log_level().map(|level| level.as_level_filter()),
    )?;

    match command {
        Command::Scan(args) => {
            crate::cli::scan::run(hardware_client, &args, &options, out, terminal_client).await
        }
        Command::Connect(args) => {
            crate::cli::connect::run(hardware_client, &args, &options, out, terminal_client).await
        }
        Command::Read(args) => {
            crate::cli::read::run(hardware_client, &args, &options, out, terminal_client).await
        }
        Command::Compare(args) => {
            crate::cli::compare::run(hardware_client, &args, &options, out, terminal_client).await
        }
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Scan(_args) => "scan",
        Command::Connect(_args) => "connect",
        Command::Read(_args) => "read",
        Command::Compare(_args) => "compare",
    }
}
