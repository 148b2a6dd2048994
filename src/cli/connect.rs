use std::io;
use std::path::Path;

use anyhow::{Result, bail};
use serde::Serialize;
use tracing::{info, instrument};

use crate::hw::{DiscoveredProfile, FoundDevice, HardwareClient};
use crate::profile;
use crate::session::{Session, SessionMode, SessionOutcome};
use crate::terminal::TerminalClient;
use crate::utils::{format_hex, format_rssi};

use super::command::{ConnectArgs, OutputFormat, RunOptions};
use super::ui::{DiscoveryView, Painter, Table};
use super::{CommandOutcome, load_name_tables, report_timed_out, write_json};

#[derive(Serialize)]
struct ConnectJson<'a> {
    device: &'a FoundDevice,
    profile: &'a DiscoveredProfile,
    document: Option<&'a Path>,
}

/// Executes the `connect` command.
#[instrument(skip_all, level = "info", fields(emit_document = args.emit_document()))]
pub(crate) async fn run<W>(
    client: Box<dyn HardwareClient>,
    args: &ConnectArgs,
    options: &RunOptions,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
) -> Result<CommandOutcome>
where
    W: io::Write,
{
    let filter = args.target().filter()?;
    let (service_names, characteristic_names) = load_name_tables(options)?;
    let painter = Painter::new(terminal_client.stdout_is_terminal());

    let mut session = Session::new(SessionMode::Connect {
        filter,
        emit_document: args.emit_document(),
    })
    .with_names(service_names, characteristic_names)
    .with_connect_timeout(options.connect_timeout());

    let (device, profile, emit_document) = match session.run(client.as_ref()).await? {
        SessionOutcome::Discovered {
            device,
            profile,
            emit_document,
        } => (device, profile, emit_document),
        SessionOutcome::TimedOut { after } => {
            return report_timed_out(out, options.output_format(), &painter, after);
        }
        _other => bail!("connect session ended without a discovered profile"),
    };

    let document = if emit_document {
        let path = profile::store(args.output_dir(), profile.device())?;
        info!(path = %path.display(), "profile document written");
        Some(path)
    } else {
        None
    };

    match options.output_format() {
        OutputFormat::Pretty => {
            writeln!(out, "{}", device_table(&device, &painter))?;
            writeln!(out, "{}", DiscoveryView::new(&profile, &painter))?;
            if let Some(path) = &document {
                writeln!(
                    out,
                    "{} {}",
                    painter.success("Profile document written to"),
                    path.display()
                )?;
            }
        }
        OutputFormat::Json => write_json(
            out,
            &ConnectJson {
                device: &device,
                profile: &profile,
                document: document.as_deref(),
            },
        )?,
    }

    Ok(CommandOutcome::Success)
}

pub(crate) fn device_table(device: &FoundDevice, painter: &Painter) -> Table {
    Table::key_value(
        painter,
        vec![
            ("name", device.local_name().unwrap_or("-").to_string()),
            ("device_id", device.device_id().to_string()),
            ("adapter", device.adapter_name().to_string()),
            ("rssi", format_rssi(device.rssi())),
            (
                "manufacturer_data",
                device
                    .manufacturer_data()
                    .map_or_else(|| "-".to_string(), format_hex),
            ),
        ],
    )
}
