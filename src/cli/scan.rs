use std::io;

use anyhow::{Result, bail};
use tracing::instrument;

use crate::hw::HardwareClient;
use crate::session::{Session, SessionMode, SessionOutcome};
use crate::terminal::TerminalClient;

use super::command::{OutputFormat, RunOptions, ScanArgs};
use super::ui::{FoundDevicesView, Painter};
use super::{CommandOutcome, write_json};

/// Executes the `scan` command.
#[instrument(skip_all, level = "info", fields(output_format = ?options.output_format()))]
pub(crate) async fn run<W>(
    client: Box<dyn HardwareClient>,
    args: &ScanArgs,
    options: &RunOptions,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
) -> Result<CommandOutcome>
where
    W: io::Write,
{
    let mut session = Session::new(SessionMode::Scan(args.options()?));
    let SessionOutcome::Scanned(devices) = session.run(client.as_ref()).await? else {
        bail!("scan session ended without scan results");
    };

    match options.output_format() {
        OutputFormat::Pretty => {
            let painter = Painter::new(terminal_client.stdout_is_terminal());
            writeln!(out, "{}", FoundDevicesView::new(&devices, &painter))?;
        }
        OutputFormat::Json => write_json(out, &devices)?,
    }

    Ok(CommandOutcome::Success)
}
