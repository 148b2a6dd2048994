use std::io;

use anyhow::{Result, bail};
use tracing::instrument;

use crate::hw::HardwareClient;
use crate::profile;
use crate::session::{Session, SessionMode, SessionOutcome};
use crate::terminal::TerminalClient;

use super::command::{OutputFormat, ReadArgs, RunOptions};
use super::ui::{DocumentSummaryView, Painter};
use super::{CommandOutcome, write_json};

/// Executes the `read` command. No radio activity takes place.
#[instrument(skip_all, level = "info", fields(file = %args.file().display()))]
pub(crate) async fn run<W>(
    client: Box<dyn HardwareClient>,
    args: &ReadArgs,
    options: &RunOptions,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
) -> Result<CommandOutcome>
where
    W: io::Write,
{
    let document = profile::load(args.file())?;
    let mut session = Session::new(SessionMode::Read { document });
    let SessionOutcome::Document(document) = session.run(client.as_ref()).await? else {
        bail!("read session ended without a document");
    };

    match options.output_format() {
        OutputFormat::Pretty => {
            let painter = Painter::new(terminal_client.stdout_is_terminal());
            writeln!(out, "{}", DocumentSummaryView::new(&document, &painter))?;
        }
        OutputFormat::Json => write_json(out, &document)?,
    }

    Ok(CommandOutcome::Success)
}
