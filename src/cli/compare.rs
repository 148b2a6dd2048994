use std::io;

use anyhow::{Result, bail};
use serde::Serialize;
use tracing::{info, instrument};

use crate::conformance::ConformanceReport;
use crate::hw::{FoundDevice, HardwareClient};
use crate::profile::{self, Device};
use crate::session::{Session, SessionMode, SessionOutcome};
use crate::terminal::TerminalClient;

use super::command::{CompareArgs, OutputFormat, RunOptions};
use super::connect::device_table;
use super::ui::{ConformanceView, DiscoveryView, DocumentSummaryView, Painter};
use super::{CommandOutcome, load_name_tables, report_timed_out, write_json};

#[derive(Serialize)]
struct CompareJson<'a> {
    device: &'a FoundDevice,
    reference: &'a Device,
    observed: &'a Device,
    matched: bool,
    report: &'a ConformanceReport,
}

/// Executes the `compare` command.
///
/// The reference document is loaded before any radio activity.
#[instrument(skip_all, level = "info", fields(file = %args.file().display()))]
pub(crate) async fn run<W>(
    client: Box<dyn HardwareClient>,
    args: &CompareArgs,
    options: &RunOptions,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
) -> Result<CommandOutcome>
where
    W: io::Write,
{
    let filter = args.target().filter()?;
    let reference = profile::load(args.file())?;
    let (service_names, characteristic_names) = load_name_tables(options)?;
    let painter = Painter::new(terminal_client.stdout_is_terminal());

    if options.output_format() == OutputFormat::Pretty {
        writeln!(out, "{}", painter.heading("Reference profile"))?;
        writeln!(out, "{}", DocumentSummaryView::new(&reference, &painter))?;
    }

    let mut session = Session::new(SessionMode::Compare { filter, reference })
        .with_names(service_names, characteristic_names)
        .with_connect_timeout(options.connect_timeout());

    let (device, profile, reference, report) = match session.run(client.as_ref()).await? {
        SessionOutcome::Compared {
            device,
            profile,
            reference,
            report,
        } => (device, profile, reference, report),
        SessionOutcome::TimedOut { after } => {
            return report_timed_out(out, options.output_format(), &painter, after);
        }
        _other => bail!("compare session ended without a conformance report"),
    };
    info!(
        matched = report.matched(),
        discrepancies = report.discrepancies().len(),
        "comparison complete"
    );

    match options.output_format() {
        OutputFormat::Pretty => {
            writeln!(out, "{}", device_table(&device, &painter))?;
            writeln!(out, "{}", DiscoveryView::new(&profile, &painter))?;
            writeln!(out, "{}", ConformanceView::new(&report, &painter))?;
        }
        OutputFormat::Json => write_json(
            out,
            &CompareJson {
                device: &device,
                reference: &reference,
                observed: profile.device(),
                matched: report.matched(),
                report: &report,
            },
        )?,
    }

    Ok(if report.matched() {
        CommandOutcome::Success
    } else {
        CommandOutcome::Mismatch
    })
}
