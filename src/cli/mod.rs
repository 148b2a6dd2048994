pub(crate) mod command;
pub(crate) mod compare;
pub(crate) mod connect;
pub(crate) mod read;
pub(crate) mod scan;
pub(crate) mod ui;

use std::io;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

use crate::profile::UuidNames;
use crate::utils::format_duration;

use self::ui::{Painter, TimedOutView};

pub use self::command::{
    Args, Command, CompareArgs, ConnectArgs, DEFAULT_CHARACTERISTIC_NAMES, DEFAULT_SERVICE_NAMES,
    FakeArgs, LogLevel, OutputFormat, ReadArgs, RunOptions, ScanArgs, TargetArgs,
};

/// How a command finished, mapped to the process exit status.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CommandOutcome {
    Success,
    /// The device did not satisfy the reference profile.
    Mismatch,
    /// No matching device connected before the connect timeout.
    TimedOut,
}

impl CommandOutcome {
    /// Returns `0`, `2` or `3`. Errors map to `1` in `main`.
    #[must_use]
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Mismatch => 2,
            Self::TimedOut => 3,
        }
    }
}

/// Loads the vendor service and characteristic name tables. Missing files give empty tables.
pub(crate) fn load_name_tables(options: &RunOptions) -> Result<(UuidNames, UuidNames)> {
    let service_names = UuidNames::load(options.service_names())?;
    let characteristic_names = UuidNames::load(options.characteristic_names())?;
    Ok((service_names, characteristic_names))
}

pub(crate) fn write_json<W, T>(out: &mut W, value: &T) -> Result<()>
where
    W: io::Write,
    T: Serialize + ?Sized,
{
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Writes the timeout notice and returns [`CommandOutcome::TimedOut`].
pub(crate) fn report_timed_out<W>(
    out: &mut W,
    output_format: OutputFormat,
    painter: &Painter,
    after: Duration,
) -> Result<CommandOutcome>
where
    W: io::Write,
{
    #[derive(Serialize)]
    struct TimedOutJson {
        status: &'static str,
        timeout: String,
    }

    match output_format {
        OutputFormat::Pretty => writeln!(out, "{}", TimedOutView::new(after, painter))?,
        OutputFormat::Json => write_json(
            out,
            &TimedOutJson {
                status: "timed_out",
                timeout: format_duration(after),
            },
        )?,
    }
    Ok(CommandOutcome::TimedOut)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::success(CommandOutcome::Success, 0)]
    #[case::mismatch(CommandOutcome::Mismatch, 2)]
    #[case::timed_out(CommandOutcome::TimedOut, 3)]
    fn outcomes_map_to_exit_codes(#[case] outcome: CommandOutcome, #[case] expected: u8) {
        assert_eq!(expected, outcome.exit_code());
    }

    #[test]
    fn timeout_json_names_the_bound() {
        let mut out = Vec::new();
        let outcome = report_timed_out(
            &mut out,
            OutputFormat::Json,
            &Painter::new(false),
            Duration::from_secs(15),
        )
        .expect("writing to a buffer should succeed");

        let value: serde_json::Value =
            serde_json::from_slice(&out).expect("output should be JSON");
        assert_eq!(CommandOutcome::TimedOut, outcome);
        assert_eq!(
            serde_json::json!({"status": "timed_out", "timeout": "15s"}),
            value
        );
    }
}
