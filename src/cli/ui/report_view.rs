use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use crate::conformance::ConformanceReport;
use crate::utils::format_duration;

use super::painter::Painter;

/// Renders a conformance verdict followed by one line per discrepancy.
pub(crate) struct ConformanceView<'a> {
    report: &'a ConformanceReport,
    painter: &'a Painter,
}

impl<'a> ConformanceView<'a> {
    pub(crate) fn new(report: &'a ConformanceReport, painter: &'a Painter) -> Self {
        Self { report, painter }
    }
}

impl Display for ConformanceView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.report.matched() {
            return write!(f, "{} {}", self.painter.success("✓"), self.report.lines().join(""));
        }

        write!(
            f,
            "{}",
            self.painter.failure(format!(
                "✗ {} discrepancy(ies) found",
                self.report.discrepancies().len()
            ))
        )?;
        for line in self.report.lines() {
            write!(f, "\n  - {line}")?;
        }
        Ok(())
    }
}

/// Tells the user that no matching device connected in time.
pub(crate) struct TimedOutView<'a> {
    after: Duration,
    painter: &'a Painter,
}

impl<'a> TimedOutView<'a> {
    pub(crate) fn new(after: Duration, painter: &'a Painter) -> Self {
        Self { after, painter }
    }
}

impl Display for TimedOutView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.painter.warning(format!(
                "No matching device connected within {}.",
                format_duration(self.after)
            ))
        )
    }
}
