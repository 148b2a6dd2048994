mod painter;
mod profile_view;
mod report_view;
mod scan_view;
mod table;

pub(crate) use self::painter::Painter;
pub(crate) use self::profile_view::{DiscoveryView, DocumentSummaryView};
pub(crate) use self::report_view::{ConformanceView, TimedOutView};
pub(crate) use self::scan_view::FoundDevicesView;
pub(crate) use self::table::Table;
