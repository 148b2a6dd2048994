use std::fmt::{self, Display, Formatter};

use crate::hw::FoundDevice;
use crate::utils::{format_hex, format_rssi};

use super::painter::Painter;
use super::table::Table;

/// Renders scan results as one row per peripheral.
pub(crate) struct FoundDevicesView<'a> {
    devices: &'a [FoundDevice],
    painter: &'a Painter,
}

impl<'a> FoundDevicesView<'a> {
    pub(crate) fn new(devices: &'a [FoundDevice], painter: &'a Painter) -> Self {
        Self { devices, painter }
    }
}

impl Display for FoundDevicesView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.devices.is_empty() {
            return write!(f, "{}", self.painter.warning("No devices found."));
        }

        let mut table =
            Table::new(["label", "device_id", "adapter", "rssi", "manufacturer_data"]).align_right(3);
        for device in self.devices {
            table.push_row(vec![
                self.painter.heading(device.label()),
                device.device_id().to_string(),
                device.adapter_name().to_string(),
                format_rssi(device.rssi()),
                device
                    .manufacturer_data()
                    .map_or_else(|| "-".to_string(), format_hex),
            ]);
        }
        writeln!(
            f,
            "{}",
            self.painter
                .heading(format!("Found {} device(s)", self.devices.len()))
        )?;
        write!(f, "{table}")
    }
}
