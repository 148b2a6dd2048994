use std::fmt::{self, Display, Formatter};

use crate::hw::{DiscoveredProfile, RawDescriptor};
use crate::profile::{Device, Service};

use super::painter::Painter;
use super::table::Table;

/// Renders the profile observed on a connected device, including descriptors.
pub(crate) struct DiscoveryView<'a> {
    profile: &'a DiscoveredProfile,
    painter: &'a Painter,
}

impl<'a> DiscoveryView<'a> {
    pub(crate) fn new(profile: &'a DiscoveredProfile, painter: &'a Painter) -> Self {
        Self { profile, painter }
    }
}

impl Display for DiscoveryView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let device = self.profile.device();
        writeln!(f, "{}", device_heading(device, self.painter))?;

        let mut table = Table::new(["uuid", "name", "properties", "descriptors"]);
        for service in device.services() {
            let skipped = self.profile.skipped_services().contains(&service.id());
            table.push_row(vec![
                self.painter.uuid(service.id().to_string()),
                self.painter.heading(service.name()),
                if skipped {
                    self.painter.warning("characteristic discovery failed")
                } else {
                    format!("{} characteristic(s)", service.characteristic_count())
                },
                String::new(),
            ]);
            for characteristic in service.characteristics() {
                let descriptors = self.profile.descriptors(&service.id(), &characteristic.id());
                table.push_row(vec![
                    format!("  {}", characteristic.id()),
                    characteristic.name().to_string(),
                    characteristic.properties().to_string(),
                    self.painter.muted(describe_descriptors(descriptors)),
                ]);
            }
        }

        if table.is_empty() {
            write!(f, "{}", self.painter.warning("No services discovered."))
        } else {
            write!(f, "{table}")
        }
    }
}

/// Summarises a profile document: service counts, per-service characteristic
/// counts and each characteristic's required properties.
pub(crate) struct DocumentSummaryView<'a> {
    device: &'a Device,
    painter: &'a Painter,
}

impl<'a> DocumentSummaryView<'a> {
    pub(crate) fn new(device: &'a Device, painter: &'a Painter) -> Self {
        Self { device, painter }
    }
}

impl Display for DocumentSummaryView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", device_heading(self.device, self.painter))?;

        let mut table = Table::new(["uuid", "name", "requirement", "required properties"]);
        for service in self.device.services() {
            table.push_row(service_row(service, self.painter));
            for characteristic in service.characteristics() {
                table.push_row(vec![
                    format!("  {}", characteristic.id()),
                    characteristic.name().to_string(),
                    characteristic.requirement().to_string(),
                    characteristic.properties().to_string(),
                ]);
            }
        }

        if table.is_empty() {
            write!(f, "{}", self.painter.warning("The document declares no services."))
        } else {
            write!(f, "{table}")
        }
    }
}

fn device_heading(device: &Device, painter: &Painter) -> String {
    painter.heading(format!(
        "Device {} has {} service(s)",
        display_device_name(device),
        device.service_count()
    ))
}

fn display_device_name(device: &Device) -> &str {
    if device.name().is_empty() {
        "<unnamed>"
    } else {
        device.name()
    }
}

fn service_row(service: &Service, painter: &Painter) -> Vec<String> {
    vec![
        painter.uuid(service.id().to_string()),
        painter.heading(service.name()),
        String::new(),
        format!("{} characteristic(s)", service.characteristic_count()),
    ]
}

fn describe_descriptors(descriptors: &[RawDescriptor]) -> String {
    if descriptors.is_empty() {
        return "-".to_string();
    }
    descriptors
        .iter()
        .map(|descriptor| match &descriptor.name {
            Some(name) => format!("{} ({name})", descriptor.uuid),
            None => descriptor.uuid.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
