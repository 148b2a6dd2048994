use std::time::Duration;

use serde::Serialize;
use serde_with::hex::Hex;
use serde_with::serde_as;

use crate::error::CliConfigError;

const LABEL_SUFFIX_BYTES: usize = 3;
const LABEL_SUFFIX_ID_CHARS: usize = 6;

/// Default scan window when listing nearby devices.
pub const DEFAULT_SCAN_DURATION: Duration = Duration::from_secs(12);
/// Shortest accepted scan window.
pub const MIN_SCAN_DURATION: Duration = Duration::from_secs(1);
/// Default cap on distinct peripherals reported by a scan.
pub const DEFAULT_MAX_SCAN_RESULTS: usize = 30;

/// Bounds for a listing scan.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ScanOptions {
    duration: Duration,
    max_results: usize,
}

impl ScanOptions {
    /// # Errors
    ///
    /// Returns an error if `duration` is shorter than one second.
    pub fn new(duration: Duration, max_results: usize) -> Result<Self, CliConfigError> {
        if duration < MIN_SCAN_DURATION {
            return Err(CliConfigError::ScanDurationTooShort {
                minimum: MIN_SCAN_DURATION,
            });
        }
        Ok(Self {
            duration,
            max_results: max_results.max(1),
        })
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    #[must_use]
    pub fn max_results(&self) -> usize {
        self.max_results
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            duration: DEFAULT_SCAN_DURATION,
            max_results: DEFAULT_MAX_SCAN_RESULTS,
        }
    }
}

/// A BLE peripheral seen while scanning.
#[serde_as]
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct FoundDevice {
    adapter_name: String,
    device_id: String,
    local_name: Option<String>,
    rssi: Option<i16>,
    #[serde_as(as = "Option<Hex>")]
    manufacturer_data: Option<Vec<u8>>,
}

impl FoundDevice {
    /// Creates a new discovered-device record.
    pub(crate) fn new(
        adapter_name: String,
        device_id: String,
        local_name: Option<String>,
        rssi: Option<i16>,
    ) -> Self {
        Self {
            adapter_name,
            device_id,
            local_name,
            rssi,
            manufacturer_data: None,
        }
    }

    /// Attaches advertised manufacturer data as sent on the air: company id
    /// (little-endian) followed by the payload.
    pub(crate) fn with_manufacturer_data(mut self, manufacturer_data: Vec<u8>) -> Self {
        self.manufacturer_data = Some(manufacturer_data);
        self
    }

    /// Returns the adapter name used to discover this device.
    #[must_use]
    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// Returns the backend-specific device identifier.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Returns the advertised local name, if present.
    #[must_use]
    pub fn local_name(&self) -> Option<&str> {
        self.local_name.as_deref()
    }

    /// Returns the latest observed RSSI value, if present.
    #[must_use]
    pub fn rssi(&self) -> Option<i16> {
        self.rssi
    }

    #[must_use]
    pub fn manufacturer_data(&self) -> Option<&[u8]> {
        self.manufacturer_data.as_deref()
    }

    /// Short label used in scan listings.
    ///
    /// Devices advertising manufacturer data are labelled with the hex of its
    /// last three bytes, others with the tail of their peripheral id.
    #[must_use]
    pub fn label(&self) -> String {
        let name = self.local_name().unwrap_or("Unknown");
        match self.manufacturer_data() {
            Some(data) if !data.is_empty() => {
                let start = data.len().saturating_sub(LABEL_SUFFIX_BYTES);
                format!("{name}-{}", hex::encode(&data[start..]))
            }
            _ => {
                let id: Vec<char> = self
                    .device_id
                    .chars()
                    .filter(|c| c.is_ascii_alphanumeric())
                    .collect();
                let start = id.len().saturating_sub(LABEL_SUFFIX_ID_CHARS);
                let suffix: String = id[start..].iter().collect();
                format!("{name}-{}", suffix.to_lowercase())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::manufacturer_tail(Some("Lamp"), Some(vec![0x59, 0x00, 0x0A, 0xB1, 0xC2]), "Lamp-0ab1c2")]
    #[case::short_manufacturer_data(Some("Lamp"), Some(vec![0xAB]), "Lamp-ab")]
    #[case::id_tail(Some("Lamp"), None, "Lamp-ddeeff")]
    #[case::unnamed(None, None, "Unknown-ddeeff")]
    fn label_uses_manufacturer_data_or_id(
        #[case] local_name: Option<&str>,
        #[case] manufacturer_data: Option<Vec<u8>>,
        #[case] expected: &str,
    ) {
        let device = FoundDevice::new(
            "hci0".to_string(),
            "AA:BB:CC:DD:EE:FF".to_string(),
            local_name.map(str::to_string),
            Some(-50),
        );
        let device = match manufacturer_data {
            Some(data) => device.with_manufacturer_data(data),
            None => device,
        };

        assert_eq!(expected, device.label());
    }

    #[test]
    fn scan_options_reject_sub_second_duration() {
        let result = ScanOptions::new(Duration::from_millis(500), 10);
        assert!(matches!(
            result,
            Err(CliConfigError::ScanDurationTooShort { minimum }) if minimum == MIN_SCAN_DURATION
        ));
    }

    #[test]
    fn scan_options_default_to_twelve_seconds_and_thirty_results() {
        let options = ScanOptions::default();
        assert_eq!(Duration::from_secs(12), options.duration());
        assert_eq!(30, options.max_results());
    }

    #[test]
    fn serializes_manufacturer_data_as_hex() {
        let device = FoundDevice::new("hci0".to_string(), "AA:BB".to_string(), None, None)
            .with_manufacturer_data(vec![0x59, 0x00, 0x01]);

        let json = serde_json::to_value(&device).expect("device should serialize");

        assert_eq!(serde_json::json!("590001"), json["manufacturer_data"]);
        assert_eq!(serde_json::Value::Null, json["local_name"]);
    }
}
