use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use tracing::{debug, instrument, warn};

use super::uuid::GattUuid;
use crate::error::UuidNameError;

/// Human-readable names for vendor-specific UUIDs, loaded from a two-column CSV table.
///
/// Rows may list either `uuid,name` or `name,uuid`. When both columns parse
/// as UUIDs the first one is the key. Rows where neither column parses are
/// skipped.
#[derive(Debug, Clone, Default)]
pub struct UuidNames {
    by_uuid: HashMap<GattUuid, String>,
}

impl UuidNames {
    /// Loads a table from `path`, returning an empty table when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be opened or parsed.
    #[instrument(level = "debug", fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, UuidNameError> {
        match File::open(path) {
            Ok(file) => Self::from_reader(file),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!("UUID name table not found, continuing without names");
                Ok(Self::default())
            }
            Err(source) => Err(UuidNameError::Open {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Parses a table from any reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the CSV stream is unreadable.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, UuidNameError> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .from_reader(reader);

        let mut by_uuid = HashMap::new();
        for record in csv.records() {
            let record = record?;
            let (Some(first), Some(second)) = (record.get(0), record.get(1)) else {
                continue;
            };
            let entry = match (first.parse::<GattUuid>(), second.parse::<GattUuid>()) {
                (Ok(uuid), _) => (uuid, second),
                (Err(_), Ok(uuid)) => (uuid, first),
                (Err(_), Err(_)) => {
                    warn!(row = ?record, "skipping UUID name row without a valid UUID");
                    continue;
                }
            };
            by_uuid.insert(entry.0, entry.1.to_string());
        }

        debug!(entries = by_uuid.len(), "loaded UUID name table");
        Ok(Self { by_uuid })
    }

    #[must_use]
    pub fn lookup(&self, uuid: &GattUuid) -> Option<&str> {
        self.by_uuid.get(uuid).map(String::as_str)
    }

    /// Chooses a display name: the name reported by the device, then the table entry, then empty.
    #[must_use]
    pub fn resolve(&self, supplied: Option<&str>, uuid: &GattUuid) -> String {
        supplied
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .or_else(|| self.lookup(uuid))
            .unwrap_or_default()
            .to_string()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_uuid.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_uuid.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(GattUuid, S)> for UuidNames {
    fn from_iter<T: IntoIterator<Item = (GattUuid, S)>>(iter: T) -> Self {
        Self {
            by_uuid: iter
                .into_iter()
                .map(|(uuid, name)| (uuid, name.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    const VENDOR_SERVICE: &str = "d44bc439-abfd-45a2-b575-925416129600";

    fn vendor_service() -> GattUuid {
        VENDOR_SERVICE.parse().expect("vendor uuid should parse")
    }

    #[rstest]
    #[case::uuid_first("D44BC439-ABFD-45A2-B575-925416129600, Lamp Control\n")]
    #[case::name_first("Lamp Control,d44bc439-abfd-45a2-b575-925416129600\n")]
    fn from_reader_accepts_either_column_order(#[case] table: &str) {
        let names = UuidNames::from_reader(table.as_bytes()).expect("table should parse");

        assert_eq!(Some("Lamp Control"), names.lookup(&vendor_service()));
    }

    #[test]
    fn from_reader_skips_unusable_rows() {
        let table = "# vendor services\nno uuid here,at all\nsingle-column\n180F,Battery\n";

        let names = UuidNames::from_reader(table.as_bytes()).expect("table should parse");

        assert_eq!(1, names.len());
        assert_eq!(Some("Battery"), names.lookup(&GattUuid::from_u16(0x180F)));
    }

    #[test]
    fn load_returns_empty_table_when_file_is_missing() {
        let directory = tempfile::tempdir().expect("temporary directory should be created");

        let names = UuidNames::load(&directory.path().join("missing.csv"))
            .expect("missing table should not be an error");

        assert!(names.is_empty());
    }

    #[test]
    fn load_reads_table_from_disk() {
        let mut file = tempfile::NamedTempFile::new().expect("temporary file should be created");
        writeln!(file, "{VENDOR_SERVICE},Lamp Control").expect("table should be written");

        let names = UuidNames::load(file.path()).expect("table should load");

        assert_eq!(Some("Lamp Control"), names.lookup(&vendor_service()));
    }

    #[rstest]
    #[case::supplied_wins(Some("Reported"), "Reported")]
    #[case::blank_supplied_falls_back(Some("  "), "Lamp Control")]
    #[case::table_fallback(None, "Lamp Control")]
    fn resolve_prefers_supplied_name(#[case] supplied: Option<&str>, #[case] expected: &str) {
        let names: UuidNames = [(vendor_service(), "Lamp Control")].into_iter().collect();

        assert_eq!(expected, names.resolve(supplied, &vendor_service()));
    }

    #[test]
    fn resolve_returns_empty_name_for_unknown_uuid() {
        let names = UuidNames::default();

        assert_eq!("", names.resolve(None, &vendor_service()));
    }
}
