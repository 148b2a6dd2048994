use std::fmt::{self, Display, Formatter};

use crate::error::CliConfigError;

const SUFFIX_LEN: usize = 3;

/// Selects the peripheral to connect to.
///
/// The name is compared against the advertised local name after Unicode
/// upper-casing both sides. The optional suffix must equal the last three bytes of the
/// advertised manufacturer data.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DeviceFilter {
    name: String,
    folded_name: String,
    manufacturer_suffix: Option<[u8; SUFFIX_LEN]>,
}

impl DeviceFilter {
    /// Validates a device name and an optional 6-hex-digit manufacturer suffix.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is blank or the suffix is not exactly
    /// three bytes of hexadecimal.
    pub fn new(name: &str, manufacturer_suffix: Option<&str>) -> Result<Self, CliConfigError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CliConfigError::EmptyDeviceName);
        }

        let manufacturer_suffix = manufacturer_suffix
            .map(|value| {
                let bytes = hex::decode(value.trim()).map_err(|source| {
                    CliConfigError::MalformedFilter {
                        value: value.to_string(),
                        source,
                    }
                })?;
                <[u8; SUFFIX_LEN]>::try_from(bytes.as_slice()).map_err(|_| {
                    CliConfigError::InvalidFilterLength {
                        value: value.to_string(),
                        expected: SUFFIX_LEN,
                    }
                })
            })
            .transpose()?;

        Ok(Self {
            name: name.to_string(),
            folded_name: name.to_uppercase(),
            manufacturer_suffix,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn manufacturer_suffix(&self) -> Option<&[u8]> {
        self.manufacturer_suffix.as_ref().map(<[u8; SUFFIX_LEN]>::as_slice)
    }

    /// Returns whether an advertisement satisfies this filter.
    #[must_use]
    pub fn matches(&self, local_name: Option<&str>, manufacturer_data: Option<&[u8]>) -> bool {
        if !self.matches_name(local_name) {
            return false;
        }
        let Some(suffix) = &self.manufacturer_suffix else {
            return true;
        };
        manufacturer_data.is_some_and(|data| data.ends_with(suffix))
    }

    /// Returns whether the advertised name alone matches.
    #[must_use]
    pub fn matches_name(&self, local_name: Option<&str>) -> bool {
        local_name.is_some_and(|value| value.trim().to_uppercase() == self.folded_name)
    }
}

impl Display for DeviceFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.manufacturer_suffix {
            Some(suffix) => write!(f, "{} ({})", self.name, hex::encode(suffix)),
            None => write!(f, "{}", self.name),
        }
    }
}
