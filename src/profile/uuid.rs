use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde_with::SerializeDisplay;
use uuid::Uuid;

use crate::error::ProfileError;

/// `0000xxxx-0000-1000-8000-00805f9b34fb` with the short-form bits zeroed.
const BLUETOOTH_BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;

/// A GATT attribute UUID held in canonical 128-bit form.
///
/// Parsing accepts the 16-bit and 32-bit short forms used throughout the
/// Bluetooth SIG assigned numbers as well as full UUIDs in any letter case,
/// so two spellings of the same attribute always compare equal.
///
/// ```
/// let short: gattcheck::GattUuid = "180D".parse().expect("short form parses");
/// let long: gattcheck::GattUuid = "0000180d-0000-1000-8000-00805F9B34FB"
///     .parse()
///     .expect("long form parses");
/// assert_eq!(short, long);
/// assert_eq!("0000180d-0000-1000-8000-00805f9b34fb", short.to_string());
/// ```
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, SerializeDisplay)]
pub struct GattUuid(Uuid);

impl GattUuid {
    /// Expands a 16-bit assigned number onto the Bluetooth base UUID.
    #[must_use]
    pub const fn from_u16(short: u16) -> Self {
        Self::from_u32(short as u32)
    }

    /// Expands a 32-bit assigned number onto the Bluetooth base UUID.
    #[must_use]
    pub const fn from_u32(short: u32) -> Self {
        Self(Uuid::from_u128(BLUETOOTH_BASE_UUID | ((short as u128) << 96)))
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Returns the assigned number when this UUID lies on the Bluetooth base UUID.
    #[must_use]
    pub fn short(&self) -> Option<u32> {
        let value = self.0.as_u128();
        if value & !(u128::from(u32::MAX) << 96) == BLUETOOTH_BASE_UUID {
            u32::try_from(value >> 96).ok()
        } else {
            None
        }
    }
}

impl From<Uuid> for GattUuid {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for GattUuid {
    type Err = ProfileError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let invalid = || ProfileError::InvalidUuid {
            value: value.to_string(),
        };

        if matches!(trimmed.len(), 4 | 8) {
            let short = u32::from_str_radix(trimmed, 16).map_err(|_| invalid())?;
            return Ok(Self::from_u32(short));
        }

        Uuid::parse_str(trimmed).map(Self).map_err(|_| invalid())
    }
}

impl Display for GattUuid {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::short_upper("180D", "0000180d-0000-1000-8000-00805f9b34fb")]
    #[case::short_lower("2a37", "00002a37-0000-1000-8000-00805f9b34fb")]
    #[case::thirty_two_bit("0000FEE9", "0000fee9-0000-1000-8000-00805f9b34fb")]
    #[case::mixed_case_full(
        "D44BC439-ABFD-45A2-b575-925416129600",
        "d44bc439-abfd-45a2-b575-925416129600"
    )]
    #[case::simple_full(
        "d44bc439abfd45a2b575925416129600",
        "d44bc439-abfd-45a2-b575-925416129600"
    )]
    fn parse_canonicalises(#[case] input: &str, #[case] expected: &str) {
        let parsed: GattUuid = input.parse().expect("uuid should parse");
        assert_eq!(expected, parsed.to_string());
    }

    #[rstest]
    #[case("")]
    #[case("18G0")]
    #[case("180")]
    #[case("not-a-uuid")]
    fn parse_rejects_invalid_values(#[case] input: &str) {
        let result = input.parse::<GattUuid>();
        assert_matches!(result, Err(ProfileError::InvalidUuid { value }) if value == input);
    }

    #[test]
    fn short_returns_assigned_number_for_base_uuids() {
        assert_eq!(Some(0x180D), GattUuid::from_u16(0x180D).short());
        let vendor: GattUuid = "d44bc439-abfd-45a2-b575-925416129600"
            .parse()
            .expect("vendor uuid should parse");
        assert_eq!(None, vendor.short());
    }
}
