//! Hardware address normalization and suffix matching.
//!
//! Only the last three octets of a MAC address take part in matching. Some
//! devices rotate or rewrite the vendor half of their address, so two
//! addresses that agree on the device-specific half are treated as the same
//! device.

use crate::error::AddressError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Characters a hardware address may contain after lowercasing.
const ALLOWED_CHARS: &str = "0123456789abcdef:";

/// Length of `aa:bb:cc:dd:ee:ff`.
const FULL_ADDRESS_LEN: usize = 17;

/// Hex characters in a key (3 octets).
const KEY_LEN: usize = 6;

/// Normalized matching key: exactly 6 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AddressKey(String);

impl AddressKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AddressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AddressKey {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize(s)
    }
}

impl TryFrom<String> for AddressKey {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        normalize(&value)
    }
}

impl From<AddressKey> for String {
    fn from(key: AddressKey) -> Self {
        key.0
    }
}

/// Normalize a hardware address into its matching key.
///
/// Accepts a full colon-hex address (`AA:BB:CC:DD:EE:FF`), a bare 3-octet
/// suffix (`ddeeff`) or a colon-separated suffix (`dd:ee:ff`). Input is
/// lowercased before validation.
pub fn normalize(raw: &str) -> Result<AddressKey, AddressError> {
    let lowered = raw.trim().to_ascii_lowercase();

    if let Some((position, character)) = lowered
        .chars()
        .enumerate()
        .find(|(_, c)| !ALLOWED_CHARS.contains(*c))
    {
        return Err(AddressError::InvalidCharacter {
            address: raw.to_string(),
            character,
            position,
        });
    }

    let octets: Vec<&str> = lowered.split(':').collect();

    let key = if lowered.len() == FULL_ADDRESS_LEN {
        if octets.len() != 6 || !well_formed(&octets) {
            return Err(AddressError::InvalidLength(raw.to_string()));
        }
        octets[3..].concat()
    } else if octets.len() == 1 && lowered.len() == KEY_LEN {
        lowered
    } else if octets.len() == 3 && well_formed(&octets) {
        octets.concat()
    } else {
        return Err(AddressError::InvalidLength(raw.to_string()));
    };

    Ok(AddressKey(key))
}

fn well_formed(octets: &[&str]) -> bool {
    octets.iter().all(|o| o.len() == 2)
}

/// Whether two hardware addresses refer to the same device under the suffix rule.
///
/// Addresses that fail normalization never match anything.
pub fn matches(a: &str, b: &str) -> bool {
    match (normalize(a), normalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
