//! MAC OUI (Organizationally Unique Identifier) vendor lookup
//!
//! Uses the IEEE OUI database to name the manufacturer behind a responder,
//! which helps when picking addresses for the watch list.

/// Lookup the vendor/manufacturer name for a MAC address.
///
/// # Arguments
/// * `mac` - MAC address in any common format (e.g., "00:1A:2B:3C:4D:5E", "00-1A-2B-3C-4D-5E")
///
/// # Returns
/// * `Some(vendor_name)` if found in the OUI database
/// * `None` if the MAC address is invalid, locally administered or not found
pub fn lookup_vendor(mac: &str) -> Option<String> {
    let normalized = normalize_mac(mac)?;

    if is_locally_administered(&normalized) {
        tracing::debug!("OUI lookup for {}: locally administered, skipping", mac);
        return None;
    }

    match oui_data::lookup(&normalized) {
        Some(record) => {
            let vendor_name = record.organization().to_string();
            tracing::debug!("OUI lookup for {}: found {}", mac, vendor_name);
            Some(vendor_name)
        }
        None => {
            tracing::debug!("OUI lookup for {}: not found in database", mac);
            None
        }
    }
}

/// Whether the address has the locally-administered bit set.
///
/// Phones and laptops that randomize their address per network set this
/// bit. Such a device keeps its address on one network but the vendor half
/// carries no meaning.
pub fn is_locally_administered(mac: &str) -> bool {
    let Some(normalized) = normalize_mac(mac) else {
        return false;
    };

    u8::from_str_radix(&normalized[0..2], 16)
        .map(|first| first & 0x02 != 0)
        .unwrap_or(false)
}

/// Normalize a MAC address to the format XX:XX:XX:XX:XX:XX
fn normalize_mac(mac: &str) -> Option<String> {
    let cleaned: String = mac.replace([':', '-', '.'], "").to_uppercase();

    if cleaned.len() != 12 {
        return None;
    }

    if !cleaned.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    Some(format!(
        "{}:{}:{}:{}:{}:{}",
        &cleaned[0..2],
        &cleaned[2..4],
        &cleaned[4..6],
        &cleaned[6..8],
        &cleaned[8..10],
        &cleaned[10..12]
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_mac() {
        assert_eq!(
            normalize_mac("00-1a-2b-3c-4d-5e"),
            Some("00:1A:2B:3C:4D:5E".to_string())
        );
        assert_eq!(
            normalize_mac("001a.2b3c.4d5e"),
            Some("00:1A:2B:3C:4D:5E".to_string())
        );
        assert_eq!(normalize_mac("00:1a:2b"), None);
        assert_eq!(normalize_mac("zz:1a:2b:3c:4d:5e"), None);
    }

    #[test]
    fn test_is_locally_administered() {
        assert!(is_locally_administered("da:a1:19:12:34:56"));
        assert!(is_locally_administered("02:42:ac:12:34:56"));
        assert!(!is_locally_administered("00:17:f2:12:34:56"));
        assert!(!is_locally_administered("not a mac"));
    }

    #[test]
    fn test_randomized_address_has_no_vendor() {
        assert_eq!(lookup_vendor("da:a1:19:12:34:56"), None);
    }
}
