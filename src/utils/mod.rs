// Tue Jan 13 2026 - Alex

pub mod logging;

pub use logging::{LoggingUtils, ScopedTimer};

use crate::memory::Address;

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

pub fn hex_string_spaced(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02X}", b)).collect::<Vec<_>>().join(" ")
}

/// Accepts `0x`-prefixed hex or plain decimal.
pub fn parse_address(s: &str) -> Option<Address> {
    let s = s.trim();
    let value = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16).ok()?,
        None => s.parse::<u64>().ok()?,
    };
    Some(Address::new(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x7FF6_0000"), Some(Address::new(0x7FF60000)));
        assert_eq!(parse_address("4096"), Some(Address::new(4096)));
        assert_eq!(parse_address("0xZZ"), None);
    }

    #[test]
    fn test_formatting() {
        assert_eq!(hex_string_spaced(&[0xE8, 0x00, 0x90]), "E8 00 90");
        assert_eq!(format_bytes(512), "512 bytes");
        assert_eq!(format_bytes(2048), "2.00 KB");
    }
}
