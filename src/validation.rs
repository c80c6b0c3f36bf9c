//! Input validation and normalization
//!
//! Everything that ends up on a dnsmasq directive line or on an nmcli command
//! line passes through here first. Values that could break the line format
//! (commas, newlines) or be mistaken for options (leading dash) are rejected.

use crate::error::{PioneerError, PioneerResult};
use std::net::Ipv4Addr;

/// Maximum length for interface names (Linux kernel limit is 15)
const MAX_INTERFACE_NAME_LEN: usize = 15;

/// Maximum length for a full DNS name
const MAX_HOSTNAME_LEN: usize = 253;

/// Maximum length for a single DNS label
const MAX_LABEL_LEN: usize = 63;

/// Maximum length for error messages shown to users
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Normalize a MAC address to lowercase, colon separated form
///
/// Accepts `AA:BB:CC:DD:EE:FF` and `aa-bb-cc-dd-ee-ff`; mixed separators are
/// rejected.
pub fn normalize_mac(mac: &str) -> PioneerResult<String> {
    let mac = mac.trim();
    let separator = if mac.contains(':') { ':' } else { '-' };

    let parts: Vec<&str> = mac.split(separator).collect();
    if parts.len() != 6 {
        return Err(PioneerError::Validation(format!(
            "MAC address '{}' must have 6 octets separated by colons",
            mac
        )));
    }

    for part in &parts {
        if part.len() != 2 || !part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(PioneerError::Validation(format!(
                "Invalid octet '{}' in MAC address '{}'",
                part, mac
            )));
        }
    }

    Ok(parts.join(":").to_ascii_lowercase())
}

/// Validate a dotted-quad IPv4 address
pub fn validate_ipv4(addr: &str) -> PioneerResult<Ipv4Addr> {
    addr.trim()
        .parse::<Ipv4Addr>()
        .map_err(|_| PioneerError::Validation(format!("Invalid IPv4 address: {}", addr)))
}

/// Validate and lowercase a DNS hostname
///
/// Labels are 1-63 characters of ASCII alphanumerics and dashes, not starting
/// or ending with a dash. A bare IP address is not a hostname here.
pub fn normalize_hostname(host: &str) -> PioneerResult<String> {
    let host = host.trim();

    if host.is_empty() {
        return Err(PioneerError::Validation("Hostname cannot be empty".to_string()));
    }

    if host.len() > MAX_HOSTNAME_LEN {
        return Err(PioneerError::Validation("Hostname too long".to_string()));
    }

    if host.parse::<Ipv4Addr>().is_ok() {
        return Err(PioneerError::Validation(format!(
            "Hostname cannot be an IP address: {}",
            host
        )));
    }

    for label in host.split('.') {
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return Err(PioneerError::Validation(format!(
                "Invalid hostname format: {}",
                host
            )));
        }

        if let Some(c) = label.chars().find(|c| !c.is_ascii_alphanumeric() && *c != '-') {
            return Err(PioneerError::Validation(format!(
                "Invalid hostname character: {}",
                c
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(PioneerError::Validation(format!(
                "Hostname label cannot start or end with a dash: {}",
                host
            )));
        }
    }

    Ok(host.to_ascii_lowercase())
}

/// Validate interface name to prevent command injection
pub fn validate_interface_name(name: &str) -> PioneerResult<()> {
    if name.is_empty() {
        return Err(PioneerError::Validation(
            "Interface name cannot be empty".to_string()
        ));
    }

    if name.len() > MAX_INTERFACE_NAME_LEN {
        return Err(PioneerError::Validation(
            format!("Interface name too long (max {} characters)", MAX_INTERFACE_NAME_LEN)
        ));
    }

    for c in name.chars() {
        if !c.is_ascii_alphanumeric() && c != '-' && c != '_' && c != '.' {
            return Err(PioneerError::Validation(
                format!("Invalid interface name '{}': contains invalid character '{}'", name, c)
            ));
        }
    }

    // Would be read as an option by nmcli
    if name.starts_with('-') {
        return Err(PioneerError::Validation(
            "Interface name cannot start with dash".to_string()
        ));
    }

    Ok(())
}

/// Validate WiFi SSID
///
/// SSIDs can be 1-32 bytes
pub fn validate_ssid(ssid: &str) -> PioneerResult<()> {
    if ssid.is_empty() {
        return Err(PioneerError::Validation(
            "SSID cannot be empty".to_string()
        ));
    }

    if ssid.len() > 32 {
        return Err(PioneerError::Validation(
            "SSID cannot exceed 32 characters".to_string()
        ));
    }

    if ssid.chars().any(|c| c.is_control()) {
        return Err(PioneerError::Validation(
            "SSID contains invalid control characters".to_string()
        ));
    }

    Ok(())
}

/// Validate WiFi password (WPA2-PSK: 8-63 ASCII characters)
pub fn validate_wifi_password(password: &str) -> PioneerResult<()> {
    if password.len() < 8 {
        return Err(PioneerError::Validation(
            "WiFi password must be at least 8 characters".to_string()
        ));
    }

    if password.len() > 63 {
        return Err(PioneerError::Validation(
            "WiFi password cannot exceed 63 characters".to_string()
        ));
    }

    if !password.is_ascii() {
        return Err(PioneerError::Validation(
            "WiFi password must contain only ASCII characters".to_string()
        ));
    }

    if password.chars().any(|c| c.is_control()) {
        return Err(PioneerError::Validation(
            "WiFi password contains invalid control characters".to_string()
        ));
    }

    Ok(())
}

/// Truncate command stderr before it is logged or returned to the web layer
pub fn sanitize_error_message(stderr: &str) -> String {
    let mut sanitized = stderr.trim().to_string();

    if sanitized.len() > MAX_ERROR_MESSAGE_LEN {
        let mut cut = MAX_ERROR_MESSAGE_LEN;
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized.truncate(cut);
        sanitized.push_str("... (truncated)");
    }

    sanitized
}
