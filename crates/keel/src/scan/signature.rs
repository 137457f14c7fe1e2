//! Byte signature patterns with wildcard support.

use crate::error::{Error, Result};

/// Parse a signature pattern string into match bytes.
///
/// Tokens are hex bytes; `??` (or `?`) marks a wildcard position.
pub fn parse_pattern(pattern: &str) -> Result<Vec<Option<u8>>> {
    let mut bytes = Vec::new();
    for token in pattern.split_whitespace() {
        if token == "??" || token == "?" {
            bytes.push(None);
            continue;
        }

        let value = u8::from_str_radix(token, 16)
            .map_err(|e| Error::InvalidPattern(format!("Invalid token '{}': {}", token, e)))?;
        bytes.push(Some(value));
    }

    if bytes.is_empty() {
        return Err(Error::InvalidPattern("Pattern is empty".to_string()));
    }

    Ok(bytes)
}

pub fn format_pattern(bytes: &[Option<u8>]) -> String {
    bytes
        .iter()
        .map(|b| match b {
            Some(value) => format!("{:02X}", value),
            None => "??".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render a pattern as concrete bytes, substituting `filler` for wildcards.
///
/// Used to synthesize module images for fixtures and dry runs.
pub fn materialize_pattern(bytes: &[Option<u8>], filler: u8) -> Vec<u8> {
    bytes.iter().map(|b| b.unwrap_or(filler)).collect()
}

/// Signatures for the host functions the runtime anchors on.
///
/// These are code signatures (instruction bytes with operand wildcards),
/// resilient to data layout changes between host builds.
pub mod builtin {
    /// Host main-loop tick entry.
    pub const FRAMEWORK_TICK: &str = "48 89 5C 24 ?? 57 48 83 EC 20 48 8B F9 E8 ?? ?? ?? ??";
    /// Client session state block reference.
    pub const CLIENT_STATE: &str = "48 8D 0D ?? ?? ?? ?? E8 ?? ?? ?? ?? 84 C0 75 0D";
    /// Inbound packet dispatch routine.
    pub const NETWORK_DISPATCH: &str = "40 53 48 83 EC 30 4C 8B 49 38 4C 8B D1";
    /// Swap-chain present call site the overlay draws from.
    pub const OVERLAY_PRESENT: &str = "48 89 5C 24 ?? 48 89 74 24 ?? 57 48 83 EC 30 41 8B F8";
    /// Debugger presence check the hook guard neutralizes.
    pub const DEBUG_CHECK: &str = "FF 15 ?? ?? ?? ?? 85 C0 74 0B B9 01 00 00 00";
    /// Top-level unhandled-exception filter registration site.
    pub const EXCEPTION_FILTER: &str = "40 55 48 83 EC 50 48 8D 6C 24 40 48 89 5D 48";

    /// Every builtin signature, by name.
    pub const ALL: &[(&str, &str)] = &[
        ("framework_tick", FRAMEWORK_TICK),
        ("client_state", CLIENT_STATE),
        ("network_dispatch", NETWORK_DISPATCH),
        ("overlay_present", OVERLAY_PRESENT),
        ("debug_check", DEBUG_CHECK),
        ("exception_filter", EXCEPTION_FILTER),
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pattern_with_wildcards() {
        let bytes = parse_pattern("48 8D 0D ?? ?? ?? ??").unwrap();
        assert_eq!(bytes.len(), 7);
        assert_eq!(bytes[0], Some(0x48));
        assert_eq!(bytes[1], Some(0x8D));
        assert_eq!(bytes[2], Some(0x0D));
        assert_eq!(bytes[3], None);
    }

    #[test]
    fn test_parse_pattern_rejects_garbage() {
        assert!(parse_pattern("48 XY").is_err());
        assert!(parse_pattern("").is_err());
        assert!(parse_pattern("   ").is_err());
    }

    #[test]
    fn test_format_pattern_roundtrip() {
        let pattern = vec![Some(0x48), Some(0x8D), Some(0x0D), None, Some(0xFF)];
        let formatted = format_pattern(&pattern);
        assert_eq!(formatted, "48 8D 0D ?? FF");
        let parsed = parse_pattern(&formatted).unwrap();
        assert_eq!(parsed, pattern);
    }

    #[test]
    fn test_materialize_fills_wildcards() {
        let pattern = parse_pattern("48 ?? 0D").unwrap();
        assert_eq!(materialize_pattern(&pattern, 0x90), vec![0x48, 0x90, 0x0D]);
    }

    #[test]
    fn test_builtin_signatures_parse() {
        for (name, pattern) in builtin::ALL {
            let parsed = parse_pattern(pattern).unwrap_or_else(|e| panic!("{name}: {e}"));
            assert!(parsed[0].is_some(), "{name} must not start with a wildcard");
        }
    }
}
