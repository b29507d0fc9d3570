//! Hex offset parsing and formatting utilities.

use anyhow::Result;

/// Parse a hex offset string (with or without 0x prefix).
pub fn parse_hex_address(s: &str) -> Result<u64> {
    let s = s.trim_start_matches("0x").trim_start_matches("0X");
    u64::from_str_radix(s, 16).map_err(|e| anyhow::anyhow!("Invalid hex offset: {}", e))
}

/// Parse a field offset: hex with a 0x prefix, decimal otherwise.
pub fn parse_offset(s: &str) -> Result<usize> {
    let value = if s.starts_with("0x") || s.starts_with("0X") {
        parse_hex_address(s)?
    } else {
        s.parse::<u64>()
            .map_err(|e| anyhow::anyhow!("Invalid offset: {}", e))?
    };
    usize::try_from(value).map_err(|_| anyhow::anyhow!("Offset too large: {}", s))
}

/// Format an offset as a hex string with 0x prefix.
pub fn format_hex_address(addr: usize) -> String {
    format!("0x{:X}", addr)
}
