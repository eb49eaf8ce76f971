//! Utility functions and helpers

/// Convert bytes to a hexadecimal string
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Hex of at most the first `max` bytes, with an ellipsis when truncated
pub fn hex_preview(bytes: &[u8], max: usize) -> String {
    if bytes.len() <= max {
        bytes_to_hex(bytes)
    } else {
        format!("{}... ({} bytes)", bytes_to_hex(&bytes[..max]), bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_to_hex() {
        assert_eq!(bytes_to_hex(&[0xde, 0xad, 0xbe, 0xef]), "deadbeef");
    }

    #[test]
    fn test_hex_preview() {
        assert_eq!(hex_preview(b"AB", 4), "4142");
        assert_eq!(hex_preview(b"ABCDEF", 2), "4142... (6 bytes)");
    }
}
