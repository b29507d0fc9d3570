//! Latin-1 transport for binary payloads stored as text.
//!
//! Asset libraries that expose a TextAsset script as a string keep each byte
//! as the code point of the same value. These helpers convert between the two
//! without going through UTF-8.

/// Map each byte to the code point of the same value
pub fn bytes_to_text(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Map each code point back to a byte; `None` if any is above U+00FF
pub fn text_to_bytes(text: &str) -> Option<Vec<u8>> {
    text.chars().map(|c| u8::try_from(c).ok()).collect()
}
