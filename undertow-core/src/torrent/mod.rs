//! BitTorrent wire formats and tracker plumbing used by the stream pipeline

pub mod bencode;
pub mod magnet;
pub mod scrape;
pub mod tracker;

use std::fmt;
use std::str::FromStr;

use crate::UndertowError;

/// SHA-1 hash identifying a unique torrent.
///
/// 20-byte SHA-1 hash of the info dictionary. Accepted in text form as
/// 40 hex characters or 32 base32 characters; always rendered as lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InfoHash([u8; 20]);

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

impl InfoHash {
    /// Creates InfoHash from 20-byte SHA-1 hash.
    pub fn new(hash: [u8; 20]) -> Self {
        Self(hash)
    }

    /// Returns reference to underlying 20-byte hash.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Lowercase 40-character hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a hex or base32 encoded info hash.
    ///
    /// # Errors
    ///
    /// - `UndertowError::InvalidInfoHash` - Wrong length or alphabet
    pub fn parse(value: &str) -> Result<Self, UndertowError> {
        let trimmed = value.trim();
        let decoded = match trimmed.len() {
            40 => Self::decode_hex(trimmed),
            32 => Self::decode_base32(trimmed),
            _ => None,
        };

        decoded.map(Self).ok_or_else(|| UndertowError::InvalidInfoHash {
            value: value.to_string(),
        })
    }

    fn decode_hex(value: &str) -> Option<[u8; 20]> {
        let mut hash = [0u8; 20];
        hex::decode_to_slice(value, &mut hash).ok()?;
        Some(hash)
    }

    /// RFC 4648 base32 without padding: 32 symbols of 5 bits give exactly
    /// 160 bits, anything past that is truncated.
    fn decode_base32(value: &str) -> Option<[u8; 20]> {
        let mut hash = [0u8; 20];
        let mut buffer: u32 = 0;
        let mut bits = 0u32;
        let mut index = 0usize;

        for ch in value.bytes() {
            let upper = ch.to_ascii_uppercase();
            let symbol = BASE32_ALPHABET.iter().position(|&a| a == upper)? as u32;
            buffer = (buffer << 5) | symbol;
            bits += 5;

            if bits >= 8 {
                bits -= 8;
                if index < hash.len() {
                    hash[index] = (buffer >> bits) as u8;
                    index += 1;
                }
                buffer &= (1 << bits) - 1;
            }
        }

        (index == hash.len()).then_some(hash)
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for InfoHash {
    type Err = UndertowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_hash_display() {
        let hash = [
            0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef, 0x01, 0x23, 0x45, 0x67, 0x89, 0xab,
            0xcd, 0xef, 0x01, 0x23, 0x45, 0x67,
        ];
        let info_hash = InfoHash::new(hash);
        assert_eq!(
            info_hash.to_string(),
            "0123456789abcdef0123456789abcdef01234567"
        );
        assert_eq!(info_hash.to_hex(), info_hash.to_string());
    }

    #[test]
    fn test_parse_hex_is_case_insensitive() {
        let lower = InfoHash::parse("c12fe1c06bba254a9dc9f519b335aa7c1367a88a").unwrap();
        let upper = InfoHash::parse("C12FE1C06BBA254A9DC9F519B335AA7C1367A88A").unwrap();
        assert_eq!(lower, upper);
    }

    #[test]
    fn test_parse_base32() {
        // 0x00 * 20 encodes as 32 'A's, 0xFF * 20 as 32 '7's.
        assert_eq!(
            InfoHash::parse(&"A".repeat(32)).unwrap(),
            InfoHash::new([0u8; 20])
        );
        assert_eq!(
            InfoHash::parse(&"7".repeat(32)).unwrap(),
            InfoHash::new([0xFF; 20])
        );

        // base32 of 0x0123456789abcdef0123456789abcdef01234567
        let parsed = InfoHash::parse("AERUKZ4JVPG66AJDIVTYTK6N54ASGRLH").unwrap();
        assert_eq!(
            parsed.to_hex(),
            "0123456789abcdef0123456789abcdef01234567"
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(InfoHash::parse("").is_err());
        assert!(InfoHash::parse("abc").is_err());
        assert!(InfoHash::parse(&"g".repeat(40)).is_err());
        assert!(InfoHash::parse(&"1".repeat(32)).is_err());
    }
}
