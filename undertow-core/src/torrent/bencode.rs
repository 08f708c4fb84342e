//! Minimal bencode decoder for tracker responses.
//!
//! Supports integers, byte strings, lists and dictionaries with byte-string
//! keys. Encoding is never needed: scrape requests are plain query strings.

use std::collections::BTreeMap;

use thiserror::Error;

const MAX_DEPTH: usize = 32;

/// Decoded bencode value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer(i64),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Dict(BTreeMap<Vec<u8>, Value>),
}

/// Errors raised while decoding bencode input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BencodeError {
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    #[error("invalid string length")]
    InvalidStringLength,

    #[error("unexpected byte {byte:#04x} at offset {offset}")]
    UnexpectedByte { byte: u8, offset: usize },

    #[error("dictionary key must be a byte string")]
    NonStringKey,

    #[error("nesting too deep")]
    NestingTooDeep,
}

impl Value {
    /// Looks up `key` when this value is a dictionary.
    pub fn get(&self, key: &[u8]) -> Option<&Value> {
        match self {
            Value::Dict(dict) => dict.get(key),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<Vec<u8>, Value>> {
        match self {
            Value::Dict(dict) => Some(dict),
            _ => None,
        }
    }
}

/// Decodes the first complete value in `data`.
///
/// Trailing bytes after the value are ignored; some trackers append
/// whitespace or a newline to scrape bodies.
///
/// # Errors
///
/// - `BencodeError` - Truncated or malformed input
pub fn decode(data: &[u8]) -> Result<Value, BencodeError> {
    let mut decoder = Decoder { data, pos: 0 };
    decoder.value(0)
}

struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Decoder<'_> {
    fn peek(&self) -> Result<u8, BencodeError> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(BencodeError::UnexpectedEof)
    }

    fn value(&mut self, depth: usize) -> Result<Value, BencodeError> {
        if depth > MAX_DEPTH {
            return Err(BencodeError::NestingTooDeep);
        }

        match self.peek()? {
            b'i' => self.integer(),
            b'l' => self.list(depth),
            b'd' => self.dict(depth),
            b'0'..=b'9' => self.bytes().map(Value::Bytes),
            byte => Err(BencodeError::UnexpectedByte {
                byte,
                offset: self.pos,
            }),
        }
    }

    /// Reads up to (not including) `terminator` and advances past it.
    fn take_until(&mut self, terminator: u8) -> Result<&[u8], BencodeError> {
        let start = self.pos;
        let len = self.data[start..]
            .iter()
            .position(|&b| b == terminator)
            .ok_or(BencodeError::UnexpectedEof)?;
        self.pos = start + len + 1;
        Ok(&self.data[start..start + len])
    }

    fn integer(&mut self) -> Result<Value, BencodeError> {
        self.pos += 1;
        let digits = self.take_until(b'e')?;
        let text = std::str::from_utf8(digits)
            .map_err(|_| BencodeError::InvalidInteger("invalid utf8".into()))?;

        if text.is_empty() || text == "-" {
            return Err(BencodeError::InvalidInteger(text.into()));
        }
        if text.starts_with("-0") || (text.starts_with('0') && text.len() > 1) {
            return Err(BencodeError::InvalidInteger(text.into()));
        }

        text.parse()
            .map(Value::Integer)
            .map_err(|_| BencodeError::InvalidInteger(text.into()))
    }

    fn bytes(&mut self) -> Result<Vec<u8>, BencodeError> {
        let len_digits = self.take_until(b':')?;
        let len: usize = std::str::from_utf8(len_digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(BencodeError::InvalidStringLength)?;

        let end = self
            .pos
            .checked_add(len)
            .ok_or(BencodeError::InvalidStringLength)?;
        if end > self.data.len() {
            return Err(BencodeError::UnexpectedEof);
        }

        let bytes = self.data[self.pos..end].to_vec();
        self.pos = end;
        Ok(bytes)
    }

    fn list(&mut self, depth: usize) -> Result<Value, BencodeError> {
        self.pos += 1;
        let mut items = Vec::new();
        while self.peek()? != b'e' {
            items.push(self.value(depth + 1)?);
        }
        self.pos += 1;
        Ok(Value::List(items))
    }

    fn dict(&mut self, depth: usize) -> Result<Value, BencodeError> {
        self.pos += 1;
        let mut dict = BTreeMap::new();
        while self.peek()? != b'e' {
            if !self.peek()?.is_ascii_digit() {
                return Err(BencodeError::NonStringKey);
            }
            let key = self.bytes()?;
            let value = self.value(depth + 1)?;
            dict.insert(key, value);
        }
        self.pos += 1;
        Ok(Value::Dict(dict))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_scalars() {
        assert_eq!(decode(b"i42e"), Ok(Value::Integer(42)));
        assert_eq!(decode(b"i-7e"), Ok(Value::Integer(-7)));
        assert_eq!(decode(b"4:spam"), Ok(Value::Bytes(b"spam".to_vec())));
        assert_eq!(decode(b"0:"), Ok(Value::Bytes(Vec::new())));
    }

    #[test]
    fn test_decode_nested_scrape_body() {
        let mut body = Vec::new();
        body.extend_from_slice(b"d5:filesd20:");
        body.extend_from_slice(&[0xAB; 20]);
        body.extend_from_slice(b"d8:completei12e10:downloadedi40e10:incompletei3eeee");

        let value = decode(&body).unwrap();
        let stats = value.get(b"files").and_then(|f| f.get(&[0xAB; 20])).unwrap();
        assert_eq!(stats.get(b"complete").and_then(Value::as_integer), Some(12));
        assert_eq!(stats.get(b"incomplete").and_then(Value::as_integer), Some(3));
    }

    #[test]
    fn test_decode_list() {
        assert_eq!(
            decode(b"li1e3:abce"),
            Ok(Value::List(vec![
                Value::Integer(1),
                Value::Bytes(b"abc".to_vec())
            ]))
        );
    }

    #[test]
    fn test_trailing_bytes_are_ignored() {
        assert_eq!(decode(b"i1e\n"), Ok(Value::Integer(1)));
    }

    #[test]
    fn test_malformed_input() {
        assert_eq!(decode(b""), Err(BencodeError::UnexpectedEof));
        assert_eq!(decode(b"i12"), Err(BencodeError::UnexpectedEof));
        assert!(matches!(decode(b"i03e"), Err(BencodeError::InvalidInteger(_))));
        assert!(matches!(decode(b"i-0e"), Err(BencodeError::InvalidInteger(_))));
        assert!(matches!(decode(b"ie"), Err(BencodeError::InvalidInteger(_))));
        assert_eq!(decode(b"10:short"), Err(BencodeError::UnexpectedEof));
        assert_eq!(decode(b"di1ei2ee"), Err(BencodeError::NonStringKey));
        assert!(matches!(
            decode(b"x"),
            Err(BencodeError::UnexpectedByte { byte: b'x', offset: 0 })
        ));
        assert_eq!(decode(b"d3:key"), Err(BencodeError::UnexpectedEof));
    }

    #[test]
    fn test_nesting_limit() {
        let mut deep = vec![b'l'; MAX_DEPTH + 2];
        deep.extend(vec![b'e'; MAX_DEPTH + 2]);
        assert_eq!(decode(&deep), Err(BencodeError::NestingTooDeep));
    }
}
