//! Byte-safe value codec.
//!
//! Values are compressed with zstd and hex encoded so that any byte sequence,
//! including NUL and invalid UTF-8, can live in a plain text column. The empty
//! string encodes to itself so that "no value" stays cheap to store and test.

use crate::{AttrError, AttrResult};

/// Fastest zstd level; compression ratio does not matter for correctness.
const COMPRESSION_LEVEL: i32 = 1;

pub fn encode(value: &[u8]) -> AttrResult<String> {
    if value.is_empty() {
        return Ok(String::new());
    }
    let compressed = zstd::encode_all(value, COMPRESSION_LEVEL)
        .map_err(|err| AttrError::storage(format!("compress value: {err}")))?;
    Ok(hex::encode(compressed))
}

pub fn decode(code: &str) -> AttrResult<Vec<u8>> {
    if code.is_empty() {
        return Ok(Vec::new());
    }
    let compressed =
        hex::decode(code).map_err(|err| AttrError::decode(format!("hex decode: {err}")))?;
    zstd::decode_all(compressed.as_slice())
        .map_err(|err| AttrError::decode(format!("decompress: {err}")))
}

pub fn encode_str(value: &str) -> AttrResult<String> {
    encode(value.as_bytes())
}

pub fn decode_str(code: &str) -> AttrResult<String> {
    let bytes = decode(code)?;
    String::from_utf8(bytes).map_err(|err| AttrError::decode(format!("utf-8: {err}")))
}
