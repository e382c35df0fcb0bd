//! `/api` request codec: form-urlencoded fields whose `payload` value is a
//! gzip-compressed JSON document.
//!
//! Field values are raw bytes, so the form encoder works on `&[u8]` instead of
//! `&str` (the compressed payload is not valid UTF-8).

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Serializes `value` to JSON and gzips the result.
pub fn compress_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(value).context("failed to serialize request payload")?;
    let mut encoder = GzEncoder::new(Vec::with_capacity(json.len() / 2), Compression::default());
    encoder
        .write_all(&json)
        .context("failed to compress request payload")?;
    encoder.finish().context("failed to finish payload gzip stream")
}

/// Reverses [`compress_json`].
pub fn decompress_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut json = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut json)
        .context("payload is not a valid gzip stream")?;
    serde_json::from_slice(&json).context("payload is not valid JSON")
}

/// Encodes `fields` as an `application/x-www-form-urlencoded` body.
pub fn encode_form(fields: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (idx, (name, value)) in fields.iter().enumerate() {
        if idx > 0 {
            body.push(b'&');
        }
        escape_into(&mut body, name.as_bytes());
        body.push(b'=');
        escape_into(&mut body, value);
    }
    body
}

/// Decodes a form body into `(name, raw value)` pairs, preserving order.
pub fn decode_form(body: &[u8]) -> Result<Vec<(String, Vec<u8>)>> {
    let mut fields = Vec::new();
    for pair in body.split(|byte| *byte == b'&') {
        if pair.is_empty() {
            continue;
        }
        let (name, value) = match pair.iter().position(|byte| *byte == b'=') {
            Some(pos) => (&pair[..pos], &pair[pos + 1..]),
            None => (pair, &pair[pair.len()..]),
        };
        let name = String::from_utf8(unescape(name)?).context("form field name is not UTF-8")?;
        fields.push((name, unescape(value)?));
    }
    Ok(fields)
}

fn escape_into(out: &mut Vec<u8>, raw: &[u8]) {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    for &byte in raw {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte),
            b' ' => out.push(b'+'),
            _ => {
                out.push(b'%');
                out.push(HEX[usize::from(byte >> 4)]);
                out.push(HEX[usize::from(byte & 0x0f)]);
            }
        }
    }
}

fn unescape(raw: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(raw.len());
    let mut idx = 0;
    while idx < raw.len() {
        match raw[idx] {
            b'+' => out.push(b' '),
            b'%' => {
                if idx + 2 >= raw.len() {
                    bail!("truncated percent escape in form body");
                }
                let high = hex_value(raw[idx + 1])?;
                let low = hex_value(raw[idx + 2])?;
                out.push((high << 4) | low);
                idx += 2;
            }
            byte => out.push(byte),
        }
        idx += 1;
    }
    Ok(out)
}

fn hex_value(digit: u8) -> Result<u8> {
    match digit {
        b'0'..=b'9' => Ok(digit - b'0'),
        b'a'..=b'f' => Ok(digit - b'a' + 10),
        b'A'..=b'F' => Ok(digit - b'A' + 10),
        other => bail!("invalid percent escape digit {:?}", char::from(other)),
    }
}
