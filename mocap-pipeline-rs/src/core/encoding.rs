//! Text decoding for marker exports.
//!
//! Raw exports are written by Windows capture software in Windows-1252.
//! The code page leaves five bytes undefined (0x81, 0x8D, 0x8F, 0x90, 0x9D);
//! meeting one of them means the file is not in the expected encoding, and
//! decoding fails rather than guessing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Characters for bytes 0x80..=0x9F. `None` marks undefined code points.
const CP1252_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'),
    None,
    Some('\u{201A}'),
    Some('\u{0192}'),
    Some('\u{201E}'),
    Some('\u{2026}'),
    Some('\u{2020}'),
    Some('\u{2021}'),
    Some('\u{02C6}'),
    Some('\u{2030}'),
    Some('\u{0160}'),
    Some('\u{2039}'),
    Some('\u{0152}'),
    None,
    Some('\u{017D}'),
    None,
    None,
    Some('\u{2018}'),
    Some('\u{2019}'),
    Some('\u{201C}'),
    Some('\u{201D}'),
    Some('\u{2022}'),
    Some('\u{2013}'),
    Some('\u{2014}'),
    Some('\u{02DC}'),
    Some('\u{2122}'),
    Some('\u{0161}'),
    Some('\u{203A}'),
    Some('\u{0153}'),
    None,
    Some('\u{017E}'),
    Some('\u{0178}'),
];

/// Supported text encodings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextEncoding {
    Utf8,
    #[default]
    #[serde(alias = "cp1252")]
    Windows1252,
}

/// Errors raised while converting between bytes and text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("byte 0x{byte:02X} at offset {offset} is undefined in Windows-1252")]
    UndefinedByte { byte: u8, offset: usize },

    #[error("invalid UTF-8 at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("character {ch:?} cannot be encoded as Windows-1252")]
    Unencodable { ch: char },
}

impl TextEncoding {
    /// Decode `bytes` into a `String`.
    pub fn decode(self, bytes: &[u8]) -> Result<String, DecodeError> {
        match self {
            TextEncoding::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|e| {
                DecodeError::InvalidUtf8 {
                    offset: e.utf8_error().valid_up_to(),
                }
            }),
            TextEncoding::Windows1252 => decode_cp1252(bytes),
        }
    }

    /// Encode `text` into bytes.
    pub fn encode(self, text: &str) -> Result<Vec<u8>, DecodeError> {
        match self {
            TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
            TextEncoding::Windows1252 => encode_cp1252(text),
        }
    }
}

fn decode_cp1252(bytes: &[u8]) -> Result<String, DecodeError> {
    let mut out = String::with_capacity(bytes.len());
    for (offset, &byte) in bytes.iter().enumerate() {
        let ch = match byte {
            0x00..=0x7F | 0xA0..=0xFF => char::from(byte),
            _ => CP1252_HIGH[(byte - 0x80) as usize]
                .ok_or(DecodeError::UndefinedByte { byte, offset })?,
        };
        out.push(ch);
    }
    Ok(out)
}

fn encode_cp1252(text: &str) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::with_capacity(text.len());
    for ch in text.chars() {
        let code = ch as u32;
        let byte = if code < 0x80 || (0xA0..=0xFF).contains(&code) {
            code as u8
        } else {
            CP1252_HIGH
                .iter()
                .position(|&mapped| mapped == Some(ch))
                .map(|idx| 0x80 + idx as u8)
                .ok_or(DecodeError::Unencodable { ch })?
        };
        out.push(byte);
    }
    Ok(out)
}
