//! Text encodings for generator output

use base64::Engine;
use serde::{Deserialize, Serialize};

/// Output encoding for random bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingFormat {
    /// Raw binary data
    Binary,
    /// Lowercase hexadecimal
    Hex,
    /// Standard base64 with padding
    Base64,
}

impl EncodingFormat {
    /// Parse from string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "binary" | "raw" => Some(Self::Binary),
            "hex" | "hexadecimal" => Some(Self::Hex),
            "base64" | "b64" => Some(Self::Base64),
            _ => None,
        }
    }

    /// Render bytes in this encoding. Binary output is returned unchanged.
    pub fn encode(&self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Binary => data.to_vec(),
            Self::Hex => encode_hex(data).into_bytes(),
            Self::Base64 => encode_base64(data).into_bytes(),
        }
    }

    /// Whether the encoded form is printable text
    pub fn is_text(&self) -> bool {
        !matches!(self, Self::Binary)
    }
}

/// Encode bytes to lowercase hexadecimal string
pub fn encode_hex(data: &[u8]) -> String {
    hex::encode(data)
}

/// Encode bytes to base64 string
pub fn encode_base64(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}
