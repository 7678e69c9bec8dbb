//! Portable text encoding for screenshot payloads.
//!
//! Screenshots travel as `data:<mime>;base64,<payload>` URLs. Decoding also
//! accepts bare base64 and the empty string.

use base64::{engine::general_purpose, Engine as _};

const OCTET_STREAM: &str = "application/octet-stream";

/// Guess an image type from its magic bytes.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        "image/png"
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        "image/gif"
    } else {
        OCTET_STREAM
    }
}

pub fn encode_data_url(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return String::new();
    }
    format!(
        "data:{};base64,{}",
        sniff_mime(bytes),
        general_purpose::STANDARD.encode(bytes)
    )
}

pub fn decode_data_url(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(Vec::new());
    }

    let payload = match value.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map_or("", |(_, payload)| payload),
        None => value,
    };
    general_purpose::STANDARD.decode(payload)
}

/// Serde adapter storing a byte payload as a data URL string.
pub mod data_url {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode_data_url(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let value: Option<String> = Option::deserialize(deserializer)?;
        match value {
            None => Ok(Vec::new()),
            Some(value) => super::decode_data_url(&value).map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 1, 2];

    #[test]
    fn test_sniff_mime() {
        assert_eq!(sniff_mime(PNG), "image/png");
        assert_eq!(sniff_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(sniff_mime(b"RIFF\0\0\0\0WEBPVP8 "), "image/webp");
        assert_eq!(sniff_mime(b"GIF89a..."), "image/gif");
        assert_eq!(sniff_mime(b"plain"), "application/octet-stream");
    }

    #[test]
    fn test_data_url_forms() {
        let url = encode_data_url(PNG);
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(decode_data_url(&url).unwrap(), PNG);

        let bare = general_purpose::STANDARD.encode(PNG);
        assert_eq!(decode_data_url(&bare).unwrap(), PNG);

        assert_eq!(encode_data_url(&[]), "");
        assert!(decode_data_url("").unwrap().is_empty());
        assert!(decode_data_url("data:image/png;base64,@@@").is_err());
    }
}
