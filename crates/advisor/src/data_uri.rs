//! Base64 data URIs carrying plant photos.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::errors::{AdvisorError, AdvisorResult};

/// Image types the diagnosis form accepts.
pub const ACCEPTED_IMAGE_TYPES: &[&str] = &["image/png", "image/jpeg", "image/webp"];

/// Default upper bound on decoded image size.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 8 * 1024 * 1024;

/// A `data:<mime>;base64,<payload>` string split into its parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataUri {
    mime_type: String,
    data: String,
}

impl DataUri {
    /// Parse a data URI, checking that the payload is valid base64.
    pub fn parse(input: &str) -> AdvisorResult<Self> {
        let rest = input
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| invalid("missing 'data:' prefix"))?;

        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| invalid("missing ',' between header and payload"))?;

        let mut params = header.split(';');
        let mime_type = params.next().unwrap_or_default().trim().to_ascii_lowercase();
        if mime_type.is_empty() || !mime_type.contains('/') {
            return Err(invalid("missing MIME type"));
        }
        if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
            return Err(invalid("payload must be base64 encoded"));
        }

        let data: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        if data.is_empty() {
            return Err(invalid("empty payload"));
        }
        STANDARD
            .decode(&data)
            .map_err(|e| invalid(&format!("payload is not valid base64: {e}")))?;

        Ok(Self { mime_type, data })
    }

    /// Encode raw bytes.
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: STANDARD.encode(bytes),
        }
    }

    /// Read an image file, inferring the MIME type from its extension.
    pub fn from_file(path: &Path) -> AdvisorResult<Self> {
        let mime_type = mime_type_for_path(path).ok_or_else(|| {
            invalid(&format!(
                "cannot infer an image type from '{}'",
                path.display()
            ))
        })?;
        let bytes = std::fs::read(path).map_err(|e| {
            invalid(&format!("failed to read '{}': {e}", path.display()))
        })?;
        Ok(Self::from_bytes(mime_type, &bytes))
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// The base64 payload without the header.
    pub fn base64_data(&self) -> &str {
        &self.data
    }

    /// Size of the decoded payload in bytes.
    pub fn decoded_len(&self) -> usize {
        let padding = self.data.bytes().rev().take_while(|b| *b == b'=').count();
        (self.data.len() / 4 * 3).saturating_sub(padding)
    }

    pub fn decode(&self) -> AdvisorResult<Vec<u8>> {
        STANDARD
            .decode(&self.data)
            .map_err(|e| invalid(&e.to_string()))
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.data)
    }
}

impl FromStr for DataUri {
    type Err = AdvisorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Guess an accepted image MIME type from a file extension.
pub fn mime_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

fn invalid(reason: &str) -> AdvisorError {
    AdvisorError::InvalidDataUri {
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_header_and_payload() {
        let uri = DataUri::parse("data:image/JPEG;base64,/9j/4AAQ").unwrap();
        assert_eq!(uri.mime_type(), "image/jpeg");
        assert_eq!(uri.base64_data(), "/9j/4AAQ");
        assert_eq!(uri.to_string(), "data:image/jpeg;base64,/9j/4AAQ");
    }

    #[test]
    fn test_parse_accepts_extra_parameters() {
        let uri: DataUri = "data:image/png;name=leaf.png;base64,iVBORw0KGgo="
            .parse()
            .unwrap();
        assert_eq!(uri.mime_type(), "image/png");
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        for bad in [
            "image/png;base64,AAAA",
            "data:image/png;base64",
            "data:;base64,AAAA",
            "data:image/png,AAAA",
            "data:image/png;base64,",
            "data:image/png;base64,not*base64",
        ] {
            assert!(DataUri::parse(bad).is_err(), "accepted {bad}");
        }
    }

    #[test]
    fn test_decoded_len_matches_decode() {
        for bytes in [&b"a"[..], &b"ab"[..], &b"abc"[..], &b"abcd"[..], &b"leaf spots"[..]] {
            let uri = DataUri::from_bytes("image/png", bytes);
            assert_eq!(uri.decoded_len(), bytes.len());
            assert_eq!(uri.decode().unwrap(), bytes);
        }
    }

    #[test]
    fn test_mime_type_for_path() {
        assert_eq!(mime_type_for_path(Path::new("leaf.JPG")), Some("image/jpeg"));
        assert_eq!(mime_type_for_path(Path::new("leaf.webp")), Some("image/webp"));
        assert_eq!(mime_type_for_path(Path::new("leaf.gif")), None);
        assert_eq!(mime_type_for_path(Path::new("leaf")), None);
    }
}
