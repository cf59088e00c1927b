//! Image asset sources and their MIME types

use std::fmt;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Image formats accepted by the print platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MimeType {
    Jpeg,
    Png,
}

impl MimeType {
    /// Wire representation, e.g. `image/jpeg`
    pub fn as_str(&self) -> &'static str {
        match self {
            MimeType::Jpeg => "image/jpeg",
            MimeType::Png => "image/png",
        }
    }

    /// Detect from a file extension, case-insensitive
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(MimeType::Jpeg),
            "png" => Some(MimeType::Png),
            _ => None,
        }
    }

    /// Parse a full MIME string such as `image/png`
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(MimeType::Jpeg),
            "image/png" => Some(MimeType::Png),
            _ => None,
        }
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an image's pixel data lives.
///
/// Two assets compare equal when they point at the same source. URL
/// comparison is exact, so `http://` and `https://` versions of the
/// same address are distinct assets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Asset {
    /// Image file on the local filesystem
    File { path: PathBuf },
    /// In-memory encoded image data
    Bytes {
        #[serde(with = "base64_bytes")]
        data: Bytes,
        mime_type: MimeType,
    },
    /// Image already hosted at a remote HTTP(S) URL
    Url { url: String, mime_type: MimeType },
}

impl Asset {
    /// Build a file asset, validating the extension against the
    /// supported formats
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ModelError> {
        let path = path.into();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        if MimeType::from_extension(ext).is_none() {
            return Err(ModelError::UnsupportedFormat(
                path.to_string_lossy().into_owned(),
            ));
        }
        Ok(Asset::File { path })
    }

    /// Build an in-memory asset from already encoded image data
    pub fn from_bytes(data: impl Into<Bytes>, mime_type: MimeType) -> Self {
        Asset::Bytes {
            data: data.into(),
            mime_type,
        }
    }

    /// Build a remote asset. Only `http://` and `https://` URLs are
    /// accepted.
    pub fn from_url(url: impl Into<String>, mime_type: MimeType) -> Result<Self, ModelError> {
        let url = url.into();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ModelError::InvalidUrl(url));
        }
        Ok(Asset::Url { url, mime_type })
    }

    /// Remote assets are registered with the platform by URL instead of
    /// being uploaded byte-by-byte
    pub fn is_remote(&self) -> bool {
        matches!(self, Asset::Url { .. })
    }

    /// The remote URL, when this asset has one
    pub fn url(&self) -> Option<&str> {
        match self {
            Asset::Url { url, .. } => Some(url),
            _ => None,
        }
    }

    /// Local file path, when this asset is file-backed
    pub fn path(&self) -> Option<&Path> {
        match self {
            Asset::File { path } => Some(path),
            _ => None,
        }
    }

    /// MIME type of the encoded data. File assets fall back to JPEG
    /// when the extension is missing, which only happens for values
    /// deserialized from older payloads.
    pub fn mime_type(&self) -> MimeType {
        match self {
            Asset::File { path } => path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(MimeType::from_extension)
                .unwrap_or(MimeType::Jpeg),
            Asset::Bytes { mime_type, .. } => *mime_type,
            Asset::Url { mime_type, .. } => *mime_type,
        }
    }
}

mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_detection_from_extension() {
        assert_eq!(MimeType::from_extension("jpg"), Some(MimeType::Jpeg));
        assert_eq!(MimeType::from_extension("JPEG"), Some(MimeType::Jpeg));
        assert_eq!(MimeType::from_extension("png"), Some(MimeType::Png));
        assert_eq!(MimeType::from_extension("gif"), None);
        assert_eq!(MimeType::from_extension(""), None);
    }

    #[test]
    fn file_asset_rejects_unknown_format() {
        let err = Asset::from_file("holiday.webp").unwrap_err();
        assert!(matches!(err, ModelError::UnsupportedFormat(_)));

        let asset = Asset::from_file("holiday.JPG").unwrap();
        assert_eq!(asset.mime_type(), MimeType::Jpeg);
    }

    #[test]
    fn url_asset_requires_http_scheme() {
        assert!(Asset::from_url("https://cdn.example.com/a.png", MimeType::Png).is_ok());
        assert!(Asset::from_url("http://cdn.example.com/a.png", MimeType::Png).is_ok());
        let err = Asset::from_url("file:///tmp/a.png", MimeType::Png).unwrap_err();
        assert!(matches!(err, ModelError::InvalidUrl(_)));
    }

    #[test]
    fn url_equality_is_scheme_sensitive() {
        let secure = Asset::from_url("https://pix.example.com/1.jpg", MimeType::Jpeg).unwrap();
        let plain = Asset::from_url("http://pix.example.com/1.jpg", MimeType::Jpeg).unwrap();
        let secure_again =
            Asset::from_url("https://pix.example.com/1.jpg", MimeType::Jpeg).unwrap();
        assert_ne!(secure, plain);
        assert_eq!(secure, secure_again);
    }

    #[test]
    fn bytes_round_trip_through_json() {
        let asset = Asset::from_bytes(&b"\x89PNG\r\n"[..], MimeType::Png);
        let json = serde_json::to_string(&asset).unwrap();
        let back: Asset = serde_json::from_str(&json).unwrap();
        assert_eq!(asset, back);
    }
}
