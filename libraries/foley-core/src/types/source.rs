//! Byte source references for effects
//!
//! A source is either a file on disk or inline bytes. Both can be written as a
//! single URI string (plain path, `file://` URI or base64 `data:` URI), which is
//! also the serialized form.

use crate::error::{FoleyError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

/// Where the encoded audio bytes of an effect live
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SourceRef {
    /// A file on the local file system
    Path(PathBuf),

    /// Encoded audio held in memory
    Inline {
        /// Media type from the data URI (e.g. `audio/wav`), if any
        media_type: Option<String>,
        /// Encoded bytes
        data: Arc<[u8]>,
    },
}

impl SourceRef {
    /// Reference a file path
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    /// Reference inline encoded bytes
    pub fn inline(data: impl Into<Arc<[u8]>>) -> Self {
        Self::Inline {
            media_type: None,
            data: data.into(),
        }
    }

    /// Parse a plain path, a `file://` URI or a base64 `data:` URI
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(FoleyError::invalid_source("empty source reference"));
        }

        if let Some(rest) = trimmed.strip_prefix("data:") {
            return Self::parse_data_uri(rest);
        }

        if trimmed.starts_with("file:") {
            let url = Url::parse(trimmed)
                .map_err(|e| FoleyError::invalid_source(format!("{}: {}", trimmed, e)))?;
            let path = url.to_file_path().map_err(|()| {
                FoleyError::invalid_source(format!("not a local file URI: {}", trimmed))
            })?;
            return Ok(Self::Path(path));
        }

        if let Some((scheme, _)) = trimmed.split_once("://") {
            return Err(FoleyError::invalid_source(format!(
                "unsupported scheme '{}' in {}",
                scheme, trimmed
            )));
        }

        Ok(Self::Path(PathBuf::from(trimmed)))
    }

    fn parse_data_uri(rest: &str) -> Result<Self> {
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| FoleyError::invalid_source("data URI without payload"))?;

        let mut parts = header.split(';');
        let media_type = parts
            .next()
            .filter(|m| !m.is_empty())
            .map(str::to_ascii_lowercase);

        if !parts.any(|p| p.eq_ignore_ascii_case("base64")) {
            return Err(FoleyError::invalid_source(
                "only base64 data URIs are supported",
            ));
        }

        let data = BASE64
            .decode(payload.trim())
            .map_err(|e| FoleyError::invalid_source(format!("bad base64 payload: {}", e)))?;

        Ok(Self::Inline {
            media_type,
            data: data.into(),
        })
    }

    /// File path, when this is a file reference
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Path(path) => Some(path),
            Self::Inline { .. } => None,
        }
    }

    /// Container hint derived from the path extension or the data URI media type
    pub fn extension_hint(&self) -> Option<String> {
        match self {
            Self::Path(path) => path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase),
            Self::Inline { media_type, .. } => media_type.as_deref().and_then(|m| {
                let sub = m.strip_prefix("audio/")?;
                Some(
                    match sub {
                        "mpeg" | "mp3" => "mp3",
                        "wav" | "wave" | "x-wav" | "vnd.wave" => "wav",
                        "ogg" | "vorbis" => "ogg",
                        "flac" | "x-flac" => "flac",
                        "mp4" | "aac" | "x-m4a" => "m4a",
                        other => other,
                    }
                    .to_string(),
                )
            }),
        }
    }
}

impl fmt::Debug for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Inline { media_type, data } => f
                .debug_struct("Inline")
                .field("media_type", media_type)
                .field("bytes", &data.len())
                .finish(),
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Inline { media_type, data } => write!(
                f,
                "data:{};base64,{}",
                media_type.as_deref().unwrap_or(""),
                BASE64.encode(data)
            ),
        }
    }
}

impl TryFrom<String> for SourceRef {
    type Error = FoleyError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<SourceRef> for String {
    fn from(source: SourceRef) -> Self {
        source.to_string()
    }
}
