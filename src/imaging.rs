//! Self-describing image blobs.
//!
//! Stored records own their image bytes outright — no paths, no handles
//! into the filesystem. The on-disk and on-export representation is a
//! `data:{mime};base64,{payload}` string, so exports stay readable by the
//! browser tooling that produced the original export format.

use anyhow::{anyhow, bail, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// An encoded image: format tag plus base64 payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct EncodedImage {
    mime: String,
    payload: String,
}

impl EncodedImage {
    /// Encode raw image bytes, sniffing the format from the magic bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let format = image::guess_format(bytes).context("unrecognized image format")?;
        Ok(Self {
            mime: format.to_mime_type().to_string(),
            payload: BASE64.encode(bytes),
        })
    }

    /// Wrap an already-encoded base64 payload with a known mime type.
    /// Used for images that arrive pre-encoded over the wire.
    pub fn from_parts(mime: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            mime: mime.into(),
            payload: payload.into(),
        }
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    /// The raw base64 payload, without the data-URL prefix.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Decode back to the original bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        BASE64
            .decode(&self.payload)
            .context("invalid base64 image payload")
    }

    /// Materialize a drawable image handle for display.
    pub fn to_image(&self) -> Result<DynamicImage> {
        let bytes = self.to_bytes()?;
        image::load_from_memory(&bytes).context("failed to decode image blob")
    }

    pub fn as_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.payload)
    }

    pub fn from_data_url(value: &str) -> Result<Self> {
        let rest = value
            .strip_prefix("data:")
            .ok_or_else(|| anyhow!("missing 'data:' prefix"))?;
        let (mime, payload) = rest
            .split_once(";base64,")
            .ok_or_else(|| anyhow!("missing ';base64,' separator"))?;
        if mime.is_empty() {
            bail!("empty mime type in image blob");
        }
        Ok(Self {
            mime: mime.to_string(),
            payload: payload.to_string(),
        })
    }
}

impl From<EncodedImage> for String {
    fn from(image: EncodedImage) -> Self {
        image.as_data_url()
    }
}

impl TryFrom<String> for EncodedImage {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        Self::from_data_url(&value)
    }
}
