//! Gzip compression for large notification payloads.

use std::io::{Read, Write};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde_json::{Value as JsonValue, json};

use crate::error::{EngineError, EngineResult};

/// A serialized payload, gzip-compressed when it was worth it.
#[derive(Debug, Clone)]
pub struct CompressedPayload {
    pub bytes: Vec<u8>,
    pub compressed: bool,
    pub original_size: usize,
}

impl CompressedPayload {
    /// Bytes saved relative to the plain serialization.
    pub fn savings(&self) -> usize {
        self.original_size.saturating_sub(self.bytes.len())
    }

    /// Wire form of the payload.
    ///
    /// When compression won, the payload travels as a gzip envelope with
    /// base64 data; otherwise the original value goes out untouched.
    /// [`payload_from_transport`] reverses this on the receiving side.
    pub fn transport_value(&self, original: &JsonValue) -> JsonValue {
        if self.compressed {
            json!({
                "encoding": "gzip",
                "data": BASE64.encode(&self.bytes),
                "original_bytes": self.original_size,
            })
        } else {
            original.clone()
        }
    }
}

/// Serializes a payload, gzipping it when the plain form exceeds the
/// threshold.
pub fn compress_payload(payload: &JsonValue, threshold: usize) -> EngineResult<CompressedPayload> {
    let plain = serde_json::to_vec(payload).map_err(|e| EngineError::Internal {
        source: anyhow::Error::from(e),
    })?;
    let original_size = plain.len();

    if original_size <= threshold {
        return Ok(CompressedPayload {
            bytes: plain,
            compressed: false,
            original_size,
        });
    }

    let mut encoder = GzEncoder::new(Vec::with_capacity(original_size / 2), Compression::default());
    encoder.write_all(&plain).map_err(|e| EngineError::Internal {
        source: anyhow::Error::from(e),
    })?;
    let bytes = encoder.finish().map_err(|e| EngineError::Internal {
        source: anyhow::Error::from(e),
    })?;

    Ok(CompressedPayload {
        bytes,
        compressed: true,
        original_size,
    })
}

/// Restores a payload from its wire form, inflating gzip envelopes.
///
/// Values without the envelope shape pass through unchanged.
pub fn payload_from_transport(value: &JsonValue) -> EngineResult<JsonValue> {
    let is_gzip = value.get("encoding").and_then(JsonValue::as_str) == Some("gzip");
    let Some(data) = is_gzip
        .then(|| value.get("data").and_then(JsonValue::as_str))
        .flatten()
    else {
        return Ok(value.clone());
    };

    let compressed = BASE64.decode(data).map_err(|e| EngineError::Internal {
        source: anyhow::Error::from(e),
    })?;
    let plain = decompress_payload(&compressed)?;
    serde_json::from_slice(&plain).map_err(|e| EngineError::Internal {
        source: anyhow::Error::from(e),
    })
}

/// Inflates a gzip-compressed payload back to its serialized form.
pub fn decompress_payload(bytes: &[u8]) -> EngineResult<Vec<u8>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut plain = Vec::new();
    decoder
        .read_to_end(&mut plain)
        .map_err(|e| EngineError::Internal {
            source: anyhow::Error::from(e),
        })?;
    Ok(plain)
}
