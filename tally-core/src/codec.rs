//! Batch wire encoding
//!
//! A batch of serialized envelopes is framed as a JSON array, gzipped, and
//! base64-encoded so it can travel as a form field:
//!
//! ```text
//! [e1,e2,...,en] → gzip → base64 → data_list=...&gzip=1
//! ```

use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{Error, Result};

/// Join already-serialized envelopes into one JSON array, in order.
pub fn frame(payloads: &[String]) -> String {
    format!("[{}]", payloads.join(","))
}

/// Frame, gzip, and base64-encode a batch.
pub fn encode_batch(payloads: &[String]) -> Result<String> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(frame(payloads).as_bytes())?;
    let compressed = encoder.finish()?;
    Ok(STANDARD.encode(compressed))
}

/// Inverse of [`encode_batch`], as a collector would apply it.
pub fn decode_batch(encoded: &str) -> Result<Vec<serde_json::Value>> {
    let compressed = STANDARD
        .decode(encoded.trim())
        .map_err(|e| Error::Delivery(format!("invalid base64 batch: {}", e)))?;

    let mut json = String::new();
    GzDecoder::new(compressed.as_slice()).read_to_string(&mut json)?;

    Ok(serde_json::from_str(&json)?)
}

/// Base64 of a single uncompressed payload
pub fn encode_single(payload: &str) -> String {
    STANDARD.encode(payload.as_bytes())
}
