//! Envelope serialization
//!
//! One envelope becomes one compact JSON object. Key order is fixed by the
//! [`Envelope`] field order and properties keep their insertion order; an
//! empty property map is written as `{}`.

use crate::error::Result;
use crate::types::Envelope;

/// Render an envelope to its wire form.
pub fn serialize(envelope: &Envelope) -> Result<String> {
    Ok(serde_json::to_string(envelope)?)
}
