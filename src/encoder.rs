//! Transport encoding of tracking requests.
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::{Properties, Result};

const TRACK_ENDPOINT: &str = "/track/?data=";

/// Event envelope sent to the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    /// Event name.
    pub event: String,
    /// Event properties, including `token`, `time` and `ip`.
    pub properties: Properties,
}

/// Serialize `payload` to JSON and base64-encode it.
///
/// The output never contains newline characters, so it can be written as a single line to the
/// worker pipe.
pub fn encode_payload(payload: &EventPayload) -> Result<String> {
    let json = serde_json::to_vec(payload)?;
    let mut data = STANDARD.encode(json);
    data.retain(|c| c != '\n');
    Ok(data)
}

/// Build the collector URL for an encoded payload.
///
/// The payload is appended verbatim, the collector accepts unescaped base64.
pub fn track_url(base_url: &str, data: &str) -> String {
    format!("{}{}{}", base_url.trim_end_matches('/'), TRACK_ENDPOINT, data)
}

/// Reverse of [`encode_payload`].
pub fn decode_payload(data: &str) -> Option<EventPayload> {
    let json = STANDARD.decode(data.trim()).ok()?;
    serde_json::from_slice(&json).ok()
}
