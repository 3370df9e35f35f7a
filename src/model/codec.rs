//! JSON envelope codec for record payloads.
//!
//! ```json
//! {"model": "Person", "fields": {"first_name": "John", ...}}
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::model::error::{ModelError, ModelResult};

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    model: &'a str,
    fields: &'a T,
}

#[derive(Deserialize)]
struct Envelope {
    model: String,
    fields: serde_json::Value,
}

/// Serialize `record` as a payload of `model`.
pub fn encode<T: Serialize>(model: &str, record: &T) -> ModelResult<Vec<u8>> {
    Ok(serde_json::to_vec(&EnvelopeRef { model, fields: record })?)
}

/// Deserialize a payload, checking that it was written by `model`.
pub fn decode<T: DeserializeOwned>(model: &str, data: &[u8]) -> ModelResult<T> {
    let envelope: Envelope = serde_json::from_slice(data)?;
    if envelope.model != model {
        return Err(ModelError::ModelMismatch {
            expected: model.to_string(),
            found: envelope.model,
        });
    }
    Ok(serde_json::from_value(envelope.fields)?)
}
