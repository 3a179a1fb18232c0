//! Value codec
//!
//! Converts between [`Value`] and the text stored in the `value` column.
//!
//! Decoding is a first-character heuristic: text starting with `[` or `{` is
//! parsed as JSON, anything else is returned as a scalar. A scalar that itself
//! starts with one of those characters is therefore misread on the way back:
//! `"[1,2]"` comes back as an array, and `"[literal]"` fails to decode at all.

use crate::core::{MapError, Result, Value};

/// Encode a value into its stored text form.
pub fn encode(value: &Value) -> String {
    match value {
        Value::Scalar(text) => text.clone(),
        Value::Structured(json) => json.to_string(),
    }
}

/// Decode stored text back into a value.
pub fn decode(text: &str) -> Result<Value> {
    if looks_structured(text) {
        let json = serde_json::from_str(text)
            .map_err(|e| MapError::Codec(format!("stored value {:?} is not valid JSON: {}", text, e)))?;
        return Ok(Value::Structured(json));
    }
    Ok(Value::Scalar(text.to_string()))
}

fn looks_structured(text: &str) -> bool {
    matches!(text.as_bytes().first(), Some(b'[' | b'{'))
}
