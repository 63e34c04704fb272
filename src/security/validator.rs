//! Input validation: honeypot, required fields, trimming, image URL policy.

use serde_json::{Map, Value};

use crate::config::ImageUrlPolicy;
use crate::gateway::{GatewayError, SanitizedBody};
use crate::security::image_url::validate_image_url;

/// Field checked against the image URL policy.
pub const IMAGE_URL_FIELD: &str = "imageUrl";

/// Rules applied to a parsed JSON body.
#[derive(Debug, Clone)]
pub struct InputRules {
    pub honeypot_field: String,
    pub required_fields: Vec<String>,
    pub image_url: Option<ImageUrlPolicy>,
}

fn trimmed(value: Value) -> Value {
    match value {
        Value::String(s) => {
            let t = s.trim();
            if t.len() == s.len() {
                Value::String(s)
            } else {
                Value::String(t.to_string())
            }
        }
        other => other,
    }
}

/// Validate `payload` and produce the sanitized body.
pub fn validate(payload: Value, rules: &InputRules) -> Result<SanitizedBody, GatewayError> {
    let Value::Object(mut input) = payload else {
        return Err(GatewayError::NotAnObject);
    };

    let honeypot_filled = input
        .get(&rules.honeypot_field)
        .and_then(Value::as_str)
        .is_some_and(|v| !v.trim().is_empty());
    if honeypot_filled {
        tracing::warn!(field = %rules.honeypot_field, "Honeypot field filled, rejecting");
        return Err(GatewayError::HoneypotTriggered);
    }

    let mut output = Map::with_capacity(input.len());

    for field in &rules.required_fields {
        let value = input
            .remove(field)
            .and_then(|v| match v {
                Value::String(s) => Some(s.trim().to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GatewayError::MissingField(field.clone()))?;
        output.insert(field.clone(), Value::String(value));
    }

    for (key, value) in input {
        output.insert(key, trimmed(value));
    }

    if let Some(policy) = &rules.image_url {
        if let Some(raw) = output.get(IMAGE_URL_FIELD).and_then(Value::as_str) {
            validate_image_url(raw, policy).map_err(GatewayError::InvalidImageUrl)?;
        }
    }

    Ok(SanitizedBody::new(output))
}
