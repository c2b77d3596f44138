//! Resolve a named parameter from whichever encoding the client used.
//!
//! Sources are tried in a fixed order and the first hit wins:
//!
//! 1. query-string field `name`
//! 2. query-string field `data` holding URL-encoded JSON with key `name`
//! 3. form field `name`
//! 4. JSON body: `data.name`, then `name` inside a JSON string under `data`,
//!    then top-level `name`
//! 5. form field `data` holding JSON with key `name`
//!
//! Malformed JSON in any source is logged and skipped.

mod request;

use percent_encoding::percent_decode_str;
use serde_json::Value;

pub use request::ParameterRequest;

use crate::types::ParamValue;

/// One extraction source.
pub type Extractor = fn(&ParameterRequest, &str) -> Option<ParamValue>;

/// Every source, in priority order.
pub const EXTRACTORS: [(&str, Extractor); 5] = [
    ("query", query_field),
    ("query_data_json", query_data_json),
    ("form", form_field),
    ("body_json", body_json),
    ("form_data_json", form_data_json),
];

/// Resolve `name` from `request`.
pub fn extract(request: &ParameterRequest, name: &str) -> Option<ParamValue> {
    EXTRACTORS.iter().find_map(|(source, extractor)| {
        let value = extractor(request, name)?;
        tracing::debug!(parameter = name, source = *source, "parameter resolved");
        Some(value)
    })
}

/// Query-string field named exactly `name`. An empty value still counts.
pub fn query_field(request: &ParameterRequest, name: &str) -> Option<ParamValue> {
    request.query_value(name).map(ParamValue::from)
}

/// Query-string `data` field, percent-decoded once more and parsed as JSON.
pub fn query_data_json(request: &ParameterRequest, name: &str) -> Option<ParamValue> {
    let raw = request.query_value("data").filter(|v| !v.is_empty())?;
    let decoded = match percent_decode_str(raw).decode_utf8() {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::debug!(error = %e, "query data parameter is not valid UTF-8");
            return None;
        }
    };
    let parsed = parse_json(&decoded, "query data parameter")?;
    lookup(&parsed, name)
}

/// Form field named exactly `name`, if non-empty.
pub fn form_field(request: &ParameterRequest, name: &str) -> Option<ParamValue> {
    request
        .form_value(name)
        .filter(|v| !v.is_empty())
        .map(ParamValue::from)
}

/// JSON request body, looking under `data` first.
pub fn body_json(request: &ParameterRequest, name: &str) -> Option<ParamValue> {
    if !request.is_json() {
        return None;
    }
    let body = match serde_json::from_slice::<Value>(request.body()) {
        Ok(body) => body,
        Err(e) => {
            tracing::debug!(error = %e, "request body is not valid JSON");
            return None;
        }
    };

    match body.get("data") {
        Some(nested @ Value::Object(_)) => {
            if let Some(value) = lookup(nested, name) {
                return Some(value);
            }
        }
        Some(Value::String(encoded)) => {
            if let Some(value) = parse_json(encoded, "nested data string")
                .and_then(|nested| lookup(&nested, name))
            {
                return Some(value);
            }
        }
        _ => {}
    }

    lookup(&body, name)
}

/// Form field `data` holding a JSON object.
pub fn form_data_json(request: &ParameterRequest, name: &str) -> Option<ParamValue> {
    let raw = request.form_value("data").filter(|v| !v.is_empty())?;
    let parsed = parse_json(raw, "form data parameter")?;
    lookup(&parsed, name)
}

fn parse_json(raw: &str, what: &str) -> Option<Value> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(error = %e, source = what, "ignoring malformed JSON");
            None
        }
    }
}

/// Top-level key of a JSON object. Non-objects never match.
fn lookup(value: &Value, name: &str) -> Option<ParamValue> {
    value.as_object()?.get(name).map(ParamValue::from_json)
}
