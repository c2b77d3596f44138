use std::fmt;

use serde::Serialize;

/// A value extracted from an inbound request.
///
/// JSON strings and numbers keep their kind. Booleans, arrays and objects
/// are kept as JSON and substituted in their compact JSON form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    Number(serde_json::Number),
    Json(serde_json::Value),
    Null,
}

impl ParamValue {
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ParamValue::Null,
            serde_json::Value::Number(n) => ParamValue::Number(n.clone()),
            serde_json::Value::String(s) => ParamValue::Text(s.clone()),
            other => ParamValue::Json(other.clone()),
        }
    }

    /// True for values a route treats as not supplied: null, empty text, zero,
    /// `false`, `[]` and `{}`.
    pub fn is_blank(&self) -> bool {
        match self {
            ParamValue::Null => true,
            ParamValue::Text(s) => s.is_empty(),
            ParamValue::Number(n) => n.as_f64() == Some(0.0),
            ParamValue::Json(serde_json::Value::Bool(b)) => !b,
            ParamValue::Json(serde_json::Value::Array(items)) => items.is_empty(),
            ParamValue::Json(serde_json::Value::Object(fields)) => fields.is_empty(),
            ParamValue::Json(other) => ParamValue::from_json(other).is_blank(),
        }
    }
}

/// Plain-text form used for template substitution. No quoting is applied.
impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Text(s) => f.write_str(s),
            ParamValue::Number(n) => write!(f, "{n}"),
            ParamValue::Json(v) => write!(f, "{v}"),
            ParamValue::Null => f.write_str("NULL"),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Number(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json() {
        assert_eq!(ParamValue::from_json(&json!("1")), ParamValue::from("1"));
        assert_eq!(ParamValue::from_json(&json!(1)), ParamValue::from(1i64));
        assert_eq!(ParamValue::from_json(&json!(null)), ParamValue::Null);
        assert_eq!(ParamValue::from_json(&json!(true)), ParamValue::Json(json!(true)));
        assert_eq!(ParamValue::from_json(&json!({"a": 1})).to_string(), r#"{"a":1}"#);
        assert_eq!(ParamValue::from_json(&json!([1, "x"])).to_string(), r#"[1,"x"]"#);
    }

    #[test]
    fn test_display_is_unquoted() {
        assert_eq!(ParamValue::from("1' OR '1'='1").to_string(), "1' OR '1'='1");
        assert_eq!(ParamValue::from(42i64).to_string(), "42");
        assert_eq!(ParamValue::from_json(&json!(1.5)).to_string(), "1.5");
        assert_eq!(ParamValue::Null.to_string(), "NULL");
    }

    #[test]
    fn test_is_blank() {
        assert!(ParamValue::Null.is_blank());
        assert!(ParamValue::from("").is_blank());
        assert!(ParamValue::from(0i64).is_blank());
        assert!(!ParamValue::from("0").is_blank());
        assert!(!ParamValue::from(7i64).is_blank());
    }

    #[test]
    fn test_empty_json_containers_and_false_are_blank() {
        for blank in [json!(false), json!([]), json!({})] {
            assert!(ParamValue::from_json(&blank).is_blank(), "{blank}");
        }
        for present in [json!(true), json!([0]), json!({"a": null})] {
            assert!(!ParamValue::from_json(&present).is_blank(), "{present}");
        }
    }
}
