use std::collections::HashMap;

use crate::error::{LabError, Result};
use crate::types::ParamValue;

/// Values bound to template placeholders, by name.
pub type Params = HashMap<String, ParamValue>;

/// A query string with `{name}` placeholders.
///
/// Rendering is plain textual substitution: values are inserted exactly as
/// their text form, with no quoting and no escaping. `{{` and `}}` produce
/// literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTemplate {
    source: String,
}

impl QueryTemplate {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// The unrendered template text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Names of the placeholders in order of appearance.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut rest = self.source.as_str();
        while let Some(open) = rest.find('{') {
            let after = &rest[open + 1..];
            if after.starts_with('{') {
                rest = &after[1..];
                continue;
            }
            match after.find('}') {
                Some(close) => {
                    names.push(&after[..close]);
                    rest = &after[close + 1..];
                }
                None => break,
            }
        }
        names
    }

    /// Substitute every placeholder with its bound value.
    pub fn render(&self, params: &Params) -> Result<String> {
        let mut sql = String::with_capacity(self.source.len() + 32);
        let mut rest = self.source.as_str();

        while let Some(pos) = rest.find(['{', '}']) {
            sql.push_str(&rest[..pos]);
            let brace = &rest[pos..pos + 1];
            let after = &rest[pos + 1..];

            // Doubled braces are literals.
            if after.starts_with(brace) {
                sql.push_str(brace);
                rest = &after[1..];
                continue;
            }
            if brace == "}" {
                return Err(LabError::Format {
                    placeholder: "}".to_string(),
                });
            }

            let close = after.find('}').ok_or_else(|| LabError::Format {
                placeholder: after.to_string(),
            })?;
            let name = &after[..close];
            let value = params.get(name).ok_or_else(|| LabError::Format {
                placeholder: name.to_string(),
            })?;
            sql.push_str(&value.to_string());
            rest = &after[close + 1..];
        }

        sql.push_str(rest);
        Ok(sql)
    }
}

impl From<&str> for QueryTemplate {
    fn from(value: &str) -> Self {
        QueryTemplate::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, ParamValue)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_substitution_does_not_escape() {
        let template = QueryTemplate::new("SELECT * FROM users WHERE id = {uid}");
        let sql = template
            .render(&params(&[("uid", ParamValue::from("1 OR 1=1"))]))
            .unwrap();
        assert_eq!(sql, "SELECT * FROM users WHERE id = 1 OR 1=1");
    }

    #[test]
    fn test_quotes_in_value_break_out_of_literal() {
        let template = QueryTemplate::new("SELECT * FROM users WHERE id = '{uid}'");
        let sql = template
            .render(&params(&[("uid", ParamValue::from("1' OR '1'='1"))]))
            .unwrap();
        assert_eq!(sql, "SELECT * FROM users WHERE id = '1' OR '1'='1'");
    }

    #[test]
    fn test_like_template_and_numeric_value() {
        let template =
            QueryTemplate::new("SELECT * FROM users WHERE username LIKE '%{username}%'");
        let sql = template
            .render(&params(&[("username", ParamValue::from(7i64))]))
            .unwrap();
        assert_eq!(sql, "SELECT * FROM users WHERE username LIKE '%7%'");
    }

    #[test]
    fn test_missing_value_is_format_error() {
        let template = QueryTemplate::new("SELECT * FROM users ORDER BY {col}");
        match template.render(&Params::new()) {
            Err(LabError::Format { placeholder }) => assert_eq!(placeholder, "col"),
            _ => panic!("Expected Format error"),
        }
    }

    #[test]
    fn test_escaped_and_unbalanced_braces() {
        let template = QueryTemplate::new("SELECT '{{x}}', {a}");
        let sql = template
            .render(&params(&[("a", ParamValue::from("1"))]))
            .unwrap();
        assert_eq!(sql, "SELECT '{x}', 1");

        assert!(QueryTemplate::new("SELECT }").render(&Params::new()).is_err());
        assert!(QueryTemplate::new("SELECT {a").render(&Params::new()).is_err());
    }

    #[test]
    fn test_placeholders() {
        let template = QueryTemplate::new("SELECT {{lit}} FROM t WHERE a = {a} AND b = '{b}'");
        assert_eq!(template.placeholders(), vec!["a", "b"]);
    }
}
