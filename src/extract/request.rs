use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Multipart};
use axum::http::header::CONTENT_TYPE;
use axum::http::Request;

/// Read-only view of one inbound request, holding everything the parameter
/// extractors look at.
#[derive(Debug, Clone, Default)]
pub struct ParameterRequest {
    query: Vec<(String, String)>,
    form: Vec<(String, String)>,
    body: Vec<u8>,
    content_type: Option<String>,
}

impl ParameterRequest {
    /// Build from the raw query string (without `?`), the `Content-Type`
    /// header and the body. Form pairs are decoded from the body only when
    /// the content type is `application/x-www-form-urlencoded`.
    pub fn new(query: Option<&str>, content_type: Option<&str>, body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        let content_type = content_type.map(str::to_string);

        let query = query.map(decode_pairs).unwrap_or_default();
        let form = if mime_type(content_type.as_deref()) == "application/x-www-form-urlencoded" {
            decode_pairs_bytes(&body)
        } else {
            Vec::new()
        };

        Self {
            query,
            form,
            body,
            content_type,
        }
    }

    /// Like [`ParameterRequest::new`], but `multipart/form-data` bodies are
    /// decoded as well. File parts are skipped.
    pub async fn from_http(query: Option<&str>, content_type: Option<&str>, body: Bytes) -> Self {
        let mut request = Self::new(query, content_type, body.to_vec());
        if let Some(ct) = content_type {
            if mime_type(Some(ct)) == "multipart/form-data" {
                request.form = decode_multipart(ct, body).await;
            }
        }
        request
    }

    /// First query-string value for `name`.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        first(&self.query, name)
    }

    /// First form value for `name`.
    pub fn form_value(&self, name: &str) -> Option<&str> {
        first(&self.form, name)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// True for `application/json` and any `+json` media type.
    pub fn is_json(&self) -> bool {
        let mime = mime_type(self.content_type.as_deref());
        mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
    }
}

fn first<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

fn decode_pairs(raw: &str) -> Vec<(String, String)> {
    decode_pairs_bytes(raw.as_bytes())
}

fn decode_pairs_bytes(raw: &[u8]) -> Vec<(String, String)> {
    url::form_urlencoded::parse(raw).into_owned().collect()
}

/// Text fields of a multipart body. Parsing stops at the first malformed part,
/// keeping whatever was read before it.
async fn decode_multipart(content_type: &str, body: Bytes) -> Vec<(String, String)> {
    let request = match Request::builder()
        .header(CONTENT_TYPE, content_type)
        .body(Body::from(body))
    {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(error = %e, "invalid multipart content type");
            return Vec::new();
        }
    };
    let mut multipart = match Multipart::from_request(request, &()).await {
        Ok(multipart) => multipart,
        Err(e) => {
            tracing::debug!(error = %e, "multipart body rejected");
            return Vec::new();
        }
    };

    let mut pairs = Vec::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "malformed multipart body");
                break;
            }
        };
        if field.file_name().is_some() {
            continue;
        }
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match field.text().await {
            Ok(value) => pairs.push((name, value)),
            Err(e) => {
                tracing::debug!(field = %name, error = %e, "unreadable multipart field");
                break;
            }
        }
    }
    pairs
}

/// Lower-cased media type without parameters.
fn mime_type(content_type: Option<&str>) -> String {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|m| m.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_pairs_are_decoded() {
        let request = ParameterRequest::new(Some("id=1%27%20OR%20%271%27%3D%271&id=2"), None, "");
        assert_eq!(request.query_value("id"), Some("1' OR '1'='1"));
        assert_eq!(request.query_value("col"), None);
    }

    #[test]
    fn test_form_pairs_only_for_urlencoded_bodies() {
        let form = ParameterRequest::new(
            None,
            Some("application/x-www-form-urlencoded; charset=UTF-8"),
            "id=1+OR+1%3D1",
        );
        assert_eq!(form.form_value("id"), Some("1 OR 1=1"));

        let json = ParameterRequest::new(None, Some("application/json"), "id=1");
        assert_eq!(json.form_value("id"), None);
    }

    fn multipart(parts: &[(&str, Option<&str>, &str)]) -> Bytes {
        let mut body = String::new();
        for (name, file_name, value) in parts {
            body.push_str("--XYZ\r\n");
            match file_name {
                Some(file) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file}\"\r\n"
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"\r\n"
                )),
            }
            body.push_str(&format!("\r\n{value}\r\n"));
        }
        body.push_str("--XYZ--\r\n");
        Bytes::from(body)
    }

    #[tokio::test]
    async fn test_multipart_text_fields_become_form_pairs() {
        let body = multipart(&[
            ("upload", Some("users.csv"), "1,admin"),
            ("id", None, "1' OR '1'='1"),
            ("data", None, r#"{"col": "2"}"#),
        ]);
        let request =
            ParameterRequest::from_http(None, Some("multipart/form-data; boundary=XYZ"), body)
                .await;

        assert_eq!(request.form_value("id"), Some("1' OR '1'='1"));
        assert_eq!(request.form_value("data"), Some(r#"{"col": "2"}"#));
        assert_eq!(request.form_value("upload"), None);
    }

    #[tokio::test]
    async fn test_malformed_multipart_yields_no_form() {
        let request = ParameterRequest::from_http(
            Some("id=7"),
            Some("multipart/form-data"),
            Bytes::from_static(b"id=1"),
        )
        .await;

        assert_eq!(request.form_value("id"), None);
        assert_eq!(request.query_value("id"), Some("7"));
    }

    #[tokio::test]
    async fn test_from_http_keeps_urlencoded_handling() {
        let request = ParameterRequest::from_http(
            None,
            Some("application/x-www-form-urlencoded"),
            Bytes::from_static(b"col=2"),
        )
        .await;
        assert_eq!(request.form_value("col"), Some("2"));
    }

    #[test]
    fn test_is_json() {
        assert!(ParameterRequest::new(None, Some("application/json"), "").is_json());
        assert!(ParameterRequest::new(None, Some("Application/JSON; charset=utf-8"), "").is_json());
        assert!(ParameterRequest::new(None, Some("application/vnd.api+json"), "").is_json());
        assert!(!ParameterRequest::new(None, Some("text/plain"), "").is_json());
        assert!(!ParameterRequest::new(None, None, "{}").is_json());
    }
}
