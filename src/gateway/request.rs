use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde_json::Value;

use crate::error::{ApiError, ApiResult};

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Clone, PartialEq)]
pub enum FormPart {
    Text { name: String, value: String },
    File { name: String, file_name: String, bytes: Vec<u8>, mime: Option<String> },
}

/// Request body. Kept as plain data so the same request can be re-issued
/// after a token refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    /// url-encoded form
    Form(Vec<(String, String)>),
    /// multipart form data; the transport sets its own boundary content type
    Multipart(Vec<FormPart>),
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: RequestBody,
    pub headers: HeaderMap,
    pub auth: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), body: RequestBody::Empty, headers: HeaderMap::new(), auth: false }
    }

    pub fn get(path: impl Into<String>) -> Self { Self::new(Method::GET, path) }
    pub fn post(path: impl Into<String>) -> Self { Self::new(Method::POST, path) }
    pub fn put(path: impl Into<String>) -> Self { Self::new(Method::PUT, path) }
    pub fn delete(path: impl Into<String>) -> Self { Self::new(Method::DELETE, path) }

    /// Attach the bearer token and take part in the refresh protocol.
    pub fn authenticated(mut self) -> Self {
        self.auth = true;
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn form<K: Into<String>, V: Into<String>>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        self.body = RequestBody::Form(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    pub fn multipart(mut self, parts: Vec<FormPart>) -> Self {
        self.body = RequestBody::Multipart(parts);
        self
    }

    pub fn header(mut self, name: HeaderName, value: &str) -> ApiResult<Self> {
        let v = HeaderValue::from_str(value)
            .map_err(|e| ApiError::config(format!("invalid value for header {}: {}", name, e)))?;
        self.headers.insert(name, v);
        Ok(self)
    }

    /// Append url-encoded query parameters to the path.
    pub fn query<K: AsRef<str>, V: AsRef<str>>(mut self, pairs: &[(K, V)]) -> Self {
        if pairs.is_empty() { return self; }
        let sep = if self.path.contains('?') { '&' } else { '?' };
        self.path.push(sep);
        self.path.push_str(&encode_pairs(pairs));
        self
    }

    /// Content type to send when the caller has not set one.
    /// Multipart bodies get none so the transport can add its boundary.
    pub(crate) fn default_content_type(&self) -> Option<&'static str> {
        match self.body {
            RequestBody::Multipart(_) => None,
            RequestBody::Form(_) => Some(CONTENT_TYPE_FORM),
            _ => Some(CONTENT_TYPE_JSON),
        }
    }
}

pub(crate) fn encode_pairs<K: AsRef<str>, V: AsRef<str>>(pairs: &[(K, V)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k.as_ref()), urlencoding::encode(v.as_ref())))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::CONTENT_TYPE;

    #[test]
    fn query_is_encoded_in_order() {
        let r = ApiRequest::get("/activity").query(&[("limit", "20"), ("offset", "0")]);
        assert_eq!(r.path, "/activity?limit=20&offset=0");
        let r = ApiRequest::get("/search?x=1").query(&[("q", "a b&c")]);
        assert_eq!(r.path, "/search?x=1&q=a%20b%26c");
    }

    #[test]
    fn form_encoding() {
        let pairs = [("username", "admin@example.com"), ("password", "p@ss word")];
        assert_eq!(encode_pairs(&pairs), "username=admin%40example.com&password=p%40ss%20word");
    }

    #[test]
    fn default_content_types() {
        assert_eq!(ApiRequest::get("/x").default_content_type(), Some(CONTENT_TYPE_JSON));
        assert_eq!(ApiRequest::post("/x").form([("a", "b")]).default_content_type(), Some(CONTENT_TYPE_FORM));
        assert_eq!(ApiRequest::post("/x").multipart(vec![]).default_content_type(), None);
    }

    #[test]
    fn rejects_bad_header_value() {
        assert!(ApiRequest::get("/x").header(CONTENT_TYPE, "text/plain").is_ok());
        let err = ApiRequest::get("/x").header(CONTENT_TYPE, "bad\nvalue").unwrap_err();
        assert_eq!(err.code_str(), "config_error");
    }
}
