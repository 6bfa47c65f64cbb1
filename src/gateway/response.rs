use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ApiError, ApiResult};

/// Successful response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// 204 or an empty JSON body
    Empty,
    Json(Value),
    /// Non-JSON content type, returned verbatim
    Text(String),
}

impl Payload {
    pub fn is_empty(&self) -> bool { matches!(self, Payload::Empty) }

    pub fn into_value(self) -> Value {
        match self {
            Payload::Empty => Value::Null,
            Payload::Json(v) => v,
            Payload::Text(s) => Value::String(s),
        }
    }

    /// Deserialize into `T`. Text bodies are given one chance to parse as JSON
    /// for servers that omit the content type.
    pub fn into_json<T: DeserializeOwned>(self) -> ApiResult<T> {
        match self {
            Payload::Empty => serde_json::from_value(Value::Null)
                .map_err(|_| ApiError::decode("expected a JSON body, got no content")),
            Payload::Json(v) => Ok(serde_json::from_value(v)?),
            Payload::Text(s) => serde_json::from_str(&s)
                .map_err(|e| ApiError::decode(format!("expected JSON, got text: {}", e))),
        }
    }
}

fn is_json_content_type(ct: &str) -> bool {
    let mime = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    mime == "application/json" || mime.ends_with("+json")
}

pub(crate) async fn read_payload(resp: reqwest::Response) -> ApiResult<Payload> {
    if resp.status() == StatusCode::NO_CONTENT {
        return Ok(Payload::Empty);
    }
    let json = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(is_json_content_type)
        .unwrap_or(false);
    if json {
        let bytes = resp.bytes().await?;
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Payload::Empty);
        }
        return Ok(Payload::Json(serde_json::from_slice(&bytes)?));
    }
    Ok(Payload::Text(resp.text().await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_content_type_detection() {
        assert!(is_json_content_type("application/json"));
        assert!(is_json_content_type("application/json; charset=utf-8"));
        assert!(is_json_content_type("application/problem+json"));
        assert!(!is_json_content_type("text/plain"));
        assert!(!is_json_content_type("text/html; charset=utf-8"));
    }

    #[test]
    fn payload_conversion() {
        let v: Vec<i64> = Payload::Json(serde_json::json!([1, 2, 3])).into_json().unwrap();
        assert_eq!(v, vec![1, 2, 3]);
        let unit: Option<i64> = Payload::Empty.into_json().unwrap();
        assert_eq!(unit, None);
        assert!(Payload::Empty.into_json::<Vec<i64>>().is_err());
        let n: i64 = Payload::Text("42".into()).into_json().unwrap();
        assert_eq!(n, 42);
        assert_eq!(Payload::Text("hi".into()).into_value(), Value::String("hi".into()));
    }
}
