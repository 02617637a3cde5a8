use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::method::HttpMethod;
use crate::error::TransportError;

/// Payload attached to a scenario request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestBody {
    /// Serialized as JSON; `Content-Type: application/json` is added unless set.
    Json(JsonValue),
    Text(String),
    Raw(Bytes),
}

/// What a scenario wants sent: method, path relative to the base URL,
/// headers and an optional body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    pub path: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<RequestBody>,
}

impl RequestDescriptor {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn json(mut self, body: JsonValue) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Text(body.into()));
        self
    }

    pub fn raw(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(RequestBody::Raw(body.into()));
        self
    }

    fn has_header(&self, name: &str) -> bool {
        self.headers.keys().any(|key| key.eq_ignore_ascii_case(name))
    }

    /// Resolve against `base_url` into the form a [`Transport`](super::transport::Transport) sends.
    pub fn to_outbound(&self, base_url: &str) -> Result<OutboundRequest, TransportError> {
        let url = join_url(base_url, &self.path)?;

        let mut headers: Vec<(String, String)> = self
            .headers
            .iter()
            .filter(|(key, _)| !key.trim().is_empty())
            .map(|(key, value)| (key.trim().to_string(), value.clone()))
            .collect();

        let body = match &self.body {
            None => None,
            Some(RequestBody::Json(value)) => {
                if !self.has_header("content-type") {
                    headers.push(("Content-Type".to_string(), "application/json".to_string()));
                }
                let encoded = serde_json::to_vec(value).map_err(|err| {
                    TransportError::InvalidRequest(format!("failed to encode JSON body: {err}"))
                })?;
                Some(Bytes::from(encoded))
            }
            Some(RequestBody::Text(text)) => Some(Bytes::from(text.clone())),
            Some(RequestBody::Raw(bytes)) => Some(bytes.clone()),
        };

        Ok(OutboundRequest {
            method: self.method,
            url,
            headers,
            body,
        })
    }
}

/// A fully resolved request ready for the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl OutboundRequest {
    /// Path plus query, as seen by the server.
    pub fn path_and_query(&self) -> String {
        match reqwest::Url::parse(&self.url) {
            Ok(url) => match url.query() {
                Some(query) => format!("{}?{query}", url.path()),
                None => url.path().to_string(),
            },
            Err(_) => self.url.clone(),
        }
    }
}

fn join_url(base_url: &str, path: &str) -> Result<String, TransportError> {
    let path = path.trim();
    let joined = if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else {
        let base = base_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(TransportError::InvalidRequest(format!(
                "no base URL configured for relative path `{path}`"
            )));
        }
        format!("{base}/{}", path.trim_start_matches('/'))
    };

    reqwest::Url::parse(&joined)
        .map(|url| url.to_string())
        .map_err(|err| TransportError::InvalidRequest(format!("invalid URL `{joined}`: {err}")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn joins_base_url_and_path() {
        let request = RequestDescriptor::get("/api/users?page=2");
        let outbound = request.to_outbound("https://reqres.in/").unwrap();
        assert_eq!(outbound.url, "https://reqres.in/api/users?page=2");
        assert_eq!(outbound.path_and_query(), "/api/users?page=2");
    }

    #[test]
    fn keeps_base_path_prefix() {
        let request = RequestDescriptor::get("users/2");
        let outbound = request.to_outbound("http://localhost:8080/api").unwrap();
        assert_eq!(outbound.url, "http://localhost:8080/api/users/2");
    }

    #[test]
    fn json_body_adds_content_type_once() {
        let request = RequestDescriptor::post("/api/users").json(json!({"name": "morpheus"}));
        let outbound = request.to_outbound("https://reqres.in").unwrap();
        let content_types: Vec<_> = outbound
            .headers
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .collect();
        assert_eq!(content_types.len(), 1);
        assert_eq!(outbound.body.unwrap(), Bytes::from_static(br#"{"name":"morpheus"}"#));

        let explicit = RequestDescriptor::post("/api/users")
            .header("content-type", "application/vnd.api+json")
            .json(json!({}));
        let outbound = explicit.to_outbound("https://reqres.in").unwrap();
        assert_eq!(
            outbound.headers,
            vec![("content-type".to_string(), "application/vnd.api+json".to_string())]
        );
    }

    #[test]
    fn relative_path_without_base_url_is_rejected() {
        let err = RequestDescriptor::get("/api/users").to_outbound("").unwrap_err();
        assert!(matches!(err, TransportError::InvalidRequest(_)));
    }

    #[test]
    fn body_deserializes_from_tagged_form() {
        let request: RequestDescriptor = serde_json::from_value(json!({
            "method": "POST",
            "path": "/api/users",
            "body": {"json": {"job": "leader"}}
        }))
        .unwrap();
        assert_eq!(request.body, Some(RequestBody::Json(json!({"job": "leader"}))));
        assert!(request.headers.is_empty());
    }
}
