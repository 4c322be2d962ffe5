//! Authenticated HTTP transport
//!
//! The dispatcher and option providers describe requests as [`ApiRequest`]
//! values and hand them to a [`Transport`]. [`HttpTransport`] sends them with
//! `reqwest::blocking`, attaching the bearer credential to every call.

use std::fmt;

use reqwest::blocking::Client;
use reqwest::{Method, StatusCode};
use serde_json::{Map, Value};
use tracing::debug;

use crate::credentials::Credentials;
use crate::error::TransportError;
use crate::spec::HttpMethod;

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

/// A fully resolved request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Map<String, Value>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            query: Map::new(),
            body: None,
        }
    }

    /// Query values as they appear on the wire.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.query
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| {
                let rendered = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), rendered)
            })
            .collect()
    }
}

/// Executes requests with the node's credentials.
pub trait Transport {
    /// Success status and decoded body of one call. Non-2xx is an error.
    fn exchange(&self, request: &ApiRequest) -> Result<(StatusCode, Value), TransportError>;

    fn send(&self, request: &ApiRequest) -> Result<Value, TransportError> {
        self.exchange(request).map(|(_, body)| body)
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn exchange(&self, request: &ApiRequest) -> Result<(StatusCode, Value), TransportError> {
        (**self).exchange(request)
    }
}

/// Blocking HTTP transport with bearer authentication.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    api_key: String,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("client", &self.client)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl HttpTransport {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
        }
    }

    pub fn from_credentials(client: Client, credentials: &Credentials) -> Self {
        Self::new(client, credentials.api_key.clone())
    }
}

impl Transport for HttpTransport {
    fn exchange(&self, request: &ApiRequest) -> Result<(StatusCode, Value), TransportError> {
        debug!(method = %request.method, url = %request.url, "sending request");

        let mut req = self.client.request(request.method.into(), &request.url);
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }
        let pairs = request.query_pairs();
        if !pairs.is_empty() {
            req = req.query(&pairs);
        }
        if let Some(body) = &request.body {
            req = req.json(body);
        }

        send_request(req)
    }
}

fn send_request(
    req: reqwest::blocking::RequestBuilder,
) -> Result<(StatusCode, Value), TransportError> {
    let resp = req.send().map_err(TransportError::RequestFailed)?;
    let status = resp.status();
    let text = resp.text().map_err(TransportError::ResponseRead)?;

    if !status.is_success() {
        return Err(TransportError::HttpError { status, body: text });
    }
    if text.trim().is_empty() {
        return Ok((status, Value::Null));
    }

    let value: Value = serde_json::from_str(&text).unwrap_or(Value::String(text));
    Ok((status, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transport(key: &str) -> HttpTransport {
        HttpTransport::new(Client::new(), key)
    }

    #[test]
    fn query_pairs_stringify_scalars_and_skip_null() {
        let mut request = ApiRequest::get("http://x");
        request.query.insert("page".into(), json!(2));
        request.query.insert("q".into(), json!("abc"));
        request.query.insert("flag".into(), json!(true));
        request.query.insert("gone".into(), Value::Null);
        assert_eq!(
            request.query_pairs(),
            [
                ("page".to_string(), "2".to_string()),
                ("q".to_string(), "abc".to_string()),
                ("flag".to_string(), "true".to_string()),
            ]
        );
    }

    #[test]
    fn send_attaches_bearer_query_and_body() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/api/partner/v1/customers")
            .match_header("authorization", "Bearer secret")
            .match_query(mockito::Matcher::UrlEncoded("dry".into(), "1".into()))
            .match_body(mockito::Matcher::Json(json!({"name": "Acme"})))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":7}"#)
            .create();

        let request = ApiRequest {
            method: HttpMethod::Post,
            url: format!("{}/api/partner/v1/customers", server.url()),
            query: json!({"dry": 1}).as_object().cloned().unwrap(),
            body: Some(json!({"name": "Acme"})),
        };
        let value = transport("secret").send(&request).unwrap();
        assert_eq!(value, json!({"id": 7}));
        mock.assert();
    }

    #[test]
    fn send_omits_auth_header_when_key_empty() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/status")
            .match_header("authorization", mockito::Matcher::Missing)
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create();

        let request = ApiRequest::get(format!("{}/status", server.url()));
        assert!(transport("").send(&request).is_ok());
        mock.assert();
    }

    #[test]
    fn send_maps_error_status() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .with_body("not found")
            .create();

        let request = ApiRequest::get(format!("{}/missing", server.url()));
        let err = transport("k").send(&request).unwrap_err();
        match err {
            TransportError::HttpError { status, body } => {
                assert_eq!(status.as_u16(), 404);
                assert_eq!(body, "not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn send_returns_null_for_empty_body_and_text_for_non_json() {
        let mut server = mockito::Server::new();
        let _empty = server.mock("DELETE", "/empty").with_status(204).create();
        let _plain = server
            .mock("GET", "/plain")
            .with_status(200)
            .with_header("content-type", "text/plain")
            .with_body("pong")
            .create();

        let mut delete = ApiRequest::get(format!("{}/empty", server.url()));
        delete.method = HttpMethod::Delete;
        assert_eq!(
            transport("k").exchange(&delete).unwrap(),
            (StatusCode::NO_CONTENT, Value::Null)
        );

        let plain = ApiRequest::get(format!("{}/plain", server.url()));
        assert_eq!(transport("k").send(&plain).unwrap(), json!("pong"));
    }
}
