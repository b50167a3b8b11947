//! HTTP request/response types and the transport seam.

use crate::config::Config;
use crate::value::{Object, Value};
use anyhow::{Context, Result};
use reqwest::Url;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names are lower case.
    pub headers: BTreeMap<String, String>,
    pub text: String,
}

impl HttpResponse {
    pub fn new(status: u16, headers: BTreeMap<String, String>, text: impl Into<String>) -> Self {
        Self { status, headers, text: text.into() }
    }

    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    pub fn server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get("content-type")
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim())
    }

    pub fn is_json(&self) -> bool {
        self.content_type()
            .map(|ct| ct == "application/json" || ct.ends_with("+json"))
            .unwrap_or(false)
    }

    /// Parsed JSON for JSON responses, the raw text otherwise.
    pub fn body(&self) -> Value {
        if self.is_json() {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(&self.text) {
                return Value::from_json(json);
            }
        }
        Value::String(self.text.clone())
    }

    /// The object bound to `$response` after `@run`.
    pub fn to_value(&self) -> Value {
        let mut obj = Object::new();
        obj.insert("status".into(), Value::Number(self.status as f64));
        obj.insert("ok".into(), Value::Bool(self.ok()));
        obj.insert(
            "headers".into(),
            Value::Object(self.headers.iter().map(|(k, v)| (k.clone(), Value::from(v.as_str()))).collect()),
        );
        obj.insert("text".into(), Value::String(self.text.clone()));
        obj.insert("body".into(), self.body());
        obj.insert("isJSON".into(), Value::Bool(self.is_json()));
        obj.insert("clientError".into(), Value::Bool(self.client_error()));
        obj.insert("serverError".into(), Value::Bool(self.server_error()));
        Value::Object(obj)
    }
}

/// A failed exchange. When the server answered, the response is attached and
/// the failure is still a usable outcome.
#[derive(Debug, Clone)]
pub struct TransportError {
    pub message: String,
    pub response: Option<HttpResponse>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), response: None }
    }

    pub fn with_response(message: impl Into<String>, response: HttpResponse) -> Self {
        Self { message: message.into(), response: Some(response) }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TransportError {}

pub trait Transport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Blocking `reqwest` transport.
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| TransportError::new(format!("Unsupported HTTP method: {}", request.method)))?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        debug!(method = %request.method, url = %request.url, "sending request");
        let response = builder
            .send()
            .map_err(|e| TransportError::new(format!("Failed to send HTTP request to {}: {}", request.url, e)))?;

        let status = response.status();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_lowercase(), v.to_str().unwrap_or("").to_string()))
            .collect();

        let text = response
            .text()
            .map_err(|e| TransportError::new(format!("Failed to read response body: {}", e)))?;

        let wrapped = HttpResponse::new(status.as_u16(), headers, text);
        if status.is_client_error() || status.is_server_error() {
            return Err(TransportError::with_response(
                format!("{} {}", status.as_u16(), status.canonical_reason().unwrap_or("Error")),
                wrapped,
            ));
        }
        Ok(wrapped)
    }
}

/// Adds query parameters to `url`. Arrays are joined with `,`; null and
/// undefined values are skipped.
pub fn build_url(url: &str, query: Option<&Object>) -> Result<String> {
    let mut parsed = Url::parse(url).with_context(|| format!("Invalid request URL: {}", url))?;
    if let Some(query) = query {
        let params: Vec<(String, String)> = query
            .iter()
            .filter(|(_, v)| !v.is_nullish())
            .map(|(k, v)| {
                let text = match v {
                    Value::Array(items) => items.iter().map(Value::display).collect::<Vec<_>>().join(","),
                    other => other.display(),
                };
                (k.clone(), text)
            })
            .collect();
        if !params.is_empty() {
            let mut pairs = parsed.query_pairs_mut();
            for (k, v) in &params {
                pairs.append_pair(k, v);
            }
        }
    }
    Ok(parsed.to_string())
}
