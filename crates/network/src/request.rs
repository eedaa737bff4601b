use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const HTTP_OK: u16 = 200;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Put => write!(f, "PUT"),
        }
    }
}

/// A request relative to the confirmations server base URL
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRequest {
    pub method: Method,
    /// Absolute path, e.g. `/v3/confirmation/payment/{payment_id}`
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub content: Option<String>,
    pub content_type: Option<String>,
}

impl UrlRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            content: None,
            content_type: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_content(mut self, content: String, content_type: impl Into<String>) -> Self {
        self.content = Some(content);
        self.content_type = Some(content_type.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlResponse {
    pub status_code: u16,
    pub body: String,
    pub headers: BTreeMap<String, String>,
}

impl UrlResponse {
    pub fn new(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            status_code,
            body: body.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status_code == HTTP_OK
    }
}

/// Transport for requests to the confirmations server. Any status code is a
/// successful exchange at this layer; only transport failures are errors.
#[async_trait]
pub trait NetworkClient: Send + Sync {
    async fn send(&self, request: UrlRequest) -> Result<UrlResponse>;
}
