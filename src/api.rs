//! Transport seam between the stores and the REST backend.
//!
//! Every backend response is a `{ success, data?, message? }` envelope. A transport
//! unwraps it: `success: true` yields the `data` payload (or `null`), anything else
//! becomes an [`AppError`].

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMethod {
    Get,
    Post,
    Put,
    Delete,
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: ApiMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    fn new(method: ApiMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(ApiMethod::Get, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(ApiMethod::Post, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(ApiMethod::Put, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(ApiMethod::Delete, path)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }
}

#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn into_result(self) -> AppResult<Option<T>> {
        if self.success {
            Ok(self.data)
        } else {
            Err(AppError::api(
                self.message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "Request failed".to_string()),
            ))
        }
    }
}

/// Backend abstraction shared by every store (HTTP in production, in-memory in tests).
#[async_trait::async_trait]
pub trait ApiTransport: Send + Sync {
    /// Issues one request and returns the unwrapped `data` payload.
    async fn send(&self, request: ApiRequest) -> AppResult<Value>;
}

/// Sends a request and decodes the payload into `T`.
pub async fn send_as<T: DeserializeOwned>(
    api: &dyn ApiTransport,
    request: ApiRequest,
) -> AppResult<T> {
    let data = api.send(request).await?;
    Ok(serde_json::from_value(data)?)
}

/// Joins path segments, percent-encoding each one.
pub fn path(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|s| format!("/{}", urlencoding::encode(s)))
        .collect()
}
