use reqwest::{Client, Method, StatusCode};
use serde_json::Value;

use crate::api::{ApiEnvelope, ApiMethod, ApiRequest, ApiTransport};
use crate::config::Config;
use crate::error::{AppError, AppResult};

/// reqwest-backed transport for the campus REST API.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpClient {
    pub fn new(config: &Config) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(AppError::Transport)?;

        Ok(Self {
            client,
            base_url: config.api_url.clone(),
            token: config.token.clone(),
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn method(method: ApiMethod) -> Method {
        match method {
            ApiMethod::Get => Method::GET,
            ApiMethod::Post => Method::POST,
            ApiMethod::Put => Method::PUT,
            ApiMethod::Delete => Method::DELETE,
        }
    }
}

/// Unwraps a response body into its `data` payload.
///
/// A parseable envelope always wins, so `404 { success: false, message }` surfaces the
/// server message. Bodies that are not envelopes fall back to the HTTP status.
pub fn parse_envelope(status: StatusCode, body: &[u8]) -> AppResult<Value> {
    match serde_json::from_slice::<ApiEnvelope<Value>>(body) {
        Ok(envelope) => {
            let data = envelope.into_result()?;
            if !status.is_success() {
                return Err(AppError::api(format!("Request failed with status {}", status)));
            }
            Ok(data.unwrap_or(Value::Null))
        }
        Err(_) if !status.is_success() => Err(AppError::api(format!(
            "Request failed with status {}",
            status
        ))),
        Err(e) => Err(AppError::Json(e)),
    }
}

#[async_trait::async_trait]
impl ApiTransport for HttpClient {
    async fn send(&self, request: ApiRequest) -> AppResult<Value> {
        let url = format!("{}{}", self.base_url, request.path);
        tracing::debug!("{:?} {}", request.method, url);

        let mut builder = self.client.request(Self::method(request.method), &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        parse_envelope(status, &bytes).inspect_err(|e| {
            tracing::warn!("{:?} {} failed: {}", request.method, url, e);
        })
    }
}
