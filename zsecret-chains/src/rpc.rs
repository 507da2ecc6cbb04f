//! JSON-RPC 2.0 transport shared by the zcashd and NEAR adapters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Credentials;
use crate::error::ChainError;

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    /// NEAR nodes put the structured error name here.
    #[serde(default)]
    cause: Option<JsonRpcErrorCause>,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Deserialize)]
struct JsonRpcErrorCause {
    name: String,
}

/// Minimal JSON-RPC 2.0 client over HTTP POST.
pub struct JsonRpcClient {
    client: reqwest::Client,
    url: String,
    credentials: Credentials,
    request_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(
        url: &str,
        credentials: Credentials,
        request_timeout: Duration,
    ) -> Result<Self, ChainError> {
        if url.trim().is_empty() {
            return Err(ChainError::InvalidConfig("RPC url is empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| ChainError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            credentials,
            request_id: AtomicU64::new(0),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Call `method` and decode its `result` into `T`.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ChainError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.request_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let mut builder = self.client.post(&self.url).json(&request);
        if let Some(user) = &self.credentials.username {
            builder = builder.basic_auth(user, self.credentials.password.as_deref());
        }
        if let Some(key) = &self.credentials.api_key {
            builder = builder.header(API_KEY_HEADER, key);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        // zcashd answers RPC errors with HTTP 500 and a JSON body, so try the
        // envelope before giving up on the status code.
        let envelope: JsonRpcResponse = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(ChainError::Transport(format!("HTTP {status}")));
            }
            Err(err) => return Err(err.into()),
        };

        if let Some(error) = envelope.error {
            let cause = error
                .cause
                .map(|c| c.name)
                .or_else(|| error.data.as_ref().and_then(|d| d.as_str()).map(str::to_string));
            return Err(ChainError::Rpc {
                code: error.code,
                message: error.message,
                cause,
            });
        }

        let result = envelope
            .result
            .ok_or_else(|| ChainError::InvalidData("missing result in response".into()))?;
        Ok(serde_json::from_value(result)?)
    }
}
