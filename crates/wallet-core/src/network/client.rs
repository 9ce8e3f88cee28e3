//! Thin reqwest wrappers: a REST client and a JSON-RPC 2.0 client.
//!
//! Neither retries. Non-2xx answers and RPC error objects become
//! [`OperationError::NetworkRequest`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::OperationError;

#[derive(Debug, Clone)]
pub struct HttpClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, OperationError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OperationError::Configuration(format!("cannot build http client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, OperationError> {
        debug!("GET {}{}", self.base_url, path);
        let response = self.http.get(self.url(path)).query(query).send().await?;
        decode(response).await
    }

    /// Like [`get`](Self::get) but maps `404` to `None`.
    pub async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, OperationError> {
        debug!("GET {}{}", self.base_url, path);
        let response = self.http.get(self.url(path)).query(query).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        decode(response).await.map(Some)
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, OperationError> {
        debug!("PUT {}{}", self.base_url, path);
        self.send_json(self.http.put(self.url(path)), body).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, OperationError> {
        debug!("POST {}{}", self.base_url, path);
        self.send_json(self.http.post(self.url(path)), body).await
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        body: &B,
    ) -> Result<T, OperationError> {
        let response = request.json(body).send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, OperationError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(error_from_body(status, &body));
    }
    serde_json::from_str(&body).map_err(|e| OperationError::NetworkRequest {
        status: Some(status.as_u16()),
        code: None,
        message: format!("unexpected response body: {e}"),
    })
}

/// Catapult answers `{code, message}`, NIS1 `{error, message}`.
fn error_from_body(status: StatusCode, body: &str) -> OperationError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let field = |name: &str| {
        parsed
            .as_ref()
            .and_then(|v| v.get(name))
            .and_then(Value::as_str)
            .map(str::to_owned)
    };
    let message = field("message").unwrap_or_else(|| {
        if body.is_empty() {
            status.canonical_reason().unwrap_or("request failed").to_owned()
        } else {
            body.to_owned()
        }
    });
    OperationError::NetworkRequest {
        status: Some(status.as_u16()),
        code: field("code").or_else(|| field("error")),
        message,
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// JSON-RPC 2.0 over a single POST endpoint.
#[derive(Debug)]
pub struct RpcClient {
    http: HttpClient,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, OperationError> {
        Ok(Self {
            http: HttpClient::new(url, timeout)?,
            next_id: AtomicU64::new(1),
        })
    }

    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, OperationError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        debug!("rpc {}", method);
        let response: RpcResponse<T> = self.http.post("", &request).await?;
        if let Some(error) = response.error {
            return Err(OperationError::NetworkRequest {
                status: None,
                code: Some(error.code.to_string()),
                message: format!("{method}: {}", error.message),
            });
        }
        response
            .result
            .ok_or_else(|| OperationError::network(format!("{method}: empty result")))
    }
}

/// Parses an Ethereum `0x`-prefixed quantity.
pub(crate) fn parse_quantity(value: &str) -> Result<u128, OperationError> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16)
        .map_err(|_| OperationError::network(format!("invalid quantity '{value}'")))
}
