//! ubus JSON-RPC bridge over HTTP.
//!
//! uhttpd exposes the router's ubus at `<base>/ubus` as JSON-RPC 2.0. A call
//! envelope carries `params: [session, object, method, args]`; the reply's
//! `result` is `[status]` or `[status, payload]`. Pure building and parsing
//! in `build_request`/`parse_envelope` for testability.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::{Map, Value, json};

use crate::transport::{RpcTransport, TransportError};

const UBUS_PATH: &str = "/ubus";

pub const DEFAULT_BASE_URL: &str = "http://192.168.1.1";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Session id uhttpd assigns to unauthenticated callers. Works when the
/// router's ACLs grant the modem objects to the anonymous session.
pub const ANONYMOUS_SESSION: &str = "00000000000000000000000000000000";

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UbusConfig {
    pub base_url: String,
    pub session: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for UbusConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            session: ANONYMOUS_SESSION.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl UbusConfig {
    /// Build bridge config from environment variables.
    ///
    /// Optional:
    /// - `USBMODEM_BASE_URL`: default `http://192.168.1.1`
    /// - `USBMODEM_SESSION`: default anonymous session
    /// - `USBMODEM_REQUEST_TIMEOUT_SECS`: default 30
    /// - `USBMODEM_CONNECT_TIMEOUT_SECS`: default 10
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("USBMODEM_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            session: std::env::var("USBMODEM_SESSION")
                .unwrap_or_else(|_| ANONYMOUS_SESSION.to_string()),
            request_timeout_secs: env_parse_u64(
                "USBMODEM_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            ),
            connect_timeout_secs: env_parse_u64(
                "USBMODEM_CONNECT_TIMEOUT_SECS",
                DEFAULT_CONNECT_TIMEOUT_SECS,
            ),
        }
    }
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse::<u64>().ok()).unwrap_or(default)
}

// =============================================================================
// TRANSPORT
// =============================================================================

/// [`RpcTransport`] implementation talking to uhttpd's ubus endpoint.
pub struct UbusHttpTransport {
    http: reqwest::Client,
    endpoint: String,
    session: String,
    next_id: AtomicU64,
}

impl UbusHttpTransport {
    /// # Errors
    ///
    /// Returns [`TransportError::ClientBuild`] if the HTTP client cannot be
    /// constructed.
    pub fn new(config: &UbusConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| TransportError::ClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: format!("{}{UBUS_PATH}", config.base_url.trim_end_matches('/')),
            session: config.session.clone(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl RpcTransport for UbusHttpTransport {
    async fn invoke(
        &self,
        object: &str,
        method: &str,
        args: Map<String, Value>,
    ) -> Result<Value, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = build_request(id, &self.session, object, method, &args);
        tracing::trace!(object, method, id, "ubus call");

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        let text =
            response.text().await.map_err(|e| TransportError::Http(e.to_string()))?;

        if status != 200 {
            return Err(TransportError::Status { status });
        }

        let reply: Value =
            serde_json::from_str(&text).map_err(|e| TransportError::Decode(e.to_string()))?;
        parse_envelope(reply)
    }
}

// =============================================================================
// ENVELOPE
// =============================================================================

/// Build the JSON-RPC envelope for one ubus call.
fn build_request(
    id: u64,
    session: &str,
    object: &str,
    method: &str,
    args: &Map<String, Value>,
) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "call",
        "params": [session, object, method, args],
    })
}

/// Unwrap a JSON-RPC reply down to the call payload.
fn parse_envelope(reply: Value) -> Result<Value, TransportError> {
    let Value::Object(mut envelope) = reply else {
        return Err(TransportError::Decode("reply is not a json object".to_string()));
    };

    if let Some(error) = envelope.get("error") {
        let code = error
            .get("code")
            .and_then(Value::as_i64)
            .and_then(|c| i32::try_from(c).ok())
            .unwrap_or(0);
        let message =
            error.get("message").and_then(Value::as_str).unwrap_or("unknown error").to_string();
        return Err(TransportError::Rpc { code, message });
    }

    let Some(result) = envelope.remove("result") else {
        return Err(TransportError::Decode("reply has neither result nor error".to_string()));
    };
    let Value::Array(mut items) = result else {
        return Err(TransportError::Decode("result is not an array".to_string()));
    };

    let status = items
        .first()
        .and_then(Value::as_i64)
        .and_then(|c| i32::try_from(c).ok())
        .ok_or_else(|| TransportError::Decode("result carries no ubus status".to_string()))?;
    if status != 0 {
        return Err(TransportError::UbusCall { code: status });
    }

    // A successful call with no payload means the method returned nothing.
    Ok(if items.len() > 1 { items.remove(1) } else { Value::Object(Map::new()) })
}

#[cfg(test)]
#[path = "ubus_test.rs"]
mod tests;
