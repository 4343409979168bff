//! HTTP-backed script channel
//!
//! Fetches the injected script URL and evaluates the only thing such a script
//! ever does: call `<callback>(<json>)`. The body is unwrapped and the payload
//! handed to the responder. Any HTTP or decode problem is a channel failure.

use crate::channel::{ChannelLease, ScriptChannel};
use crate::error::TransportError;
use crate::registry::Responder;
use crate::wire::OutboundRequest;
use reqwest::{Client, Url};
use serde_json::Value;

/// Channel that loads the request URL over HTTP
#[derive(Debug, Clone)]
pub struct HttpScriptChannel {
    client: Client,
    endpoint: Url,
}

impl HttpScriptChannel {
    /// Create channel for endpoint
    ///
    /// # Errors
    /// - `TransportError::Configuration` if the endpoint does not parse or the
    ///   HTTP client cannot be built
    pub fn new(endpoint: &str) -> Result<Self, TransportError> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            TransportError::Configuration(format!("invalid endpoint '{endpoint}': {e}"))
        })?;
        let client = Client::builder()
            .build()
            .map_err(|e| TransportError::Configuration(e.to_string()))?;

        Ok(Self { client, endpoint })
    }

    /// Endpoint requests are resolved against
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl ScriptChannel for HttpScriptChannel {
    fn inject(&self, request: &OutboundRequest, responder: Responder) -> ChannelLease {
        let url = request.to_url(&self.endpoint);
        let client = self.client.clone();
        let callback = request.callback().to_string();

        let task = tokio::spawn(async move {
            match load_script(&client, url, &callback).await {
                Ok(payload) => {
                    responder.respond(payload);
                }
                Err(reason) => {
                    responder.fail(reason);
                }
            }
        });

        ChannelLease::from_task(task)
    }
}

async fn load_script(client: &Client, url: Url, callback: &str) -> Result<Value, String> {
    let response = client.get(url).send().await.map_err(|e| e.to_string())?;
    let status = response.status();
    if !status.is_success() {
        return Err(format!("script load failed with HTTP {status}"));
    }

    let body = response.text().await.map_err(|e| e.to_string())?;
    unwrap_script(&body, callback)
}

/// Extract the payload from `callback(payload);`
///
/// A body that is not wrapped in the expected callback is parsed as bare JSON.
/// A call with no argument yields `Null`.
pub fn unwrap_script(body: &str, callback: &str) -> Result<Value, String> {
    let trimmed = body.trim().trim_start_matches("/**/").trim();
    let trimmed = trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end();

    let inner = trimmed
        .strip_prefix(callback)
        .map(str::trim_start)
        .and_then(|rest| rest.strip_prefix('('))
        .and_then(|rest| rest.strip_suffix(')'));

    match inner {
        Some(argument) if argument.trim().is_empty() => Ok(Value::Null),
        Some(argument) => serde_json::from_str(argument)
            .map_err(|e| format!("malformed callback payload: {e}")),
        None => serde_json::from_str(trimmed)
            .map_err(|e| format!("response is neither a '{callback}' call nor JSON: {e}")),
    }
}
