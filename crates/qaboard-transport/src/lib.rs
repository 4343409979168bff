//! qaboard Transport
//!
//! Request/response semantics over an unreliable, one-shot callback channel.
//!
//! # Architecture
//!
//! ```text
//! send(action, params, retries)
//!    │
//!    ▼
//! TransportBroker ── allocate ──▶ CallbackRegistry (handle → slot)
//!    │                                  ▲
//!    │ inject(request, responder)       │ respond / fail (first wins)
//!    ▼                                  │
//! ScriptChannel ─────── far side ───────┘
//! ```
//!
//! The broker returns raw payloads. Callers classify them with
//! [`normalize`](normalize::normalize).
//!
//! # Example
//!
//! ```rust,ignore
//! use qaboard_transport::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TransportConfig::new().with_endpoint("https://example.com/exec");
//! let channel = Arc::new(HttpScriptChannel::new(&config.endpoint)?);
//! let broker = TransportBroker::new(channel, config);
//!
//! let raw = broker.send("getTopics", Params::new(), 1).await?;
//! let topics = normalize(raw).into_result()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod broker;
pub mod channel;
pub mod config;
pub mod error;
pub mod http;
pub mod normalize;
pub mod registry;
pub mod testing;
pub mod wire;

// Re-exports for convenience
pub use broker::TransportBroker;
pub use channel::{ChannelLease, ScriptChannel};
pub use config::{TransportConfig, PING_ACTION};
pub use error::TransportError;
pub use http::HttpScriptChannel;
pub use normalize::{normalize, RawShape, ResponseEnvelope};
pub use registry::{CallbackRegistry, HandleName, Responder};
pub use wire::{OutboundRequest, Params, RequestDescriptor};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the transport layer
    pub use crate::broker::TransportBroker;
    pub use crate::channel::ScriptChannel;
    pub use crate::config::TransportConfig;
    pub use crate::error::TransportError;
    pub use crate::http::HttpScriptChannel;
    pub use crate::normalize::{normalize, ResponseEnvelope};
    pub use crate::wire::Params;
}
