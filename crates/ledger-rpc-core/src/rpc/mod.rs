//! JSON-RPC client layer.
//!
//! Defines the [`Transport`] trait the client dispatches through, the
//! request/response models, the id-based batch correlator, and the
//! [`RpcClient`] facade. Ships an HTTP transport ([`HttpTransport`]) and a
//! canned-response stand-in ([`MockTransport`]) for tests.

mod batch;
mod client;
mod correlate;
mod http_adapter;
pub mod mock;
mod protocol;

pub use batch::{Batch, BatchOutcomes, Slot};
pub use client::RpcClient;
pub use correlate::{correlate, RawOutcome};
pub use http_adapter::{HttpTransport, HttpTransportConfig};
pub use mock::MockTransport;
pub use protocol::{
    encode_envelope, parse_response_payload, RawResponse, Request, RpcErrorObject,
};

use async_trait::async_trait;

use crate::error::TransportError;

/// A fully prepared outbound payload. Method-agnostic: the transport only
/// moves bytes.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub body: Vec<u8>,
    pub headers: Vec<(String, String)>,
}

impl PreparedRequest {
    /// A JSON body with the matching `Content-Type` header.
    pub fn json(body: Vec<u8>) -> Self {
        Self {
            body,
            headers: vec![("Content-Type".to_owned(), "application/json".to_owned())],
        }
    }
}

/// Sends one prepared payload and returns the raw response bytes.
///
/// Implementations own everything below the payload: connection reuse,
/// TLS, timeouts, and authentication. Non-success statuses must surface as
/// errors. Callers never retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: PreparedRequest) -> Result<Vec<u8>, TransportError>;
}
