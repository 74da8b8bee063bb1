//! HTTP(S) transport built on `reqwest`.
//!
//! Posts each prepared payload to a single endpoint, with optional basic or
//! cookie-file auth, connect/request timeouts, and an outbound rate limit.

mod connection;
mod transport;

pub use transport::{HttpTransport, HttpTransportConfig};
