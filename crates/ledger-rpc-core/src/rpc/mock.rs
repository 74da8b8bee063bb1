//! A canned-response [`Transport`] for tests. Never touches the network.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;

use crate::error::TransportError;

use super::{PreparedRequest, Transport};

/// What the scripted mock answers for a given method.
#[derive(Debug, Clone)]
pub enum MockReply {
    Result(serde_json::Value),
    Error { code: i64, message: String },
    /// Leave this request out of the response array.
    Omit,
    /// Answer with an entry carrying neither `result` nor `error`.
    Malformed,
}

#[derive(Debug, Clone)]
enum Failure {
    Status { status: u16, body: String },
    Canceled,
}

enum Mode {
    Scripted {
        replies: HashMap<String, MockReply>,
        reversed: bool,
        strays: Vec<serde_json::Value>,
    },
    Canned(Vec<u8>),
    Failing(Failure),
}

/// Mock transport. Either scripted per method (echoing each request's id
/// back) or returning fixed bytes regardless of what was sent.
///
/// Every payload it receives is recorded for later inspection.
pub struct MockTransport {
    mode: Mode,
    sent: Mutex<Vec<Vec<u8>>>,
}

impl MockTransport {
    pub fn builder() -> MockTransportBuilder {
        MockTransportBuilder {
            replies: HashMap::new(),
            reversed: false,
            strays: Vec::new(),
        }
    }

    /// Always answer with `body`, byte for byte.
    pub fn canned(body: impl Into<Vec<u8>>) -> Self {
        Self::with_mode(Mode::Canned(body.into()))
    }

    /// Fail every call with a non-success HTTP status.
    pub fn failing_with_status(status: u16, body: impl Into<String>) -> Self {
        Self::with_mode(Mode::Failing(Failure::Status {
            status,
            body: body.into(),
        }))
    }

    /// Fail every call as if the in-flight request had been canceled.
    pub fn canceled() -> Self {
        Self::with_mode(Mode::Failing(Failure::Canceled))
    }

    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Payloads received so far, decoded as JSON.
    pub async fn sent_payloads(&self) -> Vec<serde_json::Value> {
        self.sent
            .lock()
            .await
            .iter()
            .map(|body| serde_json::from_slice(body).unwrap_or(serde_json::Value::Null))
            .collect()
    }

    fn scripted_reply(
        replies: &HashMap<String, MockReply>,
        reversed: bool,
        strays: &[serde_json::Value],
        body: &[u8],
    ) -> Result<Vec<u8>, TransportError> {
        let envelopes: Vec<serde_json::Value> = serde_json::from_slice(body)
            .map_err(|e| TransportError::Other(format!("mock received non-array payload: {e}")))?;

        let mut entries: Vec<serde_json::Value> = Vec::with_capacity(envelopes.len());
        for envelope in &envelopes {
            let id = envelope.get("id").cloned().unwrap_or_default();
            let method = envelope
                .get("method")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default();
            let entry = match replies.get(method) {
                Some(MockReply::Result(result)) => {
                    json!({"jsonrpc": "2.0", "id": id, "result": result})
                }
                Some(MockReply::Error { code, message }) => json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": {"code": code, "message": message},
                }),
                Some(MockReply::Omit) => continue,
                Some(MockReply::Malformed) => json!({"jsonrpc": "2.0", "id": id}),
                None => json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": {"code": -32601, "message": "Method not found"},
                }),
            };
            entries.push(entry);
        }

        if reversed {
            entries.reverse();
        }
        entries.extend(strays.iter().cloned());

        serde_json::to_vec(&entries)
            .map_err(|e| TransportError::Other(format!("mock failed to encode reply: {e}")))
    }
}

pub struct MockTransportBuilder {
    replies: HashMap<String, MockReply>,
    reversed: bool,
    strays: Vec<serde_json::Value>,
}

impl MockTransportBuilder {
    pub fn with_result(self, method: &str, result: serde_json::Value) -> Self {
        self.with_reply(method, MockReply::Result(result))
    }

    pub fn with_error(self, method: &str, code: i64, message: &str) -> Self {
        self.with_reply(
            method,
            MockReply::Error {
                code,
                message: message.to_owned(),
            },
        )
    }

    pub fn with_reply(mut self, method: &str, reply: MockReply) -> Self {
        self.replies.insert(method.to_owned(), reply);
        self
    }

    /// Answer in the reverse of request order.
    pub fn reversed(mut self) -> Self {
        self.reversed = true;
        self
    }

    /// Append an extra entry to every response array.
    pub fn with_stray(mut self, entry: serde_json::Value) -> Self {
        self.strays.push(entry);
        self
    }

    pub fn build(self) -> MockTransport {
        MockTransport::with_mode(Mode::Scripted {
            replies: self.replies,
            reversed: self.reversed,
            strays: self.strays,
        })
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: PreparedRequest) -> Result<Vec<u8>, TransportError> {
        let reply = match &self.mode {
            Mode::Scripted {
                replies,
                reversed,
                strays,
            } => Self::scripted_reply(replies, *reversed, strays, &request.body),
            Mode::Canned(body) => Ok(body.clone()),
            Mode::Failing(Failure::Status { status, body }) => Err(TransportError::Status {
                status: *status,
                body: body.clone(),
            }),
            Mode::Failing(Failure::Canceled) => Err(TransportError::Canceled),
        };
        self.sent.lock().await.push(request.body);
        reply
    }
}
