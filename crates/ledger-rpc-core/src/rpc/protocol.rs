use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, ItemError};

// ==============================================================================
// Request
// ==============================================================================

/// One outgoing JSON-RPC call: method, positional params, and the id used to
/// find its response again.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    id: String,
    method: String,
    params: Vec<serde_json::Value>,
}

impl Request {
    /// Build a request with a freshly generated id.
    pub fn new(method: impl Into<String>, params: Vec<serde_json::Value>) -> Self {
        Self::with_id(generate_request_id(), method, params)
    }

    /// Build a request with a caller-chosen id (replays, fixtures).
    pub fn with_id(
        id: impl Into<String>,
        method: impl Into<String>,
        params: Vec<serde_json::Value>,
    ) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn params(&self) -> &[serde_json::Value] {
        &self.params
    }

    pub(crate) fn regenerate_id(&mut self) {
        self.id = generate_request_id();
    }
}

#[derive(Serialize)]
struct JsonRpcEnvelope<'a> {
    jsonrpc: &'static str,
    id: &'a str,
    method: &'a str,
    params: &'a [serde_json::Value],
}

/// Encode requests as the wire payload.
///
/// The payload is always a JSON array, even for a single request; servers
/// on the other end expect the batch shape for every call.
pub fn encode_envelope(requests: &[Request]) -> Result<Vec<u8>, Error> {
    let envelopes: Vec<JsonRpcEnvelope<'_>> = requests
        .iter()
        .map(|req| JsonRpcEnvelope {
            jsonrpc: "2.0",
            id: &req.id,
            method: &req.method,
            params: &req.params,
        })
        .collect();
    serde_json::to_vec(&envelopes)
        .map_err(|e| Error::Protocol(format!("encode JSON-RPC request envelope: {e}")))
}

/// Random 128-bit token rendered as `8-4-4-4-12` uppercase hex.
pub(crate) fn generate_request_id() -> String {
    let bytes: [u8; 16] = rand::thread_rng().r#gen();
    format_request_id(bytes)
}

fn format_request_id(bytes: [u8; 16]) -> String {
    let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

// ==============================================================================
// Response
// ==============================================================================

/// One response entry exactly as received. Not yet validated.
#[derive(Debug, Clone, Deserialize)]
pub struct RawResponse {
    #[serde(default)]
    pub id: serde_json::Value,
    /// `Some(Value::Null)` when the server sent `"result": null`.
    #[serde(default, deserialize_with = "deserialize_present")]
    pub result: Option<serde_json::Value>,
    /// `"error": null` is treated as absent.
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

/// The JSON-RPC error object: `{"code": <int>, "message": <string>}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl RawResponse {
    /// The id as a correlation key. Only string ids can match our requests.
    pub fn correlation_id(&self) -> Option<&str> {
        self.id.as_str()
    }

    /// Validate the entry and split it into a result value or an RPC error.
    ///
    /// Structural problems (neither or both of `result`/`error`, an error
    /// that is not a `{code, message}` object) are protocol errors.
    pub fn into_outcome(self) -> Result<Result<serde_json::Value, ItemError>, Error> {
        match (self.result, self.error) {
            (Some(result), None) => Ok(Ok(result)),
            (None, Some(error)) => {
                let parsed = parse_jsonrpc_error(error)?;
                Ok(Err(ItemError::Rpc {
                    code: parsed.code,
                    message: parsed.message,
                    data: parsed.data,
                }))
            }
            (Some(_), Some(_)) => Err(Error::Protocol(format!(
                "response id={} carries both result and error",
                self.id
            ))),
            (None, None) => Err(Error::Protocol(format!(
                "response id={} carries neither result nor error",
                self.id
            ))),
        }
    }
}

fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

pub(crate) fn parse_jsonrpc_error(err: serde_json::Value) -> Result<RpcErrorObject, Error> {
    serde_json::from_value::<RpcErrorObject>(err.clone())
        .map_err(|_| Error::Protocol(format!("non-standard JSON-RPC error: {err}")))
}

/// Longest slice of a response body quoted in a protocol error.
const BODY_PREVIEW: usize = 512;

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(BODY_PREVIEW).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Parse a response body into its entries.
///
/// Anything other than a JSON array of objects is a protocol error, except a
/// single top-level error object, which is how servers reject a payload as a
/// whole.
pub fn parse_response_payload(body: &[u8]) -> Result<Vec<RawResponse>, Error> {
    let decoded: serde_json::Value = serde_json::from_slice(body).map_err(|e| {
        Error::Protocol(format!(
            "decode JSON-RPC response: {e}; body={}",
            preview(&String::from_utf8_lossy(body))
        ))
    })?;

    match decoded {
        serde_json::Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                if !item.is_object() {
                    return Err(Error::Protocol(format!(
                        "response entry {index} is not an object: {}",
                        preview(&item.to_string())
                    )));
                }
                serde_json::from_value::<RawResponse>(item).map_err(|e| {
                    Error::Protocol(format!("response entry {index} is malformed: {e}"))
                })
            })
            .collect(),
        serde_json::Value::Object(mut map) if map.get("error").is_some_and(|e| !e.is_null()) => {
            let error = map.remove("error").unwrap_or_default();
            let parsed = parse_jsonrpc_error(error)?;
            Err(Error::Server {
                code: parsed.code,
                message: parsed.message,
                data: parsed.data,
            })
        }
        other => Err(Error::Protocol(format!(
            "expected a JSON array of responses, got: {}",
            preview(&other.to_string())
        ))),
    }
}
