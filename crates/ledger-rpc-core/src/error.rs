/// Call-level failure: the whole call or batch produced no outcomes.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("JSON-RPC protocol violation: {0}")]
    Protocol(String),

    /// The server rejected the whole payload with a single error object
    /// instead of an array of per-request responses.
    #[error("server rejected request ({code}): {message}")]
    Server {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Only produced by single calls, which unwrap their one outcome.
    #[error(transparent)]
    Item(#[from] ItemError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Failure scoped to a single position of a batch. Sibling items are
/// unaffected.
#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    #[error("no response for request id={id}")]
    MissingResponse { id: String },

    #[error("RPC error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },

    #[error("decode result for request id={id}: {source}")]
    Decode {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("batch slot {index} does not belong to these outcomes or was already taken")]
    SlotMismatch { index: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request canceled")]
    Canceled,

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// JSON-RPC error code carried by this error, if any.
    pub fn rpc_code(&self) -> Option<i64> {
        match self {
            Error::Server { code, .. } => Some(*code),
            Error::Item(ItemError::Rpc { code, .. }) => Some(*code),
            _ => None,
        }
    }
}
