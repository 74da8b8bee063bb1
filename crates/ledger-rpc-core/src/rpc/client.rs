use std::num::NonZeroUsize;
use std::sync::Arc;

use futures::future::try_join_all;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::error::{Error, ItemError};

use super::batch::{Batch, BatchOutcomes, Slot};
use super::correlate::{correlate, RawOutcome};
use super::protocol::{encode_envelope, parse_response_payload, Request};
use super::{PreparedRequest, Transport};

/// JSON-RPC client over an injected [`Transport`].
///
/// Holds no per-call state, so one instance (or its clones) can serve any
/// number of concurrent calls.
#[derive(Clone)]
pub struct RpcClient {
    transport: Arc<dyn Transport>,
    batch_chunk_size: Option<NonZeroUsize>,
}

impl RpcClient {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::from_shared(Arc::new(transport))
    }

    pub fn from_shared(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            batch_chunk_size: None,
        }
    }

    /// Split batches larger than `size` into several payloads, sent
    /// concurrently. Outcomes still come back in request order.
    pub fn with_batch_chunk_size(mut self, size: NonZeroUsize) -> Self {
        self.batch_chunk_size = Some(size);
        self
    }

    /// Call one method and decode its result as `T`.
    ///
    /// Goes out as a one-element batch; server-side errors and decode
    /// failures surface as [`Error::Item`].
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<T, Error> {
        let request = Request::new(method, params);
        debug!(
            rpc.id = request.id(),
            rpc.method = method,
            rpc.params = request.params().len(),
            "rpc call"
        );

        let outcome = self
            .dispatch(std::slice::from_ref(&request))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ItemError::MissingResponse {
                id: request.id().to_owned(),
            })?;

        let value = outcome?;
        serde_json::from_value(value).map_err(|source| {
            Error::Item(ItemError::Decode {
                id: request.id().to_owned(),
                source,
            })
        })
    }

    /// Send every call in `batch` and return one outcome per slot.
    ///
    /// Fails as a whole only on transport or protocol errors; RPC errors,
    /// missing responses, and decode failures stay inside their slot.
    pub async fn call_batch(&self, batch: Batch) -> Result<BatchOutcomes, Error> {
        let (tag, requests, decoders) = batch.into_parts();
        debug!(rpc.batch_size = requests.len(), "rpc batch call");
        let raw = self.dispatch_chunked(&requests).await?;
        Ok(BatchOutcomes::decode(tag, &requests, &decoders, raw))
    }

    /// Batch of calls that all decode to the same type.
    pub async fn call_batch_as<T, M>(
        &self,
        calls: impl IntoIterator<Item = (M, Vec<serde_json::Value>)>,
    ) -> Result<Vec<Result<T, ItemError>>, Error>
    where
        T: DeserializeOwned + Send + 'static,
        M: Into<String>,
    {
        let mut batch = Batch::new();
        let slots: Vec<Slot<T>> = calls
            .into_iter()
            .map(|(method, params)| batch.push::<T>(method, params))
            .collect();
        let mut outcomes = self.call_batch(batch).await?;
        Ok(slots.into_iter().map(|slot| outcomes.take(slot)).collect())
    }

    async fn dispatch_chunked(&self, requests: &[Request]) -> Result<Vec<RawOutcome>, Error> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        match self.batch_chunk_size {
            Some(size) if requests.len() > size.get() => {
                let chunk_futures: Vec<_> = requests
                    .chunks(size.get())
                    .map(|chunk| self.dispatch(chunk))
                    .collect();
                let chunked = try_join_all(chunk_futures).await?;
                Ok(chunked.into_iter().flatten().collect())
            }
            _ => self.dispatch(requests).await,
        }
    }

    async fn dispatch(&self, requests: &[Request]) -> Result<Vec<RawOutcome>, Error> {
        let body = encode_envelope(requests)?;
        let first_id = requests.first().map(Request::id).unwrap_or_default();
        debug!(
            rpc.first_id = first_id,
            rpc.batch_size = requests.len(),
            body_len = body.len(),
            "rpc send"
        );

        let response = self.transport.send(PreparedRequest::json(body)).await?;
        debug!(
            rpc.first_id = first_id,
            rpc.batch_size = requests.len(),
            body_len = response.len(),
            "rpc response"
        );
        trace!(
            rpc.first_id = first_id,
            body = %String::from_utf8_lossy(&response),
            "rpc response body"
        );

        let entries = parse_response_payload(&response)?;
        correlate(requests, entries)
    }
}
