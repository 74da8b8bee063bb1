use std::collections::HashMap;

use tracing::warn;

use crate::error::{Error, ItemError};

use super::protocol::{RawResponse, Request};

/// Per-position outcome before typed decoding.
pub type RawOutcome = Result<serde_json::Value, ItemError>;

/// Match responses to requests by id and return one outcome per request,
/// in request order.
///
/// Servers may answer a batch in any order, so position in the response
/// array carries no meaning. Every entry is validated before its id is
/// looked at: a structurally broken entry fails the whole batch even when
/// its id matches no request. Well-formed entries whose id matches no
/// request are dropped. A duplicated id also fails the batch, since there is
/// no safe way to tell which request it belongs to.
pub fn correlate(
    requests: &[Request],
    responses: Vec<RawResponse>,
) -> Result<Vec<RawOutcome>, Error> {
    let mut by_id: HashMap<String, RawOutcome> = HashMap::with_capacity(responses.len());
    for response in responses {
        let id = response.correlation_id().map(str::to_owned);
        let raw_id = response.id.clone();
        let outcome = response.into_outcome()?;
        let Some(id) = id else {
            warn!(rpc.response_id = %raw_id, "ignoring response without a string id");
            continue;
        };
        if by_id.contains_key(&id) {
            return Err(Error::Protocol(format!("duplicate response id={id} in batch")));
        }
        by_id.insert(id, outcome);
    }

    let mut ordered = Vec::with_capacity(requests.len());
    for request in requests {
        let outcome = match by_id.remove(request.id()) {
            None => Err(ItemError::MissingResponse {
                id: request.id().to_owned(),
            }),
            Some(outcome) => outcome,
        };
        ordered.push(outcome);
    }

    for stray in by_id.keys() {
        warn!(rpc.response_id = %stray, "ignoring response with unknown id");
    }

    Ok(ordered)
}
