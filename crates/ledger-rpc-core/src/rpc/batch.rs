use std::any::Any;
use std::marker::PhantomData;

use rand::Rng;
use serde::de::DeserializeOwned;

use crate::error::{Error, ItemError};

use super::correlate::RawOutcome;
use super::protocol::Request;

type Decoded = Box<dyn Any + Send>;

/// Turns the raw `result` of one slot into the type the caller asked for.
pub(crate) type Decoder =
    Box<dyn Fn(&str, serde_json::Value) -> Result<Decoded, ItemError> + Send + Sync>;

/// An ordered set of calls sent in one payload, each with its own result
/// type.
///
/// ```ignore
/// let mut batch = Batch::new();
/// let height = batch.push::<u64>("getBlockHeight", vec![]);
/// let blocks = batch.push::<Vec<u64>>("getConfirmedBlocksWithLimit", vec![json!(5), json!(10)]);
/// let mut outcomes = client.call_batch(batch).await?;
/// let height = outcomes.take(height)?;
/// ```
pub struct Batch {
    tag: u64,
    requests: Vec<Request>,
    decoders: Vec<Decoder>,
}

/// Typed handle for one position of a [`Batch`].
pub struct Slot<T> {
    tag: u64,
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Slot<T> {
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Batch {
    pub fn new() -> Self {
        Self {
            tag: rand::thread_rng().r#gen(),
            requests: Vec::new(),
            decoders: Vec::new(),
        }
    }

    /// Append a call and get back the slot its decoded result will land in.
    pub fn push<T>(
        &mut self,
        method: impl Into<String>,
        params: Vec<serde_json::Value>,
    ) -> Slot<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let mut request = Request::new(method, params);
        while self.contains_id(request.id()) {
            request.regenerate_id();
        }
        self.insert(request)
    }

    /// Append a prebuilt request, keeping its id.
    pub fn push_request<T>(&mut self, request: Request) -> Result<Slot<T>, Error>
    where
        T: DeserializeOwned + Send + 'static,
    {
        if self.contains_id(request.id()) {
            return Err(Error::Protocol(format!(
                "duplicate request id={} in batch",
                request.id()
            )));
        }
        Ok(self.insert(request))
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    fn contains_id(&self, id: &str) -> bool {
        self.requests.iter().any(|r| r.id() == id)
    }

    fn insert<T>(&mut self, request: Request) -> Slot<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let index = self.requests.len();
        self.requests.push(request);
        self.decoders.push(Box::new(|id: &str, value: serde_json::Value| {
            serde_json::from_value::<T>(value)
                .map(|decoded| Box::new(decoded) as Decoded)
                .map_err(|source| ItemError::Decode {
                    id: id.to_owned(),
                    source,
                })
        }));
        Slot {
            tag: self.tag,
            index,
            _marker: PhantomData,
        }
    }

    pub(crate) fn into_parts(self) -> (u64, Vec<Request>, Vec<Decoder>) {
        (self.tag, self.requests, self.decoders)
    }
}

impl Default for Batch {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-slot outcomes of a batch call, in request order.
pub struct BatchOutcomes {
    tag: u64,
    outcomes: Vec<Option<Result<Decoded, ItemError>>>,
}

impl BatchOutcomes {
    /// Apply each slot's decoder to its correlated raw outcome.
    pub(crate) fn decode(
        tag: u64,
        requests: &[Request],
        decoders: &[Decoder],
        raw: Vec<RawOutcome>,
    ) -> Self {
        let outcomes = raw
            .into_iter()
            .zip(requests.iter().zip(decoders))
            .map(|(outcome, (request, decode))| {
                Some(outcome.and_then(|value| decode(request.id(), value)))
            })
            .collect();
        Self { tag, outcomes }
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Whether the slot at `index` decoded successfully. `None` once taken.
    pub fn is_ok(&self, index: usize) -> Option<bool> {
        self.outcomes
            .get(index)
            .and_then(Option::as_ref)
            .map(Result::is_ok)
    }

    /// Move the outcome for `slot` out.
    pub fn take<T: 'static>(&mut self, slot: Slot<T>) -> Result<T, ItemError> {
        let mismatch = || ItemError::SlotMismatch { index: slot.index };
        if slot.tag != self.tag {
            return Err(mismatch());
        }
        let outcome = self
            .outcomes
            .get_mut(slot.index)
            .and_then(Option::take)
            .ok_or_else(mismatch)?;
        outcome?
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| mismatch())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn push_generates_unique_ids() {
        let mut batch = Batch::new();
        for _ in 0..64 {
            let _ = batch.push::<u64>("getBlockHeight", vec![]);
        }
        let mut ids: Vec<&str> = batch.requests().iter().map(Request::id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 64);
    }

    #[test]
    fn push_request_rejects_duplicate_id() {
        let mut batch = Batch::new();
        batch
            .push_request::<u64>(Request::with_id("A", "getBlockHeight", vec![]))
            .expect("first id is free");
        let err = batch
            .push_request::<u64>(Request::with_id("A", "getSlot", vec![]))
            .err()
            .expect("duplicate id must be rejected");
        assert!(matches!(err, Error::Protocol(msg) if msg.contains("duplicate request id=A")));
    }

    #[test]
    fn slots_decode_to_their_own_types() {
        let mut batch = Batch::new();
        let height = batch.push::<u64>("getBlockHeight", vec![]);
        let blocks = batch.push::<Vec<u64>>("getConfirmedBlocksWithLimit", vec![]);
        let (tag, requests, decoders) = batch.into_parts();

        let raw = vec![Ok(json!(119396901)), Ok(json!([1, 2, 3]))];
        let mut outcomes = BatchOutcomes::decode(tag, &requests, &decoders, raw);

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes.take(height).expect("height"), 119396901);
        assert_eq!(outcomes.take(blocks).expect("blocks"), vec![1, 2, 3]);
    }

    #[test]
    fn decode_failure_is_scoped_to_slot() {
        let mut batch = Batch::new();
        let bad = batch.push::<u64>("getBlockHeight", vec![]);
        let good = batch.push::<String>("getVersion", vec![]);
        let (tag, requests, decoders) = batch.into_parts();

        let raw = vec![Ok(json!("not a number")), Ok(json!("1.9.14"))];
        let mut outcomes = BatchOutcomes::decode(tag, &requests, &decoders, raw);

        assert_eq!(outcomes.is_ok(0), Some(false));
        assert!(matches!(outcomes.take(bad), Err(ItemError::Decode { .. })));
        assert_eq!(outcomes.take(good).expect("version"), "1.9.14");
    }

    #[test]
    fn decoding_same_value_twice_is_stable() {
        let mut batch = Batch::new();
        let _ = batch.push::<Vec<u64>>("getConfirmedBlocksWithLimit", vec![]);
        let (_, requests, decoders) = batch.into_parts();

        let value = json!([131421172, 131421173]);
        let first = (decoders[0])(requests[0].id(), value.clone()).expect("decodes");
        let second = (decoders[0])(requests[0].id(), value).expect("decodes");
        assert_eq!(
            first.downcast_ref::<Vec<u64>>(),
            second.downcast_ref::<Vec<u64>>()
        );
    }

    #[test]
    fn slot_from_other_batch_is_rejected() {
        let mut first = Batch::new();
        let _ = first.push::<u64>("getBlockHeight", vec![]);
        let mut second = Batch::new();
        let foreign = second.push::<u64>("getBlockHeight", vec![]);

        let (tag, requests, decoders) = first.into_parts();
        let mut outcomes = BatchOutcomes::decode(tag, &requests, &decoders, vec![Ok(json!(1))]);
        assert!(matches!(
            outcomes.take(foreign),
            Err(ItemError::SlotMismatch { index: 0 })
        ));
        assert_eq!(outcomes.is_ok(0), Some(true));
    }
}
