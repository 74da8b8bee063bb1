//! Result shapes shared by many ledger methods. Decode targets for
//! [`RpcClient::call`](crate::rpc::RpcClient::call) and batch slots.

use std::fmt;

use serde::{Deserialize, Deserializer};
use time::OffsetDateTime;

// ==============================================================================
// Unix Timestamp
// ==============================================================================

/// A point in time sent over the wire as integer seconds since the Unix
/// epoch (for example, block times).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnixTimestamp(pub OffsetDateTime);

impl UnixTimestamp {
    pub fn from_unix_seconds(seconds: i64) -> Result<Self, time::error::ComponentRange> {
        OffsetDateTime::from_unix_timestamp(seconds).map(Self)
    }

    pub fn unix_seconds(&self) -> i64 {
        self.0.unix_timestamp()
    }

    pub fn as_datetime(&self) -> OffsetDateTime {
        self.0
    }
}

impl<'de> Deserialize<'de> for UnixTimestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let seconds = i64::deserialize(deserializer)?;
        Self::from_unix_seconds(seconds).map_err(|e| {
            serde::de::Error::custom(format!("unix timestamp {seconds} out of range: {e}"))
        })
    }
}

impl fmt::Display for UnixTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self
            .0
            .format(&time::format_description::well_known::Rfc3339)
        {
            Ok(formatted) => f.write_str(&formatted),
            Err(_) => write!(f, "{}", self.unix_seconds()),
        }
    }
}

// ==============================================================================
// Context Wrapper
// ==============================================================================

/// Slot at which the node evaluated a context-wrapped result.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RpcContext {
    pub slot: u64,
}

/// `{"context": {"slot": ..}, "value": ..}`, the envelope many
/// state-reading methods wrap their result in.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WithContext<T> {
    pub context: RpcContext,
    pub value: T,
}

impl<T> WithContext<T> {
    pub fn into_value(self) -> T {
        self.value
    }
}
