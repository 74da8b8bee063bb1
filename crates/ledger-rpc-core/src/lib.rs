pub mod error;
pub mod rpc;
pub mod types;

pub use error::{Error, ItemError, TransportError};
pub use rpc::{Batch, BatchOutcomes, RpcClient, Slot, Transport};
pub use types::{UnixTimestamp, WithContext};
