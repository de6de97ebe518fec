//! Network Layer
//!
//! Input frames in, impact requests across, authority lookups.
//! Transport is in-process `tokio::sync::mpsc`; nothing here awaits, so the
//! simulation stays deterministic and runtime-agnostic.

pub mod authority;
pub mod channel;
pub mod rpc;

pub use authority::{Authority, AuthorityTable};
pub use channel::{ChannelError, InputChannel, InputRelay, InputSender};
pub use rpc::{ImpactBus, ImpactInbox, ImpactRequest, ImpactSender, RpcError};
