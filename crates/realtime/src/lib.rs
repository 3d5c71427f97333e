//! Skillforge push-channel transport
//!
//! A persistent, authenticated websocket connection that delivers the
//! server's named events as parsed JSON frames and carries the client's
//! commands upstream. Reconnection with exponential backoff, heartbeat
//! and room re-join live here; what the events *mean* is the store
//! crate's business.

mod client;
mod command;
mod error;

pub use client::{ConnectionState, SyncClient, SyncClientOptions};
pub use command::ClientCommand;
pub use error::SyncError;
