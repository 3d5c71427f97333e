//! Error handling for the Skillforge Rust client

use thiserror::Error;

/// Unified error type for the Skillforge Rust client
#[derive(Error, Debug)]
pub enum Error {
    /// REST layer errors, already classified by HTTP status category
    #[error("API error: {0}")]
    Api(#[from] skillforge_rust_api::ApiError),

    /// Push channel errors
    #[error("Realtime error: {0}")]
    Realtime(#[from] skillforge_rust_realtime::SyncError),

    /// State layer errors (e.g. mutating an entity that is not loaded)
    #[error("State error: {0}")]
    Store(#[from] skillforge_rust_store::StoreError),

    /// General errors
    #[error("{0}")]
    General(String),
}

impl Error {
    /// The message a UI should render for this failure; server-provided
    /// messages pass through verbatim.
    pub fn surface_message(&self) -> String {
        match self {
            Error::Api(e) => e.surface_message(),
            other => other.to_string(),
        }
    }
}
