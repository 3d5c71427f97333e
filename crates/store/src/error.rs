use thiserror::Error;

/// Errors from the state layer itself. Server-side failures are not
/// represented here; they arrive as messages the owning collection
/// records in its `error` field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("entity not found in collection: {0}")]
    NotFound(String),

    #[error("no in-flight operation tracked for {0}")]
    NoPendingOperation(String),
}
