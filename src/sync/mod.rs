//! The incremental synchronization engine: watermark resolution, query
//! window chunking and the idempotent patch write.

pub mod patch;
pub mod watermark;
pub mod window;

use thiserror::Error;

use crate::portals::client::ClientError;
use crate::store::StoreError;

/// Fatal conditions for a sync cycle. Everything here terminates the
/// cycle; `main` turns it into a non-zero exit after the store handle
/// has been released.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("getting data from {endpoint} failed - failcode: {code} - message: {message}")]
    Vendor {
        endpoint: String,
        code: i64,
        message: String,
    },
    #[error("unexpected payload shape: {0}")]
    ShapeMismatch(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What a completed cycle did. `NoOp` is the common steady-state
/// outcome (store already current through yesterday), not an error.
#[derive(Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    NoOp,
    Synced { appended: usize },
}
