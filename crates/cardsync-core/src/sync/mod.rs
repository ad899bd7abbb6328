//! Remote reconciliation
//!
//! - `diff`: compares materialized cards with the remote store
//! - `apply`: performs the resulting mutations one at a time
//! - `session`: the end-to-end run with its confirmation gates

mod apply;
mod diff;
mod session;

pub use apply::{Applied, ApplyDiff};
pub use diff::{index_remote, RemoteDiff, RemoteSet};
pub use session::{AutoApprove, Gate, SyncHandler, SyncReport, SyncSession};
