//! File-backed job state for the job runner.
//!
//! Each job group owns two files in the work directory:
//!
//! - `<group>.lock` - held by launchers across check-then-write sequences
//! - `<group>.json` - the [`StoreDocument`](jobs_core::StoreDocument)
//!
//! All participants may be separate processes; coordination happens only
//! through advisory `flock` locks on these files.

mod error;
mod lock;
mod retention;
mod store;

pub use error::StoreError;
pub use lock::{LockMode, LockPolicy, LockedFile};
pub use retention::sweep;
pub use store::{JobStore, parse_document};
