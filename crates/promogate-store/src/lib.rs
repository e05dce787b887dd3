//! Filesystem side of the pipeline: inbox scan, file moves, incident records,
//! and run-summary artifacts.

mod error;
pub use error::StoreError;

pub mod execute;
pub mod inbox;
pub mod samples;
pub mod stamp;

pub use execute::{Executor, write_summary};
pub use inbox::{ProposalFile, scan_inbox};
pub use samples::seed_samples;
pub use stamp::RunClock;
