//! Read-only consistency validation: a snapshot of the engine's state
//! plus a fixed battery of checks over it, reported as data.

pub mod checks;
pub mod report;
pub mod snapshot;

pub use checks::Auditor;
pub use report::{CheckResult, CheckStatus, Report, Summary};
pub use snapshot::{CountRow, EntryRow, LineRow, MovementRow, SessionRow, Snapshot};
