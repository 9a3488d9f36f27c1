//! # Cash Sessions
//!
//! The per-teller drawer lifecycle: open at shift start, accumulate
//! approved vault movements, close against a physical count, get
//! validated by a supervisor. `session.rs` is the data model,
//! `manager.rs` the state machine that owns it.

pub mod manager;
pub mod session;

pub use manager::{MovementEffect, SessionError, SessionManager};
pub use session::{CashSession, Closing, SessionId, SessionState, ValidationStamp};
