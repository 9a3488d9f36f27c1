//! Vault/drawer cash movements under maker-checker control.

pub mod movement;
pub mod workflow;

pub use movement::{CashMovement, MovementId, MovementState, MovementType};
pub use workflow::{Decision, MovementError, MovementWorkflow};
