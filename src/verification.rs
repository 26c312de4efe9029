//! Payment verification state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions:
//! `Idle -> Verifying -> Confirmed | TimedOut`.

mod effect;
pub mod event;
mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::{CheckOutcome, Event};
pub use state::{VerifyPolicy, VerifyState};
pub use transition::{transition, TransitionError};
