//! Run protocol state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions:
//! the controller feeds inputs in, executes the effects that come out.

mod effect;
mod failure;
mod input;
mod state;
mod transition;

#[cfg(test)]
pub(crate) mod conformance;
#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use failure::{RunFailure, ValidationError};
pub use input::RunInput;
pub use state::{RunContext, RunIds, RunState};
pub use transition::{transition, TransitionError, TransitionResult};
