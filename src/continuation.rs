//! Continuation controller
//!
//! Turns one chat turn into one or more segments. The decision logic is a
//! pure transition function over [`TurnState`]; [`TurnController`] executes
//! the effects it asks for against the model collaborator and the relay.

mod controller;
mod effect;
mod error;
pub mod event;
mod runner;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use controller::{TurnController, TurnReport};
pub use effect::Effect;
pub use error::TurnError;
pub use event::TurnEvent;
pub use runner::{Turn, TurnRunner};
pub use state::{TurnContext, TurnState};
pub use transition::{transition, TransitionError, TransitionResult};
