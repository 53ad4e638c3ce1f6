//! The reducer abstraction.
//!
//! A reducer is the pure half of every write: it validates a command against
//! the current state, applies the resulting event in place and hands the event
//! back. Persisting and publishing the outcome is the caller's job.

use crate::error::Result;

/// The Reducer trait - core abstraction for business logic
///
/// # Type Parameters
///
/// - `State`: The domain state this reducer operates on
/// - `Action`: The command type this reducer processes
/// - `Event`: What a successful command produces
/// - `Environment`: The injected dependencies this reducer needs
pub trait Reducer {
    /// The state type this reducer operates on
    type State;

    /// The command type this reducer processes
    type Action;

    /// The event produced by a successful command
    type Event;

    /// The environment type with injected dependencies
    type Environment;

    /// Reduce a command into a state change.
    ///
    /// On success the event has already been applied to `state`. On failure
    /// `state` is left exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns an error if the command is not valid for the current state.
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Result<Self::Event>;
}
