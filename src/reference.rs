//! Stand-in collaborators for running the loop without external tools.
//!
//! Neither is a power-system model to be trusted: the dispatch ignores the
//! network and the simulator lumps every machine onto one rotor.

pub mod dispatch;
pub mod swing;

pub use dispatch::MeritOrderDispatch;
pub use swing::{AggregateSwing, AggregateSwingBuilder};
