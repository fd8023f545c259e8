//! Co-simulation loop controller coupling an economic dispatch engine with a
//! time-domain dynamic simulator under automatic generation control.

pub mod config;
pub mod curve;
pub mod error;
pub mod grid;
pub mod io;
/// Perturbation hooks evaluated at every integration step.
pub mod pert;
/// Reference dispatch and dynamic collaborators.
pub mod reference;
pub mod runner;
/// Loop controller, AGC, clock, and collaborator contracts.
pub mod sim;
