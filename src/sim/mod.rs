pub mod adapter;
/// AGC PI controller and ACE state.
pub mod agc;
/// Nested hour / dispatch / AGC / second clock.
pub mod clock;
pub mod collaborator;
pub mod engine;
pub mod kpi;
pub mod link;
pub mod participation;
pub mod types;
