//! Fatal error taxonomy for a co-simulation run.

use thiserror::Error;

/// Errors that abort a co-simulation run.
///
/// Every variant is fatal: the loop controller never retries a failed
/// initialization, solve, or integration step.
#[derive(Error, Debug)]
pub enum CosimError {
    /// Power flow or dynamic initialization did not converge at an hour boundary.
    #[error("dynamic initialization failed at hour {hour}")]
    InitFailed { hour: usize },

    /// The dispatch engine reported a non-converged solve.
    #[error("dispatch did not converge at hour {hour}, interval {interval}")]
    DispatchDiverged { hour: usize, interval: usize },

    /// The dynamic simulator returned a nonzero exit code.
    #[error("simulator exited with code {code} at hour {hour}, second {second}")]
    SimulatorExit { code: i32, hour: usize, second: usize },

    /// The dynamic simulator could not be built from the dispatch network.
    #[error("failed to build simulator: {0}")]
    Build(String),

    /// Exogenous curve data is malformed.
    #[error("invalid curve: {0}")]
    Curve(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Convenience alias used across the crate.
pub type CosimResult<T> = Result<T, CosimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let e = CosimError::SimulatorExit {
            code: 3,
            hour: 1,
            second: 42,
        };
        let msg = e.to_string();
        assert!(msg.contains("code 3"));
        assert!(msg.contains("hour 1"));
        assert!(msg.contains("second 42"));

        let e = CosimError::DispatchDiverged {
            hour: 0,
            interval: 2,
        };
        assert!(e.to_string().contains("interval 2"));
    }
}
