use thiserror::Error;

/// Failures raised while stepping a simulation.
///
/// Returned wrapped in `anyhow::Error`; use `downcast_ref` to match on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulationError {
    /// A field holds NaN or infinite values after a step.
    #[error("solution diverged at step {step} (non-finite values in {field})")]
    Diverged {
        /// 1-based index of the step that produced the values.
        step: usize,
        /// Name of the first offending field (`p`, `u`, `v` or `t`).
        field: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diverged_message() {
        let err = SimulationError::Diverged { step: 42, field: "u" };
        assert_eq!(
            err.to_string(),
            "solution diverged at step 42 (non-finite values in u)"
        );
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = SimulationError::Diverged { step: 3, field: "t" }.into();
        assert_eq!(
            err.downcast_ref::<SimulationError>(),
            Some(&SimulationError::Diverged { step: 3, field: "t" })
        );
    }
}
