//! Error types for rrt_planners

use thiserror::Error;

/// Main error type for the planners
#[derive(Error, Debug)]
pub enum PlanningError {
    /// A flat configuration buffer does not split into whole configurations
    #[error("configuration buffer of length {len} is not a multiple of dof {dof}")]
    InvalidConfigurationBuffer { len: usize, dof: usize },

    /// Every initial configuration failed the constraints and nothing can sample new ones
    #[error("no initial configurations")]
    NoInitialConfigurations,

    /// Every goal configuration failed the constraints and nothing can sample new ones
    #[error("no goal configurations or goal sampler specified")]
    NoGoalConfigurations,

    /// `plan_path` called without a successful `init_plan`
    #[error("planner not initialized")]
    NotInitialized,

    /// A configuration has the wrong number of values
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Invalid parameter
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parameters could not be parsed
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),
}

impl PlanningError {
    /// True for the failures that leave a planner "not ready" after `init_plan`.
    pub fn is_not_ready(&self) -> bool {
        matches!(
            self,
            PlanningError::InvalidConfigurationBuffer { .. }
                | PlanningError::NoInitialConfigurations
                | PlanningError::NoGoalConfigurations
        )
    }
}

/// Result type alias for planning operations
pub type PlanningResult<T> = Result<T, PlanningError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PlanningError::InvalidConfigurationBuffer { len: 5, dof: 2 };
        assert_eq!(
            format!("{}", err),
            "configuration buffer of length 5 is not a multiple of dof 2"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PlanningError = io_err.into();
        assert!(matches!(err, PlanningError::Io(_)));
        assert!(!err.is_not_ready());
    }

    #[test]
    fn test_not_ready_classification() {
        assert!(PlanningError::NoGoalConfigurations.is_not_ready());
        assert!(PlanningError::NoInitialConfigurations.is_not_ready());
        assert!(!PlanningError::NotInitialized.is_not_ready());
    }
}
