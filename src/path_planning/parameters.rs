//! Planner parameters

use serde::{Deserialize, Serialize};

use crate::common::{PlanningError, PlanningResult};

/// Iteration budget used when `max_iterations` is left at zero
pub const DEFAULT_MAX_ITERATIONS: usize = 10000;

/// Tunable parameters shared by the RRT planners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RrtParameters {
    /// Maximum extension distance per accepted sub-step
    pub step_length: f64,
    /// Outer iteration budget, 0 selects the default
    pub max_iterations: usize,
    /// Bidirectional planner keeps searching until this many goal paths exist
    pub minimum_goal_paths: usize,
    pub random_seed: u64,
    /// Probability of targeting a goal, `None` for the planner default
    pub goal_bias: Option<f64>,
    /// Initial configurations, concatenated
    pub initial_config: Vec<f64>,
    /// Goal configurations, concatenated
    pub goal_config: Vec<f64>,
    /// Exploration planner: probability of neighbour sampling instead of extension
    pub explore_prob: f64,
    /// Exploration planner: stop once the tree holds this many nodes
    pub expected_size: usize,
    /// Shortcutting budget applied to every extracted path
    pub shortcut_iterations: usize,
}

impl Default for RrtParameters {
    fn default() -> Self {
        Self {
            step_length: 0.04,
            max_iterations: 0,
            minimum_goal_paths: 1,
            random_seed: 0,
            goal_bias: None,
            initial_config: Vec::new(),
            goal_config: Vec::new(),
            explore_prob: 0.0,
            expected_size: 100,
            shortcut_iterations: 10,
        }
    }
}

impl RrtParameters {
    /// Parse parameters from TOML; missing keys keep their defaults
    pub fn from_toml_str(s: &str) -> PlanningResult<Self> {
        let params: RrtParameters = toml::from_str(s)?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> PlanningResult<()> {
        if !(self.step_length > 0.0) {
            return Err(PlanningError::InvalidParameter(format!(
                "step_length must be positive, got {}",
                self.step_length
            )));
        }
        if let Some(bias) = self.goal_bias {
            if !(0.0..=1.0).contains(&bias) {
                return Err(PlanningError::InvalidParameter(format!(
                    "goal_bias must be in [0, 1], got {}",
                    bias
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.explore_prob) {
            return Err(PlanningError::InvalidParameter(format!(
                "explore_prob must be in [0, 1], got {}",
                self.explore_prob
            )));
        }
        if self.minimum_goal_paths == 0 {
            return Err(PlanningError::InvalidParameter(
                "minimum_goal_paths must be at least 1".to_string(),
            ));
        }
        if self.expected_size == 0 {
            return Err(PlanningError::InvalidParameter(
                "expected_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Iteration budget with the default applied
    pub fn effective_max_iterations(&self) -> usize {
        if self.max_iterations == 0 {
            DEFAULT_MAX_ITERATIONS
        } else {
            self.max_iterations
        }
    }
}

/// Splits a flat buffer into configurations of `dof` values
pub fn split_configurations(buffer: &[f64], dof: usize) -> PlanningResult<Vec<Vec<f64>>> {
    if dof == 0 || buffer.len() % dof != 0 {
        return Err(PlanningError::InvalidConfigurationBuffer {
            len: buffer.len(),
            dof,
        });
    }
    Ok(buffer.chunks(dof).map(|q| q.to_vec()).collect())
}
