//! rrt_planners - Rapidly-exploring random tree motion planners
//!
//! This crate provides a bi-directional RRT-Connect planner, a goal-biased
//! single-tree RRT and a coverage-oriented exploration planner, all driven
//! through the [`MotionPlanner`] trait against a pluggable configuration
//! space, constraint checker and sampler.

// Core modules
pub mod common;
pub mod utils;

// Algorithm modules
pub mod path_planning;

// Re-export common types for convenience
pub use common::{
    ConfigurationSpecification, PlannerAction, PlannerProgress, PlannerStatus, Trajectory,
};
pub use common::{ConfigurationSpace, ConstraintChecker, SpaceSampler, MotionPlanner};
pub use common::{PlanningError, PlanningResult};
pub use path_planning::{
    BasicRrtPlanner, BiRrtPlanner, ExplorationPlanner, PlanningContext, RrtParameters,
};
