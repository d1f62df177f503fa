//! Common traits defining the collaborators a planner is built over

use crate::common::error::PlanningResult;
use crate::common::types::*;
use crate::path_planning::{PlanningContext, RrtParameters};

/// Distance metric and difference function of a configuration space.
///
/// Both must agree on the topology: circular dimensions wrap around in
/// `distance`, `difference` and `integrate` alike.
pub trait ConfigurationSpace {
    /// Number of degrees of freedom
    fn dof(&self) -> usize;

    /// Non-negative distance between two configurations
    fn distance(&self, a: &[f64], b: &[f64]) -> f64;

    /// Displacement `a - b`
    fn difference(&self, a: &[f64], b: &[f64]) -> Vec<f64>;

    /// Configuration reached by moving from `q` along `delta`
    fn integrate(&self, q: &[f64], delta: &[f64]) -> Vec<f64> {
        q.iter().zip(delta).map(|(a, d)| a + d).collect()
    }

    fn lower_limits(&self) -> &[f64];

    fn upper_limits(&self) -> &[f64];

    /// Per-DOF velocity limits, empty or zero entries mean unlimited
    fn velocity_limits(&self) -> &[f64] {
        &[]
    }
}

/// Feasibility oracle for configurations and segments
pub trait ConstraintChecker {
    /// `Ok(())` when the segment is feasible.
    ///
    /// When `query.options` contains [`CheckOptions::FILL_CHECKED`] and
    /// `filled` is given, the interior configurations actually evaluated
    /// along the segment are appended to it (endpoints excluded).
    fn check(
        &mut self,
        query: &SegmentQuery<'_>,
        filled: Option<&mut Vec<Vec<f64>>>,
    ) -> Result<(), ConstraintViolation>;
}

/// Uniform sampler over the valid input domain
pub trait SpaceSampler {
    fn set_seed(&mut self, seed: u64);

    /// A configuration drawn uniformly, `None` when the sampler cannot produce one
    fn sample_config(&mut self) -> Option<Vec<f64>>;

    fn sample_u32(&mut self) -> u32;

    /// Uniform real in `[0, 1)`
    fn sample_real(&mut self) -> f64;
}

/// Common interface of the tree planners
pub trait MotionPlanner {
    /// Validates the problem and seeds the trees. Fails with a "not ready"
    /// error before any tree growth happens.
    fn init_plan(&mut self, params: RrtParameters, context: PlanningContext) -> PlanningResult<()>;

    /// Grows the trees and appends the result to `trajectory`
    fn plan_path(&mut self, trajectory: &mut Trajectory) -> PlanningResult<PlannerStatus>;

    fn parameters(&self) -> Option<&RrtParameters>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LineSpace;

    impl ConfigurationSpace for LineSpace {
        fn dof(&self) -> usize {
            1
        }

        fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
            (a[0] - b[0]).abs()
        }

        fn difference(&self, a: &[f64], b: &[f64]) -> Vec<f64> {
            vec![a[0] - b[0]]
        }

        fn lower_limits(&self) -> &[f64] {
            &[0.0]
        }

        fn upper_limits(&self) -> &[f64] {
            &[1.0]
        }
    }

    #[test]
    fn test_default_integrate_adds_delta() {
        let space = LineSpace;
        assert_eq!(space.integrate(&[0.25], &[0.5]), vec![0.75]);
        assert!(space.velocity_limits().is_empty());
    }
}
