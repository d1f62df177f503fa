//! State and routines shared by every RRT planner
//!
//! [`PlanningContext`] bundles the collaborators a planning session runs
//! against; [`RrtCore`] owns the forward tree and implements initialization
//! and randomized shortcutting.

use log::{debug, warn};

use crate::common::{
    CheckOptions, ConfigurationSpace, ConfigurationSpecification, ConstraintChecker,
    EnvironmentLock, IntervalType, PlannerAction, PlannerProgress, PlanningError, PlanningResult,
    SegmentQuery, SpaceSampler, Trajectory,
};
use crate::path_planning::parameters::{split_configurations, RrtParameters};
use crate::path_planning::spatial_tree::{NodeId, SpatialTree};

/// Produces a new start or goal configuration, `None` when none is available yet
pub type SampleFn = Box<dyn FnMut() -> Option<Vec<f64>>>;
/// Produces a configuration near the given one, within the given radius
pub type NeighborSampleFn = Box<dyn FnMut(&[f64], f64) -> Option<Vec<f64>>>;
/// Scalar goal heuristic, values at or below [`GOAL_HEURISTIC_TOLERANCE`] mean "at goal"
pub type GoalHeuristicFn = Box<dyn FnMut(&[f64]) -> f64>;
pub type ProgressFn = Box<dyn FnMut(&PlannerProgress) -> PlannerAction>;

pub const GOAL_HEURISTIC_TOLERANCE: f64 = 1e-4;

/// Rejections tolerated beyond the path length before shortcutting gives up
const SHORTCUT_REJECTION_MARGIN: usize = 4;

/// The collaborators a planning session is built over
pub struct PlanningContext {
    pub space: Box<dyn ConfigurationSpace>,
    pub checker: Box<dyn ConstraintChecker>,
    pub sampler: Box<dyn SpaceSampler>,
    pub goal_sampler: Option<SampleFn>,
    pub initial_sampler: Option<SampleFn>,
    pub neighbor_sampler: Option<NeighborSampleFn>,
    pub goal_heuristic: Option<GoalHeuristicFn>,
    pub progress: Option<ProgressFn>,
    pub environment: Option<EnvironmentLock>,
    pub specification: ConfigurationSpecification,
}

impl PlanningContext {
    pub fn new(
        space: Box<dyn ConfigurationSpace>,
        checker: Box<dyn ConstraintChecker>,
        sampler: Box<dyn SpaceSampler>,
    ) -> Self {
        let specification = ConfigurationSpecification::uniform(space.dof(), "");
        PlanningContext {
            space,
            checker,
            sampler,
            goal_sampler: None,
            initial_sampler: None,
            neighbor_sampler: None,
            goal_heuristic: None,
            progress: None,
            environment: None,
            specification,
        }
    }

    pub fn with_goal_sampler(mut self, f: impl FnMut() -> Option<Vec<f64>> + 'static) -> Self {
        self.goal_sampler = Some(Box::new(f));
        self
    }

    pub fn with_initial_sampler(mut self, f: impl FnMut() -> Option<Vec<f64>> + 'static) -> Self {
        self.initial_sampler = Some(Box::new(f));
        self
    }

    pub fn with_neighbor_sampler(
        mut self,
        f: impl FnMut(&[f64], f64) -> Option<Vec<f64>> + 'static,
    ) -> Self {
        self.neighbor_sampler = Some(Box::new(f));
        self
    }

    pub fn with_goal_heuristic(mut self, f: impl FnMut(&[f64]) -> f64 + 'static) -> Self {
        self.goal_heuristic = Some(Box::new(f));
        self
    }

    pub fn with_progress(
        mut self,
        f: impl FnMut(&PlannerProgress) -> PlannerAction + 'static,
    ) -> Self {
        self.progress = Some(Box::new(f));
        self
    }

    pub fn with_environment(mut self, lock: EnvironmentLock) -> Self {
        self.environment = Some(lock);
        self
    }

    pub fn with_specification(mut self, specification: ConfigurationSpecification) -> Self {
        self.specification = specification;
        self
    }

    /// Checks a single configuration in isolation
    pub fn check_config(&mut self, q: &[f64]) -> bool {
        self.checker.check(&SegmentQuery::point(q), None).is_ok()
    }

    /// Asks the progress callback what to do, `Continue` when there is none
    pub fn call_progress(&mut self, iteration: usize) -> PlannerAction {
        match self.progress.as_mut() {
            Some(f) => f(&PlannerProgress { iteration }),
            None => PlannerAction::Continue,
        }
    }

    fn sample_extra(f: &mut Option<SampleFn>, dof: usize) -> Option<Vec<f64>> {
        let sampler = f.as_mut()?;
        let q = sampler()?;
        if q.len() != dof {
            warn!("sampled configuration has {} values, expected {}", q.len(), dof);
            return None;
        }
        Some(q)
    }

    pub fn sample_goal(&mut self) -> Option<Vec<f64>> {
        let dof = self.space.dof();
        Self::sample_extra(&mut self.goal_sampler, dof)
    }

    pub fn sample_initial(&mut self) -> Option<Vec<f64>> {
        let dof = self.space.dof();
        Self::sample_extra(&mut self.initial_sampler, dof)
    }
}

/// Forward tree plus session state common to all planners
pub struct RrtCore {
    pub params: RrtParameters,
    pub ctx: PlanningContext,
    pub forward: SpatialTree,
    pub initial_nodes: Vec<NodeId>,
}

impl RrtCore {
    /// Seeds the sampler and inserts every initial configuration that passes
    /// the oracle as a forward root tagged with its ordinal.
    pub fn init(params: RrtParameters, mut ctx: PlanningContext) -> PlanningResult<Self> {
        params.validate()?;
        let dof = ctx.space.dof();
        if ctx.specification.dof() != dof {
            return Err(PlanningError::DimensionMismatch {
                expected: dof,
                actual: ctx.specification.dof(),
            });
        }
        ctx.sampler.set_seed(params.random_seed);

        let configs = split_configurations(&params.initial_config, dof)?;
        let extent = Self::extent(ctx.space.as_ref());
        let mut forward = SpatialTree::new(dof, params.step_length, extent);
        let mut initial_nodes = Vec::new();

        for (i, q) in configs.into_iter().enumerate() {
            if !ctx.check_config(&q) {
                warn!("initial configuration {} fails constraints", i);
                continue;
            }
            let tag = initial_nodes.len();
            initial_nodes.push(forward.insert_node(None, q, tag)?);
        }

        if forward.num_nodes() == 0 && ctx.initial_sampler.is_none() {
            warn!("no initial configurations");
            return Err(PlanningError::NoInitialConfigurations);
        }

        Ok(RrtCore {
            params,
            ctx,
            forward,
            initial_nodes,
        })
    }

    /// Metric extent of the space's limits, infinite when unbounded
    pub fn extent(space: &dyn ConfigurationSpace) -> f64 {
        let (lower, upper) = (space.lower_limits(), space.upper_limits());
        if lower.len() == space.dof() && upper.len() == space.dof() {
            space.distance(lower, upper)
        } else {
            f64::INFINITY
        }
    }

    /// Pulls one configuration from the initial sampler into the forward tree
    pub fn ingest_initial(&mut self) -> Option<NodeId> {
        let q = self.ctx.sample_initial()?;
        let tag = self.initial_nodes.len();
        debug!("inserting new initial {}", tag);
        let id = self.forward.insert_node(None, q, tag).ok()?;
        self.initial_nodes.push(id);
        Some(id)
    }

    /// Configurations from `id` back to its root, root first
    pub fn forward_chain(&self, id: NodeId) -> Vec<Vec<f64>> {
        self.forward
            .path_to_root(id)
            .into_iter()
            .rev()
            .map(|n| self.forward.get_vector_config(n))
            .collect()
    }

    /// Randomized shortcutting.
    ///
    /// Picks two waypoints at least two apart and asks the oracle for the
    /// straight transition between them; on success the waypoints in between
    /// are replaced by the interior configurations the oracle checked, or
    /// dropped outright when there would be as many interpolants as removed
    /// waypoints. The first and last waypoints never change and the count
    /// never grows.
    pub fn simple_optimize_path(&mut self, path: &mut Vec<Vec<f64>>, iterations: usize) {
        let dof = self.ctx.space.dof();
        let mut rejected = 0;
        let mut filled = Vec::new();

        for _ in 0..iterations {
            if path.len() <= 2 || rejected > path.len() + SHORTCUT_REJECTION_MARGIN {
                break;
            }

            let end = 2 + self.ctx.sampler.sample_u32() as usize % (path.len() - 2);
            let start = self.ctx.sampler.sample_u32() as usize % (end - 1);

            filled.clear();
            let accepted = {
                let query = SegmentQuery::new(&path[start], &path[end], IntervalType::Open)
                    .with_options(CheckOptions::ALL | CheckOptions::FILL_CHECKED);
                self.ctx.checker.check(&query, Some(&mut filled)).is_ok()
            };
            if !accepted {
                rejected += 1;
                continue;
            }

            if filled.first().map_or(false, |q| q == &path[start]) {
                filled.remove(0);
            }
            if filled.last().map_or(false, |q| q == &path[end]) {
                filled.pop();
            }
            // the whole segment was accepted, so dropping its interpolants is still valid
            if filled.len() >= end - start - 1 || filled.iter().any(|q| q.len() != dof) {
                filled.clear();
            }

            let tail = path.split_off(end);
            path.truncate(start + 1);
            path.append(&mut filled);
            path.extend(tail);
            rejected = 0;
        }
    }

    /// Appends waypoints to a trajectory, initializing its layout if empty
    pub fn write_trajectory<I>(
        &self,
        trajectory: &mut Trajectory,
        waypoints: I,
    ) -> PlanningResult<()>
    where
        I: IntoIterator<Item = Vec<f64>>,
    {
        if trajectory.specification().dof() == 0 {
            trajectory.init(self.ctx.specification.clone());
        }
        trajectory.insert(waypoints)
    }
}
