//! Coverage-oriented tree growth
//!
//! Grows a single tree from the start configurations without any goal,
//! mixing ordinary one-step extensions with neighbour sampling around random
//! existing nodes. The result is every configuration in the tree.

use std::time::Instant;

use log::{debug, trace, warn};

use crate::common::{
    IntervalType, MotionPlanner, PlannerAction, PlannerStatus, PlanningError, PlanningResult,
    SegmentQuery, Trajectory,
};
use crate::path_planning::parameters::{RrtParameters, DEFAULT_MAX_ITERATIONS};
use crate::path_planning::rrt_base::{PlanningContext, RrtCore};
use crate::path_planning::spatial_tree::{NodeId, SpatialTree};

enum GrowOutcome {
    Finished,
    Interrupted,
    /// The neighbour sampler declined to produce a configuration
    SamplerExhausted,
}

struct ExplorationSession {
    core: RrtCore,
    iterations: usize,
}

impl ExplorationSession {
    fn new(params: RrtParameters, context: PlanningContext) -> PlanningResult<Self> {
        let mut core = RrtCore::init(params, context)?;
        if core.params.max_iterations == 0 {
            core.params.max_iterations = DEFAULT_MAX_ITERATIONS;
        }
        if core.params.explore_prob > 0.0 && core.ctx.neighbor_sampler.is_none() {
            warn!("explore_prob is {} but no neighbour sampler is set", core.params.explore_prob);
        }
        debug!(
            "exploration planner initialized, initial={}, expected size={}",
            core.initial_nodes.len(),
            core.params.expected_size
        );
        Ok(ExplorationSession {
            core,
            iterations: 0,
        })
    }

    /// Samples around a random node and inserts the sample if the segment
    /// from that node is feasible. `Err` when the neighbour sampler gives up.
    fn explore_step(&mut self) -> Result<Option<NodeId>, ()> {
        let core = &mut self.core;
        let n = core.forward.num_nodes();
        let parent = core.ctx.sampler.sample_u32() as usize % n;
        let step_length = core.params.step_length;

        let neighbor = match core.ctx.neighbor_sampler.as_mut() {
            Some(f) => f,
            None => return Ok(None),
        };
        let q = match neighbor(core.forward.config(parent), step_length) {
            Some(q) => q,
            None => return Err(()),
        };
        if q.len() != core.forward.dof() {
            warn!("neighbour sample has {} values, expected {}", q.len(), core.forward.dof());
            return Ok(None);
        }

        let accepted = {
            let query = SegmentQuery::new(core.forward.config(parent), &q, IntervalType::OpenStart);
            core.ctx.checker.check(&query, None).is_ok()
        };
        if !accepted {
            return Ok(None);
        }
        Ok(core.forward.insert_node(Some(parent), q, 0).ok())
    }

    fn extend_step(&mut self) -> Option<NodeId> {
        let core = &mut self.core;
        let target = core.ctx.sampler.sample_config()?;
        let space = &*core.ctx.space;
        let checker = &mut *core.ctx.checker;
        core.forward.extend(&target, space, checker, true).node()
    }

    fn grow(&mut self) -> GrowOutcome {
        self.iterations = 0;
        let max_iterations = self.core.params.max_iterations;
        let expected_size = self.core.params.expected_size;
        let explore_prob = self.core.params.explore_prob;

        while self.iterations < max_iterations && self.core.forward.num_nodes() < expected_size {
            self.iterations += 1;
            trace!("iter={}, nodes={}", self.iterations, self.core.forward.num_nodes());

            self.core.ingest_initial();
            if self.core.forward.num_nodes() > 0 {
                let explore = self.core.ctx.sampler.sample_real() < explore_prob
                    && self.core.ctx.neighbor_sampler.is_some();
                if explore {
                    if self.explore_step().is_err() {
                        warn!("neighbour sampler failed at iteration {}", self.iterations);
                        return GrowOutcome::SamplerExhausted;
                    }
                } else {
                    self.extend_step();
                }
            }

            if let PlannerAction::Interrupt = self.core.ctx.call_progress(self.iterations) {
                return GrowOutcome::Interrupted;
            }
        }
        GrowOutcome::Finished
    }
}

/// Exploration planner producing a coverage set of configurations
#[derive(Default)]
pub struct ExplorationPlanner {
    session: Option<ExplorationSession>,
}

impl ExplorationPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iterations(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.iterations)
    }

    pub fn forward_tree(&self) -> Option<&SpatialTree> {
        self.session.as_ref().map(|s| &s.core.forward)
    }
}

impl MotionPlanner for ExplorationPlanner {
    fn init_plan(&mut self, params: RrtParameters, context: PlanningContext) -> PlanningResult<()> {
        self.session = None;
        let lock = context.environment.clone();
        let _guard = lock.as_ref().map(|l| l.acquire());
        self.session = Some(ExplorationSession::new(params, context)?);
        Ok(())
    }

    fn plan_path(&mut self, trajectory: &mut Trajectory) -> PlanningResult<PlannerStatus> {
        let session = self.session.as_mut().ok_or(PlanningError::NotInitialized)?;
        let lock = session.core.ctx.environment.clone();
        let _guard = lock.as_ref().map(|l| l.acquire());
        let started = Instant::now();

        match session.grow() {
            GrowOutcome::Interrupted => return Ok(PlannerStatus::Interrupted),
            GrowOutcome::SamplerExhausted => return Ok(PlannerStatus::Failed),
            GrowOutcome::Finished => {}
        }

        let tree = &session.core.forward;
        let configs: Vec<Vec<f64>> = tree
            .get_nodes_vector()
            .into_iter()
            .map(|id| tree.get_vector_config(id))
            .collect();
        session.core.write_trajectory(trajectory, configs)?;

        debug!(
            "exploration finished, nodes={}, iters={}, {:.3}s",
            trajectory.num_waypoints(),
            session.iterations,
            started.elapsed().as_secs_f64()
        );
        Ok(PlannerStatus::HasSolution)
    }

    fn parameters(&self) -> Option<&RrtParameters> {
        self.session.as_ref().map(|s| &s.core.params)
    }
}
