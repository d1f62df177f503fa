//! Goal-biased single-tree RRT
//!
//! Grows one tree from the start configurations one step at a time, steering
//! toward a known goal with probability `goal_bias`. Planning succeeds as
//! soon as a node lands within two step lengths of a goal, or the goal
//! heuristic reports that a node is at the goal.

use std::time::Instant;

use log::{debug, warn};

use crate::common::{
    MotionPlanner, PlannerAction, PlannerStatus, PlanningError, PlanningResult, Trajectory,
};
use crate::path_planning::parameters::{
    split_configurations, RrtParameters, DEFAULT_MAX_ITERATIONS,
};
use crate::path_planning::rrt_base::{PlanningContext, RrtCore, GOAL_HEURISTIC_TOLERANCE};
use crate::path_planning::spatial_tree::{NodeId, SpatialTree};

/// Goal bias used when the parameters leave it unset
pub const DEFAULT_RRT_GOAL_BIAS: f64 = 0.05;

/// A node that satisfied the goal test, with the explicit goal it reached
struct GoalHit {
    node: NodeId,
    goal_index: Option<usize>,
}

struct BasicRrtSession {
    core: RrtCore,
    goals: Vec<Vec<f64>>,
    goal_bias: f64,
    iterations: usize,
}

impl BasicRrtSession {
    fn new(params: RrtParameters, context: PlanningContext) -> PlanningResult<Self> {
        let mut core = RrtCore::init(params, context)?;
        let dof = core.ctx.space.dof();

        let mut goals = Vec::new();
        let configs = split_configurations(&core.params.goal_config, dof)?;
        for (i, q) in configs.into_iter().enumerate() {
            if core.ctx.check_config(&q) {
                goals.push(q);
            } else {
                warn!("goal {} in collision", i);
            }
        }

        if goals.is_empty()
            && core.ctx.goal_heuristic.is_none()
            && core.ctx.goal_sampler.is_none()
        {
            warn!("no goals or goal function specified");
            return Err(PlanningError::NoGoalConfigurations);
        }

        if core.params.max_iterations == 0 {
            core.params.max_iterations = DEFAULT_MAX_ITERATIONS;
        }
        let goal_bias = core.params.goal_bias.unwrap_or(DEFAULT_RRT_GOAL_BIAS);

        debug!(
            "RRT planner initialized, initial={}, goals={}",
            core.initial_nodes.len(),
            goals.len()
        );
        Ok(BasicRrtSession {
            core,
            goals,
            goal_bias,
            iterations: 0,
        })
    }

    fn choose_target(&mut self) -> Option<Vec<f64>> {
        let sampler = &mut self.core.ctx.sampler;
        if (self.iterations == 1 || sampler.sample_real() < self.goal_bias)
            && !self.goals.is_empty()
        {
            let index = sampler.sample_u32() as usize % self.goals.len();
            return Some(self.goals[index].clone());
        }
        sampler.sample_config()
    }

    /// Goal test on a freshly reached node
    fn goal_test(&mut self, node: NodeId) -> Option<GoalHit> {
        let RrtCore { ctx, forward, params, .. } = &mut self.core;
        let q = forward.config(node);
        let radius = 2.0 * params.step_length;

        let reached = self.goals.iter().position(|g| ctx.space.distance(g, q) < radius);
        if let Some(goal_index) = reached {
            debug!("found goal index: {}", goal_index);
            return Some(GoalHit {
                node,
                goal_index: Some(goal_index),
            });
        }
        if let Some(heuristic) = ctx.goal_heuristic.as_mut() {
            if heuristic(q) <= GOAL_HEURISTIC_TOLERANCE {
                debug!("node at goal");
                return Some(GoalHit {
                    node,
                    goal_index: None,
                });
            }
        }
        None
    }

    /// Runs the sample/extend loop. `Ok(None)` means the budget ran out.
    fn grow(&mut self) -> Result<Option<GoalHit>, PlannerStatus> {
        self.iterations = 0;
        let max_iterations = self.core.params.max_iterations;
        let mut hit = None;

        while hit.is_none() && self.iterations < max_iterations {
            self.iterations += 1;

            if let Some(q) = self.core.ctx.sample_goal() {
                debug!("found goal");
                self.goals.push(q);
            }
            self.core.ingest_initial();

            if let Some(target) = self.choose_target() {
                let space = &*self.core.ctx.space;
                let checker = &mut *self.core.ctx.checker;
                if let Some(node) = self.core.forward.extend(&target, space, checker, true).node() {
                    hit = self.goal_test(node);
                }
            }
            // success is final, the callback never sees a solved round
            if hit.is_some() {
                break;
            }

            if let PlannerAction::Interrupt = self.core.ctx.call_progress(self.iterations) {
                return Err(PlannerStatus::Interrupted);
            }
        }

        if hit.is_none() {
            warn!("iterations exceeded {}", max_iterations);
        }
        Ok(hit)
    }
}

/// Goal-biased single-tree RRT planner
#[derive(Default)]
pub struct BasicRrtPlanner {
    session: Option<BasicRrtSession>,
    start_index: Option<usize>,
    goal_index: Option<usize>,
}

impl BasicRrtPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the explicit goal that was reached, `None` if the heuristic ended the search
    pub fn goal_index(&self) -> Option<usize> {
        self.goal_index
    }

    pub fn start_index(&self) -> Option<usize> {
        self.start_index
    }

    /// Iterations consumed by the last `plan_path` call
    pub fn iterations(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.iterations)
    }

    pub fn forward_tree(&self) -> Option<&SpatialTree> {
        self.session.as_ref().map(|s| &s.core.forward)
    }

    /// Explicit and sampled goals known to the planner
    pub fn goals(&self) -> &[Vec<f64>] {
        self.session.as_ref().map_or(&[][..], |s| s.goals.as_slice())
    }
}

impl MotionPlanner for BasicRrtPlanner {
    fn init_plan(&mut self, params: RrtParameters, context: PlanningContext) -> PlanningResult<()> {
        self.session = None;
        self.start_index = None;
        self.goal_index = None;

        let lock = context.environment.clone();
        let _guard = lock.as_ref().map(|l| l.acquire());
        self.session = Some(BasicRrtSession::new(params, context)?);
        Ok(())
    }

    fn plan_path(&mut self, trajectory: &mut Trajectory) -> PlanningResult<PlannerStatus> {
        self.start_index = None;
        self.goal_index = None;
        let session = self.session.as_mut().ok_or(PlanningError::NotInitialized)?;

        let lock = session.core.ctx.environment.clone();
        let _guard = lock.as_ref().map(|l| l.acquire());
        let started = Instant::now();

        let hit = match session.grow() {
            Ok(Some(hit)) => hit,
            Ok(None) => {
                debug!("plan failed, {:.3}s", started.elapsed().as_secs_f64());
                return Ok(PlannerStatus::Failed);
            }
            Err(status) => return Ok(status),
        };

        let mut path = session.core.forward_chain(hit.node);
        let iterations = session.core.params.shortcut_iterations;
        session.core.simple_optimize_path(&mut path, iterations);

        let root = session.core.forward.root_of(hit.node);
        self.start_index = Some(session.core.forward.node(root).tag);
        self.goal_index = hit.goal_index;
        session.core.write_trajectory(trajectory, path)?;

        debug!(
            "plan success, path={} points in {:.3}s",
            trajectory.num_waypoints(),
            started.elapsed().as_secs_f64()
        );
        Ok(PlannerStatus::HasSolution)
    }

    fn parameters(&self) -> Option<&RrtParameters> {
        self.session.as_ref().map(|s| &s.core.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{BoxSpace, InterpolatingChecker, UniformSampler};
    use std::cell::Cell;
    use std::rc::Rc;

    fn context<F>(predicate: F) -> PlanningContext
    where
        F: FnMut(&[f64]) -> bool + 'static,
    {
        let space = BoxSpace::new(vec![0.0, 0.0], vec![10.0, 10.0]);
        let sampler = UniformSampler::for_space(&space);
        PlanningContext::new(
            Box::new(space),
            Box::new(InterpolatingChecker::new(0.05, predicate)),
            Box::new(sampler),
        )
    }

    fn params(goals: Vec<f64>) -> RrtParameters {
        RrtParameters {
            step_length: 0.5,
            max_iterations: 2000,
            initial_config: vec![1.0, 1.0],
            goal_config: goals,
            goal_bias: Some(0.2),
            ..Default::default()
        }
    }

    #[test]
    fn test_reaches_goal_in_free_space() {
        let mut planner = BasicRrtPlanner::new();
        planner
            .init_plan(params(vec![8.0, 8.0]), context(|_q: &[f64]| true))
            .unwrap();

        let mut traj = Trajectory::new();
        assert_eq!(planner.plan_path(&mut traj).unwrap(), PlannerStatus::HasSolution);
        assert_eq!(planner.goal_index(), Some(0));
        assert_eq!(planner.start_index(), Some(0));
        assert_eq!(traj.waypoint(0), Some(&[1.0, 1.0][..]));

        let last = traj.waypoints().last().unwrap();
        let d = ((last[0] - 8.0).powi(2) + (last[1] - 8.0).powi(2)).sqrt();
        assert!(d < 1.0);
    }

    #[test]
    fn test_rejects_missing_goals() {
        let mut planner = BasicRrtPlanner::new();
        let err = planner
            .init_plan(params(vec![9.0, 9.0]), context(|q: &[f64]| q[0] < 5.0))
            .unwrap_err();
        assert!(matches!(err, PlanningError::NoGoalConfigurations));
        assert!(planner.parameters().is_none());
    }

    #[test]
    fn test_goal_heuristic_ends_search() {
        let mut planner = BasicRrtPlanner::new();
        let ctx = context(|_q: &[f64]| true).with_goal_heuristic(|q: &[f64]| {
            if q[0] > 6.0 {
                0.0
            } else {
                1.0
            }
        });
        planner.init_plan(params(Vec::new()), ctx).unwrap();

        let mut traj = Trajectory::new();
        assert_eq!(planner.plan_path(&mut traj).unwrap(), PlannerStatus::HasSolution);
        assert_eq!(planner.goal_index(), None);
        assert!(traj.waypoints().last().unwrap()[0] > 6.0);
    }

    #[test]
    fn test_fails_when_budget_exhausted() {
        let mut planner = BasicRrtPlanner::new();
        let mut p = params(vec![9.0, 9.0]);
        p.max_iterations = 50;
        // wall at x in [4, 6] separates start and goal
        planner
            .init_plan(p, context(|q: &[f64]| q[0] < 4.0 || q[0] > 6.0))
            .unwrap();

        let mut traj = Trajectory::new();
        assert_eq!(planner.plan_path(&mut traj).unwrap(), PlannerStatus::Failed);
        assert_eq!(planner.iterations(), 50);
        assert!(traj.is_empty());
    }

    #[test]
    fn test_goal_reached_before_interrupt_is_kept() {
        let mut planner = BasicRrtPlanner::new();
        let polls = Rc::new(Cell::new(0));
        let seen = polls.clone();
        let ctx = context(|_q: &[f64]| true).with_progress(move |_p| {
            seen.set(seen.get() + 1);
            PlannerAction::Interrupt
        });
        // goal one step away is reached on the first iteration
        planner.init_plan(params(vec![1.5, 1.0]), ctx).unwrap();

        let mut traj = Trajectory::new();
        assert_eq!(planner.plan_path(&mut traj).unwrap(), PlannerStatus::HasSolution);
        assert_eq!(planner.iterations(), 1);
        assert_eq!(polls.get(), 0);
        assert_eq!(planner.goal_index(), Some(0));
        assert_eq!(traj.waypoints().last().unwrap(), &vec![1.5, 1.0]);
    }

    #[test]
    fn test_interrupt_before_goal_reached() {
        let mut planner = BasicRrtPlanner::new();
        let ctx = context(|_q: &[f64]| true).with_progress(|_p| PlannerAction::Interrupt);
        planner.init_plan(params(vec![9.0, 9.0]), ctx).unwrap();

        let mut traj = Trajectory::new();
        assert_eq!(planner.plan_path(&mut traj).unwrap(), PlannerStatus::Interrupted);
        assert_eq!(planner.iterations(), 1);
        assert!(traj.is_empty());
    }
}
