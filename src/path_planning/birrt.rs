//! Bi-directional RRT (RRT-Connect) path planning
//!
//! Grows a forward tree from the start configurations and a backward tree
//! from the goal configurations, alternating their roles every round, until
//! the trees connect. Supports several goals: each connection yields a
//! candidate path, the goal it reached is retired from the backward tree,
//! and the shortest candidate is returned.
//!
//! J.J. Kuffner and S.M. LaValle. RRT-Connect: An efficient approach to
//! single-query path planning. ICRA 2000.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use itertools::Itertools;
use log::{debug, trace, warn};
use ordered_float::OrderedFloat;

use crate::common::{
    MotionPlanner, PlannerAction, PlannerStatus, PlanningError, PlanningResult, Trajectory,
};
use crate::path_planning::parameters::{
    split_configurations, RrtParameters, DEFAULT_MAX_ITERATIONS,
};
use crate::path_planning::rrt_base::{PlanningContext, RrtCore};
use crate::path_planning::spatial_tree::{ExtendResult, NodeId, SpatialTree};

/// Goal bias used when the parameters leave it unset
pub const DEFAULT_BIRRT_GOAL_BIAS: f64 = 0.01;

/// Ticks charged per round; the tick budget is this times `max_iterations`
pub const TICKS_PER_ROUND: usize = 3;

/// Candidate solution produced by one tree connection
#[derive(Debug, Clone)]
pub struct GoalPath {
    pub waypoints: Vec<Vec<f64>>,
    pub start_index: usize,
    pub goal_index: usize,
    /// Velocity-scaled distance between the first and last waypoint
    pub length: f64,
}

enum RoundResult {
    /// Tree A could not move toward the target
    Stalled,
    Extended,
    Connected { forward: NodeId, backward: NodeId },
}

enum GrowOutcome {
    Finished,
    Interrupted,
}

struct BiRrtSession {
    core: RrtCore,
    backward: SpatialTree,
    /// Backward roots by goal index, `None` where the goal failed the constraints
    goal_nodes: Vec<Option<NodeId>>,
    valid_goals: usize,
    goal_bias: f64,
    ticks: usize,
    goal_paths: Vec<GoalPath>,
}

impl BiRrtSession {
    fn new(params: RrtParameters, context: PlanningContext) -> PlanningResult<Self> {
        let mut core = RrtCore::init(params, context)?;
        let dof = core.ctx.space.dof();
        let goals = split_configurations(&core.params.goal_config, dof)?;

        let mut backward =
            SpatialTree::new(dof, core.params.step_length, core.forward.max_distance());
        let mut goal_nodes = Vec::with_capacity(goals.len());
        let mut valid_goals = 0;
        for (i, q) in goals.into_iter().enumerate() {
            if core.ctx.check_config(&q) {
                goal_nodes.push(Some(backward.insert_node(None, q, i)?));
                valid_goals += 1;
            } else {
                warn!("goal {} fails constraints", i);
                goal_nodes.push(None);
            }
        }

        if backward.num_nodes() == 0 && core.ctx.goal_sampler.is_none() {
            warn!("no goals specified");
            return Err(PlanningError::NoGoalConfigurations);
        }

        if core.params.max_iterations == 0 {
            core.params.max_iterations = DEFAULT_MAX_ITERATIONS;
        }
        let goal_bias = core.params.goal_bias.unwrap_or(DEFAULT_BIRRT_GOAL_BIAS);

        debug!(
            "BiRRT planner initialized, initial={}, goal={}",
            core.initial_nodes.len(),
            backward.num_nodes()
        );
        Ok(BiRrtSession {
            core,
            backward,
            goal_nodes,
            valid_goals,
            goal_bias,
            ticks: 0,
            goal_paths: Vec::new(),
        })
    }

    fn ingest_samples(&mut self) {
        if let Some(q) = self.core.ctx.sample_goal() {
            let index = self.goal_nodes.len();
            debug!("inserting new goal index {}", index);
            if let Ok(id) = self.backward.insert_node(None, q, index) {
                self.goal_nodes.push(Some(id));
                self.valid_goals += 1;
            }
        }
        self.core.ingest_initial();
    }

    /// Picks a goal no candidate path has claimed yet, rejection-sampling up
    /// to three times the number of goals.
    fn choose_goal(&mut self) -> Option<Vec<f64>> {
        let n = self.goal_nodes.len();
        for _ in 0..3 * n {
            let index = self.core.ctx.sampler.sample_u32() as usize % n;
            let node = match self.goal_nodes[index] {
                Some(node) => node,
                None => continue,
            };
            if self.goal_paths.iter().any(|p| p.goal_index == index) {
                continue;
            }
            return Some(self.backward.get_vector_config(node));
        }
        None
    }

    fn choose_target(&mut self, sample_goal: &mut bool) -> Option<Vec<f64>> {
        if (*sample_goal || self.core.ctx.sampler.sample_real() < self.goal_bias)
            && self.valid_goals > 0
        {
            *sample_goal = false;
            if let Some(q) = self.choose_goal() {
                return Some(q);
            }
        }
        self.core.ctx.sampler.sample_config()
    }

    /// Extends tree A toward `target`, then tree B toward whatever A reached
    fn extend_trees(&mut self, forward_is_a: bool, target: &[f64]) -> RoundResult {
        let space = &*self.core.ctx.space;
        let checker = &mut *self.core.ctx.checker;
        let (tree_a, tree_b) = if forward_is_a {
            (&mut self.core.forward, &mut self.backward)
        } else {
            (&mut self.backward, &mut self.core.forward)
        };

        let reached_a = match tree_a.extend(target, space, checker, false).node() {
            Some(id) => id,
            None => return RoundResult::Stalled,
        };
        let q = tree_a.get_vector_config(reached_a);

        match tree_b.extend(&q, space, checker, false) {
            ExtendResult::Connected(reached_b) if forward_is_a => RoundResult::Connected {
                forward: reached_a,
                backward: reached_b,
            },
            ExtendResult::Connected(reached_b) => RoundResult::Connected {
                forward: reached_b,
                backward: reached_a,
            },
            _ => RoundResult::Extended,
        }
    }

    fn grow(&mut self) -> GrowOutcome {
        self.ticks = 0;
        self.goal_paths.clear();
        let max_ticks = TICKS_PER_ROUND * self.core.params.max_iterations;
        let minimum_goal_paths = self.core.params.minimum_goal_paths;
        let mut forward_is_a = true;
        let mut sample_goal = true;

        while self.goal_paths.len() < minimum_goal_paths && self.ticks < max_ticks {
            self.ticks += TICKS_PER_ROUND;
            trace!(
                "iter={}, forward={}, backward={}",
                self.ticks / TICKS_PER_ROUND,
                self.core.forward.num_nodes(),
                self.backward.num_nodes()
            );

            self.ingest_samples();

            let round = match self.choose_target(&mut sample_goal) {
                Some(target) => self.extend_trees(forward_is_a, &target),
                None => RoundResult::Stalled,
            };

            match round {
                RoundResult::Stalled => {}
                RoundResult::Extended => forward_is_a = !forward_is_a,
                RoundResult::Connected { forward, backward } => {
                    let goal_path = self.extract_path(forward, backward);
                    debug!(
                        "found a goal, start index={} goal index={}, path length={}, values=[{}]",
                        goal_path.start_index,
                        goal_path.goal_index,
                        goal_path.length,
                        goal_path.waypoints.last().map_or(String::new(), |q| q.iter().join(", "))
                    );
                    let goal_index = goal_path.goal_index;
                    self.goal_paths.push(goal_path);
                    if self.goal_paths.len() >= minimum_goal_paths
                        || self.goal_paths.len() >= self.valid_goals
                    {
                        break;
                    }

                    // more goals requested, retire everything hanging off this one
                    sample_goal = true;
                    if let Some(Some(root)) = self.goal_nodes.get(goal_index) {
                        self.backward.invalidate_nodes_with_parent(*root);
                    }
                    forward_is_a = !forward_is_a;
                }
            }

            match self.core.ctx.call_progress(self.ticks / TICKS_PER_ROUND) {
                PlannerAction::Interrupt => return GrowOutcome::Interrupted,
                PlannerAction::ReturnWithAnySolution if !self.goal_paths.is_empty() => break,
                _ => {}
            }
        }

        if self.goal_paths.is_empty() && self.ticks >= max_ticks {
            warn!("iterations exceeded");
        }
        GrowOutcome::Finished
    }

    /// Joins the forward chain (root first) with the backward chain (goal
    /// root last), shortcuts it and measures it.
    fn extract_path(&mut self, forward: NodeId, backward: NodeId) -> GoalPath {
        let start_index = self.core.forward.node(self.core.forward.root_of(forward)).tag;
        let goal_index = self.backward.node(self.backward.root_of(backward)).tag;

        let mut waypoints = self.core.forward_chain(forward);
        waypoints.extend(
            self.backward
                .path_to_root(backward)
                .into_iter()
                .map(|n| self.backward.get_vector_config(n)),
        );
        waypoints.dedup();

        let iterations = self.core.params.shortcut_iterations;
        self.core.simple_optimize_path(&mut waypoints, iterations);
        let length = self.path_length(&waypoints);

        GoalPath {
            waypoints,
            start_index,
            goal_index,
            length,
        }
    }

    /// Velocity-scaled distance between the first and last waypoint only;
    /// tree paths are often needlessly tortuous near their ends.
    fn path_length(&self, waypoints: &[Vec<f64>]) -> f64 {
        let (first, last) = match (waypoints.first(), waypoints.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0.0,
        };
        let space = &*self.core.ctx.space;
        let velocity_limits = space.velocity_limits();
        space
            .difference(first, last)
            .iter()
            .enumerate()
            .map(|(i, d)| {
                let weight = match velocity_limits.get(i) {
                    Some(&v) if v != 0.0 => 1.0 / v,
                    _ => 1.0,
                };
                d.abs() * weight
            })
            .sum()
    }
}

/// Bi-directional RRT planner
#[derive(Default)]
pub struct BiRrtPlanner {
    session: Option<BiRrtSession>,
    start_index: Option<usize>,
    goal_index: Option<usize>,
}

impl BiRrtPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Goal index of the last returned path
    pub fn goal_index(&self) -> Option<usize> {
        self.goal_index
    }

    /// Start index of the last returned path
    pub fn start_index(&self) -> Option<usize> {
        self.start_index
    }

    /// Ticks consumed by the last `plan_path` call
    pub fn ticks(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.ticks)
    }

    /// Every candidate collected by the last `plan_path` call
    pub fn goal_paths(&self) -> &[GoalPath] {
        self.session.as_ref().map_or(&[][..], |s| s.goal_paths.as_slice())
    }

    pub fn forward_tree(&self) -> Option<&SpatialTree> {
        self.session.as_ref().map(|s| &s.core.forward)
    }

    pub fn backward_tree(&self) -> Option<&SpatialTree> {
        self.session.as_ref().map(|s| &s.backward)
    }

    /// Writes the forward tree, then the backward tree, to `path`
    pub fn dump_tree<P: AsRef<Path>>(&self, path: P) -> PlanningResult<()> {
        let session = self.session.as_ref().ok_or(PlanningError::NotInitialized)?;
        debug!("dumping rrt tree to {}", path.as_ref().display());
        let mut out = BufWriter::new(File::create(path)?);
        session.core.forward.dump_tree(&mut out)?;
        session.backward.dump_tree(&mut out)?;
        out.flush()?;
        Ok(())
    }
}

impl MotionPlanner for BiRrtPlanner {
    fn init_plan(&mut self, params: RrtParameters, context: PlanningContext) -> PlanningResult<()> {
        self.session = None;
        self.start_index = None;
        self.goal_index = None;

        let lock = context.environment.clone();
        let _guard = lock.as_ref().map(|l| l.acquire());
        self.session = Some(BiRrtSession::new(params, context)?);
        Ok(())
    }

    fn plan_path(&mut self, trajectory: &mut Trajectory) -> PlanningResult<PlannerStatus> {
        self.start_index = None;
        self.goal_index = None;
        let session = self.session.as_mut().ok_or(PlanningError::NotInitialized)?;

        let lock = session.core.ctx.environment.clone();
        let _guard = lock.as_ref().map(|l| l.acquire());
        let started = Instant::now();

        if let GrowOutcome::Interrupted = session.grow() {
            debug!("plan interrupted after {} ticks", session.ticks);
            return Ok(PlannerStatus::Interrupted);
        }

        let best = match session.goal_paths.iter().min_by_key(|p| OrderedFloat(p.length)) {
            Some(best) => best,
            None => {
                warn!("plan failed, {:.3}s", started.elapsed().as_secs_f64());
                return Ok(PlannerStatus::Failed);
            }
        };

        self.goal_index = Some(best.goal_index);
        self.start_index = Some(best.start_index);
        session.core.write_trajectory(trajectory, best.waypoints.iter().cloned())?;
        debug!(
            "plan success, iters={}, path={} points, computation time={:.3}s",
            session.ticks / TICKS_PER_ROUND,
            trajectory.num_waypoints(),
            started.elapsed().as_secs_f64()
        );
        Ok(PlannerStatus::HasSolution)
    }

    fn parameters(&self) -> Option<&RrtParameters> {
        self.session.as_ref().map(|s| &s.core.params)
    }
}
