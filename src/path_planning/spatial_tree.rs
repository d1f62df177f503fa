//! Spatial tree shared by the RRT planners
//!
//! Nodes live in an arena addressed by stable index. Every node stores the
//! index of its parent, which always refers to an older node, so walking the
//! parents from any node reaches a root in at most `num_nodes()` hops.
//! Invalidated nodes stay in the arena and are skipped by every query.

use std::io::Write;

use itertools::Itertools;
use log::trace;
use ordered_float::OrderedFloat;

use crate::common::{
    ConfigurationSpace, ConstraintChecker, IntervalType, PlanningError, PlanningResult,
    SegmentQuery,
};

/// Stable index of a node inside its tree
pub type NodeId = usize;

/// Relative tolerance, in units of step length, under which an extension
/// counts as having reached its target.
pub const CONNECT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct TreeNode {
    pub config: Vec<f64>,
    pub parent: Option<NodeId>,
    /// Start/goal index for roots, 0 otherwise
    pub tag: usize,
    valid: bool,
}

impl TreeNode {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

/// Outcome of [`SpatialTree::extend`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendResult {
    /// Not a single sub-step was accepted
    Failed,
    /// Moved toward the target and stopped at the given node
    Advanced(NodeId),
    /// The given node sits on the target
    Connected(NodeId),
}

impl ExtendResult {
    pub fn node(&self) -> Option<NodeId> {
        match *self {
            ExtendResult::Failed => None,
            ExtendResult::Advanced(id) | ExtendResult::Connected(id) => Some(id),
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ExtendResult::Connected(_))
    }
}

/// Rooted forest of configurations grown by step-bounded extension
#[derive(Debug, Clone)]
pub struct SpatialTree {
    dof: usize,
    step_length: f64,
    max_distance: f64,
    nodes: Vec<TreeNode>,
}

impl SpatialTree {
    /// `max_distance` is the extent of the space under the metric.
    pub fn new(dof: usize, step_length: f64, max_distance: f64) -> Self {
        SpatialTree {
            dof,
            step_length,
            max_distance,
            nodes: Vec::new(),
        }
    }

    pub fn dof(&self) -> usize {
        self.dof
    }

    pub fn step_length(&self) -> f64 {
        self.step_length
    }

    pub fn max_distance(&self) -> f64 {
        self.max_distance
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Appends a node. Pass `None` as parent to add a root.
    pub fn insert_node(
        &mut self,
        parent: Option<NodeId>,
        config: Vec<f64>,
        tag: usize,
    ) -> PlanningResult<NodeId> {
        if config.len() != self.dof {
            return Err(PlanningError::DimensionMismatch {
                expected: self.dof,
                actual: config.len(),
            });
        }
        if let Some(p) = parent {
            if p >= self.nodes.len() {
                return Err(PlanningError::InvalidParameter(format!(
                    "parent {} does not exist",
                    p
                )));
            }
        }
        Ok(self.push_node(parent, config, tag))
    }

    fn push_node(&mut self, parent: Option<NodeId>, config: Vec<f64>, tag: usize) -> NodeId {
        self.nodes.push(TreeNode {
            config,
            parent,
            tag,
            valid: true,
        });
        self.nodes.len() - 1
    }

    /// Nearest valid node to `target` under the metric
    pub fn nearest(&self, target: &[f64], space: &dyn ConfigurationSpace) -> Option<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.valid)
            .map(|(i, node)| (i, space.distance(&node.config, target)))
            .min_by_key(|&(_, d)| OrderedFloat(d))
            .map(|(i, _)| i)
    }

    /// Grows the tree from its nearest node toward `target` in sub-steps no
    /// longer than the step length, validating each with the oracle.
    ///
    /// With `one_step` only the first accepted sub-step is inserted.
    pub fn extend(
        &mut self,
        target: &[f64],
        space: &dyn ConfigurationSpace,
        checker: &mut dyn ConstraintChecker,
        one_step: bool,
    ) -> ExtendResult {
        if target.len() != self.dof {
            return ExtendResult::Failed;
        }
        let nearest = match self.nearest(target, space) {
            Some(id) => id,
            None => return ExtendResult::Failed,
        };

        let start = self.nodes[nearest].config.clone();
        let dist = space.distance(&start, target);
        let diff = space.difference(target, &start);
        let num_steps = ((dist / self.step_length).ceil() as usize).max(1);

        let mut last = nearest;
        let mut prev = start.clone();
        for k in 1..=num_steps {
            let next = if k == num_steps {
                target.to_vec()
            } else {
                let scale = k as f64 / num_steps as f64;
                let delta: Vec<f64> = diff.iter().map(|d| d * scale).collect();
                space.integrate(&start, &delta)
            };

            if checker
                .check(&SegmentQuery::new(&prev, &next, IntervalType::OpenStart), None)
                .is_err()
            {
                break;
            }

            last = self.push_node(Some(last), next.clone(), 0);
            prev = next;
            if one_step {
                break;
            }
        }

        if last == nearest {
            trace!("extend failed from node {}", nearest);
            return ExtendResult::Failed;
        }
        let gap = space.distance(&self.nodes[last].config, target);
        if gap <= CONNECT_TOLERANCE * self.step_length {
            ExtendResult::Connected(last)
        } else {
            ExtendResult::Advanced(last)
        }
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id]
    }

    pub fn config(&self, id: NodeId) -> &[f64] {
        &self.nodes[id].config
    }

    /// Copy of a node's configuration
    pub fn get_vector_config(&self, id: NodeId) -> Vec<f64> {
        self.nodes[id].config.clone()
    }

    pub fn get_node_from_index(&self, index: usize) -> Option<&TreeNode> {
        self.nodes.get(index)
    }

    /// Indices of all valid nodes, in insertion order
    pub fn get_nodes_vector(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.valid)
            .map(|(i, _)| i)
            .collect()
    }

    /// Number of nodes ever inserted, invalidated ones included
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_valid_nodes(&self) -> usize {
        self.nodes.iter().filter(|node| node.valid).count()
    }

    pub fn is_valid(&self, id: NodeId) -> bool {
        self.nodes.get(id).map_or(false, |node| node.valid)
    }

    /// Node ids from `id` up to and including its root
    pub fn path_to_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = vec![id];
        let mut current = self.nodes[id].parent;
        while let Some(p) = current {
            chain.push(p);
            current = self.nodes[p].parent;
        }
        chain
    }

    pub fn root_of(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(p) = self.nodes[current].parent {
            current = p;
        }
        current
    }

    /// Invalidates `id` and every node descending from it.
    ///
    /// Parents always precede their children, so a single forward pass
    /// starting at `id` reaches every descendant.
    pub fn invalidate_nodes_with_parent(&mut self, id: NodeId) {
        if id >= self.nodes.len() {
            return;
        }
        self.nodes[id].valid = false;
        let mut count = 1;
        for i in id + 1..self.nodes.len() {
            if let Some(p) = self.nodes[i].parent {
                if !self.nodes[p].valid && self.nodes[i].valid {
                    self.nodes[i].valid = false;
                    count += 1;
                }
            }
        }
        trace!("invalidated {} nodes under {}", count, id);
    }

    /// Writes one `<values> <parent>` row per valid node, parent -1 for roots.
    /// Parent indices refer to row numbers within this dump.
    pub fn dump_tree<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        let mut row_of = vec![-1i64; self.nodes.len()];
        let mut row = 0i64;
        for (i, node) in self.nodes.iter().enumerate() {
            if node.valid {
                row_of[i] = row;
                row += 1;
            }
        }

        for node in self.nodes.iter().filter(|node| node.valid) {
            let parent = node.parent.map_or(-1, |p| row_of[p]);
            writeln!(
                out,
                "{} {}",
                node.config.iter().map(|v| format!("{:e}", v)).join(" "),
                parent
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{BoxSpace, InterpolatingChecker};
    use proptest::prelude::*;

    fn free_space() -> BoxSpace {
        BoxSpace::new(vec![-20.0, -20.0], vec![20.0, 20.0])
    }

    fn tree_with_root() -> SpatialTree {
        let mut tree = SpatialTree::new(2, 1.0, 40.0);
        tree.insert_node(None, vec![0.0, 0.0], 0).unwrap();
        tree
    }

    #[test]
    fn test_insert_rejects_wrong_dof() {
        let mut tree = SpatialTree::new(2, 1.0, 10.0);
        assert!(matches!(
            tree.insert_node(None, vec![0.0], 0),
            Err(PlanningError::DimensionMismatch { expected: 2, actual: 1 })
        ));
        assert_eq!(tree.num_nodes(), 0);
    }

    #[test]
    fn test_extend_connects_in_free_space() {
        let space = free_space();
        let mut checker = InterpolatingChecker::new(0.1, |_q: &[f64]| true);
        let mut tree = tree_with_root();

        let result = tree.extend(&[3.0, 4.0], &space, &mut checker, false);
        match result {
            ExtendResult::Connected(id) => {
                assert_eq!(tree.config(id), &[3.0, 4.0]);
                // distance 5 with step 1 => 5 new nodes
                assert_eq!(tree.num_nodes(), 6);
                assert_eq!(tree.path_to_root(id).len(), 6);
            }
            other => panic!("expected connection, got {:?}", other),
        }
    }

    #[test]
    fn test_extend_one_step_advances() {
        let space = free_space();
        let mut checker = InterpolatingChecker::new(0.1, |_q: &[f64]| true);
        let mut tree = tree_with_root();

        let result = tree.extend(&[3.0, 4.0], &space, &mut checker, true);
        let id = match result {
            ExtendResult::Advanced(id) => id,
            other => panic!("expected advance, got {:?}", other),
        };
        assert_eq!(tree.num_nodes(), 2);
        let q = tree.config(id);
        assert!((q[0] - 0.6).abs() < 1e-12 && (q[1] - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_extend_stops_at_obstacle() {
        let space = free_space();
        let mut checker = InterpolatingChecker::new(0.05, |q: &[f64]| q[0] < 2.5);
        let mut tree = tree_with_root();

        let result = tree.extend(&[5.0, 0.0], &space, &mut checker, false);
        let id = result.node().unwrap();
        assert!(!result.is_connected());
        assert_eq!(tree.config(id), &[2.0, 0.0]);
    }

    #[test]
    fn test_extend_fails_when_blocked() {
        let space = free_space();
        let mut checker = InterpolatingChecker::new(0.05, |q: &[f64]| q[0] < 0.5);
        let mut tree = tree_with_root();

        assert_eq!(
            tree.extend(&[5.0, 0.0], &space, &mut checker, false),
            ExtendResult::Failed
        );
        assert_eq!(tree.num_nodes(), 1);
    }

    #[test]
    fn test_extend_wraps_circular_dimension() {
        let pi = std::f64::consts::PI;
        let space = BoxSpace::new(vec![-pi], vec![pi]).with_circular(0);
        let mut checker = InterpolatingChecker::new(0.01, |_q: &[f64]| true);
        let mut tree = SpatialTree::new(1, 0.1, pi);
        tree.insert_node(None, vec![3.0], 0).unwrap();

        let result = tree.extend(&[-3.0], &space, &mut checker, true);
        let id = result.node().unwrap();
        // short way round crosses +pi instead of sweeping through zero
        let q = tree.config(id)[0];
        assert!(q > 3.0 || q < -3.0);
    }

    #[test]
    fn test_extend_connects_across_circular_seam() {
        let pi = std::f64::consts::PI;
        let space = BoxSpace::new(vec![-pi], vec![pi]).with_circular(0);
        // obstacle around zero blocks the long way round
        let mut checker = InterpolatingChecker::new(0.01, |q: &[f64]| q[0].abs() > 2.0)
            .with_space(space.clone());
        let mut tree = SpatialTree::new(1, 0.1, pi);
        tree.insert_node(None, vec![3.0], 0).unwrap();

        let result = tree.extend(&[-3.0], &space, &mut checker, false);
        let id = match result {
            ExtendResult::Connected(id) => id,
            other => panic!("expected connection, got {:?}", other),
        };
        assert_eq!(tree.config(id), &[-3.0]);
        // 2*pi - 6 with step 0.1 => 3 sub-steps
        assert_eq!(tree.num_nodes(), 4);
        assert!(tree.get_nodes_vector().iter().all(|&n| tree.config(n)[0].abs() > 2.0));
    }

    #[test]
    fn test_invalidate_removes_subtree_from_queries() {
        let space = free_space();
        let mut checker = InterpolatingChecker::new(0.1, |_q: &[f64]| true);
        let mut tree = SpatialTree::new(2, 1.0, 40.0);
        let a = tree.insert_node(None, vec![0.0, 0.0], 0).unwrap();
        let b = tree.insert_node(None, vec![10.0, 0.0], 1).unwrap();
        tree.extend(&[10.0, 3.0], &space, &mut checker, false);

        tree.invalidate_nodes_with_parent(b);
        assert_eq!(tree.get_nodes_vector(), vec![a]);
        assert_eq!(tree.nearest(&[10.0, 3.0], &space), Some(a));
        assert!(tree.num_nodes() > tree.num_valid_nodes());
    }

    #[test]
    fn test_dump_tree_format() {
        let mut tree = SpatialTree::new(2, 1.0, 10.0);
        let root = tree.insert_node(None, vec![0.0, 0.0], 0).unwrap();
        let dead = tree.insert_node(None, vec![5.0, 5.0], 1).unwrap();
        tree.insert_node(Some(root), vec![1.0, 0.5], 0).unwrap();
        tree.invalidate_nodes_with_parent(dead);

        let mut out = Vec::new();
        tree.dump_tree(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let rows: Vec<Vec<f64>> = text
            .lines()
            .map(|l| l.split_whitespace().map(|v| v.parse().unwrap()).collect())
            .collect();
        assert_eq!(rows, vec![vec![0.0, 0.0, -1.0], vec![1.0, 0.5, 0.0]]);
    }

    proptest! {
        #[test]
        fn prop_parent_chains_terminate(
            targets in prop::collection::vec((-15.0f64..15.0, -15.0f64..15.0), 1..40)
        ) {
            let space = free_space();
            let mut checker =
                InterpolatingChecker::new(0.2, |q: &[f64]| q[0].abs() > 1.0 || q[1] < 5.0);
            let mut tree = tree_with_root();
            for (x, y) in targets {
                tree.extend(&[x, y], &space, &mut checker, false);
            }
            for id in 0..tree.num_nodes() {
                let chain = tree.path_to_root(id);
                prop_assert!(chain.len() <= tree.num_nodes());
                prop_assert!(tree.node(*chain.last().unwrap()).is_root());
            }
        }

        #[test]
        fn prop_invalidation_closes_over_descendants(
            targets in prop::collection::vec((-15.0f64..15.0, -15.0f64..15.0), 1..30),
            pick in 0usize..1000
        ) {
            let space = free_space();
            let mut checker = InterpolatingChecker::new(0.2, |_q: &[f64]| true);
            let mut tree = tree_with_root();
            for (x, y) in targets {
                tree.extend(&[x, y], &space, &mut checker, true);
            }
            let victim = pick % tree.num_nodes();
            tree.invalidate_nodes_with_parent(victim);
            for id in 0..tree.num_nodes() {
                let through_victim = tree.path_to_root(id).contains(&victim);
                prop_assert_eq!(tree.is_valid(id), !through_victim);
            }
        }
    }
}
