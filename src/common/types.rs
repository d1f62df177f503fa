//! Common types used throughout rrt_planners

use std::ops::BitOr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use serde::{Deserialize, Serialize};

use crate::common::error::{PlanningError, PlanningResult};

/// Description of one degree of freedom in the output layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DofDescriptor {
    pub name: String,
    pub unit: String,
}

impl DofDescriptor {
    pub fn new(name: &str, unit: &str) -> Self {
        Self {
            name: name.to_string(),
            unit: unit.to_string(),
        }
    }
}

/// Per-DOF ordering and units of the configurations a planner emits
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfigurationSpecification {
    pub dofs: Vec<DofDescriptor>,
}

impl ConfigurationSpecification {
    pub fn new(dofs: Vec<DofDescriptor>) -> Self {
        Self { dofs }
    }

    /// Layout with `dof` joints named `j0..jN` in the given unit
    pub fn uniform(dof: usize, unit: &str) -> Self {
        let dofs = (0..dof)
            .map(|i| DofDescriptor::new(&format!("j{}", i), unit))
            .collect();
        Self { dofs }
    }

    pub fn dof(&self) -> usize {
        self.dofs.len()
    }
}

/// Caller-owned container the planners append waypoints to
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    specification: ConfigurationSpecification,
    waypoints: Vec<Vec<f64>>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the trajectory to an empty one with the given layout
    pub fn init(&mut self, specification: ConfigurationSpecification) {
        self.specification = specification;
        self.waypoints.clear();
    }

    pub fn specification(&self) -> &ConfigurationSpecification {
        &self.specification
    }

    /// Appends waypoints at the end. Every waypoint must match the layout's DOF.
    pub fn insert<I>(&mut self, waypoints: I) -> PlanningResult<()>
    where
        I: IntoIterator<Item = Vec<f64>>,
    {
        let dof = self.specification.dof();
        for q in waypoints {
            if q.len() != dof {
                return Err(PlanningError::DimensionMismatch {
                    expected: dof,
                    actual: q.len(),
                });
            }
            self.waypoints.push(q);
        }
        Ok(())
    }

    pub fn num_waypoints(&self) -> usize {
        self.waypoints.len()
    }

    pub fn waypoints(&self) -> &[Vec<f64>] {
        &self.waypoints
    }

    pub fn waypoint(&self, index: usize) -> Option<&[f64]> {
        self.waypoints.get(index).map(|q| q.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }
}

/// Result of a planning call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerStatus {
    HasSolution,
    /// Budget exhausted without a solution
    Failed,
    /// Aborted by the progress callback
    Interrupted,
}

impl PlannerStatus {
    pub fn has_solution(&self) -> bool {
        *self == PlannerStatus::HasSolution
    }
}

/// What the progress callback asks the planner to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerAction {
    Continue,
    Interrupt,
    ReturnWithAnySolution,
}

/// Snapshot handed to the progress callback once per outer iteration
#[derive(Debug, Clone, Copy, Default)]
pub struct PlannerProgress {
    pub iteration: usize,
}

/// Which endpoints of a segment the oracle must check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalType {
    /// Neither endpoint
    Open,
    /// Everything but the first configuration
    OpenStart,
    /// Everything but the last configuration
    OpenEnd,
    /// Both endpoints
    Closed,
}

/// Option flags passed to the oracle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckOptions(u32);

impl CheckOptions {
    /// Check every constraint category
    pub const ALL: CheckOptions = CheckOptions(0xffff);
    /// Report the intermediate configurations that were actually checked
    pub const FILL_CHECKED: CheckOptions = CheckOptions(0x10000);

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, other: CheckOptions) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for CheckOptions {
    type Output = CheckOptions;

    fn bitor(self, rhs: CheckOptions) -> CheckOptions {
        CheckOptions(self.0 | rhs.0)
    }
}

/// A segment (or a single point when `q0 == q1`) to validate
#[derive(Debug, Clone, Copy)]
pub struct SegmentQuery<'a> {
    pub q0: &'a [f64],
    pub q1: &'a [f64],
    /// Velocities at the endpoints, empty when unused
    pub dq0: &'a [f64],
    pub dq1: &'a [f64],
    pub time_elapsed: f64,
    pub interval: IntervalType,
    pub options: CheckOptions,
}

impl<'a> SegmentQuery<'a> {
    pub fn new(q0: &'a [f64], q1: &'a [f64], interval: IntervalType) -> Self {
        Self {
            q0,
            q1,
            dq0: &[],
            dq1: &[],
            time_elapsed: 0.0,
            interval,
            options: CheckOptions::ALL,
        }
    }

    /// Query for a single configuration in isolation
    pub fn point(q: &'a [f64]) -> Self {
        Self::new(q, q, IntervalType::OpenStart)
    }

    pub fn with_options(mut self, options: CheckOptions) -> Self {
        self.options = options;
        self
    }
}

/// Non-zero oracle answer: the segment is infeasible
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstraintViolation {
    pub code: u32,
}

impl ConstraintViolation {
    pub fn new(code: u32) -> Self {
        Self { code }
    }
}

/// Exclusive lock on the simulation state the oracle touches.
///
/// Clones share the same lock, so every planner built over one environment
/// serializes its sessions against the others.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentLock(Arc<Mutex<()>>);

impl EnvironmentLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the lock is held. A panic in a previous holder does not
    /// keep the environment locked.
    pub fn acquire(&self) -> MutexGuard<'_, ()> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True while some session holds the lock. A poisoned but released lock is free.
    pub fn is_locked(&self) -> bool {
        matches!(self.0.try_lock(), Err(TryLockError::WouldBlock))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trajectory_rejects_wrong_dof() {
        let mut traj = Trajectory::new();
        traj.init(ConfigurationSpecification::uniform(2, "rad"));
        assert!(traj.insert(vec![vec![0.0, 1.0]]).is_ok());
        assert!(matches!(
            traj.insert(vec![vec![0.0]]),
            Err(PlanningError::DimensionMismatch { expected: 2, actual: 1 })
        ));
        assert_eq!(traj.num_waypoints(), 1);
    }

    #[test]
    fn test_check_options_flags() {
        let opts = CheckOptions::ALL | CheckOptions::FILL_CHECKED;
        assert!(opts.contains(CheckOptions::FILL_CHECKED));
        assert!(!CheckOptions::ALL.contains(CheckOptions::FILL_CHECKED));
    }

    #[test]
    fn test_environment_lock_released_on_drop() {
        let lock = EnvironmentLock::new();
        {
            let _guard = lock.acquire();
            assert!(lock.is_locked());
        }
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_environment_lock_free_after_panicking_holder() {
        let lock = EnvironmentLock::new();
        let shared = lock.clone();
        let result = std::panic::catch_unwind(move || {
            let _guard = shared.acquire();
            panic!("holder failed");
        });
        assert!(result.is_err());
        assert!(!lock.is_locked());
        let _guard = lock.acquire();
        assert!(lock.is_locked());
    }
}
