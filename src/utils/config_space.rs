//! Box-bounded configuration space with optional wrap-around dimensions

use nalgebra::DVector;

use crate::common::ConfigurationSpace;

/// Configuration space bounded by per-DOF limits.
///
/// Distance is the weighted Euclidean norm of the difference. Circular
/// dimensions have period `upper - lower` and always take the short way round.
#[derive(Debug, Clone)]
pub struct BoxSpace {
    lower: Vec<f64>,
    upper: Vec<f64>,
    weights: DVector<f64>,
    circular: Vec<bool>,
    velocity_limits: Vec<f64>,
}

impl BoxSpace {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        assert_eq!(lower.len(), upper.len());
        let dof = lower.len();
        BoxSpace {
            lower,
            upper,
            weights: DVector::from_element(dof, 1.0),
            circular: vec![false; dof],
            velocity_limits: Vec::new(),
        }
    }

    /// Marks one dimension as wrapping around
    pub fn with_circular(mut self, dim: usize) -> Self {
        self.circular[dim] = true;
        self
    }

    pub fn with_weights(mut self, weights: Vec<f64>) -> Self {
        assert_eq!(weights.len(), self.lower.len());
        self.weights = DVector::from_vec(weights);
        self
    }

    pub fn with_velocity_limits(mut self, limits: Vec<f64>) -> Self {
        assert_eq!(limits.len(), self.lower.len());
        self.velocity_limits = limits;
        self
    }

    pub fn is_circular(&self, dim: usize) -> bool {
        self.circular[dim]
    }

    fn period(&self, dim: usize) -> f64 {
        self.upper[dim] - self.lower[dim]
    }

    fn wrap_delta(&self, dim: usize, delta: f64) -> f64 {
        let period = self.period(dim);
        let half = 0.5 * period;
        (delta + half).rem_euclid(period) - half
    }
}

impl ConfigurationSpace for BoxSpace {
    fn dof(&self) -> usize {
        self.lower.len()
    }

    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        let diff = DVector::from_vec(self.difference(a, b));
        diff.component_mul(&self.weights).norm()
    }

    fn difference(&self, a: &[f64], b: &[f64]) -> Vec<f64> {
        a.iter()
            .zip(b)
            .enumerate()
            .map(|(i, (x, y))| {
                if self.circular[i] {
                    self.wrap_delta(i, x - y)
                } else {
                    x - y
                }
            })
            .collect()
    }

    fn integrate(&self, q: &[f64], delta: &[f64]) -> Vec<f64> {
        q.iter()
            .zip(delta)
            .enumerate()
            .map(|(i, (x, d))| {
                if self.circular[i] {
                    self.lower[i] + (x + d - self.lower[i]).rem_euclid(self.period(i))
                } else {
                    x + d
                }
            })
            .collect()
    }

    fn lower_limits(&self) -> &[f64] {
        &self.lower
    }

    fn upper_limits(&self) -> &[f64] {
        &self.upper
    }

    fn velocity_limits(&self) -> &[f64] {
        &self.velocity_limits
    }
}
