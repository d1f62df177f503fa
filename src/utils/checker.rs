//! Constraint checker built from a point-validity predicate

use crate::common::{
    CheckOptions, ConfigurationSpace, ConstraintChecker, ConstraintViolation, IntervalType,
    SegmentQuery,
};

/// Checks segments by linear interpolation at a fixed resolution and
/// evaluating a predicate at every interpolated configuration.
///
/// Without a space, interpolation is in raw coordinates. With one, each
/// interpolant is `integrate(q0, t * difference(q1, q0))`, so circular
/// dimensions are crossed the short way round, as `SpatialTree::extend` does.
pub struct InterpolatingChecker<F> {
    resolution: f64,
    predicate: F,
    space: Option<Box<dyn ConfigurationSpace>>,
    num_checks: usize,
}

impl<F> InterpolatingChecker<F>
where
    F: FnMut(&[f64]) -> bool,
{
    pub fn new(resolution: f64, predicate: F) -> Self {
        assert!(resolution > 0.0);
        InterpolatingChecker {
            resolution,
            predicate,
            space: None,
            num_checks: 0,
        }
    }

    /// Interpolates along the topology of `space`
    pub fn with_space(mut self, space: impl ConfigurationSpace + 'static) -> Self {
        self.space = Some(Box::new(space));
        self
    }

    /// Number of segment queries answered so far
    pub fn num_checks(&self) -> usize {
        self.num_checks
    }
}

impl<F> ConstraintChecker for InterpolatingChecker<F>
where
    F: FnMut(&[f64]) -> bool,
{
    fn check(
        &mut self,
        query: &SegmentQuery<'_>,
        mut filled: Option<&mut Vec<Vec<f64>>>,
    ) -> Result<(), ConstraintViolation> {
        self.num_checks += 1;
        let delta: Vec<f64> = match self.space.as_ref() {
            Some(space) => space.difference(query.q1, query.q0),
            None => query.q0.iter().zip(query.q1).map(|(a, b)| b - a).collect(),
        };
        let max_delta = delta.iter().map(|d| d.abs()).fold(0.0, f64::max);
        let n = ((max_delta / self.resolution).ceil() as usize).max(1);

        let (first, last) = match query.interval {
            IntervalType::Open => (1, n - 1),
            IntervalType::OpenStart => (1, n),
            IntervalType::OpenEnd => (0, n - 1),
            IntervalType::Closed => (0, n),
        };
        let fill = query.options.contains(CheckOptions::FILL_CHECKED);

        for i in first..=last {
            let q: Vec<f64> = if i == n {
                query.q1.to_vec()
            } else {
                let t = i as f64 / n as f64;
                let step: Vec<f64> = delta.iter().map(|d| t * d).collect();
                match self.space.as_ref() {
                    Some(space) => space.integrate(query.q0, &step),
                    None => query.q0.iter().zip(&step).map(|(a, d)| a + d).collect(),
                }
            };
            if !(self.predicate)(&q) {
                return Err(ConstraintViolation::new(1));
            }
            if fill && i > 0 && i < n {
                if let Some(out) = filled.as_mut() {
                    out.push(q);
                }
            }
        }
        Ok(())
    }
}
