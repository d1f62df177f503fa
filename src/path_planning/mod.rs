//! RRT path planning algorithms
//!
//! The planners share [`RrtCore`] for initialization and shortcutting and
//! grow [`SpatialTree`]s through the same extension routine.

pub mod parameters;
pub mod spatial_tree;
pub mod rrt_base;
pub mod birrt;
pub mod basic_rrt;
pub mod exploration;

pub use parameters::*;
pub use spatial_tree::*;
pub use rrt_base::*;
pub use birrt::*;
pub use basic_rrt::*;
pub use exploration::*;
