//! Default collaborators and utilities for rrt_planners

pub mod checker;
pub mod config_space;
pub mod sampler;
pub mod visualization;

pub use checker::*;
pub use config_space::*;
pub use sampler::*;
pub use visualization::{Visualizer, PathStyle, PointStyle, colors, quick_plot_trees};
