//! Visualization utilities for rrt_planners
//!
//! Plots the first two DOFs of trees and paths using gnuplot.

use gnuplot::{AutoOption, AxesCommon, Caption, Color, Figure, LineWidth, PointSize, PointSymbol};

use crate::path_planning::SpatialTree;

/// Colors for trees, paths and endpoints
pub mod colors {
    pub const START: &str = "#00FF00";
    pub const GOAL: &str = "#0000FF";
    pub const PATH: &str = "#FF0000";
    /// One per tree, cycled
    pub const TREES: [&str; 3] = ["#808080", "#FFA500", "#800080"];
}

/// Style for path and tree edges
#[derive(Debug, Clone)]
pub struct PathStyle {
    pub color: String,
    pub line_width: f64,
    pub caption: String,
}

impl PathStyle {
    pub fn new(color: &str, caption: &str) -> Self {
        Self {
            color: color.to_string(),
            line_width: 2.0,
            caption: caption.to_string(),
        }
    }

    pub fn with_line_width(mut self, width: f64) -> Self {
        self.line_width = width;
        self
    }
}

impl Default for PathStyle {
    fn default() -> Self {
        Self::new(colors::PATH, "Path")
    }
}

/// Style for single configurations
#[derive(Debug, Clone)]
pub struct PointStyle {
    pub color: String,
    pub size: f64,
    pub caption: String,
}

impl PointStyle {
    pub fn new(color: &str, caption: &str) -> Self {
        Self {
            color: color.to_string(),
            size: 1.0,
            caption: caption.to_string(),
        }
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }
}

/// Accumulates plots on one figure with square axes labelled q0 and q1
pub struct Visualizer {
    figure: Figure,
    title: String,
    range: Option<(f64, f64)>,
}

impl Visualizer {
    pub fn new() -> Self {
        Self {
            figure: Figure::new(),
            title: String::new(),
            range: None,
        }
    }

    pub fn set_title(&mut self, title: &str) -> &mut Self {
        self.title = title.to_string();
        self
    }

    /// Fix both axes to `[min, max]`
    pub fn set_range(&mut self, min: f64, max: f64) -> &mut Self {
        self.range = Some((min, max));
        self
    }

    pub fn plot_path(&mut self, path: &[Vec<f64>], style: &PathStyle) -> &mut Self {
        let (x, y) = project(path.iter().map(|q| q.as_slice()));
        self.figure.axes2d().lines(
            &x,
            &y,
            &[
                Caption(&style.caption),
                Color(&style.color),
                LineWidth(style.line_width),
            ],
        );
        self
    }

    /// Plot every parent/child edge between valid nodes
    pub fn plot_tree(&mut self, tree: &SpatialTree, style: &PathStyle) -> &mut Self {
        let axes = self.figure.axes2d();
        for id in tree.get_nodes_vector() {
            if let Some(parent) = tree.node(id).parent {
                let (x, y) = project([tree.config(parent), tree.config(id)].iter().copied());
                axes.lines(&x, &y, &[Color(&style.color), LineWidth(style.line_width)]);
            }
        }
        self
    }

    pub fn plot_point(&mut self, q: &[f64], style: &PointStyle) -> &mut Self {
        let (x, y) = project(std::iter::once(q));
        self.figure.axes2d().points(
            &x,
            &y,
            &[
                Caption(&style.caption),
                Color(&style.color),
                PointSymbol('O'),
                PointSize(style.size),
            ],
        );
        self
    }

    pub fn show(&mut self) -> Result<(), String> {
        self.apply_settings();
        self.figure.show().map_err(|e| e.to_string()).map(|_| ())
    }

    pub fn save_svg(&mut self, path: &str) -> Result<(), String> {
        self.apply_settings();
        self.figure
            .save_to_svg(path, 800, 600)
            .map_err(|e| e.to_string())
    }

    fn apply_settings(&mut self) {
        let axes = self.figure.axes2d();
        if !self.title.is_empty() {
            axes.set_title(&self.title, &[]);
        }
        axes.set_x_label("q0", &[]);
        axes.set_y_label("q1", &[]);
        if let Some((min, max)) = self.range {
            axes.set_x_range(AutoOption::Fix(min), AutoOption::Fix(max));
            axes.set_y_range(AutoOption::Fix(min), AutoOption::Fix(max));
        }
        axes.set_aspect_ratio(AutoOption::Fix(1.0));
    }
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits configurations into x and y coordinate vectors (DOF 0 and 1)
fn project<'a, I>(configs: I) -> (Vec<f64>, Vec<f64>)
where
    I: IntoIterator<Item = &'a [f64]>,
{
    configs
        .into_iter()
        .map(|q| (q.first().copied().unwrap_or(0.0), q.get(1).copied().unwrap_or(0.0)))
        .unzip()
}

/// Trees, start and goal markers and the path on one figure
pub fn quick_plot_trees(trees: &[&SpatialTree], path: &[Vec<f64>], title: &str) -> Visualizer {
    let mut vis = Visualizer::new();
    vis.set_title(title);

    for (tree, color) in trees.iter().zip(colors::TREES.iter().cycle()) {
        vis.plot_tree(tree, &PathStyle::new(color, "").with_line_width(0.5));
    }
    if let (Some(first), Some(last)) = (path.first(), path.last()) {
        vis.plot_point(first, &PointStyle::new(colors::START, "Start").with_size(1.5));
        vis.plot_point(last, &PointStyle::new(colors::GOAL, "Goal").with_size(1.5));
        vis.plot_path(path, &PathStyle::default());
    }
    vis
}
