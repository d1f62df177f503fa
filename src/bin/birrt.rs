// Bi-directional RRT path planning around circular obstacles
//
// Run with RUST_LOG=debug to follow tree growth. Writes the trees to
// birrt_tree.txt and plots them to birrt.svg with gnuplot.

use log::info;

use rrt_planners::utils::{quick_plot_trees, BoxSpace, InterpolatingChecker, UniformSampler};
use rrt_planners::{
    BiRrtPlanner, MotionPlanner, PlanningContext, PlanningResult, RrtParameters, Trajectory,
};

const OBSTACLES: [(f64, f64, f64); 6] = [
    (5.0, 5.0, 1.0),
    (3.0, 6.0, 2.0),
    (3.0, 8.0, 2.0),
    (3.0, 10.0, 2.0),
    (7.0, 5.0, 2.0),
    (9.0, 5.0, 2.0),
];

const PARAMETERS: &str = r#"
step_length = 0.5
max_iterations = 2000
random_seed = 7
minimum_goal_paths = 2
shortcut_iterations = 50
initial_config = [0.0, 0.0]
goal_config = [6.0, 10.0, 12.0, 2.0]
"#;

fn collision_free(q: &[f64]) -> bool {
    OBSTACLES
        .iter()
        .all(|&(ox, oy, size)| (q[0] - ox).powi(2) + (q[1] - oy).powi(2) > size * size)
}

fn main() -> PlanningResult<()> {
    env_logger::init();

    let params = RrtParameters::from_toml_str(PARAMETERS)?;
    let space = BoxSpace::new(vec![-2.0, -2.0], vec![15.0, 15.0]);
    let sampler = UniformSampler::for_space(&space);
    let context = PlanningContext::new(
        Box::new(space),
        Box::new(InterpolatingChecker::new(0.05, collision_free)),
        Box::new(sampler),
    );

    let mut planner = BiRrtPlanner::new();
    planner.init_plan(params, context)?;

    let mut trajectory = Trajectory::new();
    let status = planner.plan_path(&mut trajectory)?;
    info!(
        "status={:?}, goal index={:?}, candidates={}, waypoints={}",
        status,
        planner.goal_index(),
        planner.goal_paths().len(),
        trajectory.num_waypoints()
    );

    planner.dump_tree("birrt_tree.txt")?;

    let trees: Vec<_> = planner
        .forward_tree()
        .into_iter()
        .chain(planner.backward_tree())
        .collect();
    let mut vis = quick_plot_trees(&trees, trajectory.waypoints(), "BiRRT");
    vis.set_range(-2.0, 15.0);
    if let Err(e) = vis.save_svg("birrt.svg") {
        eprintln!("saving plot failed: {}", e);
    }
    if let Err(e) = vis.show() {
        eprintln!("plot failed: {}", e);
    }
    Ok(())
}
