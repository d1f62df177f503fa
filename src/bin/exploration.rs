// Tree exploration of a free-space box with neighbour sampling

use log::info;

use rrt_planners::utils::{
    gaussian_neighbor_sampler, quick_plot_trees, BoxSpace, InterpolatingChecker, UniformSampler,
};
use rrt_planners::{
    ExplorationPlanner, MotionPlanner, PlanningContext, PlanningResult, RrtParameters, Trajectory,
};

fn main() -> PlanningResult<()> {
    env_logger::init();

    let params = RrtParameters {
        step_length: 0.5,
        max_iterations: 5000,
        random_seed: 3,
        initial_config: vec![5.0, 5.0],
        explore_prob: 0.3,
        expected_size: 300,
        ..Default::default()
    };
    let space = BoxSpace::new(vec![0.0, 0.0], vec![10.0, 10.0]);
    let sampler = UniformSampler::for_space(&space);
    // a wall with a gap at the top
    let checker =
        InterpolatingChecker::new(0.05, |q: &[f64]| !(q[0] > 6.0 && q[0] < 7.0 && q[1] < 8.0));
    let context = PlanningContext::new(Box::new(space), Box::new(checker), Box::new(sampler))
        .with_neighbor_sampler(gaussian_neighbor_sampler(3));

    let mut planner = ExplorationPlanner::new();
    planner.init_plan(params, context)?;

    let mut coverage = Trajectory::new();
    let status = planner.plan_path(&mut coverage)?;
    info!(
        "status={:?}, nodes={}, iterations={}",
        status,
        coverage.num_waypoints(),
        planner.iterations()
    );

    let trees: Vec<_> = planner.forward_tree().into_iter().collect();
    let mut vis = quick_plot_trees(&trees, &[], "Exploration");
    vis.set_range(0.0, 10.0);
    if let Err(e) = vis.save_svg("exploration.svg") {
        eprintln!("saving plot failed: {}", e);
    }
    if let Err(e) = vis.show() {
        eprintln!("plot failed: {}", e);
    }
    Ok(())
}
