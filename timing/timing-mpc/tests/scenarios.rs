//! End-to-end scenarios for the timing MPC with the built-in solver.

use approx::assert_relative_eq;
use nalgebra::DVector;
use timing_mpc::{PhaseState, SolverStatus, TimingConfig, TimingError, TimingMpc};

fn v(values: &[f64]) -> DVector<f64> {
    DVector::from_row_slice(values)
}

fn unit_line(n: usize) -> Vec<DVector<f64>> {
    (1..=n).map(|i| v(&[i as f64, 0.0])).collect()
}

fn corner() -> Vec<DVector<f64>> {
    vec![v(&[1.0, 0.0]), v(&[1.0, 1.0]), v(&[2.0, 1.0]), v(&[2.0, 2.0])]
}

// =============================================================================
// Plan bookkeeping
// =============================================================================

#[test]
fn uniform_timing_gives_unit_arrival_times() {
    let mpc = TimingMpc::new(unit_line(3), TimingConfig::default()).unwrap();
    assert_eq!(mpc.times(), vec![1.0, 2.0, 3.0]);
    assert_eq!(mpc.waypoints(), unit_line(3));
}

#[test]
fn replacing_waypoints_mid_plan() {
    let mut mpc = TimingMpc::new(unit_line(3), TimingConfig::default()).unwrap();
    mpc.solve(&v(&[0.0, 0.0]), &v(&[0.0, 0.0]), 0).unwrap();

    mpc.update_set_phase(1).unwrap();
    mpc.update_waypoints(vec![v(&[2.0, 1.0]), v(&[3.0, 1.0])], true).unwrap();

    assert_eq!(mpc.len(), 3);
    assert_eq!(mpc.phase(), 1);
    assert!(!mpc.has_warm_start());
    assert_eq!(mpc.waypoints(), vec![v(&[2.0, 1.0]), v(&[3.0, 1.0])]);
    assert!(mpc.vels().iter().all(|v| v.norm() == 0.0));

    let tangents = mpc.tangents();
    assert_relative_eq!(tangents[0].clone().unwrap(), v(&[1.0, 0.0]));
    assert!(tangents[1].is_none());
}

#[test]
fn backtrack_after_replacing_waypoints_keeps_new_durations() {
    let mut mpc = TimingMpc::new(unit_line(3), TimingConfig::default()).unwrap();
    mpc.update_progress_time(1.5).unwrap();
    assert_eq!(mpc.phase(), 1);

    mpc.update_waypoints(vec![v(&[2.0, 1.0]), v(&[4.0, 1.0])], true).unwrap();
    assert_eq!(mpc.durations(), [0.5, 1.0].as_slice());

    assert_eq!(mpc.update_backtrack().unwrap(), 0);
    assert_eq!(mpc.durations(), [1.0, 0.5, 1.0].as_slice());
    assert_eq!(mpc.waypoints()[1], v(&[2.0, 1.0]));
}

#[test]
fn set_phase_to_end_empties_getters() {
    let mut mpc = TimingMpc::new(unit_line(3), TimingConfig::default()).unwrap();
    mpc.update_set_phase(3).unwrap();

    assert!(mpc.done());
    assert_eq!(mpc.phase_state(), PhaseState::Done);
    assert!(mpc.waypoints().is_empty());
    assert!(mpc.times().is_empty());
    assert!(mpc.vels().is_empty());
    assert!(mpc.durations().is_empty());
    assert!(mpc.tangents().is_empty());
}

#[test]
fn backtrack_without_history_fails_cleanly() {
    let mut mpc = TimingMpc::new(unit_line(2), TimingConfig::default()).unwrap();
    let err = mpc.update_backtrack().unwrap_err();
    assert!(matches!(err, TimingError::BacktrackUnderflow));
    assert_eq!(mpc.phase(), 0);
    assert_eq!(mpc.times(), vec![1.0, 2.0]);
}

// =============================================================================
// Solving
// =============================================================================

#[test]
fn solve_improves_on_uniform_timing() {
    let mut mpc = TimingMpc::new(corner(), TimingConfig::default()).unwrap();
    let plan = mpc.solve(&v(&[0.0, 0.0]), &v(&[0.0, 0.0]), 1).unwrap();

    assert!(plan.is_converged() && plan.is_committed());
    assert!(plan.objective < plan.initial_objective);
    assert!(mpc.durations().iter().all(|&t| t >= mpc.config().tau_min));
    assert_eq!(mpc.durations(), plan.durations.as_slice());

    // Path ends at rest
    assert_relative_eq!(mpc.vels()[3].norm(), 0.0);
}

#[test]
fn every_preset_commits_an_improved_plan() {
    for config in [
        TimingConfig::default(),
        TimingConfig::realtime(),
        TimingConfig::high_accuracy(),
    ] {
        let mut mpc = TimingMpc::new(corner(), config).unwrap();
        let plan = mpc.solve(&v(&[0.0, 0.0]), &v(&[0.0, 0.0]), 0).unwrap();

        assert!(plan.is_committed(), "{:?}", plan.status);
        assert!(plan.iterations < config.solver.max_iterations);
        assert!(
            plan.objective < plan.initial_objective,
            "{} !< {}",
            plan.objective,
            plan.initial_objective
        );
        assert_eq!(mpc.durations(), plan.durations.as_slice());
    }
}

#[test]
fn velocities_follow_next_waypoint_tangents() {
    let mut mpc = TimingMpc::new(unit_line(4), TimingConfig::default()).unwrap();
    mpc.solve(&v(&[0.0, 0.0]), &v(&[0.0, 0.0]), 0).unwrap();

    // Interior velocities point along the line
    for vel in &mpc.vels()[..3] {
        assert!(vel[1].abs() < 1e-4, "off-tangent velocity {vel:?}");
        assert!(vel[0] > -1e-4);
    }
}

#[test]
fn higher_time_cost_gives_faster_plan() {
    let cheap = TimingConfig::default().with_costs(0.1, 1.0);
    let dear = TimingConfig::default().with_costs(10.0, 1.0);

    let mut slow = TimingMpc::new(corner(), cheap).unwrap();
    let mut fast = TimingMpc::new(corner(), dear).unwrap();
    let slow_plan = slow.solve(&v(&[0.0, 0.0]), &v(&[0.0, 0.0]), 0).unwrap();
    let fast_plan = fast.solve(&v(&[0.0, 0.0]), &v(&[0.0, 0.0]), 0).unwrap();

    assert!(fast_plan.total_time() < slow_plan.total_time());
}

#[test]
fn second_solve_uses_warm_start() {
    let mut mpc = TimingMpc::new(corner(), TimingConfig::default()).unwrap();
    let first = mpc.solve(&v(&[0.0, 0.0]), &v(&[0.0, 0.0]), 0).unwrap();
    assert!(first.is_committed());
    assert!(!first.used_warm_start);
    assert!(mpc.has_warm_start());

    let second = mpc.solve(&v(&[0.05, 0.0]), &v(&[0.1, 0.0]), 0).unwrap();
    assert!(second.used_warm_start);

    // Advancing past a waypoint changes the horizon
    mpc.update_progress_time(mpc.durations()[0]).unwrap();
    assert!(!mpc.has_warm_start());
    let third = mpc.solve(&v(&[1.0, 0.0]), &v(&[0.0, 0.0]), 0).unwrap();
    assert!(!third.used_warm_start);
}

#[test]
fn fixed_velocities_optimize_durations_only() {
    let config = TimingConfig::default().with_optimize_velocities(false);
    let mut mpc = TimingMpc::new(corner(), config).unwrap();
    let plan = mpc.solve(&v(&[0.0, 0.0]), &v(&[0.0, 0.0]), 0).unwrap();

    assert!(plan.is_converged());
    assert!(plan.velocities.iter().all(|v| v.norm() == 0.0));
    assert!(plan.objective < plan.initial_objective);
}

#[test]
fn solve_after_completion() {
    let mut mpc = TimingMpc::new(unit_line(2), TimingConfig::default()).unwrap();
    mpc.update_progress_time(100.0).unwrap();
    assert!(mpc.done());

    let rest = mpc.solve(&v(&[2.0, 0.0]), &v(&[0.0, 0.0]), 0).unwrap();
    assert_eq!(rest.status, SolverStatus::Converged);

    let moving = mpc.solve(&v(&[2.0, 0.0]), &v(&[1.0, 0.0]), 0).unwrap();
    assert_eq!(moving.status, SolverStatus::Infeasible);
    assert!(mpc.durations().is_empty());
}

// =============================================================================
// Receding horizon
// =============================================================================

#[test]
fn control_loop_reaches_waypoints() {
    let dt = 0.1;
    let mut mpc = TimingMpc::new(corner(), TimingConfig::realtime()).unwrap();
    let mut position = v(&[0.0, 0.0]);
    let mut velocity = v(&[0.0, 0.0]);
    let mut last_phase = 0;

    // Roughly 9 s of plan at 10 Hz
    for _ in 0..300 {
        if mpc.done() {
            break;
        }
        mpc.solve(&position, &velocity, 0).unwrap();
        let spline = mpc.cubic_spline(&position, &velocity).unwrap();
        position = spline.position(dt);
        velocity = spline.velocity(dt);
        mpc.update_progress_time(dt).unwrap();

        assert!(mpc.phase() >= last_phase);
        assert!(mpc.durations().iter().all(|&t| t > 0.0));
        last_phase = mpc.phase();
    }

    assert!(mpc.done());
    assert_eq!(mpc.phase(), corner().len());
}

#[test]
fn spline_reproduces_plan() {
    let mut mpc = TimingMpc::new(corner(), TimingConfig::default()).unwrap();
    let start = v(&[0.0, 0.0]);
    let rest = v(&[0.0, 0.0]);
    mpc.solve(&start, &rest, 0).unwrap();

    let spline = mpc.cubic_spline(&start, &rest).unwrap();
    let times = mpc.times();
    let waypoints = mpc.waypoints();

    assert_eq!(spline.num_segments(), 4);
    assert_relative_eq!(spline.duration(), times[3], epsilon = 1e-12);
    for (t, w) in times.iter().zip(&waypoints) {
        assert_relative_eq!(spline.position(*t), w.clone(), epsilon = 1e-9);
    }
    assert_relative_eq!(spline.velocity(times[3]).norm(), 0.0, epsilon = 1e-12);
}

#[test]
fn spline_after_backtrack_covers_restored_waypoint() {
    let mut mpc = TimingMpc::new(unit_line(3), TimingConfig::default()).unwrap();
    mpc.update_progress_time(1.5).unwrap();
    assert_eq!(mpc.cubic_spline(&v(&[1.5, 0.0]), &v(&[0.0, 0.0])).unwrap().num_segments(), 2);

    mpc.update_backtrack().unwrap();
    let spline = mpc.cubic_spline(&v(&[0.5, 0.0]), &v(&[0.0, 0.0])).unwrap();
    assert_eq!(spline.num_segments(), 3);
}
