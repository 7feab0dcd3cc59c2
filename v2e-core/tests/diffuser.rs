use approx::assert_abs_diff_eq;
use ndarray::Array2;
use v2e_core::kernels::diffuser::{CenterSurround, MAX_CHANGE_TO_TERMINATE_EULER_STEPPING};
use v2e_core::EmulatorError;

#[test]
fn time_constants_follow_lambda() {
    let cs = CenterSurround::new(2.0, Some(1.0));
    assert_abs_diff_eq!(cs.tau_p_s(), 1e-3, epsilon = 1e-15);
    assert_abs_diff_eq!(cs.tau_h_s(), 0.25e-3, epsilon = 1e-15);

    let instant = CenterSurround::new(1.0, Some(0.0));
    assert_abs_diff_eq!(instant.tau_p_s(), 1e-9, epsilon = 1e-20);
}

#[test]
fn first_update_copies_center() {
    let mut cs = CenterSurround::new(2.0, Some(1.0));
    let center = Array2::from_shape_fn((3, 3), |(y, x)| (y * 3 + x) as f64);
    let plan = cs.plan(0.01).unwrap();
    assert_eq!(cs.update(&center, &plan), 0);
    assert_eq!(cs.surround(), Some(&center));
    assert!(cs.stats().is_none());
}

#[test]
fn surround_converges_to_uniform_center() {
    let mut cs = CenterSurround::new(2.0, Some(1.0));
    let plan = cs.plan(0.1).unwrap();
    assert!(plan.alpha_p <= 0.25 && plan.alpha_h <= 0.25);

    cs.update(&Array2::from_elem((5, 6), 1.0), &plan);
    let steps = cs.update(&Array2::from_elem((5, 6), 2.0), &plan);
    assert!(steps > 0 && steps < plan.num_steps);

    let tol = MAX_CHANGE_TO_TERMINATE_EULER_STEPPING / plan.alpha_p * 1.01;
    for &h in cs.surround().unwrap().iter() {
        assert!((h - 2.0).abs() < tol, "h={h}");
    }
}

#[test]
fn point_input_spreads_to_neighbours() {
    let mut cs = CenterSurround::new(1.5, Some(1.0));
    let plan = cs.plan(0.2).unwrap();
    cs.update(&Array2::zeros((9, 9)), &plan);

    let mut point = Array2::zeros((9, 9));
    point[[4, 4]] = 1.0;
    cs.update(&point, &plan);
    let h = cs.surround().unwrap();
    assert!(h[[4, 4]] < 1.0);
    assert!(h[[4, 5]] > 0.0 && h[[4, 5]] < h[[4, 4]]);
    assert!(h[[3, 4]] > h[[2, 4]]);
    assert_abs_diff_eq!(h[[4, 5]], h[[5, 4]], epsilon = 1e-9);
}

#[test]
fn too_few_steps_is_unstable() {
    let cs = CenterSurround::new(2.0, Some(1.0));
    match cs.plan_with_steps(0.01, 1) {
        Err(EmulatorError::UnstableDiffuser { alpha_p, .. }) => assert!(alpha_p >= 1.0),
        other => panic!("expected UnstableDiffuser, got {other:?}"),
    }
}

#[test]
fn zero_interval_takes_no_steps() {
    let mut cs = CenterSurround::new(2.0, Some(1.0));
    let plan = cs.plan(0.0).unwrap();
    assert_eq!(plan.num_steps, 0);
    cs.update(&Array2::from_elem((2, 2), 1.0), &plan);
    assert_eq!(cs.update(&Array2::from_elem((2, 2), 3.0), &plan), 0);
    assert_eq!(cs.surround().unwrap()[[0, 0]], 1.0);
}

#[test]
fn stats_cover_stepped_frames() {
    let mut cs = CenterSurround::new(2.0, Some(1.0));
    let plan = cs.plan(0.01).unwrap();
    cs.update(&Array2::from_elem((4, 4), 0.0), &plan);
    cs.update(&Array2::from_elem((4, 4), 1.0), &plan);
    cs.update(&Array2::from_elem((4, 4), 1.0), &plan);
    let stats = cs.stats().unwrap();
    assert_eq!(stats.frames, 2);
    assert!(stats.mean > 0.0);
    assert!(stats.std >= 0.0);

    cs.clear();
    assert!(cs.surround().is_none());
}
