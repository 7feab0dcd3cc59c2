use ndarray::Array2;
use proptest::prelude::*;
use v2e_core::{EmulatorConfig, EmulatorState, EventEmulator};

fn frame_from(values: &[u8], shape: (usize, usize)) -> Array2<f64> {
    Array2::from_shape_fn(shape, |(y, x)| values[(y * shape.1 + x) % values.len()] as f64)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn events_lie_in_their_frame_interval(
        seed in 1u64..1000,
        shot_noise_rate_hz in prop_oneof![Just(0.0), 1.0f64..50.0],
        refractory_period_s in prop_oneof![Just(0.0), 0.001f64..0.02],
        cutoff_hz in prop_oneof![Just(0.0), 5.0f64..100.0],
        steps in prop::collection::vec((0u32..3, prop::collection::vec(any::<u8>(), 1..30)), 2..10),
    ) {
        let cfg = EmulatorConfig {
            seed,
            shot_noise_rate_hz,
            refractory_period_s,
            cutoff_hz,
            ..Default::default()
        };
        let shape = (5, 6);
        let mut emu = EventEmulator::new(cfg).unwrap();
        let mut t = 0.0;
        for (gap_ms, values) in steps {
            let t_previous = emu.t_previous();
            t += gap_ms as f64 * 0.01;
            let batch = emu.generate_events(frame_from(&values, shape).view(), t).unwrap();
            prop_assert!(batch.is_monotonic_non_decreasing());
            match t_previous {
                None => prop_assert!(batch.is_empty()),
                Some(tp) if tp == t => prop_assert!(batch.is_empty()),
                Some(tp) => {
                    for e in &batch {
                        prop_assert!(e.t > tp && e.t <= t, "t={} not in ({}, {}]", e.t, tp, t);
                        prop_assert!((e.x as usize) < shape.1 && (e.y as usize) < shape.0);
                    }
                }
            }
        }
    }

    #[test]
    fn noiseless_baseline_stays_within_one_threshold(
        seed in 1u64..1000,
        sigma_thres in 0.0f64..0.05,
        frames in prop::collection::vec(prop::collection::vec(1u8..=255, 12), 1..8),
    ) {
        let cfg = EmulatorConfig {
            seed,
            sigma_thres,
            leak_rate_hz: 0.0,
            shot_noise_rate_hz: 0.0,
            ..Default::default()
        };
        let mut emu = EventEmulator::new(cfg).unwrap();
        for (k, values) in frames.iter().enumerate() {
            emu.generate_events(frame_from(values, (3, 4)).view(), k as f64 * 0.033).unwrap();
            let EmulatorState::Running(ps) = emu.state() else { unreachable!() };
            let rem = ps.photoreceptor().output() - ps.base_log_frame();
            let th = ps.thresholds();
            for ((y, x), r) in rem.indexed_iter() {
                prop_assert!(*r < th.pos[[y, x]] + 1e-9);
                prop_assert!(*r > -th.neg[[y, x]] - 1e-9);
            }
        }
    }
}
