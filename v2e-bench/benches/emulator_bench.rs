use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use v2e_bench::{make_frames, moving_bar_frames};
use v2e_core::{DvsModel, EmulatorConfig, EventEmulator};

const N_FRAMES: usize = 10;

pub fn emulator_model_bench(c: &mut Criterion) {
    let sizes = [(128usize, 128usize), (346, 260)];
    let models = [DvsModel::Clean, DvsModel::Noisy];

    let mut group = c.benchmark_group("emulator/model");

    for &(w, h) in &sizes {
        let seed = 0xD1CE ^ ((w as u64) << 32) ^ ((h as u64) << 16);
        let frames = make_frames(N_FRAMES, w, h, seed);
        for &model in &models {
            group.throughput(Throughput::Elements((w * h * N_FRAMES) as u64));
            let id = BenchmarkId::new(format!("{}x{}-f{}", w, h, N_FRAMES), model);
            group.bench_with_input(id, &(frames.as_slice(), model), |b, (frs, model_)| {
                b.iter(|| {
                    let cfg = EmulatorConfig { seed: 1, ..EmulatorConfig::preset(*model_) };
                    let mut emu = EventEmulator::new(cfg).expect("valid preset");
                    let mut n = 0usize;
                    for (f, t) in frs.iter() {
                        n += emu.generate_events(black_box(f.view()), *t).expect("frame ok").len();
                    }
                    black_box(n);
                });
            });
        }
    }

    group.finish();
}

pub fn emulator_refractory_bench(c: &mut Criterion) {
    let (w, h) = (240usize, 180usize);
    let frames = moving_bar_frames(N_FRAMES, w, h);

    let mut group = c.benchmark_group("emulator/refractory");

    for &period in &[0.0f64, 0.001] {
        group.throughput(Throughput::Elements((w * h * N_FRAMES) as u64));
        let id = BenchmarkId::new(format!("{}x{}-bar", w, h), format!("refr={}", period));
        group.bench_with_input(id, &(frames.as_slice(), period), |b, (frs, period_)| {
            b.iter(|| {
                let cfg = EmulatorConfig {
                    seed: 1,
                    refractory_period_s: *period_,
                    shot_noise_rate_hz: 1.0,
                    ..Default::default()
                };
                let mut emu = EventEmulator::new(cfg).expect("valid config");
                for (f, t) in frs.iter() {
                    black_box(emu.generate_events(black_box(f.view()), *t).expect("frame ok"));
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, emulator_model_bench, emulator_refractory_bench);
criterion_main!(benches);
