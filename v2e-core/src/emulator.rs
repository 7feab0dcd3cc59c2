//! Frame-to-event emulation driver.
//!
//! [`EventEmulator`] owns all per-pixel state and turns a sequence of
//! intensity frames into time-sorted event batches. Every call to
//! [`EventEmulator::generate_events`] either fails without touching any state
//! or processes the whole frame.

use crate::config::EmulatorConfig;
use crate::error::{EmulatorError, Result};
use crate::events::EventBatch;
use crate::kernels::change_detector::{self, ShotNoise};
use crate::kernels::diffuser::{CenterSurround, DiffuserPlan, DiffuserStats};
use crate::kernels::noise::{noise_rate_array, subtract_leak_current};
use crate::kernels::photoreceptor::{lin_log, rescale_intensity, Photoreceptor};
use crate::kernels::refractory_period::RefractoryMemory;
use crate::kernels::thresholds::ThresholdField;
use crate::waist::{ModelState, StateObserver};
use ndarray::{Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

/// Largest frame side addressable by `u16` event coordinates.
pub const MAX_FRAME_SIDE: usize = u16::MAX as usize + 1;

/// Per-pixel state established by the first frame.
#[derive(Debug, Clone)]
pub struct PixelState {
    shape: (usize, usize),
    photoreceptor: Photoreceptor,
    /// Memorized brightness each pixel compares against.
    base_log_frame: Array2<f64>,
    thresholds: ThresholdField,
    /// Log-normal leak rate multiplier, present when leak is enabled.
    noise_rate: Option<Array2<f64>>,
    refractory: Option<RefractoryMemory>,
    t_previous: f64,
}

impl PixelState {
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    #[inline]
    pub fn photoreceptor(&self) -> &Photoreceptor {
        &self.photoreceptor
    }

    #[inline]
    pub fn base_log_frame(&self) -> &Array2<f64> {
        &self.base_log_frame
    }

    #[inline]
    pub fn thresholds(&self) -> &ThresholdField {
        &self.thresholds
    }

    #[inline]
    pub fn noise_rate(&self) -> Option<&Array2<f64>> {
        self.noise_rate.as_ref()
    }

    #[inline]
    pub fn t_previous(&self) -> f64 {
        self.t_previous
    }
}

#[derive(Debug, Clone)]
pub enum EmulatorState {
    /// No frame seen since construction or the last reset.
    Uninitialized,
    Running(Box<PixelState>),
}

pub struct EventEmulator {
    config: EmulatorConfig,
    rng: StdRng,
    state: EmulatorState,
    diffuser: Option<CenterSurround>,
    observer: Option<Box<dyn StateObserver + Send>>,
    frame_counter: u64,
    num_events_on: u64,
    num_events_off: u64,
}

impl std::fmt::Debug for EventEmulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmulator")
            .field("config", &self.config)
            .field("frame_counter", &self.frame_counter)
            .field("num_events_on", &self.num_events_on)
            .field("num_events_off", &self.num_events_off)
            .field("running", &self.is_running())
            .finish()
    }
}

fn make_rng(seed: u64) -> StdRng {
    if seed == 0 {
        StdRng::from_entropy()
    } else {
        StdRng::seed_from_u64(seed)
    }
}

impl EventEmulator {
    /// Validate `config` and build an emulator waiting for its first frame.
    pub fn new(config: EmulatorConfig) -> Result<Self> {
        config.validate()?;
        info!(
            pos_thres = config.pos_thres,
            neg_thres = config.neg_thres,
            sigma_thres = config.sigma_thres,
            cutoff_hz = config.cutoff_hz,
            leak_rate_hz = config.leak_rate_hz,
            shot_noise_rate_hz = config.shot_noise_rate_hz,
            refractory_period_s = config.refractory_period_s,
            seed = config.seed,
            "event emulator configured"
        );
        let diffuser = config.cs_lambda_pixels.map(|lambda| {
            let cs = CenterSurround::new(lambda, config.cs_tau_p_ms);
            info!(
                lambda_pixels = lambda,
                tau_p_s = cs.tau_p_s(),
                tau_h_s = cs.tau_h_s(),
                "center-surround diffuser enabled"
            );
            cs
        });
        Ok(Self {
            rng: make_rng(config.seed),
            config,
            state: EmulatorState::Uninitialized,
            diffuser,
            observer: None,
            frame_counter: 0,
            num_events_on: 0,
            num_events_off: 0,
        })
    }

    /// Install a tap on the intermediate grids, replacing any previous one.
    pub fn set_observer(&mut self, observer: Box<dyn StateObserver + Send>) {
        self.observer = Some(observer);
    }

    pub fn take_observer(&mut self) -> Option<Box<dyn StateObserver + Send>> {
        self.observer.take()
    }

    #[inline]
    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    #[inline]
    pub fn state(&self) -> &EmulatorState {
        &self.state
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        matches!(self.state, EmulatorState::Running(_))
    }

    /// Timestamp of the last accepted frame.
    pub fn t_previous(&self) -> Option<f64> {
        match &self.state {
            EmulatorState::Running(ps) => Some(ps.t_previous),
            EmulatorState::Uninitialized => None,
        }
    }

    /// Frames accepted since construction or the last reset.
    #[inline]
    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    #[inline]
    pub fn num_events_on(&self) -> u64 {
        self.num_events_on
    }

    #[inline]
    pub fn num_events_off(&self) -> u64 {
        self.num_events_off
    }

    #[inline]
    pub fn num_events_total(&self) -> u64 {
        self.num_events_on + self.num_events_off
    }

    /// Current surround grid, when the diffuser is enabled and initialized.
    pub fn surround(&self) -> Option<&Array2<f64>> {
        self.diffuser.as_ref().and_then(|cs| cs.surround())
    }

    /// Diffuser sub-step statistics, `None` when disabled or before the second frame.
    pub fn diffuser_stats(&self) -> Option<DiffuserStats> {
        self.diffuser.as_ref().and_then(|cs| cs.stats())
    }

    /// Forget all pixel state and counters; keep the configuration.
    ///
    /// A nonzero seed re-seeds the generator, so replaying the same frames
    /// reproduces the same batches.
    pub fn reset(&mut self) {
        self.state = EmulatorState::Uninitialized;
        if let Some(cs) = self.diffuser.as_mut() {
            cs.clear();
        }
        if self.config.seed != 0 {
            self.rng = StdRng::seed_from_u64(self.config.seed);
        }
        self.frame_counter = 0;
        self.num_events_on = 0;
        self.num_events_off = 0;
        debug!("event emulator reset");
    }

    /// Process one frame taken at `t_frame` seconds.
    ///
    /// The first frame after construction or reset only initializes the
    /// pixels and yields an empty batch. Later frames yield the events of the
    /// interval `(t_previous, t_frame]`, sorted by timestamp.
    ///
    /// Errors leave the emulator exactly as it was.
    pub fn generate_events(&mut self, frame: ArrayView2<'_, f64>, t_frame: f64) -> Result<EventBatch> {
        let plan = self.check_frame(frame, t_frame)?;

        self.frame_counter += 1;
        let state = match &mut self.state {
            EmulatorState::Uninitialized => {
                let ps = self.initialize(frame, t_frame);
                self.state = EmulatorState::Running(Box::new(ps));
                debug!(frame = self.frame_counter, t_frame, "pixels initialized from first frame");
                return Ok(EventBatch::new());
            }
            EmulatorState::Running(ps) => ps,
        };

        let delta_time = t_frame - state.t_previous;
        let cfg = &self.config;

        let log_frame = lin_log(frame);
        let inten01 = if cfg.cutoff_hz > 0.0 || cfg.shot_noise_rate_hz > 0.0 {
            Some(rescale_intensity(frame))
        } else {
            None
        };
        state.photoreceptor.update(&log_frame, inten01.as_ref(), delta_time);

        if let (Some(cs), Some(plan)) = (self.diffuser.as_mut(), plan.as_ref()) {
            cs.update(state.photoreceptor.output(), plan);
        }

        if let Some(noise_rate) = state.noise_rate.as_ref() {
            subtract_leak_current(
                &mut state.base_log_frame,
                cfg.leak_rate_hz,
                delta_time,
                &state.thresholds.pos,
                cfg.leak_jitter_fraction,
                noise_rate,
                &mut self.rng,
            );
        }

        let surround = self.diffuser.as_ref().and_then(|cs| cs.surround());
        let c_minus_s = surround.map(|s| state.photoreceptor.output() - s);
        let center = c_minus_s.as_ref().unwrap_or(state.photoreceptor.output());
        let diff = center - &state.base_log_frame;

        if let Some(observer) = self.observer.as_mut() {
            let new_frame = frame.to_owned();
            let mut grids: Vec<(ModelState, &Array2<f64>)> = vec![
                (ModelState::NewFrame, &new_frame),
                (ModelState::LpLogFrame0, state.photoreceptor.stage0()),
                (ModelState::LpLogFrame1, state.photoreceptor.output()),
            ];
            if let (Some(s), Some(cms)) = (surround, c_minus_s.as_ref()) {
                grids.push((ModelState::CsSurroundFrame, s));
                grids.push((ModelState::CMinusSFrame, cms));
            }
            grids.push((ModelState::BaseLogFrame, &state.base_log_frame));
            grids.push((ModelState::DiffFrame, &diff));
            for (name, grid) in grids {
                observer.observe(name, grid, self.frame_counter, t_frame);
            }
        }

        let shot_noise = match inten01.as_ref() {
            Some(inten01) if cfg.shot_noise_rate_hz > 0.0 => Some(ShotNoise {
                rate_hz: cfg.shot_noise_rate_hz,
                inten01,
            }),
            _ => None,
        };
        let detection = change_detector::detect(
            &diff,
            &state.thresholds,
            state.t_previous,
            t_frame,
            shot_noise,
            state.refractory.as_mut(),
            &mut self.rng,
        );
        change_detector::update_baseline(&mut state.base_log_frame, &detection, &state.thresholds);
        state.t_previous = t_frame;

        let num_on = detection.batch.num_on() as u64;
        let num_off = detection.batch.len() as u64 - num_on;
        self.num_events_on += num_on;
        self.num_events_off += num_off;
        debug!(
            frame = self.frame_counter,
            t_frame,
            delta_time,
            num_on,
            num_off,
            on_passes = detection.pos_num_iters,
            off_passes = detection.neg_num_iters,
            "frame processed"
        );
        Ok(detection.batch)
    }

    /// Every fallible check of a frame, run before any mutation.
    ///
    /// Returns the diffuser plan for this interval when the diffuser steps.
    fn check_frame(&self, frame: ArrayView2<'_, f64>, t_frame: f64) -> Result<Option<DiffuserPlan>> {
        if !t_frame.is_finite() {
            return Err(EmulatorError::NonFiniteTimestamp(t_frame));
        }
        let (height, width) = frame.dim();
        let plan = match &self.state {
            EmulatorState::Uninitialized => {
                if height == 0 || width == 0 || height > MAX_FRAME_SIDE || width > MAX_FRAME_SIDE {
                    return Err(EmulatorError::InvalidFrameShape { height, width });
                }
                None
            }
            EmulatorState::Running(ps) => {
                if (height, width) != ps.shape {
                    return Err(EmulatorError::ShapeMismatch {
                        expected: ps.shape,
                        got: (height, width),
                    });
                }
                if t_frame < ps.t_previous {
                    return Err(EmulatorError::NonMonotonicTimestamp {
                        t_frame,
                        t_previous: ps.t_previous,
                    });
                }
                match self.diffuser.as_ref() {
                    Some(cs) => Some(cs.plan(t_frame - ps.t_previous)?),
                    None => None,
                }
            }
        };
        if let Some(((y, x), _)) = frame.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(EmulatorError::NonFiniteSample { x, y });
        }
        Ok(plan)
    }

    /// Build pixel state from the first frame.
    ///
    /// Draw order on the generator: thresholds (ON, then OFF), then the leak
    /// noise rates when leak is enabled.
    fn initialize(&mut self, frame: ArrayView2<'_, f64>, t_frame: f64) -> PixelState {
        let cfg = &self.config;
        let shape = frame.dim();
        let log_frame = lin_log(frame);
        let photoreceptor = Photoreceptor::new(&log_frame, cfg.cutoff_hz);

        // the surround starts as a copy of the center, so the first baseline is flat zero
        let base_log_frame = match self.diffuser.as_mut() {
            Some(cs) => {
                let plan = DiffuserPlan { num_steps: 0, alpha_p: 0.0, alpha_h: 0.0 };
                cs.update(photoreceptor.output(), &plan);
                match cs.surround() {
                    Some(s) => photoreceptor.output() - s,
                    None => photoreceptor.output().clone(),
                }
            }
            None => photoreceptor.output().clone(),
        };

        let thresholds = ThresholdField::draw(shape, cfg.pos_thres, cfg.neg_thres, cfg.sigma_thres, &mut self.rng);
        let noise_rate = if cfg.leak_rate_hz > 0.0 {
            Some(noise_rate_array(shape, cfg.noise_rate_cov_decades, &mut self.rng))
        } else {
            None
        };
        let refractory = if cfg.refractory_period_s > 0.0 {
            Some(RefractoryMemory::new(shape, cfg.refractory_period_s))
        } else {
            None
        };

        PixelState {
            shape,
            photoreceptor,
            base_log_frame,
            thresholds,
            noise_rate,
            refractory,
            t_previous: t_frame,
        }
    }
}

impl Drop for EventEmulator {
    fn drop(&mut self) {
        if let Some(stats) = self.diffuser_stats() {
            info!(
                frames = stats.frames,
                mean = stats.mean,
                std = stats.std,
                median = stats.median,
                "center-surround Euler steps per frame"
            );
        }
    }
}
