//! Emulator configuration.
//!
//! All rates are in Hz, all durations in seconds unless the field name says
//! otherwise. Thresholds are in natural-log brightness units.

use crate::error::{EmulatorError, Result};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Option set consumed by [`crate::EventEmulator`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EmulatorConfig {
    /// Nominal ON threshold in log intensity.
    pub pos_thres: f64,
    /// Nominal OFF threshold in log intensity.
    pub neg_thres: f64,
    /// Std deviation of the per-pixel thresholds.
    pub sigma_thres: f64,
    /// 3dB cutoff of the photoreceptor lowpass; 0 disables filtering.
    pub cutoff_hz: f64,
    /// Leak event rate per pixel from junction leakage in the reset switch.
    pub leak_rate_hz: f64,
    pub refractory_period_s: f64,
    /// Rate of temporal (shot) noise events per pixel, ON and OFF combined.
    pub shot_noise_rate_hz: f64,
    /// Per-frame jitter of the leak rate as a fraction of its value.
    pub leak_jitter_fraction: f64,
    /// Spread of the log-normal per-pixel noise rate, in decades.
    pub noise_rate_cov_decades: f64,
    /// Seed for all random draws; 0 draws a seed from OS entropy.
    pub seed: u64,
    /// Space constant of the surround in pixels; `None` disables the surround.
    pub cs_lambda_pixels: Option<f64>,
    /// Surround time constant in ms; `None` or 0 makes the surround "instantaneous".
    pub cs_tau_p_ms: Option<f64>,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            pos_thres: 0.2,
            neg_thres: 0.2,
            sigma_thres: 0.03,
            cutoff_hz: 0.0,
            leak_rate_hz: 0.1,
            refractory_period_s: 0.0,
            shot_noise_rate_hz: 0.0,
            leak_jitter_fraction: 0.1,
            noise_rate_cov_decades: 0.1,
            seed: 0,
            cs_lambda_pixels: None,
            cs_tau_p_ms: None,
        }
    }
}

/// Named parameter presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DvsModel {
    /// Ideal pixels: small mismatch, no noise, no bandwidth limit.
    Clean,
    /// Typical low-light sensor: bandwidth limit, leak and shot noise.
    Noisy,
}

impl FromStr for DvsModel {
    type Err = EmulatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clean" => Ok(DvsModel::Clean),
            "noisy" => Ok(DvsModel::Noisy),
            other => Err(EmulatorError::InvalidConfig(format!(
                "unknown DVS model '{other}', use 'clean' or 'noisy'"
            ))),
        }
    }
}

impl fmt::Display for DvsModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DvsModel::Clean => f.write_str("clean"),
            DvsModel::Noisy => f.write_str("noisy"),
        }
    }
}

impl EmulatorConfig {
    /// Configuration of a named preset. Seed and surround options keep their defaults.
    pub fn preset(model: DvsModel) -> Self {
        let mut cfg = Self::default();
        cfg.apply_model(model);
        cfg
    }

    /// Overwrite the pixel parameters with those of `model`.
    pub fn apply_model(&mut self, model: DvsModel) {
        match model {
            DvsModel::Clean => {
                self.pos_thres = 0.2;
                self.neg_thres = 0.2;
                self.sigma_thres = 0.02;
                self.cutoff_hz = 0.0;
                self.leak_rate_hz = 0.0;
                self.leak_jitter_fraction = 0.0;
                self.noise_rate_cov_decades = 0.0;
                self.shot_noise_rate_hz = 0.0;
                self.refractory_period_s = 0.0;
            }
            DvsModel::Noisy => {
                self.pos_thres = 0.2;
                self.neg_thres = 0.2;
                self.sigma_thres = 0.05;
                self.cutoff_hz = 30.0;
                self.leak_rate_hz = 0.1;
                self.shot_noise_rate_hz = 5.0;
                self.refractory_period_s = 0.0;
                self.leak_jitter_fraction = 0.1;
                self.noise_rate_cov_decades = 0.1;
            }
        }
    }

    /// Whether the center-surround diffuser runs.
    #[inline]
    pub fn surround_enabled(&self) -> bool {
        self.cs_lambda_pixels.is_some()
    }

    /// Reject values that would make the emulation meaningless.
    pub fn validate(&self) -> Result<()> {
        fn check(ok: bool, msg: impl Into<String>) -> Result<()> {
            if ok {
                Ok(())
            } else {
                Err(EmulatorError::InvalidConfig(msg.into()))
            }
        }
        let non_negative = [
            ("sigma_thres", self.sigma_thres),
            ("cutoff_hz", self.cutoff_hz),
            ("leak_rate_hz", self.leak_rate_hz),
            ("refractory_period_s", self.refractory_period_s),
            ("shot_noise_rate_hz", self.shot_noise_rate_hz),
            ("leak_jitter_fraction", self.leak_jitter_fraction),
            ("noise_rate_cov_decades", self.noise_rate_cov_decades),
        ];
        for (name, v) in non_negative {
            check(v.is_finite() && v >= 0.0, format!("{name} must be finite and >= 0, got {v}"))?;
        }
        check(
            self.pos_thres.is_finite() && self.pos_thres > 0.0,
            format!("pos_thres must be > 0, got {}", self.pos_thres),
        )?;
        check(
            self.neg_thres.is_finite() && self.neg_thres > 0.0,
            format!("neg_thres must be > 0, got {}", self.neg_thres),
        )?;
        if let Some(lambda) = self.cs_lambda_pixels {
            check(
                lambda.is_finite() && lambda > 0.0,
                format!("cs_lambda_pixels must be > 0, got {lambda}"),
            )?;
        }
        if let Some(tau) = self.cs_tau_p_ms {
            check(
                tau.is_finite() && tau >= 0.0,
                format!("cs_tau_p_ms must be >= 0, got {tau}"),
            )?;
        }
        Ok(())
    }
}
