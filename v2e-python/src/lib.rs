//! v2e_python: PyO3 bindings for the v2e-core event emulator.
//!
//! Exposes one class:
//! - EventEmulator(**options) -> emulator configured like `v2e_core::EmulatorConfig`
//! - EventEmulator.generate_events(frame, t) -> f64 array shape (N, 4) or None
//!
//! Frames are 2D float64 NumPy arrays (height, width) of 8-bit-range intensities.
//! Event rows are [t, x, y, p] with p in {-1, +1}, sorted by t.

use numpy::{ndarray, PyArray2, PyReadonlyArray2};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use v2e_core::{DvsModel, EmulatorConfig, EmulatorError};

fn to_py_err(err: EmulatorError) -> PyErr {
    match err {
        EmulatorError::UnstableDiffuser { .. } | EmulatorError::Sink(_) => PyRuntimeError::new_err(err.to_string()),
        _ => PyValueError::new_err(err.to_string()),
    }
}

#[pyclass(name = "EventEmulator", module = "v2e_python")]
/// Frame-to-event DVS emulator.
///
/// `dvs_model` ("clean" or "noisy"), when given, overrides the pixel
/// parameters passed alongside it.
struct PyEventEmulator {
    inner: v2e_core::EventEmulator,
}

#[pymethods]
impl PyEventEmulator {
    #[new]
    #[pyo3(signature = (
        pos_thres = 0.2,
        neg_thres = 0.2,
        sigma_thres = 0.03,
        cutoff_hz = 0.0,
        leak_rate_hz = 0.1,
        refractory_period_s = 0.0,
        shot_noise_rate_hz = 0.0,
        leak_jitter_fraction = 0.1,
        noise_rate_cov_decades = 0.1,
        seed = 0,
        cs_lambda_pixels = None,
        cs_tau_p_ms = None,
        dvs_model = None,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        pos_thres: f64,
        neg_thres: f64,
        sigma_thres: f64,
        cutoff_hz: f64,
        leak_rate_hz: f64,
        refractory_period_s: f64,
        shot_noise_rate_hz: f64,
        leak_jitter_fraction: f64,
        noise_rate_cov_decades: f64,
        seed: u64,
        cs_lambda_pixels: Option<f64>,
        cs_tau_p_ms: Option<f64>,
        dvs_model: Option<&str>,
    ) -> PyResult<Self> {
        let mut config = EmulatorConfig {
            pos_thres,
            neg_thres,
            sigma_thres,
            cutoff_hz,
            leak_rate_hz,
            refractory_period_s,
            shot_noise_rate_hz,
            leak_jitter_fraction,
            noise_rate_cov_decades,
            seed,
            cs_lambda_pixels,
            cs_tau_p_ms,
        };
        if let Some(name) = dvs_model {
            let model: DvsModel = name.parse().map_err(to_py_err)?;
            config.apply_model(model);
        }
        let inner = v2e_core::EventEmulator::new(config).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    #[pyo3(text_signature = "($self, frame, t_frame, /)")]
    /// Feed one frame taken at `t_frame` seconds.
    /// Returns a NumPy f64 array with shape (N, 4) in C-order, or None without events.
    fn generate_events<'py>(
        &mut self,
        py: Python<'py>,
        frame: PyReadonlyArray2<'py, f64>,
        t_frame: f64,
    ) -> PyResult<Option<Py<PyArray2<f64>>>> {
        let batch = self
            .inner
            .generate_events(frame.as_array(), t_frame)
            .map_err(to_py_err)?;
        if batch.is_empty() {
            return Ok(None);
        }
        let n = batch.len();
        let mut buf = Vec::with_capacity(n * 4);
        for e in &batch {
            buf.extend_from_slice(&[e.t, e.x as f64, e.y as f64, e.p as f64]);
        }
        let arr = ndarray::Array2::from_shape_vec((n, 4), buf)
            .map_err(|_| PyValueError::new_err("Failed to reshape events into (N,4)."))?;
        Ok(Some(PyArray2::from_owned_array(py, arr).to_owned()))
    }

    /// Forget all pixel state and counters; the configuration is kept.
    fn reset(&mut self) {
        self.inner.reset();
    }

    #[getter]
    fn frame_counter(&self) -> u64 {
        self.inner.frame_counter()
    }

    #[getter]
    fn num_events_on(&self) -> u64 {
        self.inner.num_events_on()
    }

    #[getter]
    fn num_events_off(&self) -> u64 {
        self.inner.num_events_off()
    }

    #[getter]
    fn num_events_total(&self) -> u64 {
        self.inner.num_events_total()
    }

    #[getter]
    fn t_previous(&self) -> Option<f64> {
        self.inner.t_previous()
    }

    fn __repr__(&self) -> String {
        let c = self.inner.config();
        format!(
            "EventEmulator(pos_thres={}, neg_thres={}, sigma_thres={}, cutoff_hz={}, leak_rate_hz={}, shot_noise_rate_hz={}, seed={})",
            c.pos_thres, c.neg_thres, c.sigma_thres, c.cutoff_hz, c.leak_rate_hz, c.shot_noise_rate_hz, c.seed
        )
    }
}

#[pymodule]
fn v2e_python(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add("__doc__", "Python bindings for the v2e-core DVS event emulator.")?;
    m.add_class::<PyEventEmulator>()?;
    Ok(())
}
