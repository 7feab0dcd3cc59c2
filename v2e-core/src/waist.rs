//! Thin-waist interfaces of the emulator.
//!
//! This module defines the minimal contracts between the emulator and the
//! outside world:
//! - EventSink: consumers of time-sorted event batches
//! - FrameSink: consumers of the raw input frames, DAVIS-style
//! - StateObserver: read-only taps on named intermediate pixel grids
//!
//! Notes
//! - Event coordinates are zero-based, x is the column and y the row
//! - Batches handed to sinks are non-empty and sorted by timestamp
//! - File encoders (AEDAT, HDF5, text) live outside the core and implement these traits

use crate::emulator::EventEmulator;
use crate::error::{EmulatorError, Result};
use crate::events::{Event, EventBatch, PolarityEncoding};
use ndarray::{Array2, ArrayView2};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Consumers of event batches.
///
/// Contract:
/// - `append` is called at most once per frame, never with an empty batch
/// - successive batches do not overlap in time
/// - `close` is called once after the last batch
pub trait EventSink {
    fn append(&mut self, batch: &EventBatch) -> Result<()>;

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// One input frame as seen by a [`FrameSink`].
#[derive(Debug, Clone, Copy)]
pub struct FrameRecord<'a> {
    pub frame: ArrayView2<'a, f64>,
    pub t_frame: f64,
    /// Total events emitted up to and including this frame.
    pub event_index: u64,
}

/// Consumers of raw input frames, recorded alongside the events.
pub trait FrameSink {
    fn record_frame(&mut self, record: FrameRecord<'_>) -> Result<()>;
}

/// Intermediate pixel grids an emulator can expose to a [`StateObserver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelState {
    NewFrame,
    LpLogFrame0,
    LpLogFrame1,
    CsSurroundFrame,
    CMinusSFrame,
    BaseLogFrame,
    DiffFrame,
}

impl ModelState {
    pub const ALL: [ModelState; 7] = [
        ModelState::NewFrame,
        ModelState::LpLogFrame0,
        ModelState::LpLogFrame1,
        ModelState::CsSurroundFrame,
        ModelState::CMinusSFrame,
        ModelState::BaseLogFrame,
        ModelState::DiffFrame,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ModelState::NewFrame => "new_frame",
            ModelState::LpLogFrame0 => "lp_log_frame0",
            ModelState::LpLogFrame1 => "lp_log_frame1",
            ModelState::CsSurroundFrame => "cs_surround_frame",
            ModelState::CMinusSFrame => "c_minus_s_frame",
            ModelState::BaseLogFrame => "base_log_frame",
            ModelState::DiffFrame => "diff_frame",
        }
    }
}

impl fmt::Display for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelState {
    type Err = EmulatorError;

    fn from_str(s: &str) -> Result<Self> {
        ModelState::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| EmulatorError::InvalidConfig(format!("unknown model state '{s}'")))
    }
}

/// Read-only tap on the emulator's intermediate grids.
///
/// Called once per named grid for every frame after the first, before events
/// are generated. The surround grids are only reported when the
/// center-surround diffuser is enabled.
pub trait StateObserver {
    fn observe(&mut self, state: ModelState, grid: &Array2<f64>, frame_counter: u64, t_frame: f64);
}

/// In-memory sink collecting every appended event.
#[derive(Debug, Clone, Default)]
pub struct VecSink {
    encoding: PolarityEncoding,
    events: Vec<Event>,
    appends: usize,
    closed: bool,
}

impl VecSink {
    pub fn new(encoding: PolarityEncoding) -> Self {
        Self { encoding, ..Default::default() }
    }

    #[inline]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Number of `append` calls received.
    #[inline]
    pub fn appends(&self) -> usize {
        self.appends
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Rows of `[t, x, y, p]` with `p` in this sink's polarity encoding.
    pub fn rows(&self) -> Vec<[f64; 4]> {
        self.events
            .iter()
            .map(|e| [e.t, e.x as f64, e.y as f64, e.polarity(self.encoding) as f64])
            .collect()
    }
}

impl EventSink for VecSink {
    fn append(&mut self, batch: &EventBatch) -> Result<()> {
        if self.closed {
            return Err(EmulatorError::Sink("append after close".to_string()));
        }
        self.events.extend_from_slice(batch.as_slice());
        self.appends += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Totals of one [`drive`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriveSummary {
    pub frames: u64,
    pub events: u64,
    pub appends: u64,
}

/// Feed `(frame, t_frame)` pairs through `emulator` into `sink`.
///
/// Only non-empty batches are appended, at most once per frame. When given,
/// `frame_sink` receives every accepted frame with the cumulative event count.
/// The sink is closed after the last frame; the first error stops the run
/// without closing it.
pub fn drive<'a, I>(
    emulator: &mut EventEmulator,
    frames: I,
    sink: &mut dyn EventSink,
    mut frame_sink: Option<&mut dyn FrameSink>,
) -> Result<DriveSummary>
where
    I: IntoIterator<Item = (ArrayView2<'a, f64>, f64)>,
{
    let mut summary = DriveSummary::default();
    for (frame, t_frame) in frames {
        let batch = emulator.generate_events(frame, t_frame)?;
        summary.frames += 1;
        if !batch.is_empty() {
            sink.append(&batch)?;
            summary.events += batch.len() as u64;
            summary.appends += 1;
        }
        if let Some(fs) = frame_sink.as_deref_mut() {
            fs.record_frame(FrameRecord {
                frame,
                t_frame,
                event_index: summary.events,
            })?;
        }
    }
    sink.close()?;
    debug!(frames = summary.frames, events = summary.events, "drive finished");
    Ok(summary)
}
