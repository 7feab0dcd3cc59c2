/*!
Core of the DVS event emulator: turns intensity frames into time-sorted
brightness-change events.
*/

pub mod config;
pub mod emulator;
pub mod error;
pub mod events;
pub mod kernels;
pub mod waist;

pub use config::{DvsModel, EmulatorConfig};
pub use emulator::{EmulatorState, EventEmulator};
pub use error::{EmulatorError, Result};
pub use events::{Event, EventBatch, PolarityEncoding};
pub use waist::{drive, EventSink, FrameRecord, FrameSink, ModelState, StateObserver, VecSink};
