use thiserror::Error;

/// Common result type for emulator operations.
pub type Result<T> = std::result::Result<T, EmulatorError>;

/// Errors surfaced by the emulator and its sinks.
#[derive(Debug, Error)]
pub enum EmulatorError {
    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Frames must arrive in non-decreasing time order.
    #[error("frame time {t_frame}s is earlier than previous frame time {t_previous}s")]
    NonMonotonicTimestamp { t_frame: f64, t_previous: f64 },

    #[error("frame timestamp must be finite, got {0}")]
    NonFiniteTimestamp(f64),

    #[error("frame contains a non-finite sample at (x={x}, y={y})")]
    NonFiniteSample { x: usize, y: usize },

    /// Resolution is fixed by the first frame.
    #[error("frame shape {got:?} does not match emulator resolution {expected:?} (height, width)")]
    ShapeMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("frame shape {height}x{width} is empty or exceeds 65536 pixels per side")]
    InvalidFrameShape { height: usize, width: usize },

    /// Euler stepping of the surround network would diverge.
    #[error("center-surround update is unstable: alpha_p={alpha_p:.3} alpha_h={alpha_h:.3}")]
    UnstableDiffuser { alpha_p: f64, alpha_h: f64 },

    #[error("event sink error: {0}")]
    Sink(String),
}
