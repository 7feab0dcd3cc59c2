use core::cmp::Ordering;

/// A single brightness-change event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    /// Timestamp in seconds
    pub t: f64,
    /// X-coordinate (column)
    pub x: u16,
    /// Y-coordinate (row)
    pub y: u16,
    /// Polarity: +1 for ON, -1 for OFF.
    pub p: i8,
}

impl Event {
    #[inline]
    pub fn is_on(&self) -> bool {
        self.p > 0
    }

    /// Polarity re-encoded for a sink convention.
    #[inline]
    pub fn polarity(&self, encoding: PolarityEncoding) -> i8 {
        match encoding {
            PolarityEncoding::Signed => {
                if self.is_on() {
                    1
                } else {
                    -1
                }
            }
            PolarityEncoding::Binary => u8::from(self.is_on()) as i8,
        }
    }
}

/// Polarity conventions used by downstream writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolarityEncoding {
    /// ON = 1, OFF = -1
    #[default]
    Signed,
    /// ON = 1, OFF = 0
    Binary,
}

/// Events emitted for one frame interval, sorted by timestamp.
///
/// Invariants (held by batches produced by the emulator):
/// - `t` is non-decreasing
/// - every `t` lies in `(t_previous, t_frame]` of the interval that produced it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventBatch {
    events: Vec<Event>,
}

impl EventBatch {
    #[inline]
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Stable sort by timestamp, then wrap.
    pub fn from_unsorted(mut events: Vec<Event>) -> Self {
        events.sort_by(|a, b| a.t.total_cmp(&b.t));
        Self { events }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[Event] {
        &self.events
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    #[inline]
    pub fn into_vec(self) -> Vec<Event> {
        self.events
    }

    pub fn num_on(&self) -> usize {
        self.events.iter().filter(|e| e.is_on()).count()
    }

    pub fn num_off(&self) -> usize {
        self.len() - self.num_on()
    }

    /// First and last timestamp, if any.
    pub fn time_span(&self) -> Option<(f64, f64)> {
        match (self.events.first(), self.events.last()) {
            (Some(a), Some(b)) => Some((a.t, b.t)),
            _ => None,
        }
    }

    /// Returns whether timestamps are non-decreasing.
    pub fn is_monotonic_non_decreasing(&self) -> bool {
        self.events
            .windows(2)
            .all(|w| w[1].t.total_cmp(&w[0].t) != Ordering::Less)
    }
}

impl<'a> IntoIterator for &'a EventBatch {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

impl IntoIterator for EventBatch {
    type Item = Event;
    type IntoIter = std::vec::IntoIter<Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_unsorted_is_stable_and_monotonic() {
        let evs = vec![
            Event { t: 0.3, x: 0, y: 0, p: 1 },
            Event { t: 0.1, x: 1, y: 0, p: -1 },
            Event { t: 0.3, x: 2, y: 0, p: -1 },
            Event { t: 0.2, x: 3, y: 0, p: 1 },
        ];
        let batch = EventBatch::from_unsorted(evs);
        assert!(batch.is_monotonic_non_decreasing());
        let xs: Vec<u16> = batch.iter().map(|e| e.x).collect();
        assert_eq!(xs, vec![1, 3, 0, 2]);
        assert_eq!(batch.num_on(), 2);
        assert_eq!(batch.num_off(), 2);
        assert_eq!(batch.time_span(), Some((0.1, 0.3)));
    }

    #[test]
    fn polarity_encodings() {
        let on = Event { t: 0.0, x: 0, y: 0, p: 1 };
        let off = Event { t: 0.0, x: 0, y: 0, p: -1 };
        assert_eq!(on.polarity(PolarityEncoding::Binary), 1);
        assert_eq!(off.polarity(PolarityEncoding::Binary), 0);
        assert_eq!(off.polarity(PolarityEncoding::Signed), -1);
    }
}
