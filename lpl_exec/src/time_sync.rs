//! # Time synchronisation buffer
//!
//! A fixed-capacity ring of timestamped samples used to associate an
//! asynchronous arrival (a depth cloud, a planned path) with the sample that
//! was current when that arrival was produced.
//!
//! Lookups are served by a read cursor which only ever moves forward, so a
//! run of roughly monotonic queries costs O(1) amortised regardless of the
//! spacing of the samples.

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A sample with the time it is valid at.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Stamped<T> {
    pub time_s: f64,
    pub data: T,
}

/// Fixed-capacity ring buffer with nearest-time lookup.
///
/// Samples are addressed internally by an absolute sequence number (the
/// number of samples inserted before them), which keeps the cursor logic
/// free of wraparound cases. Once more than `capacity` samples have been
/// inserted the oldest are overwritten.
#[derive(Debug, Clone)]
pub struct TimeSyncBuffer<T> {
    ring: Vec<Stamped<T>>,
    capacity: usize,

    /// Total number of samples ever inserted
    num_inserted: u64,

    /// Sequence number of the sample returned by the last lookup
    cursor: u64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<T> TimeSyncBuffer<T> {
    /// Create an empty buffer holding at most `capacity` samples. A capacity
    /// of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);

        Self {
            ring: Vec::with_capacity(capacity),
            capacity,
            num_inserted: 0,
            cursor: 0,
        }
    }

    /// Insert a new sample, overwriting the oldest if the buffer is full.
    pub fn insert(&mut self, time_s: f64, data: T) {
        let sample = Stamped { time_s, data };
        let slot = self.slot(self.num_inserted);

        if self.ring.len() < self.capacity {
            self.ring.push(sample);
        } else {
            self.ring[slot] = sample;
        }

        self.num_inserted += 1;
    }

    /// Find the sample nearest in time to `query_time_s`.
    ///
    /// The search starts from the sample returned by the previous lookup and
    /// advances while the next sample is a strictly better match. It never
    /// moves backwards, except that a cursor pointing at an overwritten
    /// sample is first moved up to the oldest one still held.
    pub fn nearest(&mut self, query_time_s: f64) -> Option<&Stamped<T>> {
        let seq = self.advance_cursor(query_time_s)?;
        let slot = self.slot(seq);
        self.ring.get(slot)
    }

    /// As [`TimeSyncBuffer::nearest`], but allows the matched sample to be
    /// modified in place.
    pub fn nearest_mut(&mut self, query_time_s: f64) -> Option<&mut Stamped<T>> {
        let seq = self.advance_cursor(query_time_s)?;
        let slot = self.slot(seq);
        self.ring.get_mut(slot)
    }

    /// The most recently inserted sample.
    pub fn latest(&self) -> Option<&Stamped<T>> {
        if self.num_inserted == 0 {
            return None;
        }
        self.ring.get(self.slot(self.num_inserted - 1))
    }

    /// Sequence number of the sample the cursor currently points at.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Number of samples currently held.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Ring slot of the given sequence number.
    fn slot(&self, seq: u64) -> usize {
        (seq % self.capacity as u64) as usize
    }

    /// Sequence number of the oldest sample still held.
    fn oldest_seq(&self) -> u64 {
        self.num_inserted.saturating_sub(self.capacity as u64)
    }

    fn time_of(&self, seq: u64) -> f64 {
        self.ring[self.slot(seq)].time_s
    }

    fn advance_cursor(&mut self, query_time_s: f64) -> Option<u64> {
        if self.num_inserted == 0 {
            return None;
        }

        if self.cursor < self.oldest_seq() {
            self.cursor = self.oldest_seq();
        }

        while self.cursor + 1 < self.num_inserted {
            let current = (self.time_of(self.cursor) - query_time_s).abs();
            let next = (self.time_of(self.cursor + 1) - query_time_s).abs();

            if next < current {
                self.cursor += 1;
            } else {
                break;
            }
        }

        Some(self.cursor)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn buffer_with_times(capacity: usize, times: &[f64]) -> TimeSyncBuffer<usize> {
        let mut buf = TimeSyncBuffer::new(capacity);
        for (i, t) in times.iter().enumerate() {
            buf.insert(*t, i);
        }
        buf
    }

    #[test]
    fn test_empty_lookup() {
        let mut buf: TimeSyncBuffer<usize> = TimeSyncBuffer::new(4);
        assert!(buf.nearest(1.0).is_none());
        assert!(buf.latest().is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_nearest_is_globally_nearest() {
        // Uneven spacing on purpose
        let times = [0.0, 0.1, 0.15, 0.4, 0.45, 0.9, 1.3, 1.31, 2.0];
        let mut buf = buffer_with_times(16, &times);

        let mut last_cursor = 0;
        let mut q = -0.2;
        while q < 2.5 {
            let found = buf.nearest(q).unwrap().time_s;
            let best = times
                .iter()
                .map(|t| (t - q).abs())
                .fold(std::f64::INFINITY, f64::min);
            assert!((found - q).abs() <= best + 1e-12, "query {} found {}", q, found);

            // The cursor never regresses
            assert!(buf.cursor() >= last_cursor);
            last_cursor = buf.cursor();

            q += 0.037;
        }
    }

    #[test]
    fn test_cursor_does_not_move_back() {
        let mut buf = buffer_with_times(8, &[0.0, 1.0, 2.0, 3.0]);

        assert_eq!(buf.nearest(2.9).unwrap().data, 3);

        // An earlier query can't rewind past the cursor
        assert_eq!(buf.nearest(0.2).unwrap().data, 3);
    }

    #[test]
    fn test_ties_keep_earlier_sample() {
        let mut buf = buffer_with_times(8, &[0.0, 1.0]);
        assert_eq!(buf.nearest(0.5).unwrap().data, 0);
    }

    #[test]
    fn test_wraparound() {
        // Capacity 4, ten samples: only 6..=9 remain
        let times: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let mut buf = buffer_with_times(4, &times);

        assert_eq!(buf.len(), 4);
        assert_eq!(buf.latest().unwrap().data, 9);

        // Query older than everything held returns the oldest held sample
        assert_eq!(buf.nearest(1.0).unwrap().data, 6);
        assert_eq!(buf.nearest(7.6).unwrap().data, 8);

        // Keep inserting, the cursor follows the overwritten region forward
        for i in 10..20 {
            buf.insert(i as f64, i);
        }
        assert_eq!(buf.nearest(12.0).unwrap().data, 16);
        assert_eq!(buf.nearest(18.2).unwrap().data, 18);
    }

    #[test]
    fn test_nearest_mut() {
        let mut buf = buffer_with_times(4, &[0.0, 1.0, 2.0]);
        buf.nearest_mut(1.1).unwrap().data = 42;
        assert_eq!(buf.nearest(1.0).unwrap().data, 42);
    }
}
