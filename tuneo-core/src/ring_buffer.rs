//! # Ring Buffer Module
//!
//! Fixed-capacity circular store for the most recent audio samples.
//! The pitch estimator always looks at the last `capacity` samples, so the
//! buffer overwrites the oldest entries and never grows with session time.

/// Circular sample store with overwrite-oldest semantics.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    buffer: Vec<f32>,
    head: usize,
}

impl RingBuffer {
    /// Creates a zero-filled buffer holding `capacity` samples.
    ///
    /// # Panics
    /// * If `capacity` is zero
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be non-zero");
        Self {
            buffer: vec![0.0; capacity],
            head: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Appends samples in order, overwriting the oldest once full.
    ///
    /// Only the trailing `capacity` samples of a large push can survive, so
    /// anything before them is skipped.
    pub fn push(&mut self, samples: &[f32]) {
        let capacity = self.buffer.len();
        let skip = samples.len().saturating_sub(capacity);
        if skip > 0 {
            self.head = (self.head + skip) % capacity;
        }

        for &sample in &samples[skip..] {
            self.buffer[self.head] = sample;
            self.head = (self.head + 1) % capacity;
        }
    }

    /// Returns exactly `capacity` samples, oldest first.
    pub fn snapshot(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.buffer.len());
        self.snapshot_into(&mut out);
        out
    }

    /// Writes the linearized contents into `out`, reusing its allocation.
    pub fn snapshot_into(&self, out: &mut Vec<f32>) {
        out.clear();
        out.extend_from_slice(&self.buffer[self.head..]);
        out.extend_from_slice(&self.buffer[..self.head]);
    }

    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.head = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_prefilled_with_zeros() {
        let mut buffer = RingBuffer::new(5);
        assert_eq!(buffer.snapshot(), vec![0.0; 5]);

        buffer.push(&[1.0, 2.0]);
        assert_eq!(buffer.snapshot(), vec![0.0, 0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_wraps_and_keeps_last_samples_in_order() {
        let mut buffer = RingBuffer::new(4);
        let mut pushed = Vec::new();
        for chunk in 0..7 {
            let samples: Vec<f32> = (0..3).map(|i| (chunk * 3 + i) as f32).collect();
            pushed.extend_from_slice(&samples);
            buffer.push(&samples);

            let snapshot = buffer.snapshot();
            assert_eq!(snapshot.len(), 4);
            if pushed.len() >= 4 {
                assert_eq!(snapshot, pushed[pushed.len() - 4..].to_vec());
            }
        }
    }

    #[test]
    fn test_push_larger_than_capacity() {
        let mut buffer = RingBuffer::new(3);
        buffer.push(&[9.0]);
        buffer.push(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(buffer.snapshot(), vec![5.0, 6.0, 7.0]);

        buffer.push(&[8.0]);
        assert_eq!(buffer.snapshot(), vec![6.0, 7.0, 8.0]);
    }

    #[test]
    fn test_empty_push_is_noop() {
        let mut buffer = RingBuffer::new(3);
        buffer.push(&[1.0, 2.0]);
        buffer.push(&[]);
        assert_eq!(buffer.snapshot(), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_clear_zeroes_everything() {
        let mut buffer = RingBuffer::new(4);
        buffer.push(&[0.5, -0.5, 0.25, 0.75, 1.0]);
        buffer.clear();
        assert_eq!(buffer.snapshot(), vec![0.0; 4]);

        buffer.push(&[1.0]);
        assert_eq!(buffer.snapshot(), vec![0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_snapshot_into_reuses_allocation() {
        let mut buffer = RingBuffer::new(3);
        buffer.push(&[1.0, 2.0, 3.0, 4.0]);
        let mut out = vec![42.0; 10];
        buffer.snapshot_into(&mut out);
        assert_eq!(out, vec![2.0, 3.0, 4.0]);
    }
}
