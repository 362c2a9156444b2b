use crate::error::{MotionCamError, Result};
use crate::frame::FrameData;
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Fixed-capacity FIFO of the most recent frames, oldest first.
///
/// Owned by the pipeline task. Snapshots are `Arc`-backed clones; frames
/// already handed to a recording are unaffected by later evictions.
pub struct RingBuffer {
    frames: VecDeque<FrameData>,
    capacity: usize,
    stats: RingBufferStats,
}

/// Counters for ring buffer monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RingBufferStats {
    /// Total frames pushed to buffer
    pub frames_pushed: u64,
    /// Frames discarded to make room for newer ones
    pub frames_evicted: u64,
}

impl RingBuffer {
    /// Create a new ring buffer holding at most `capacity` frames
    ///
    /// # Example
    /// ```
    /// use motioncam::ring_buffer::RingBuffer;
    ///
    /// let buffer = RingBuffer::new(15);
    /// assert_eq!(buffer.capacity(), 15);
    /// ```
    pub fn new(capacity: usize) -> Self {
        if capacity == 0 {
            panic!("Ring buffer capacity must be greater than 0");
        }

        debug!("Created ring buffer with capacity {}", capacity);

        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
            stats: RingBufferStats::default(),
        }
    }

    /// Append a frame, evicting the oldest one when full
    pub fn push(&mut self, frame: FrameData) {
        if self.frames.len() == self.capacity {
            if let Some(evicted) = self.frames.pop_front() {
                self.stats.frames_evicted += 1;
                trace!("Evicted frame {} from ring buffer", evicted.id);
            }
        }

        trace!("Pushing frame {} to ring buffer", frame.id);
        self.frames.push_back(frame);
        self.stats.frames_pushed += 1;
    }

    /// Current contents in capture order; the buffer itself is unchanged
    pub fn snapshot(&self) -> Vec<FrameData> {
        let frames: Vec<FrameData> = self.frames.iter().cloned().collect();
        debug!("Collected {} pre-trigger frames", frames.len());
        frames
    }

    /// Most recently pushed frame
    pub fn latest(&self) -> Option<&FrameData> {
        self.frames.back()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.frames.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> RingBufferStats {
        self.stats.clone()
    }
}

/// Builder for creating ring buffers with validated configuration
pub struct RingBufferBuilder {
    capacity: Option<usize>,
}

impl RingBufferBuilder {
    pub fn new() -> Self {
        Self { capacity: None }
    }

    /// Set the buffer capacity
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn build(self) -> Result<RingBuffer> {
        let capacity = self
            .capacity
            .ok_or_else(|| MotionCamError::system("Ring buffer capacity must be specified"))?;

        if capacity == 0 {
            return Err(MotionCamError::system(
                "Ring buffer capacity must be greater than 0",
            ));
        }

        Ok(RingBuffer::new(capacity))
    }
}

impl Default for RingBufferBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameFormat;
    use std::sync::Arc;
    use std::time::SystemTime;

    fn create_test_frame(id: u64) -> FrameData {
        FrameData::new(id, SystemTime::now(), vec![0u8; 16], 4, 4, FrameFormat::Gray8)
    }

    fn ids(frames: &[FrameData]) -> Vec<u64> {
        frames.iter().map(|f| f.id).collect()
    }

    #[test]
    fn test_ring_buffer_creation() {
        let buffer = RingBuffer::new(10);
        assert_eq!(buffer.capacity(), 10);
        assert!(buffer.is_empty());
        assert!(buffer.latest().is_none());
    }

    #[test]
    fn test_push_and_latest() {
        let mut buffer = RingBuffer::new(5);
        buffer.push(create_test_frame(1));
        buffer.push(create_test_frame(2));

        assert_eq!(buffer.latest().map(|f| f.id), Some(2));
        assert_eq!(buffer.len(), 2);
        assert!(!buffer.is_full());
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut buffer = RingBuffer::new(3);
        for i in 0..10 {
            buffer.push(create_test_frame(i));
            assert!(buffer.len() <= 3);
        }
        assert!(buffer.is_full());
        assert_eq!(buffer.stats().frames_pushed, 10);
        assert_eq!(buffer.stats().frames_evicted, 7);
    }

    #[test]
    fn test_snapshot_returns_last_frames_in_push_order() {
        let mut buffer = RingBuffer::new(4);
        for i in 1..=9 {
            buffer.push(create_test_frame(i));
        }

        let before = buffer.stats();
        let snapshot = buffer.snapshot();
        assert_eq!(ids(&snapshot), vec![6, 7, 8, 9]);

        // Snapshot does not drain or otherwise change the buffer
        assert_eq!(ids(&buffer.snapshot()), vec![6, 7, 8, 9]);
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.stats(), before);
    }

    #[test]
    fn test_snapshot_before_full() {
        let mut buffer = RingBuffer::new(5);
        buffer.push(create_test_frame(1));
        buffer.push(create_test_frame(2));
        assert_eq!(ids(&buffer.snapshot()), vec![1, 2]);
    }

    #[test]
    fn test_snapshot_survives_eviction() {
        let mut buffer = RingBuffer::new(2);
        buffer.push(create_test_frame(1));
        buffer.push(create_test_frame(2));

        let seed = buffer.snapshot();
        let payload = Arc::clone(&seed[0].data);

        buffer.push(create_test_frame(3));
        buffer.push(create_test_frame(4));

        assert_eq!(ids(&seed), vec![1, 2]);
        assert!(Arc::ptr_eq(&payload, &seed[0].data));
    }

    #[test]
    fn test_builder_validation() {
        assert!(RingBufferBuilder::new().build().is_err());
        assert!(RingBufferBuilder::new().capacity(0).build().is_err());

        let buffer = RingBufferBuilder::new().capacity(20).build().unwrap();
        assert_eq!(buffer.capacity(), 20);
    }

    #[test]
    #[should_panic(expected = "greater than 0")]
    fn test_zero_capacity_panics() {
        let _ = RingBuffer::new(0);
    }
}
