use crate::foundation::core::{FrameIndex, Fps};

/// Ideal fixed-rate capture timestamps `0, 1/F, 2/F, ...` strictly below the duration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameGrid {
    fps: Fps,
    total_ms: f64,
    len: u64,
}

impl FrameGrid {
    pub fn new(fps: Fps, total_ms: f64) -> Self {
        let total_ms = if total_ms.is_finite() { total_ms.max(0.0) } else { 0.0 };
        let mut len = (total_ms / fps.frame_duration_ms()).ceil() as u64;
        // Float rounding can put the estimate one off in either direction.
        while len > 0 && fps.frame_time_ms(FrameIndex(len - 1)) >= total_ms {
            len -= 1;
        }
        while fps.frame_time_ms(FrameIndex(len)) < total_ms {
            len += 1;
        }
        Self { fps, total_ms, len }
    }

    pub fn fps(&self) -> Fps {
        self.fps
    }

    pub fn total_ms(&self) -> f64 {
        self.total_ms
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn time_ms(&self, idx: FrameIndex) -> f64 {
        self.fps.frame_time_ms(idx)
    }

    /// Number of grid points at or before `position_ms`, capped at the grid length.
    pub fn elapsed_through(&self, position_ms: f64) -> u64 {
        if self.len == 0 || position_ms.is_nan() || position_ms < 0.0 {
            return 0;
        }
        let mut n = ((position_ms / self.fps.frame_duration_ms()).floor() as u64)
            .saturating_add(1)
            .min(self.len);
        while n > 0 && self.time_ms(FrameIndex(n - 1)) > position_ms {
            n -= 1;
        }
        while n < self.len && self.time_ms(FrameIndex(n)) <= position_ms {
            n += 1;
        }
        n
    }
}
