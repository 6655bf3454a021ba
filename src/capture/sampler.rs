use crate::capture::grid::FrameGrid;
use crate::capture::queue::{CaptureJob, FrameQueueTx};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::ReelResult;
use crate::render::surface::VisualState;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SamplerStats {
    /// Snapshots taken (one per sampling call that had due grid points).
    pub snapshots: u64,
    pub jobs: u64,
    /// Jobs that reused an earlier snapshot because the live one failed.
    pub fallback_jobs: u64,
    pub failed_snapshots: u64,
    /// Grid slots filled with the final state once playback ended.
    pub filled_at_end: u64,
}

/// Producer side of capture: maps playback position onto the ideal frame grid.
///
/// Each call enqueues a job for every grid point that has elapsed since the previous call,
/// all carrying the same single snapshot, so a lagging clock never skips grid slots.
#[derive(Debug)]
pub struct FrameSampler {
    grid: FrameGrid,
    next: u64,
    queue: FrameQueueTx,
    last_good: Option<VisualState>,
    stats: SamplerStats,
}

impl FrameSampler {
    pub fn new(grid: FrameGrid, queue: FrameQueueTx) -> Self {
        Self {
            grid,
            next: 0,
            queue,
            last_good: None,
            stats: SamplerStats::default(),
        }
    }

    pub fn grid(&self) -> &FrameGrid {
        &self.grid
    }

    /// Index of the next grid slot waiting for a job.
    pub fn next_index(&self) -> FrameIndex {
        FrameIndex(self.next)
    }

    pub fn is_complete(&self) -> bool {
        self.next >= self.grid.len()
    }

    pub fn stats(&self) -> SamplerStats {
        self.stats
    }

    /// Sample at `position_ms`, taking at most one snapshot. Returns the number of jobs queued.
    ///
    /// A failed snapshot falls back to the last good one. Without any good snapshot yet the
    /// due slots stay pending and are caught up on a later call.
    pub fn sample<F>(&mut self, position_ms: f64, snapshot: F) -> ReelResult<u64>
    where
        F: FnOnce() -> ReelResult<VisualState>,
    {
        let due = self.grid.elapsed_through(position_ms);
        if due <= self.next {
            return Ok(0);
        }

        let (state, fallback) = match snapshot() {
            Ok(state) => {
                self.stats.snapshots += 1;
                self.last_good = Some(state.clone());
                (state, false)
            }
            Err(e) => {
                self.stats.failed_snapshots += 1;
                tracing::warn!(frame = self.next, error = %e, "snapshot failed");
                match self.last_good.clone() {
                    Some(state) => (state, true),
                    None => return Ok(0),
                }
            }
        };

        let queued = self.enqueue_until(due, &state)?;
        if fallback {
            self.stats.fallback_jobs += queued;
        }
        Ok(queued)
    }

    /// Playback ended: fill every remaining slot with the final state and close the queue.
    pub fn finish<F>(mut self, snapshot: F) -> ReelResult<SamplerStats>
    where
        F: FnOnce() -> ReelResult<VisualState>,
    {
        let end = self.grid.len();
        if self.next < end {
            let state = match snapshot() {
                Ok(state) => {
                    self.stats.snapshots += 1;
                    Some(state)
                }
                Err(e) => {
                    self.stats.failed_snapshots += 1;
                    tracing::warn!(error = %e, "final snapshot failed");
                    self.last_good.clone()
                }
            };
            if let Some(state) = state {
                let filled = self.enqueue_until(end, &state)?;
                self.stats.filled_at_end += filled;
            }
        }
        let stats = self.stats;
        self.queue.finish();
        Ok(stats)
    }

    /// Close the queue without filling the rest of the grid.
    pub fn cancel(self) -> SamplerStats {
        tracing::debug!(next = self.next, "capture sampling cancelled");
        let stats = self.stats;
        self.queue.finish();
        stats
    }

    fn enqueue_until(&mut self, end: u64, state: &VisualState) -> ReelResult<u64> {
        let start = self.next;
        for k in start..end {
            self.queue.push(CaptureJob::new(FrameIndex(k), state.clone()))?;
            self.next = k + 1;
            self.stats.jobs += 1;
        }
        Ok(end.saturating_sub(start))
    }
}
