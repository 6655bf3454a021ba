use std::time::Duration;

/// Waits between two playback ticks.
///
/// Tick deltas always come from the clock, so a pacer only sets cadence and never affects
/// where playback ends up.
pub trait Pacer {
    fn wait(&mut self);
}

/// Real-time pacing with a thread sleep.
#[derive(Clone, Copy, Debug)]
pub struct SleepPacer {
    pub interval: Duration,
}

impl SleepPacer {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for SleepPacer {
    fn default() -> Self {
        Self::new(Duration::from_millis(16))
    }
}

impl Pacer for SleepPacer {
    fn wait(&mut self) {
        std::thread::sleep(self.interval);
    }
}

/// Pacer backed by a closure; tests use it to advance a manual clock.
pub struct FnPacer<F>(pub F);

impl<F: FnMut()> Pacer for FnPacer<F> {
    fn wait(&mut self) {
        (self.0)();
    }
}
