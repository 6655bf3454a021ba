use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use crate::audio::pcm::{MIX_SAMPLE_RATE, PcmChannel};
use crate::foundation::clock::Clock;
use crate::foundation::error::{ReelError, ReelResult};

#[derive(Clone, Debug, PartialEq)]
pub struct RecorderOpts {
    pub sample_rate: u32,
    pub channels: u16,
    pub poll_interval: Duration,
}

impl Default for RecorderOpts {
    fn default() -> Self {
        Self {
            sample_rate: MIX_SAMPLE_RATE,
            channels: 2,
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl RecorderOpts {
    pub fn validate(&self) -> ReelResult<()> {
        if self.sample_rate == 0 {
            return Err(ReelError::validation("recorder sample_rate must be > 0"));
        }
        if !(1..=2).contains(&self.channels) {
            return Err(ReelError::validation("recorder channels must be 1 or 2"));
        }
        if self.poll_interval.is_zero() {
            return Err(ReelError::validation("recorder poll_interval must be > 0"));
        }
        Ok(())
    }
}

/// A contiguous run of mixed interleaved samples.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioChunk {
    pub first_frame: u64,
    pub interleaved_f32: Vec<f32>,
}

/// Everything a recording session captured, in capture order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AudioBlob {
    pub sample_rate: u32,
    pub channels: u16,
    pub interleaved_f32: Vec<f32>,
}

impl AudioBlob {
    pub fn frames(&self) -> usize {
        self.interleaved_f32.len() / usize::from(self.channels.max(1))
    }

    pub fn duration_ms(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 * 1000.0 / f64::from(self.sample_rate)
    }

    /// True when nothing audible was captured.
    pub fn is_silent(&self) -> bool {
        self.interleaved_f32.iter().all(|s| *s == 0.0)
    }

    pub fn to_f32le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.interleaved_f32.len() * 4);
        for s in &self.interleaved_f32 {
            out.extend_from_slice(&s.clamp(-1.0, 1.0).to_le_bytes());
        }
        out
    }
}

/// Taps playing channels and mixes what they output since the last poll.
///
/// The emitted frame count tracks elapsed clock time, so chunk boundaries never drop or
/// duplicate samples no matter how irregular polling is.
pub struct AudioRecorder {
    taps: Vec<PcmChannel>,
    clock: Arc<dyn Clock>,
    opts: RecorderOpts,
    start_ms: f64,
    emitted_frames: u64,
}

impl AudioRecorder {
    pub fn new(taps: Vec<PcmChannel>, clock: Arc<dyn Clock>, opts: RecorderOpts) -> ReelResult<Self> {
        opts.validate()?;
        let start_ms = clock.now_ms();
        Ok(Self {
            taps,
            clock,
            opts,
            start_ms,
            emitted_frames: 0,
        })
    }

    pub fn opts(&self) -> &RecorderOpts {
        &self.opts
    }

    /// Mix the samples produced since the previous poll. `None` when no new frame is due.
    pub fn poll(&mut self) -> Option<AudioChunk> {
        let elapsed = (self.clock.now_ms() - self.start_ms).max(0.0);
        let target = (elapsed * f64::from(self.opts.sample_rate) / 1000.0).floor() as u64;
        let due = target.saturating_sub(self.emitted_frames);
        if due == 0 {
            return None;
        }

        let frames = due as usize;
        let mut buf = vec![0.0f32; frames * usize::from(self.opts.channels)];
        for tap in &self.taps {
            tap.mix_recent(&mut buf, frames, self.opts.channels, self.opts.sample_rate);
        }

        let chunk = AudioChunk {
            first_frame: self.emitted_frames,
            interleaved_f32: buf,
        };
        self.emitted_frames = target;
        Some(chunk)
    }

    /// Run the recorder on a background thread until [`RecordingSession::stop`].
    pub fn spawn(self) -> ReelResult<RecordingSession> {
        let (tx, rx) = mpsc::channel::<AudioChunk>();
        let stop = Arc::new(AtomicBool::new(false));
        let sample_rate = self.opts.sample_rate;
        let channels = self.opts.channels;
        let interval = self.opts.poll_interval;

        let stop_flag = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name("scenereel-audio-recorder".to_owned())
            .spawn(move || {
                let mut rec = self;
                while !stop_flag.load(Ordering::Acquire) {
                    if let Some(chunk) = rec.poll()
                        && tx.send(chunk).is_err()
                    {
                        return;
                    }
                    std::thread::sleep(interval);
                }
                if let Some(chunk) = rec.poll() {
                    let _ = tx.send(chunk);
                }
            })
            .map_err(|e| ReelError::audio(format!("failed to spawn recorder thread: {e}")))?;

        tracing::debug!(sample_rate, channels, "audio recording started");
        Ok(RecordingSession {
            stop,
            handle: Some(handle),
            rx,
            sample_rate,
            channels,
        })
    }
}

/// A recorder running on its own thread.
pub struct RecordingSession {
    stop: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
    rx: mpsc::Receiver<AudioChunk>,
    sample_rate: u32,
    channels: u16,
}

impl RecordingSession {
    /// Take a final window, join the thread and concatenate every chunk in order.
    pub fn stop(mut self) -> ReelResult<AudioBlob> {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| ReelError::audio("audio recorder thread panicked"))?;
        }

        let mut blob = AudioBlob {
            sample_rate: self.sample_rate,
            channels: self.channels,
            interleaved_f32: Vec::new(),
        };
        for chunk in self.rx.try_iter() {
            blob.interleaved_f32.extend_from_slice(&chunk.interleaved_f32);
        }
        tracing::debug!(duration_ms = blob.duration_ms(), "audio recording stopped");
        Ok(blob)
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
