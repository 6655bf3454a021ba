use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::audio::channel::AudioChannel;
use crate::encode::ffmpeg::FFMPEG;
use crate::foundation::clock::Clock;
use crate::foundation::error::{ReelError, ReelResult};

/// Sample rate used for decoding, mixing and recording.
pub const MIX_SAMPLE_RATE: u32 = 48_000;

/// Decoded interleaved floating-point PCM.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioPcm {
    pub sample_rate: u32,
    pub channels: u16,
    pub interleaved_f32: Vec<f32>,
}

impl AudioPcm {
    pub fn frames(&self) -> usize {
        self.interleaved_f32.len() / usize::from(self.channels.max(1))
    }

    pub fn duration_ms(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 * 1000.0 / f64::from(self.sample_rate)
    }
}

/// Turns an audio URI into PCM.
pub trait PcmDecoder: Send + Sync {
    fn decode(&self, uri: &str) -> ReelResult<AudioPcm>;
}

/// Decoder that shells out to the system `ffmpeg`, producing stereo `f32le`.
#[derive(Clone, Debug)]
pub struct FfmpegPcmDecoder {
    assets_root: PathBuf,
    sample_rate: u32,
}

impl FfmpegPcmDecoder {
    pub fn new(assets_root: impl Into<PathBuf>) -> Self {
        Self {
            assets_root: assets_root.into(),
            sample_rate: MIX_SAMPLE_RATE,
        }
    }

    fn resolve(&self, uri: &str) -> String {
        if uri.contains("://") && !uri.starts_with("file://") {
            return uri.to_owned();
        }
        let path = Path::new(uri.strip_prefix("file://").unwrap_or(uri));
        if path.is_absolute() {
            path.display().to_string()
        } else {
            self.assets_root.join(path).display().to_string()
        }
    }
}

impl PcmDecoder for FfmpegPcmDecoder {
    #[tracing::instrument(skip(self))]
    fn decode(&self, uri: &str) -> ReelResult<AudioPcm> {
        let input = self.resolve(uri);
        let out = std::process::Command::new(FFMPEG)
            .args(["-v", "error", "-i"])
            .arg(&input)
            .args([
                "-vn",
                "-f",
                "f32le",
                "-acodec",
                "pcm_f32le",
                "-ac",
                "2",
                "-ar",
                &self.sample_rate.to_string(),
                "pipe:1",
            ])
            .output()
            .map_err(|e| ReelError::audio(format!("failed to run ffmpeg for audio decode: {e}")))?;

        if !out.status.success() {
            return Err(ReelError::audio(format!(
                "ffmpeg audio decode failed for '{input}': {}",
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        if !out.stdout.len().is_multiple_of(4) {
            return Err(ReelError::audio(
                "decoded audio byte length is not aligned to f32 samples",
            ));
        }
        let interleaved_f32 = out
            .stdout
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        Ok(AudioPcm {
            sample_rate: self.sample_rate,
            channels: 2,
            interleaved_f32,
        })
    }
}

/// In-memory decoder keyed by URI, for tests and pre-decoded assets.
#[derive(Clone, Debug, Default)]
pub struct StaticPcmDecoder {
    sources: HashMap<String, Arc<AudioPcm>>,
}

impl StaticPcmDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, uri: impl Into<String>, pcm: AudioPcm) -> Self {
        self.sources.insert(uri.into(), Arc::new(pcm));
        self
    }
}

impl PcmDecoder for StaticPcmDecoder {
    fn decode(&self, uri: &str) -> ReelResult<AudioPcm> {
        self.sources
            .get(uri)
            .map(|pcm| pcm.as_ref().clone())
            .ok_or_else(|| ReelError::audio(format!("unknown audio source '{uri}'")))
    }
}

#[derive(Debug)]
struct PcmChannelState {
    source: Option<String>,
    pcm: Option<Arc<AudioPcm>>,
    playing: bool,
    anchor_pos_ms: f64,
    anchor_clock_ms: f64,
    volume: f32,
}

impl PcmChannelState {
    fn position_at(&self, now_ms: f64) -> f64 {
        let pos = if self.playing {
            self.anchor_pos_ms + (now_ms - self.anchor_clock_ms).max(0.0)
        } else {
            self.anchor_pos_ms
        };
        match &self.pcm {
            Some(pcm) => pos.min(pcm.duration_ms()),
            None => pos,
        }
    }

    fn audible_at(&self, now_ms: f64) -> bool {
        match &self.pcm {
            Some(pcm) => self.playing && self.position_at(now_ms) < pcm.duration_ms(),
            None => false,
        }
    }
}

/// Audio channel backed by decoded PCM and a clock-driven playhead.
///
/// Clones share the same channel, so the recorder can tap a channel the player controls.
#[derive(Clone)]
pub struct PcmChannel {
    state: Arc<Mutex<PcmChannelState>>,
    clock: Arc<dyn Clock>,
    decoder: Arc<dyn PcmDecoder>,
}

impl PcmChannel {
    pub fn new(clock: Arc<dyn Clock>, decoder: Arc<dyn PcmDecoder>) -> Self {
        Self {
            state: Arc::new(Mutex::new(PcmChannelState {
                source: None,
                pcm: None,
                playing: false,
                anchor_pos_ms: 0.0,
                anchor_clock_ms: 0.0,
                volume: 1.0,
            })),
            clock,
            decoder,
        }
    }

    /// Mix the last `frames` output frames that this channel played, ending now, into `out`.
    ///
    /// `out` is interleaved with `channels` channels; mono sources are duplicated and extra
    /// source channels beyond stereo are ignored.
    pub fn mix_recent(&self, out: &mut [f32], frames: usize, channels: u16, sample_rate: u32) {
        let now = self.clock.now_ms();
        let st = self.state.lock();
        let Some(pcm) = st.pcm.as_ref() else {
            return;
        };
        if !st.playing || frames == 0 || sample_rate == 0 {
            return;
        }

        let out_ch = usize::from(channels.max(1));
        let src_ch = usize::from(pcm.channels.max(1));
        let src_frames = pcm.frames();
        let end_ms = st.position_at(now);
        let window_ms = frames as f64 * 1000.0 / f64::from(sample_rate);
        let start_ms = end_ms - window_ms;
        let gain = st.volume;

        for i in 0..frames.min(out.len() / out_ch) {
            let t_ms = start_ms + i as f64 * 1000.0 / f64::from(sample_rate);
            if t_ms < 0.0 {
                continue;
            }
            let src_frame = (t_ms * f64::from(pcm.sample_rate) / 1000.0) as usize;
            if src_frame >= src_frames {
                break;
            }
            let base = src_frame * src_ch;
            let l = pcm.interleaved_f32[base];
            let r = if src_ch > 1 {
                pcm.interleaved_f32[base + 1]
            } else {
                l
            };
            let dst = i * out_ch;
            out[dst] += l * gain;
            if out_ch > 1 {
                out[dst + 1] += r * gain;
            }
        }
    }
}

impl std::fmt::Debug for PcmChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.state.lock();
        f.debug_struct("PcmChannel")
            .field("source", &st.source)
            .field("playing", &st.playing)
            .field("volume", &st.volume)
            .finish()
    }
}

impl AudioChannel for PcmChannel {
    fn load(&mut self, uri: Option<&str>) -> ReelResult<()> {
        let decoded = uri.map(|u| self.decoder.decode(u));
        let now = self.clock.now_ms();
        let mut st = self.state.lock();
        st.source = uri.map(str::to_owned);
        st.playing = false;
        st.anchor_pos_ms = 0.0;
        st.anchor_clock_ms = now;
        match decoded {
            None => {
                st.pcm = None;
                Ok(())
            }
            Some(Ok(pcm)) => {
                st.pcm = Some(Arc::new(pcm));
                Ok(())
            }
            Some(Err(e)) => {
                st.pcm = None;
                Err(e)
            }
        }
    }

    fn source(&self) -> Option<String> {
        self.state.lock().source.clone()
    }

    fn play(&mut self) -> ReelResult<()> {
        let now = self.clock.now_ms();
        let mut st = self.state.lock();
        if st.pcm.is_none() {
            return Err(ReelError::audio("no playable source loaded"));
        }
        if !st.playing {
            st.anchor_clock_ms = now;
            st.playing = true;
        }
        Ok(())
    }

    fn pause(&mut self) {
        let now = self.clock.now_ms();
        let mut st = self.state.lock();
        st.anchor_pos_ms = st.position_at(now);
        st.anchor_clock_ms = now;
        st.playing = false;
    }

    fn is_playing(&self) -> bool {
        let now = self.clock.now_ms();
        self.state.lock().audible_at(now)
    }

    fn position_ms(&self) -> f64 {
        let now = self.clock.now_ms();
        self.state.lock().position_at(now)
    }

    fn set_position_ms(&mut self, ms: f64) -> ReelResult<()> {
        if !ms.is_finite() {
            return Err(ReelError::audio("audio position must be finite"));
        }
        let now = self.clock.now_ms();
        let mut st = self.state.lock();
        let max = st.pcm.as_ref().map(|p| p.duration_ms()).unwrap_or(f64::MAX);
        st.anchor_pos_ms = ms.clamp(0.0, max);
        st.anchor_clock_ms = now;
        Ok(())
    }

    fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.state.lock().volume = volume.clamp(0.0, 1.0);
    }
}
