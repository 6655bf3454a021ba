//! `capture_and_encode`: play a loaded document in real time while sampling frames and audio,
//! then hand everything to the muxer.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context as _;

use crate::audio::pcm::{FfmpegPcmDecoder, PcmChannel, PcmDecoder};
use crate::audio::recorder::{AudioBlob, AudioRecorder, RecorderOpts};
use crate::audio::sync::AudioSync;
use crate::capture::encoder::{EncodeStats, FrameEncoder};
use crate::capture::grid::FrameGrid;
use crate::capture::queue::frame_queue;
use crate::capture::sampler::{FrameSampler, SamplerStats};
use crate::encode::ffmpeg::{ExternalEncoder, FfmpegEncoder, ensure_parent_dir};
use crate::encode::mux::{MuxOpts, Muxer};
use crate::encode::workspace::{DirWorkspace, Workspace};
use crate::foundation::clock::{Clock, SystemClock};
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{ReelError, ReelResult};
use crate::player::pacing::{Pacer, SleepPacer};
use crate::player::{Player, TickOutcome};
use crate::render::raster::{Rasterizer, SvgRasterizer};
use crate::render::still::StillFormat;
use crate::render::surface::{SvgRenderer, SvgRendererOpts};

#[derive(Clone, Debug, PartialEq)]
pub struct ExportOpts {
    pub fps: Fps,
    pub canvas: Canvas,
    pub image_format: StillFormat,
    /// Cadence of playback ticks during capture.
    pub tick_interval: Duration,
    pub record_audio: bool,
    /// Color that transparent pixels are flattened onto.
    pub background_rgba: [u8; 4],
    pub mux: MuxOpts,
}

impl Default for ExportOpts {
    fn default() -> Self {
        Self {
            fps: Fps::default(),
            canvas: Canvas::default(),
            image_format: StillFormat::Png,
            tick_interval: Duration::from_millis(16),
            record_audio: true,
            background_rgba: [255, 255, 255, 255],
            mux: MuxOpts::default(),
        }
    }
}

impl ExportOpts {
    pub fn validate(&self) -> ReelResult<()> {
        Fps::new(self.fps.num, self.fps.den)?;
        self.canvas.validate()?;
        self.image_format.validate()?;
        if self.tick_interval.is_zero() {
            return Err(ReelError::validation("export tick_interval must be > 0"));
        }
        self.mux.validate()
    }
}

/// Shared flag that stops a running capture.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExportReport {
    /// Ideal frame grid length for the document.
    pub grid_frames: u64,
    pub sampler: SamplerStats,
    pub encoder: EncodeStats,
    pub audio_ms: Option<f64>,
    pub bytes: usize,
    pub output: Option<PathBuf>,
}

enum CaptureEnd {
    Finished,
    Cancelled,
}

/// Capture-and-encode driver with swappable rasterizer, encoder and workspace.
pub struct Exporter {
    opts: ExportOpts,
    rasterizer: Arc<dyn Rasterizer>,
    encoder: Arc<dyn ExternalEncoder>,
    workspace: Option<Arc<dyn Workspace>>,
    cancel: CancelToken,
}

impl Exporter {
    /// An exporter using `resvg` rasterization, system `ffmpeg` and a temp-dir workspace.
    pub fn new(opts: ExportOpts) -> ReelResult<Self> {
        opts.validate()?;
        Ok(Self {
            rasterizer: Arc::new(SvgRasterizer::new(opts.canvas)),
            encoder: Arc::new(FfmpegEncoder::new()),
            workspace: None,
            cancel: CancelToken::new(),
            opts,
        })
    }

    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    pub fn with_encoder(mut self, encoder: Arc<dyn ExternalEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Use this workspace instead of a fresh temp directory per export.
    pub fn with_workspace(mut self, workspace: Arc<dyn Workspace>) -> Self {
        self.workspace = Some(workspace);
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn opts(&self) -> &ExportOpts {
        &self.opts
    }

    /// Play `player` from the start, capture it, and return the muxed video bytes.
    ///
    /// `audio_taps` are the channels whose output is recorded; pass the clones of the
    /// channels the player's audio sync drives.
    #[tracing::instrument(skip_all, fields(fps = %self.opts.fps.ffmpeg_rate()))]
    pub fn capture_and_encode(
        &self,
        player: &mut Player,
        audio_taps: Vec<PcmChannel>,
        pacer: &mut dyn Pacer,
    ) -> ReelResult<(Vec<u8>, ExportReport)> {
        if !player.is_loaded() {
            return Err(ReelError::validation("capture requires a loaded document"));
        }
        let grid = FrameGrid::new(self.opts.fps, player.duration_ms());
        if grid.is_empty() {
            return Err(ReelError::validation("document has zero duration"));
        }

        let owned_ws;
        let ws: &dyn Workspace = match &self.workspace {
            Some(ws) => ws.as_ref(),
            None => {
                owned_ws = DirWorkspace::temp()?;
                &owned_ws
            }
        };

        let captured = self.capture(player, audio_taps, pacer, grid, ws);
        let (end, sampler, encoder, audio) = match captured {
            Ok(parts) => parts,
            Err(e) => {
                sweep_frames(ws, self.opts.image_format);
                return Err(e);
            }
        };
        if let CaptureEnd::Cancelled = end {
            tracing::info!(frames = encoder.written.len(), "capture cancelled");
            sweep_frames(ws, self.opts.image_format);
            return Err(ReelError::Cancelled);
        }

        tracing::info!(
            grid = grid.len(),
            written = encoder.written.len(),
            serialized = encoder.serialized,
            reused = encoder.reused,
            "capture finished"
        );

        let muxer = Muxer::new(self.opts.mux.clone())?;
        let bytes = muxer.finalize(
            ws,
            self.encoder.as_ref(),
            self.opts.fps,
            &encoder.frame_set(self.opts.image_format),
            audio.as_ref(),
        )?;

        let report = ExportReport {
            grid_frames: grid.len(),
            sampler,
            encoder,
            audio_ms: audio.as_ref().map(AudioBlob::duration_ms),
            bytes: bytes.len(),
            output: None,
        };
        Ok((bytes, report))
    }

    /// [`Exporter::capture_and_encode`] and write the result to `out_path`.
    pub fn capture_to_file(
        &self,
        player: &mut Player,
        audio_taps: Vec<PcmChannel>,
        pacer: &mut dyn Pacer,
        out_path: &Path,
    ) -> ReelResult<ExportReport> {
        let (bytes, mut report) = self.capture_and_encode(player, audio_taps, pacer)?;
        ensure_parent_dir(out_path)?;
        std::fs::write(out_path, &bytes)
            .with_context(|| format!("failed to write '{}'", out_path.display()))?;
        report.output = Some(out_path.to_path_buf());
        Ok(report)
    }

    fn capture(
        &self,
        player: &mut Player,
        audio_taps: Vec<PcmChannel>,
        pacer: &mut dyn Pacer,
        grid: FrameGrid,
        ws: &dyn Workspace,
    ) -> ReelResult<(CaptureEnd, SamplerStats, EncodeStats, Option<AudioBlob>)> {
        player.pause();
        player.seek_to(0.0);

        let (tx, rx) = frame_queue();
        let frame_encoder = FrameEncoder::new(
            self.rasterizer.as_ref(),
            ws,
            self.opts.image_format,
            self.opts.background_rgba,
        );

        std::thread::scope(|s| {
            let consumer = std::thread::Builder::new()
                .name("scenereel-frame-encoder".to_owned())
                .spawn_scoped(s, move || frame_encoder.run(rx))
                .map_err(|e| ReelError::encoder(format!("failed to spawn frame encoder: {e}")))?;

            let produced = self.produce(player, audio_taps, pacer, FrameSampler::new(grid, tx));

            let consumed = consumer
                .join()
                .map_err(|_| ReelError::encoder("frame encoder thread panicked"))?;
            // The consumer's failure explains any producer failure (a closed queue).
            let encoder_stats = consumed?;
            let (end, sampler_stats, audio) = produced?;
            Ok((end, sampler_stats, encoder_stats, audio))
        })
    }

    fn produce(
        &self,
        player: &mut Player,
        audio_taps: Vec<PcmChannel>,
        pacer: &mut dyn Pacer,
        sampler: FrameSampler,
    ) -> ReelResult<(CaptureEnd, SamplerStats, Option<AudioBlob>)> {
        let recording = if self.opts.record_audio {
            let recorder = AudioRecorder::new(
                audio_taps,
                Arc::clone(player.clock()),
                RecorderOpts::default(),
            )?;
            Some(recorder.spawn()?)
        } else {
            None
        };

        player.play();
        let (end, stats) = match self.drive(player, pacer, sampler) {
            Ok(parts) => parts,
            Err(e) => {
                // Dropping the session joins the recorder thread.
                player.pause();
                return Err(e);
            }
        };
        let audio = match recording {
            Some(session) => Some(session.stop()?),
            None => None,
        };
        Ok((end, stats, audio))
    }

    /// Tick and sample until playback ends, stops or is cancelled.
    fn drive(
        &self,
        player: &mut Player,
        pacer: &mut dyn Pacer,
        mut sampler: FrameSampler,
    ) -> ReelResult<(CaptureEnd, SamplerStats)> {
        let end = loop {
            sampler.sample(player.current_time_ms(), || player.snapshot())?;
            if self.cancel.is_cancelled() {
                player.pause();
                break CaptureEnd::Cancelled;
            }
            match player.tick() {
                TickOutcome::Continue => pacer.wait(),
                TickOutcome::Ended | TickOutcome::Stopped => break CaptureEnd::Finished,
            }
        };

        let stats = match end {
            CaptureEnd::Finished => sampler.finish(|| player.snapshot())?,
            CaptureEnd::Cancelled => sampler.cancel(),
        };
        Ok((end, stats))
    }
}

fn sweep_frames(ws: &dyn Workspace, format: StillFormat) {
    let suffix = format!(".{}", format.extension());
    for name in ws.names() {
        if name.starts_with("frame_") && name.ends_with(&suffix) {
            let _ = ws.delete(&name);
        }
    }
}

/// Load `source`, play it through real `PcmChannel`s on the system clock and export to
/// `out_path`. A document path resolves against the working directory; relative media paths
/// inside the document resolve against `assets_root`.
pub fn export_to_file(
    source: &str,
    out_path: &Path,
    opts: ExportOpts,
    assets_root: &Path,
    cancel: Option<CancelToken>,
) -> ReelResult<ExportReport> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let decoder: Arc<dyn PcmDecoder> = Arc::new(FfmpegPcmDecoder::new(assets_root));
    let background = PcmChannel::new(Arc::clone(&clock), Arc::clone(&decoder));
    let scene = PcmChannel::new(Arc::clone(&clock), decoder);
    let taps = vec![background.clone(), scene.clone()];

    let renderer = SvgRenderer::new(SvgRendererOpts {
        canvas: opts.canvas,
        ..SvgRendererOpts::default()
    });
    let mut player = Player::new(
        clock,
        Box::new(renderer),
        AudioSync::new(Box::new(background), Box::new(scene)),
    );
    player.load(source)?;

    let mut pacer = SleepPacer::new(opts.tick_interval);
    let mut exporter = Exporter::new(opts)?;
    if let Some(cancel) = cancel {
        exporter = exporter.with_cancel_token(cancel);
    }
    exporter.capture_to_file(&mut player, taps, &mut pacer, out_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_opts_are_valid() {
        ExportOpts::default().validate().unwrap();
    }

    #[test]
    fn odd_canvas_is_rejected() {
        let opts = ExportOpts {
            canvas: Canvas {
                width: 641,
                height: 480,
            },
            ..ExportOpts::default()
        };
        assert!(matches!(opts.validate(), Err(ReelError::Validation(_))));
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let a = CancelToken::new();
        let b = a.clone();
        b.cancel();
        assert!(a.is_cancelled());
    }
}
