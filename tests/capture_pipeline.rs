use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use std::path::Path;
use std::time::Duration;

use scenereel::{
    AudioChannel, AudioPcm, AudioSync, CancelToken, Canvas, Clock, EncodeCommand, ExportOpts,
    Exporter, ExternalEncoder, FnPacer, FrameRGBA, ManualClock, MemoryWorkspace,
    NullAudioChannel, PcmChannel, PlaybackState, Player, Rasterizer, ReelError, ReelResult,
    SceneDocument, StaticPcmDecoder, SvgRenderer, SvgRendererOpts, VisualState, Workspace,
};

const DOC: &str = r#"{"scenes":[
    {"html":"<p>first</p>","duration":1},
    {"html":"<p>second</p>","duration":1}
]}"#;

#[derive(Default)]
struct CountingRasterizer {
    calls: AtomicU64,
}

impl Rasterizer for CountingRasterizer {
    fn rasterize(&self, state: &VisualState) -> ReelResult<FrameRGBA> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let shade = (state.document().len() % 251) as u8;
        Ok(FrameRGBA::solid(4, 4, [shade, 10, 20, 255]))
    }
}

/// Records commands and writes a placeholder for each output, optionally failing a phase.
#[derive(Default)]
struct FakeEncoder {
    commands: Mutex<Vec<EncodeCommand>>,
    fail_frames_phase: bool,
}

impl ExternalEncoder for FakeEncoder {
    fn run(&self, workspace: &dyn Workspace, cmd: &EncodeCommand) -> ReelResult<()> {
        self.commands.lock().push(cmd.clone());
        if self.fail_frames_phase && matches!(cmd, EncodeCommand::FramesToVideo { .. }) {
            return Err(ReelError::encoder("ffmpeg exited with status 1"));
        }
        workspace.write(cmd.output(), b"fake mp4")
    }
}

struct Rig {
    clock: Arc<ManualClock>,
    player: Player,
    rasterizer: Arc<CountingRasterizer>,
    encoder: Arc<FakeEncoder>,
    workspace: Arc<MemoryWorkspace>,
}

fn rig(encoder: FakeEncoder) -> Rig {
    let clock = Arc::new(ManualClock::new(0.0));
    let renderer = SvgRenderer::new(SvgRendererOpts {
        canvas: Canvas {
            width: 64,
            height: 64,
        },
        ..SvgRendererOpts::default()
    });
    let mut player = Player::new(
        clock.clone(),
        Box::new(renderer),
        AudioSync::new(
            Box::new(NullAudioChannel::new()),
            Box::new(NullAudioChannel::new()),
        ),
    );
    player
        .load_document(SceneDocument::from_json_str(DOC).unwrap())
        .unwrap();
    Rig {
        clock,
        player,
        rasterizer: Arc::new(CountingRasterizer::default()),
        encoder: Arc::new(encoder),
        workspace: Arc::new(MemoryWorkspace::new()),
    }
}

fn exporter(rig: &Rig, record_audio: bool) -> Exporter {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let opts = ExportOpts {
        canvas: Canvas {
            width: 64,
            height: 64,
        },
        record_audio,
        ..ExportOpts::default()
    };
    Exporter::new(opts)
        .unwrap()
        .with_rasterizer(rig.rasterizer.clone())
        .with_encoder(rig.encoder.clone())
        .with_workspace(rig.workspace.clone())
}

#[test]
fn steady_capture_produces_one_job_per_grid_point() {
    let mut rig = rig(FakeEncoder::default());
    let exporter = exporter(&rig, false);
    let clock = rig.clock.clone();
    let mut pacer = FnPacer(|| clock.advance_ms(100.0));

    let (bytes, report) = exporter
        .capture_and_encode(&mut rig.player, Vec::new(), &mut pacer)
        .unwrap();

    assert_eq!(bytes, b"fake mp4");
    assert_eq!(report.grid_frames, 20);
    assert_eq!(report.sampler.jobs, 20);
    assert_eq!(report.sampler.snapshots, 20);
    assert_eq!(report.sampler.filled_at_end, 0);
    assert_eq!(report.encoder.written.len(), 20);
    // Two distinct scenes, so only two frames are ever rasterized.
    assert_eq!(report.encoder.serialized, 2);
    assert_eq!(report.encoder.reused, 18);
    assert_eq!(rig.rasterizer.calls.load(Ordering::SeqCst), 2);
    assert_eq!(rig.player.state(), PlaybackState::Ended);
    assert!(rig.workspace.is_empty());

    let commands = rig.encoder.commands.lock();
    assert!(matches!(
        &commands[0],
        EncodeCommand::FramesToVideo {
            start_number: 0,
            frame_count: 20,
            ..
        }
    ));
    assert!(matches!(&commands[1], EncodeCommand::Mux { audio: None, .. }));
}

#[test]
fn lagging_clock_still_fills_the_grid() {
    let mut rig = rig(FakeEncoder::default());
    let exporter = exporter(&rig, false);
    let clock = rig.clock.clone();
    let mut pacer = FnPacer(|| clock.advance_ms(450.0));

    let (_, report) = exporter
        .capture_and_encode(&mut rig.player, Vec::new(), &mut pacer)
        .unwrap();

    assert_eq!(report.sampler.jobs, 20);
    assert!(report.sampler.snapshots < 20);
    assert_eq!(report.encoder.written.len(), 20);
}

#[test]
fn recorded_audio_matches_playback_length() {
    let mut rig = rig(FakeEncoder::default());
    let exporter = exporter(&rig, true);
    let clock = rig.clock.clone();
    let mut pacer = FnPacer(|| clock.advance_ms(100.0));

    let (_, report) = exporter
        .capture_and_encode(&mut rig.player, Vec::new(), &mut pacer)
        .unwrap();

    assert_eq!(report.audio_ms, Some(2000.0));
    let commands = rig.encoder.commands.lock();
    assert!(matches!(
        &commands[1],
        EncodeCommand::Mux { audio: Some(a), .. } if a.sample_rate == 48_000 && a.channels == 2
    ));
    assert!(rig.workspace.is_empty());
}

#[test]
fn cancel_stops_capture_and_cleans_up() {
    let mut rig = rig(FakeEncoder::default());
    let cancel = CancelToken::new();
    let exporter = exporter(&rig, false).with_cancel_token(cancel.clone());
    let clock = rig.clock.clone();
    let mut pacer = FnPacer(|| {
        clock.advance_ms(100.0);
        if clock.now_ms() >= 500.0 {
            cancel.cancel();
        }
    });

    let err = exporter
        .capture_and_encode(&mut rig.player, Vec::new(), &mut pacer)
        .unwrap_err();

    assert!(matches!(err, ReelError::Cancelled));
    assert_eq!(rig.player.state(), PlaybackState::Paused);
    assert!(rig.encoder.commands.lock().is_empty());
    assert!(rig.workspace.is_empty());
}

#[test]
fn encoder_failure_is_fatal_and_cleans_up() {
    let mut rig = rig(FakeEncoder {
        fail_frames_phase: true,
        ..FakeEncoder::default()
    });
    let exporter = exporter(&rig, true);
    let clock = rig.clock.clone();
    let mut pacer = FnPacer(|| clock.advance_ms(100.0));

    let err = exporter
        .capture_and_encode(&mut rig.player, Vec::new(), &mut pacer)
        .unwrap_err();

    assert!(matches!(err, ReelError::Encoder(_)));
    assert!(err.to_string().starts_with("encoder error:"));
    assert!(rig.workspace.is_empty());
}

#[test]
fn capture_requires_a_loaded_document() {
    let clock = Arc::new(ManualClock::new(0.0));
    let mut player = Player::new(
        clock,
        Box::new(SvgRenderer::default()),
        AudioSync::new(
            Box::new(NullAudioChannel::new()),
            Box::new(NullAudioChannel::new()),
        ),
    );
    let err = Exporter::new(ExportOpts::default())
        .unwrap()
        .with_encoder(Arc::new(FakeEncoder::default()))
        .with_workspace(Arc::new(MemoryWorkspace::new()))
        .capture_and_encode(&mut player, Vec::new(), &mut FnPacer(|| {}))
        .unwrap_err();
    assert!(matches!(err, ReelError::Validation(_)));
}

/// Accepts nothing: every write fails as if the disk were full.
struct FullDisk;

impl Workspace for FullDisk {
    fn write(&self, _name: &str, _bytes: &[u8]) -> ReelResult<()> {
        Err(ReelError::encoder("disk full"))
    }
    fn read(&self, name: &str) -> ReelResult<Vec<u8>> {
        Err(ReelError::encoder(format!("'{name}' not found")))
    }
    fn delete(&self, _name: &str) -> ReelResult<()> {
        Ok(())
    }
    fn exists(&self, _name: &str) -> bool {
        false
    }
    fn names(&self) -> Vec<String> {
        Vec::new()
    }
    fn local_dir(&self) -> Option<&Path> {
        None
    }
}

#[test]
fn failed_frame_write_leaves_player_and_audio_stopped() {
    let clock = Arc::new(ManualClock::new(0.0));
    let decoder = Arc::new(StaticPcmDecoder::new().with_source(
        "music.wav",
        AudioPcm {
            sample_rate: 1000,
            channels: 2,
            interleaved_f32: vec![0.2; 60 * 2000],
        },
    ));
    let background = PcmChannel::new(clock.clone(), decoder.clone());
    let scene = PcmChannel::new(clock.clone(), decoder);
    let mut player = Player::new(
        clock.clone(),
        Box::new(SvgRenderer::default()),
        AudioSync::new(Box::new(background.clone()), Box::new(scene.clone())),
    );
    let doc = r#"{"audio":"music.wav","scenes":[
        {"html":"<p>first</p>","duration":1},
        {"html":"<p>second</p>","duration":1}
    ]}"#;
    player
        .load_document(SceneDocument::from_json_str(doc).unwrap())
        .unwrap();

    let exporter = Exporter::new(ExportOpts {
        record_audio: false,
        ..ExportOpts::default()
    })
    .unwrap()
    .with_rasterizer(Arc::new(CountingRasterizer::default()))
    .with_encoder(Arc::new(FakeEncoder::default()))
    .with_workspace(Arc::new(FullDisk));
    let mut pacer = FnPacer(|| {
        std::thread::sleep(Duration::from_millis(5));
        clock.advance_ms(100.0);
    });

    let err = exporter
        .capture_and_encode(&mut player, vec![background.clone(), scene], &mut pacer)
        .unwrap_err();

    assert!(matches!(err, ReelError::Encoder(_)));
    assert_ne!(player.state(), PlaybackState::Playing);
    assert!(player.paused());
    assert!(!background.is_playing());

    let t = player.current_time_ms();
    clock.advance_ms(500.0);
    player.tick();
    assert_eq!(player.current_time_ms(), t);
}
