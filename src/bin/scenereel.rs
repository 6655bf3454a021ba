use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "scenereel", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the computed scene timeline.
    Info(InfoArgs),
    /// Render the presentation at one timestamp as a still image.
    Frame(FrameArgs),
    /// Play the presentation headlessly in real time, logging player events.
    Play(PlayArgs),
    /// Capture the presentation into an MP4 (requires `ffmpeg` on PATH).
    Export(ExportArgs),
}

#[derive(Parser, Debug)]
struct SourceArgs {
    /// Scenes document: a path, inline JSON, or a `data:` URI.
    #[arg(long = "in")]
    source: String,

    /// Directory that relative document and media paths resolve against.
    /// Defaults to the document's directory, or the working directory.
    #[arg(long)]
    assets: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct CanvasArgs {
    #[arg(long, default_value_t = 1280)]
    width: u32,

    #[arg(long, default_value_t = 720)]
    height: u32,
}

#[derive(Parser, Debug)]
struct InfoArgs {
    #[command(flatten)]
    src: SourceArgs,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    #[command(flatten)]
    src: SourceArgs,

    #[command(flatten)]
    canvas: CanvasArgs,

    /// Timestamp in milliseconds (clamped to the timeline).
    #[arg(long, default_value_t = 0.0)]
    at_ms: f64,

    /// Output image path.
    #[arg(long)]
    out: PathBuf,

    #[arg(long, value_enum, default_value_t = ImageChoice::Png)]
    format: ImageChoice,

    /// JPEG quality (1..=100).
    #[arg(long, default_value_t = 80)]
    quality: u8,

    /// Hide the speech caption overlay.
    #[arg(long)]
    no_captions: bool,

    /// Extra directory of `.ttf`/`.otf`/`.ttc` fonts for text rendering.
    #[arg(long)]
    fonts: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct PlayArgs {
    #[command(flatten)]
    src: SourceArgs,

    /// Milliseconds between ticks.
    #[arg(long, default_value_t = 16)]
    tick_ms: u64,

    /// Start position in milliseconds.
    #[arg(long, default_value_t = 0.0)]
    from_ms: f64,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    #[command(flatten)]
    src: SourceArgs,

    #[command(flatten)]
    canvas: CanvasArgs,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    #[arg(long, default_value_t = 10)]
    fps: u32,

    /// Image format of intermediate frames.
    #[arg(long, value_enum, default_value_t = ImageChoice::Png)]
    format: ImageChoice,

    /// JPEG quality (1..=100) when `--format jpeg`.
    #[arg(long, default_value_t = 80)]
    quality: u8,

    /// Skip recording and muxing audio.
    #[arg(long)]
    no_audio: bool,

    #[arg(long, default_value_t = 23)]
    crf: u8,

    #[arg(long, default_value = "medium")]
    preset: String,

    /// Milliseconds between playback ticks while capturing.
    #[arg(long, default_value_t = 16)]
    tick_ms: u64,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ImageChoice {
    Png,
    Jpeg,
}

impl ImageChoice {
    fn still(self, quality: u8) -> scenereel::StillFormat {
        match self {
            ImageChoice::Png => scenereel::StillFormat::Png,
            ImageChoice::Jpeg => scenereel::StillFormat::Jpeg { quality },
        }
    }
}

fn main() -> anyhow::Result<()> {
    initialise_tracing();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Info(args) => cmd_info(args),
        Command::Frame(args) => cmd_frame(args),
        Command::Play(args) => cmd_play(args),
        Command::Export(args) => cmd_export(args),
    }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn assets_root(src: &SourceArgs) -> PathBuf {
    if let Some(dir) = &src.assets {
        return dir.clone();
    }
    let path = Path::new(src.source.trim());
    if path.is_file()
        && let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        return parent.to_path_buf();
    }
    PathBuf::from(".")
}

fn load_document(src: &SourceArgs) -> anyhow::Result<scenereel::SceneDocument> {
    use scenereel::SourceLoader as _;
    let doc = scenereel::DefaultSourceLoader::default()
        .load(&src.source)
        .with_context(|| "load scenes document")?;
    Ok(doc)
}

fn silent_player(canvas: scenereel::Canvas) -> scenereel::Player {
    let audio = scenereel::AudioSync::new(
        Box::new(scenereel::NullAudioChannel::new()),
        Box::new(scenereel::NullAudioChannel::new()),
    );
    let renderer = scenereel::SvgRenderer::new(scenereel::SvgRendererOpts {
        canvas,
        ..scenereel::SvgRendererOpts::default()
    });
    scenereel::Player::new(
        Arc::new(scenereel::SystemClock::new()),
        Box::new(renderer),
        audio,
    )
}

fn cmd_info(args: InfoArgs) -> anyhow::Result<()> {
    let doc = load_document(&args.src)?;
    let timeline = scenereel::SceneTimeline::build(&doc.scenes);

    println!(
        "{} scene(s), total {:.0} ms{}",
        timeline.len(),
        timeline.total_duration_ms(),
        doc.audio
            .as_deref()
            .map(|a| format!(", background audio '{a}'"))
            .unwrap_or_default()
    );
    println!("{:>3}  {:>9}  {:>9}  {:>9}  {:>5}  audio", "#", "start", "end", "dur", "words");
    for (i, scene) in timeline.scenes().iter().enumerate() {
        let words = scene.spec.speech.as_deref().map(scenereel::word_count).unwrap_or(0);
        println!(
            "{:>3}  {:>9.0}  {:>9.0}  {:>9.0}  {:>5}  {}{}",
            i,
            scene.start_ms,
            scene.end_ms,
            scene.duration_ms(),
            words,
            scene.spec.audio.as_deref().unwrap_or("-"),
            if scene.spec.pause_background {
                " (pauses background)"
            } else {
                ""
            }
        );
    }
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let canvas = scenereel::Canvas {
        width: args.canvas.width,
        height: args.canvas.height,
    };
    canvas.validate()?;
    let format = args.format.still(args.quality);
    format.validate()?;

    let doc = load_document(&args.src)?;
    let mut player = silent_player(canvas);
    player.load_document(doc)?;
    player.set_captions(!args.no_captions);
    player.seek_to(args.at_ms);

    let state = player.snapshot()?;
    let rasterizer = scenereel::SvgRasterizer::with_font_dir(canvas, args.fonts.as_deref());
    let frame = scenereel::Rasterizer::rasterize(&rasterizer, &state)?;
    let bytes = scenereel::encode_still(&frame, format, [255, 255, 255, 255])?;

    scenereel::ensure_parent_dir(&args.out)?;
    std::fs::write(&args.out, bytes)
        .with_context(|| format!("write image '{}'", args.out.display()))?;
    tracing::info!(
        t_ms = player.current_time_ms(),
        scene = player.scene_index(),
        out = %args.out.display(),
        "frame written"
    );
    Ok(())
}

fn cmd_play(args: PlayArgs) -> anyhow::Result<()> {
    let doc = load_document(&args.src)?;
    let mut player = silent_player(scenereel::Canvas::default());
    let events = player.subscribe();
    player.load_document(doc)?;
    player.seek_to(args.from_ms);

    let interval = Duration::from_millis(args.tick_ms.max(1));
    let mut last_second = -1i64;
    let mut pacer = scenereel::FnPacer(|| {
        for ev in events.try_iter() {
            log_event(&ev, &mut last_second);
        }
        std::thread::sleep(interval);
    });
    let end = player.run(&mut pacer);
    drop(pacer);
    for ev in events.try_iter() {
        log_event(&ev, &mut last_second);
    }
    tracing::info!(state = ?end, t_ms = player.current_time_ms(), "playback stopped");
    Ok(())
}

fn log_event(ev: &scenereel::PlayerEvent, last_second: &mut i64) {
    match ev {
        // One line per second of playback is plenty.
        scenereel::PlayerEvent::TimeUpdate { current_ms } => {
            let second = (*current_ms / 1000.0).floor() as i64;
            if second != *last_second {
                *last_second = second;
                tracing::info!(event = ev.name(), t_ms = %format!("{current_ms:.0}"));
            }
        }
        scenereel::PlayerEvent::Error { message } => {
            tracing::warn!(event = ev.name(), %message);
        }
        other => tracing::info!(event = other.name(), detail = ?other),
    }
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let opts = scenereel::ExportOpts {
        fps: scenereel::Fps::whole(args.fps)?,
        canvas: scenereel::Canvas {
            width: args.canvas.width,
            height: args.canvas.height,
        },
        image_format: args.format.still(args.quality),
        tick_interval: Duration::from_millis(args.tick_ms.max(1)),
        record_audio: !args.no_audio,
        mux: scenereel::MuxOpts {
            crf: args.crf,
            preset: args.preset.clone(),
            ..scenereel::MuxOpts::default()
        },
        ..scenereel::ExportOpts::default()
    };

    let root = assets_root(&args.src);
    let report = scenereel::export_to_file(&args.src.source, &args.out, opts, &root, None)
        .with_context(|| format!("export '{}'", args.out.display()))?;

    tracing::info!(
        frames = report.grid_frames,
        written = report.encoder.written.len(),
        serialized = report.encoder.serialized,
        reused = report.encoder.reused,
        audio_ms = report.audio_ms.unwrap_or(0.0),
        bytes = report.bytes,
        out = %args.out.display(),
        "export complete"
    );
    Ok(())
}
