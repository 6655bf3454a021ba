//! scenereel plays declarative scene documents on a millisecond timeline and captures them
//! into video.
//!
//! - Load a [`SceneDocument`] into a [`Player`] and drive it with [`Player::tick`]
//! - Keep background and per-scene audio aligned with [`AudioSync`]
//! - Capture playback onto a fixed [`FrameGrid`] and mux it with [`Exporter`]
#![forbid(unsafe_code)]

mod foundation;

pub(crate) mod audio;
pub(crate) mod capture;
pub(crate) mod encode;
pub(crate) mod export;
pub(crate) mod player;
pub(crate) mod render;
pub(crate) mod scene;
pub(crate) mod timeline;

pub use crate::foundation::clock::{Clock, ManualClock, SystemClock};
pub use crate::foundation::core::{Canvas, Fps, FrameIndex};
pub use crate::foundation::error::{ReelError, ReelResult};

pub use crate::scene::load::{DefaultSourceLoader, SourceLoader};
pub use crate::scene::model::{
    DEFAULT_SCENE_MS, MS_PER_SPOKEN_WORD, SceneDocument, SceneDuration, SceneSpec, word_count,
};
pub use crate::timeline::{ProcessedScene, SceneTimeline};

pub use crate::render::raster::{FrameRGBA, Rasterizer, SvgRasterizer};
pub use crate::render::still::{StillFormat, encode_still};
pub use crate::render::surface::{
    ContentSignature, Renderer, ScenePresentation, SvgRenderer, SvgRendererOpts, VisualState,
};

pub use crate::audio::channel::{AudioChannel, NullAudioChannel};
pub use crate::audio::pcm::{
    AudioPcm, FfmpegPcmDecoder, MIX_SAMPLE_RATE, PcmChannel, PcmDecoder, StaticPcmDecoder,
};
pub use crate::audio::recorder::{
    AudioBlob, AudioChunk, AudioRecorder, RecorderOpts, RecordingSession,
};
pub use crate::audio::sync::{AudioSync, AudioSyncState, RESYNC_TOLERANCE_MS};

pub use crate::player::events::PlayerEvent;
pub use crate::player::pacing::{FnPacer, Pacer, SleepPacer};
pub use crate::player::{PlaybackState, Player, TickOutcome};

pub use crate::capture::encoder::{EncodeStats, FrameEncoder, frame_name, frame_pattern};
pub use crate::capture::grid::FrameGrid;
pub use crate::capture::queue::{CaptureJob, FrameQueueRx, FrameQueueTx, frame_queue};
pub use crate::capture::sampler::{FrameSampler, SamplerStats};

pub use crate::encode::ffmpeg::{
    EncodeCommand, ExternalEncoder, FfmpegEncoder, RawAudioInput, ensure_parent_dir,
    is_ffmpeg_on_path,
};
pub use crate::encode::mux::{AUDIO_FILE, FrameSet, INTERMEDIATE_FILE, MuxOpts, Muxer, OUTPUT_FILE};
pub use crate::encode::workspace::{DirWorkspace, MemoryWorkspace, Workspace, validate_name};

pub use crate::export::{CancelToken, ExportOpts, ExportReport, Exporter, export_to_file};
