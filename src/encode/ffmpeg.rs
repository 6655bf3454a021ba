use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::Context as _;

use crate::encode::workspace::Workspace;
use crate::foundation::core::Fps;
use crate::foundation::error::{ReelError, ReelResult};

pub(crate) const FFMPEG: &str = "ffmpeg";

/// Raw interleaved f32 audio stored in the workspace.
#[derive(Clone, Debug, PartialEq)]
pub struct RawAudioInput {
    pub name: String,
    pub sample_rate: u32,
    pub channels: u16,
}

/// One external encode step. Every name refers to a file in the workspace.
#[derive(Clone, Debug, PartialEq)]
pub enum EncodeCommand {
    /// Numbered still images at a fixed rate into a video-only stream.
    FramesToVideo {
        fps: Fps,
        pattern: String,
        start_number: u64,
        frame_count: u64,
        video_codec: String,
        preset: String,
        crf: u8,
        output: String,
    },
    /// Copy the video stream and add encoded audio, truncated to the shorter stream.
    Mux {
        video: String,
        audio: Option<RawAudioInput>,
        audio_codec: String,
        audio_bitrate: String,
        output: String,
    },
}

impl EncodeCommand {
    pub fn output(&self) -> &str {
        match self {
            Self::FramesToVideo { output, .. } | Self::Mux { output, .. } => output,
        }
    }

    /// ffmpeg arguments after the global flags.
    pub fn ffmpeg_args(&self) -> Vec<String> {
        let mut args: Vec<String> = Vec::new();
        let mut push = |items: &[&str]| args.extend(items.iter().map(|s| (*s).to_owned()));
        match self {
            Self::FramesToVideo {
                fps,
                pattern,
                start_number,
                frame_count,
                video_codec,
                preset,
                crf,
                output,
            } => {
                push(&[
                    "-framerate",
                    fps.ffmpeg_rate().as_str(),
                    "-start_number",
                    start_number.to_string().as_str(),
                    "-i",
                    pattern.as_str(),
                    "-frames:v",
                    frame_count.to_string().as_str(),
                    "-c:v",
                    video_codec.as_str(),
                    "-pix_fmt",
                    "yuv420p",
                    "-preset",
                    preset.as_str(),
                    "-crf",
                    crf.to_string().as_str(),
                    "-an",
                    output.as_str(),
                ]);
            }
            Self::Mux {
                video,
                audio,
                audio_codec,
                audio_bitrate,
                output,
            } => {
                push(&["-i", video.as_str()]);
                match audio {
                    Some(a) => push(&[
                        "-f",
                        "f32le",
                        "-ar",
                        a.sample_rate.to_string().as_str(),
                        "-ac",
                        a.channels.to_string().as_str(),
                        "-i",
                        a.name.as_str(),
                        "-map",
                        "0:v:0",
                        "-map",
                        "1:a:0",
                        "-c:v",
                        "copy",
                        "-c:a",
                        audio_codec.as_str(),
                        "-b:a",
                        audio_bitrate.as_str(),
                        "-shortest",
                    ]),
                    None => push(&["-c:v", "copy", "-an"]),
                }
                push(&["-movflags", "+faststart", output.as_str()]);
            }
        }
        args
    }
}

/// External encoder process collaborator. Only exit status and output bytes matter.
pub trait ExternalEncoder: Send + Sync {
    fn run(&self, workspace: &dyn Workspace, cmd: &EncodeCommand) -> ReelResult<()>;
}

/// Runs the system `ffmpeg` binary inside a directory-backed workspace.
#[derive(Clone, Debug, Default)]
pub struct FfmpegEncoder {
    _priv: (),
}

impl FfmpegEncoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExternalEncoder for FfmpegEncoder {
    #[tracing::instrument(skip(self, workspace, cmd), fields(output = cmd.output()))]
    fn run(&self, workspace: &dyn Workspace, cmd: &EncodeCommand) -> ReelResult<()> {
        let Some(dir) = workspace.local_dir() else {
            return Err(ReelError::encoder(
                "ffmpeg needs a directory-backed workspace",
            ));
        };
        if !is_ffmpeg_on_path() {
            return Err(ReelError::encoder(
                "ffmpeg is required for encoding, but was not found on PATH",
            ));
        }

        let args = cmd.ffmpeg_args();
        tracing::debug!(args = %args.join(" "), "running ffmpeg");
        let output = Command::new(FFMPEG)
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .args(&args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                ReelError::encoder(format!(
                    "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReelError::encoder(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        if !workspace.exists(cmd.output()) {
            return Err(ReelError::encoder(format!(
                "ffmpeg reported success but produced no '{}'",
                cmd.output()
            )));
        }
        Ok(())
    }
}

/// Whether the `ffmpeg` binary resolves on `PATH` and answers `-version`.
pub fn is_ffmpeg_on_path() -> bool {
    answers_version(FFMPEG)
}

fn answers_version(program: &str) -> bool {
    let status = Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    matches!(status, Ok(s) if s.success())
}

pub fn ensure_parent_dir(path: &Path) -> ReelResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}
