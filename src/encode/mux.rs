use crate::audio::recorder::AudioBlob;
use crate::encode::ffmpeg::{EncodeCommand, ExternalEncoder, RawAudioInput};
use crate::encode::workspace::Workspace;
use crate::foundation::core::Fps;
use crate::foundation::error::{ReelError, ReelResult};

pub const AUDIO_FILE: &str = "audio.f32le";
pub const INTERMEDIATE_FILE: &str = "intermediate.mp4";
pub const OUTPUT_FILE: &str = "output.mp4";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MuxOpts {
    pub video_codec: String,
    pub preset: String,
    /// x264 constant rate factor, 0..=51.
    pub crf: u8,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl Default for MuxOpts {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_owned(),
            preset: "medium".to_owned(),
            crf: 23,
            audio_codec: "aac".to_owned(),
            audio_bitrate: "192k".to_owned(),
        }
    }
}

impl MuxOpts {
    pub fn validate(&self) -> ReelResult<()> {
        if self.video_codec.trim().is_empty() || self.audio_codec.trim().is_empty() {
            return Err(ReelError::validation("mux codecs must be non-empty"));
        }
        if self.preset.trim().is_empty() {
            return Err(ReelError::validation("mux preset must be non-empty"));
        }
        if self.crf > 51 {
            return Err(ReelError::validation("mux crf must be in 0..=51"));
        }
        if self.audio_bitrate.trim().is_empty() {
            return Err(ReelError::validation("mux audio_bitrate must be non-empty"));
        }
        Ok(())
    }
}

/// The contiguous numbered frame images the capture encoder left in the workspace.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameSet {
    /// printf-style input pattern, e.g. `frame_%06d.png`.
    pub pattern: String,
    pub first_index: u64,
    pub count: u64,
    pub names: Vec<String>,
}

/// Deletes every listed workspace file when dropped.
struct ArtifactGuard<'a> {
    workspace: &'a dyn Workspace,
    names: Vec<String>,
}

impl Drop for ArtifactGuard<'_> {
    fn drop(&mut self) {
        for name in &self.names {
            if let Err(e) = self.workspace.delete(name) {
                tracing::warn!(file = %name, error = %e, "failed to clean up artifact");
            }
        }
    }
}

/// Two-phase finalize: frames to a video-only stream, then video plus audio.
#[derive(Clone, Debug, Default)]
pub struct Muxer {
    opts: MuxOpts,
}

impl Muxer {
    pub fn new(opts: MuxOpts) -> ReelResult<Self> {
        opts.validate()?;
        Ok(Self { opts })
    }

    pub fn opts(&self) -> &MuxOpts {
        &self.opts
    }

    /// Encode and mux, returning the final container bytes.
    ///
    /// Frames, audio and intermediates are removed from the workspace on every exit path.
    #[tracing::instrument(skip_all, fields(frames = frames.count, audio = audio.is_some()))]
    pub fn finalize(
        &self,
        workspace: &dyn Workspace,
        encoder: &dyn ExternalEncoder,
        fps: Fps,
        frames: &FrameSet,
        audio: Option<&AudioBlob>,
    ) -> ReelResult<Vec<u8>> {
        let mut guard = ArtifactGuard {
            workspace,
            names: frames.names.clone(),
        };
        guard.names.extend(
            [AUDIO_FILE, INTERMEDIATE_FILE, OUTPUT_FILE]
                .iter()
                .map(|s| (*s).to_owned()),
        );

        if frames.count == 0 {
            return Err(ReelError::encoder("no frames were captured"));
        }

        let audio_input = match audio {
            Some(blob) if blob.frames() > 0 => {
                workspace.write(AUDIO_FILE, &blob.to_f32le_bytes())?;
                Some(RawAudioInput {
                    name: AUDIO_FILE.to_owned(),
                    sample_rate: blob.sample_rate,
                    channels: blob.channels,
                })
            }
            _ => None,
        };

        tracing::info!(frames = frames.count, first = frames.first_index, "phase 1: frames to video");
        encoder.run(
            workspace,
            &EncodeCommand::FramesToVideo {
                fps,
                pattern: frames.pattern.clone(),
                start_number: frames.first_index,
                frame_count: frames.count,
                video_codec: self.opts.video_codec.clone(),
                preset: self.opts.preset.clone(),
                crf: self.opts.crf,
                output: INTERMEDIATE_FILE.to_owned(),
            },
        )?;

        tracing::info!(with_audio = audio_input.is_some(), "phase 2: mux");
        encoder.run(
            workspace,
            &EncodeCommand::Mux {
                video: INTERMEDIATE_FILE.to_owned(),
                audio: audio_input,
                audio_codec: self.opts.audio_codec.clone(),
                audio_bitrate: self.opts.audio_bitrate.clone(),
                output: OUTPUT_FILE.to_owned(),
            },
        )?;

        let bytes = workspace.read(OUTPUT_FILE)?;
        drop(guard);
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::encode::workspace::MemoryWorkspace;

    #[derive(Default)]
    struct ScriptedEncoder {
        seen: Mutex<Vec<EncodeCommand>>,
        fail_mux: bool,
    }

    impl ExternalEncoder for ScriptedEncoder {
        fn run(&self, workspace: &dyn Workspace, cmd: &EncodeCommand) -> ReelResult<()> {
            self.seen.lock().push(cmd.clone());
            if self.fail_mux && matches!(cmd, EncodeCommand::Mux { .. }) {
                return Err(ReelError::encoder("exit status 1"));
            }
            workspace.write(cmd.output(), cmd.output().as_bytes())
        }
    }

    fn frame_set(ws: &MemoryWorkspace, n: u64) -> FrameSet {
        let names: Vec<String> = (0..n).map(|i| format!("frame_{i:06}.png")).collect();
        for name in &names {
            ws.write(name, b"png").unwrap();
        }
        FrameSet {
            pattern: "frame_%06d.png".to_owned(),
            first_index: 0,
            count: n,
            names,
        }
    }

    #[test]
    fn runs_both_phases_and_cleans_up() {
        let ws = MemoryWorkspace::new();
        let frames = frame_set(&ws, 3);
        let enc = ScriptedEncoder::default();
        let blob = AudioBlob {
            sample_rate: 48_000,
            channels: 2,
            interleaved_f32: vec![0.0; 96],
        };
        let fps = Fps::whole(10).unwrap();

        let out = Muxer::default()
            .finalize(&ws, &enc, fps, &frames, Some(&blob))
            .unwrap();
        assert_eq!(out, OUTPUT_FILE.as_bytes());
        assert!(ws.is_empty());

        let seen = enc.seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(matches!(
            &seen[0],
            EncodeCommand::FramesToVideo { frame_count: 3, .. }
        ));
        assert!(matches!(
            &seen[1],
            EncodeCommand::Mux { audio: Some(_), .. }
        ));
    }

    #[test]
    fn failure_still_cleans_up() {
        let ws = MemoryWorkspace::new();
        let frames = frame_set(&ws, 2);
        let enc = ScriptedEncoder {
            fail_mux: true,
            ..Default::default()
        };
        let err = Muxer::default()
            .finalize(&ws, &enc, Fps::whole(10).unwrap(), &frames, None)
            .unwrap_err();
        assert!(matches!(err, ReelError::Encoder(_)));
        assert!(ws.is_empty());
    }

    #[test]
    fn empty_frame_set_is_an_encoder_error() {
        let ws = MemoryWorkspace::new();
        let enc = ScriptedEncoder::default();
        let err = Muxer::default()
            .finalize(&ws, &enc, Fps::whole(10).unwrap(), &FrameSet::default(), None)
            .unwrap_err();
        assert!(matches!(err, ReelError::Encoder(_)));
        assert!(enc.seen.lock().is_empty());
    }

    #[test]
    fn rejects_out_of_range_crf() {
        let opts = MuxOpts {
            crf: 60,
            ..MuxOpts::default()
        };
        assert!(Muxer::new(opts).is_err());
    }
}
