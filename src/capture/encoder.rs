use std::sync::Arc;

use crate::capture::queue::FrameQueueRx;
use crate::encode::mux::FrameSet;
use crate::encode::workspace::Workspace;
use crate::foundation::core::FrameIndex;
use crate::foundation::error::ReelResult;
use crate::render::raster::Rasterizer;
use crate::render::still::{StillFormat, encode_still};
use crate::render::surface::{ContentSignature, VisualState};

pub fn frame_name(index: FrameIndex, format: StillFormat) -> String {
    format!("frame_{:06}.{}", index.0, format.extension())
}

/// printf-style pattern matching [`frame_name`].
pub fn frame_pattern(format: StillFormat) -> String {
    format!("frame_%06d.{}", format.extension())
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncodeStats {
    pub received: u64,
    /// Frames rasterized and encoded.
    pub serialized: u64,
    /// Frames written with the previous frame's bytes because signatures matched.
    pub reused: u64,
    /// Frames that failed to serialize and were written with the previous frame's bytes.
    pub held: u64,
    /// Frames that failed before any frame was serialized; nothing was written for them.
    pub dropped: u64,
    pub first_index: Option<u64>,
    pub written: Vec<String>,
}

impl EncodeStats {
    /// Written frames as the muxer sees them. Written indices are contiguous.
    pub fn frame_set(&self, format: StillFormat) -> FrameSet {
        FrameSet {
            pattern: frame_pattern(format),
            first_index: self.first_index.unwrap_or(0),
            count: self.written.len() as u64,
            names: self.written.clone(),
        }
    }
}

/// Consumer side of capture: drains the queue in order and writes numbered stills.
pub struct FrameEncoder<'a> {
    rasterizer: &'a dyn Rasterizer,
    workspace: &'a dyn Workspace,
    format: StillFormat,
    background_rgba: [u8; 4],
}

impl<'a> FrameEncoder<'a> {
    pub fn new(
        rasterizer: &'a dyn Rasterizer,
        workspace: &'a dyn Workspace,
        format: StillFormat,
        background_rgba: [u8; 4],
    ) -> Self {
        Self {
            rasterizer,
            workspace,
            format,
            background_rgba,
        }
    }

    /// Run until the producer finishes and the queue is empty.
    ///
    /// Per-frame serialization failures are absorbed; a workspace write failure ends the run.
    pub fn run(&self, queue: FrameQueueRx) -> ReelResult<EncodeStats> {
        let mut stats = EncodeStats::default();
        let mut prev: Option<(ContentSignature, Arc<Vec<u8>>)> = None;

        for job in queue {
            stats.received += 1;

            let reuse = prev
                .as_ref()
                .filter(|(sig, _)| *sig == job.signature)
                .map(|(_, bytes)| Arc::clone(bytes));

            let bytes = if let Some(bytes) = reuse {
                stats.reused += 1;
                bytes
            } else {
                match self.serialize(&job.state) {
                    Ok(bytes) => {
                        stats.serialized += 1;
                        let bytes = Arc::new(bytes);
                        prev = Some((job.signature, Arc::clone(&bytes)));
                        bytes
                    }
                    Err(e) => match &prev {
                        Some((_, bytes)) => {
                            tracing::warn!(frame = job.index.0, error = %e, "frame failed to serialize, holding previous frame");
                            stats.held += 1;
                            Arc::clone(bytes)
                        }
                        None => {
                            tracing::warn!(frame = job.index.0, error = %e, "frame failed to serialize, dropped");
                            stats.dropped += 1;
                            continue;
                        }
                    },
                }
            };

            let name = frame_name(job.index, self.format);
            self.workspace.write(&name, &bytes)?;
            stats.first_index.get_or_insert(job.index.0);
            stats.written.push(name);
        }

        tracing::debug!(
            written = stats.written.len(),
            serialized = stats.serialized,
            reused = stats.reused,
            "frame encoder drained"
        );
        Ok(stats)
    }

    fn serialize(&self, state: &VisualState) -> ReelResult<Vec<u8>> {
        let frame = self.rasterizer.rasterize(state)?;
        encode_still(&frame, self.format, self.background_rgba)
    }
}
