use std::io::Cursor;

use ::image::ImageEncoder as _;

use crate::foundation::error::{ReelError, ReelResult};
use crate::render::raster::FrameRGBA;

/// Still-image encoding used for captured frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StillFormat {
    #[default]
    Png,
    /// JPEG at `quality` (1..=100).
    Jpeg { quality: u8 },
}

impl StillFormat {
    pub fn extension(self) -> &'static str {
        match self {
            StillFormat::Png => "png",
            StillFormat::Jpeg { .. } => "jpg",
        }
    }

    pub fn validate(self) -> ReelResult<()> {
        if let StillFormat::Jpeg { quality } = self
            && !(1..=100).contains(&quality)
        {
            return Err(ReelError::validation("jpeg quality must be in 1..=100"));
        }
        Ok(())
    }
}

/// Flatten `frame` over the opaque `background` and encode it.
pub fn encode_still(
    frame: &FrameRGBA,
    format: StillFormat,
    background: [u8; 4],
) -> ReelResult<Vec<u8>> {
    let expected = (frame.width as usize) * (frame.height as usize) * 4;
    if frame.data.len() != expected {
        return Err(ReelError::render(format!(
            "{}x{} frame holds {} bytes, expected {expected}",
            frame.width,
            frame.height,
            frame.data.len()
        )));
    }

    let mut buf = Vec::new();
    match format {
        StillFormat::Png => {
            ::image::codecs::png::PngEncoder::new(Cursor::new(&mut buf))
                .write_image(
                    &flatten(&frame.data, background, 4),
                    frame.width,
                    frame.height,
                    ::image::ExtendedColorType::Rgba8,
                )
                .map_err(|e| ReelError::render(format!("png encode failed: {e}")))?;
        }
        StillFormat::Jpeg { quality } => {
            ::image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality)
                .write_image(
                    &flatten(&frame.data, background, 3),
                    frame.width,
                    frame.height,
                    ::image::ExtendedColorType::Rgb8,
                )
                .map_err(|e| ReelError::render(format!("jpeg encode failed: {e}")))?;
        }
    }
    Ok(buf)
}

/// Composite premultiplied RGBA8 over `background`, keeping the first `channels` bytes of
/// each opaque pixel (4 for RGBA, 3 for RGB).
fn flatten(premul: &[u8], background: [u8; 4], channels: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(premul.len() / 4 * channels);
    for px in premul.chunks_exact(4) {
        out.extend_from_slice(&over_background(px, background)[..channels]);
    }
    out
}

/// `src + bg * (255 - src_alpha) / 255`, rounded.
fn over_background(px: &[u8], bg: [u8; 4]) -> [u8; 4] {
    let uncovered = 255 - u32::from(px[3]);
    let channel = |i: usize| {
        let under = (u32::from(bg[i]) * uncovered + 127) / 255;
        (u32::from(px[i]) + under).min(255) as u8
    };
    [channel(0), channel(1), channel(2), 255]
}
