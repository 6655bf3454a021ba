use std::path::Path;
use std::sync::Arc;

use crate::foundation::core::Canvas;
use crate::foundation::error::{ReelError, ReelResult};
use crate::render::surface::VisualState;

/// Premultiplied RGBA8 frame buffer, the layout resvg renders into.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl FrameRGBA {
    /// Frame filled with the straight (non-premultiplied) color `rgba`.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let alpha = u32::from(rgba[3]);
        let premul = |c: u8| ((u32::from(c) * alpha + 127) / 255) as u8;
        let px = [premul(rgba[0]), premul(rgba[1]), premul(rgba[2]), rgba[3]];
        Self {
            width,
            height,
            data: px.repeat((width as usize) * (height as usize)),
        }
    }
}

/// Turns a visual state into concrete pixels. Runs on the encoder thread.
pub trait Rasterizer: Send + Sync {
    fn rasterize(&self, state: &VisualState) -> ReelResult<FrameRGBA>;
}

/// `usvg`/`resvg` rasterizer for states produced by the SVG renderer.
pub struct SvgRasterizer {
    canvas: Canvas,
    fontdb: Arc<usvg::fontdb::Database>,
}

impl SvgRasterizer {
    /// Rasterizer using system fonts only.
    pub fn new(canvas: Canvas) -> Self {
        Self::with_font_dir(canvas, None)
    }

    /// Rasterizer using system fonts plus `.ttf`/`.otf`/`.ttc` files from `font_dir`.
    pub fn with_font_dir(canvas: Canvas, font_dir: Option<&Path>) -> Self {
        Self {
            canvas,
            fontdb: build_fontdb(font_dir),
        }
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }
}

impl std::fmt::Debug for SvgRasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SvgRasterizer")
            .field("canvas", &self.canvas)
            .field("font_faces", &self.fontdb.len())
            .finish()
    }
}

impl Rasterizer for SvgRasterizer {
    fn rasterize(&self, state: &VisualState) -> ReelResult<FrameRGBA> {
        let opts = usvg::Options {
            fontdb: self.fontdb.clone(),
            ..Default::default()
        };
        let tree = usvg::Tree::from_str(state.document(), &opts)
            .map_err(|e| ReelError::render(format!("failed to parse visual state: {e}")))?;

        let Canvas { width, height } = self.canvas;
        let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
            .ok_or_else(|| ReelError::render("failed to allocate frame pixmap"))?;

        let size = tree.size();
        let sx = (width as f32) / size.width();
        let sy = (height as f32) / size.height();
        resvg::render(
            &tree,
            resvg::tiny_skia::Transform::from_scale(sx, sy),
            &mut pixmap.as_mut(),
        );

        Ok(FrameRGBA {
            width,
            height,
            data: pixmap.take(),
        })
    }
}

const FONT_EXTENSIONS: [&str; 3] = ["ttf", "otf", "ttc"];

fn build_fontdb(font_dir: Option<&Path>) -> Arc<usvg::fontdb::Database> {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    let extra = font_dir.map_or(0, |dir| load_fonts_from_dir(&mut db, dir));
    tracing::debug!(faces = db.len(), extra, "font database ready");
    Arc::new(db)
}

fn is_font_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| FONT_EXTENSIONS.iter().any(|f| e.eq_ignore_ascii_case(f)))
}

/// Adds the font files directly inside `dir` and returns how many faces they contributed.
fn load_fonts_from_dir(db: &mut usvg::fontdb::Database, dir: &Path) -> usize {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "font directory unreadable");
            return 0;
        }
    };
    let before = db.len();
    for path in entries.flatten().map(|e| e.path()).filter(|p| is_font_file(p)) {
        if let Err(e) = db.load_font_file(&path) {
            tracing::warn!(path = %path.display(), error = %e, "skipping unreadable font");
        }
    }
    db.len() - before
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::surface::{Renderer, ScenePresentation, SvgRenderer, SvgRendererOpts};

    fn small() -> Canvas {
        Canvas {
            width: 32,
            height: 18,
        }
    }

    #[test]
    fn rasterizes_svg_scene_at_canvas_size() {
        let mut r = SvgRenderer::new(SvgRendererOpts {
            canvas: small(),
            ..Default::default()
        });
        r.present(&ScenePresentation {
            scene_index: 0,
            markup: r##"<svg x="0" y="0" width="32" height="18"><rect width="32" height="18" fill="#ff0000"/></svg>"##,
            caption: None,
        })
        .unwrap();
        let frame = SvgRasterizer::new(small())
            .rasterize(&r.snapshot().unwrap())
            .unwrap();
        assert_eq!((frame.width, frame.height), (32, 18));
        assert_eq!(frame.data.len(), 32 * 18 * 4);
        assert_eq!(&frame.data[..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn font_dir_ignores_non_fonts_and_missing_dirs() {
        let dir = std::env::temp_dir().join(format!("scenereel_fonts_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("notes.txt"), b"not a font").unwrap();
        std::fs::write(dir.join("Broken.TTF"), b"not a font either").unwrap();

        assert!(is_font_file(&dir.join("Broken.TTF")));
        assert!(!is_font_file(&dir.join("notes.txt")));
        let mut db = usvg::fontdb::Database::new();
        assert_eq!(load_fonts_from_dir(&mut db, &dir), 0);
        assert_eq!(load_fonts_from_dir(&mut db, &dir.join("missing")), 0);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn malformed_state_is_a_render_error() {
        let err = SvgRasterizer::new(small())
            .rasterize(&VisualState::new("<svg"))
            .unwrap_err();
        assert!(matches!(err, ReelError::Render(_)));
    }
}
