use std::sync::Arc;

use crate::foundation::core::Canvas;
use crate::foundation::error::ReelResult;

/// Cheap comparison key for a [`VisualState`].
///
/// Equal signatures imply equal documents (128-bit xxh3 of the serialized state).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContentSignature {
    pub hi: u64,
    pub lo: u64,
}

impl ContentSignature {
    pub fn of(document: &str) -> Self {
        let h = xxhash_rust::xxh3::xxh3_128(document.as_bytes());
        Self {
            hi: (h >> 64) as u64,
            lo: h as u64,
        }
    }
}

/// Opaque, cheaply clonable snapshot of what the renderer currently shows.
///
/// The state is a self-contained SVG document; rasterizing it needs nothing else.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisualState {
    document: Arc<str>,
    signature: ContentSignature,
}

impl VisualState {
    pub fn new(document: impl Into<Arc<str>>) -> Self {
        let document = document.into();
        let signature = ContentSignature::of(&document);
        Self {
            document,
            signature,
        }
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn signature(&self) -> ContentSignature {
        self.signature
    }
}

/// What the player asks the renderer to show.
#[derive(Clone, Copy, Debug)]
pub struct ScenePresentation<'a> {
    pub scene_index: usize,
    pub markup: &'a str,
    /// Caption text, already filtered by caption visibility.
    pub caption: Option<&'a str>,
}

/// Visual surface collaborator: displays one scene and reads back its state.
pub trait Renderer: Send {
    fn present(&mut self, view: &ScenePresentation<'_>) -> ReelResult<()>;
    fn snapshot(&self) -> ReelResult<VisualState>;
}

#[derive(Clone, Debug)]
pub struct SvgRendererOpts {
    pub canvas: Canvas,
    pub caption_font_size: u32,
    /// Page color behind the scene markup (CSS color).
    pub background: String,
}

impl Default for SvgRendererOpts {
    fn default() -> Self {
        Self {
            canvas: Canvas::default(),
            caption_font_size: 28,
            background: "#ffffff".to_owned(),
        }
    }
}

/// Renderer that composes each scene into a standalone SVG document.
///
/// SVG markup is embedded as-is. Any other markup is reduced to its text content and drawn
/// centered. Captions become a translucent band at the bottom edge.
#[derive(Debug)]
pub struct SvgRenderer {
    opts: SvgRendererOpts,
    current: VisualState,
}

impl SvgRenderer {
    pub fn new(opts: SvgRendererOpts) -> Self {
        let current = VisualState::new(blank_document(&opts));
        Self { opts, current }
    }

    pub fn canvas(&self) -> Canvas {
        self.opts.canvas
    }

    fn compose(&self, view: &ScenePresentation<'_>) -> String {
        let Canvas { width, height } = self.opts.canvas;
        let mut doc = String::with_capacity(view.markup.len() + 512);
        doc.push_str(&svg_open(width, height));
        doc.push_str(&format!(
            r#"<rect width="{width}" height="{height}" fill="{}"/>"#,
            escape_xml(&self.opts.background)
        ));

        let markup = view.markup.trim();
        if is_svg_markup(markup) {
            doc.push_str(strip_xml_prolog(markup));
        } else {
            let text = markup_text(markup);
            if !text.is_empty() {
                push_centered_text(&mut doc, &text, width, height);
            }
        }

        if let Some(caption) = view.caption {
            push_caption(&mut doc, caption, width, height, self.opts.caption_font_size);
        }

        doc.push_str("</svg>");
        doc
    }
}

impl Default for SvgRenderer {
    fn default() -> Self {
        Self::new(SvgRendererOpts::default())
    }
}

impl Renderer for SvgRenderer {
    fn present(&mut self, view: &ScenePresentation<'_>) -> ReelResult<()> {
        self.current = VisualState::new(self.compose(view));
        Ok(())
    }

    fn snapshot(&self) -> ReelResult<VisualState> {
        Ok(self.current.clone())
    }
}

fn svg_open(width: u32, height: u32) -> String {
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    )
}

fn blank_document(opts: &SvgRendererOpts) -> String {
    let Canvas { width, height } = opts.canvas;
    format!(
        r#"{}<rect width="{width}" height="{height}" fill="{}"/></svg>"#,
        svg_open(width, height),
        escape_xml(&opts.background)
    )
}

fn is_svg_markup(markup: &str) -> bool {
    let body = strip_xml_prolog(markup);
    body.get(..4)
        .is_some_and(|head| head.eq_ignore_ascii_case("<svg"))
}

fn strip_xml_prolog(markup: &str) -> &str {
    let s = markup.trim_start();
    if s.starts_with("<?xml")
        && let Some(end) = s.find("?>")
    {
        return s[end + 2..].trim_start();
    }
    s
}

/// Text content of tag markup, whitespace collapsed.
fn markup_text(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut in_tag = false;
    let mut skip_until: Option<&str> = None;
    let lower = markup.to_ascii_lowercase();
    let mut i = 0;
    let bytes = markup.as_bytes();

    while i < bytes.len() {
        if let Some(close) = skip_until {
            match lower[i..].find(close) {
                Some(off) => {
                    i += off + close.len();
                    skip_until = None;
                    continue;
                }
                None => break,
            }
        }
        let c = bytes[i];
        if in_tag {
            if c == b'>' {
                in_tag = false;
                out.push(' ');
            }
            i += 1;
            continue;
        }
        if c == b'<' {
            if lower[i..].starts_with("<script") {
                skip_until = Some("</script>");
            } else if lower[i..].starts_with("<style") {
                skip_until = Some("</style>");
            } else {
                in_tag = true;
            }
            i += 1;
            continue;
        }
        let ch_len = utf8_len(c);
        out.push_str(&markup[i..i + ch_len]);
        i += ch_len;
    }

    let decoded = out
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn utf8_len(first: u8) -> usize {
    match first {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        _ => 4,
    }
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Greedy word wrap by character count.
fn wrap_words(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        let needed = if line.is_empty() {
            word.chars().count()
        } else {
            line.chars().count() + 1 + word.chars().count()
        };
        if needed > max_chars && !line.is_empty() {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

fn push_centered_text(doc: &mut String, text: &str, width: u32, height: u32) {
    let font_size = (height / 12).max(12);
    let max_chars = ((f64::from(width) * 0.8) / (f64::from(font_size) * 0.55)).max(8.0) as usize;
    let lines = wrap_words(text, max_chars);
    let line_h = f64::from(font_size) * 1.3;
    let block_h = line_h * lines.len() as f64;
    let top = (f64::from(height) - block_h) / 2.0 + f64::from(font_size);

    doc.push_str(&format!(
        r##"<g font-family="sans-serif" font-size="{font_size}" fill="#111111" text-anchor="middle">"##
    ));
    for (i, line) in lines.iter().enumerate() {
        doc.push_str(&format!(
            r#"<text x="{}" y="{:.1}">{}</text>"#,
            width / 2,
            top + line_h * i as f64,
            escape_xml(line)
        ));
    }
    doc.push_str("</g>");
}

fn push_caption(doc: &mut String, caption: &str, width: u32, height: u32, font_size: u32) {
    let font_size = font_size.max(8);
    let max_chars = ((f64::from(width) * 0.85) / (f64::from(font_size) * 0.55)).max(8.0) as usize;
    let lines = wrap_words(caption, max_chars);
    if lines.is_empty() {
        return;
    }

    let pad = f64::from(font_size) * 0.4;
    let line_h = f64::from(font_size) * 1.25;
    let widest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let band_w = (widest as f64 * f64::from(font_size) * 0.55 + pad * 4.0).min(f64::from(width));
    let band_h = line_h * lines.len() as f64 + pad * 2.0;
    let bottom = f64::from(height) - f64::from(font_size) * 1.0;
    let band_y = bottom - band_h;
    let band_x = (f64::from(width) - band_w) / 2.0;

    doc.push_str(&format!(
        r#"<rect x="{band_x:.1}" y="{band_y:.1}" width="{band_w:.1}" height="{band_h:.1}" rx="4" fill="rgb(0,0,0)" fill-opacity="0.8"/>"#
    ));
    doc.push_str(&format!(
        r##"<g font-family="sans-serif" font-size="{font_size}" fill="#ffffff" text-anchor="middle">"##
    ));
    for (i, line) in lines.iter().enumerate() {
        let y = band_y + pad + line_h * (i as f64 + 0.8);
        doc.push_str(&format!(
            r#"<text x="{}" y="{y:.1}">{}</text>"#,
            width / 2,
            escape_xml(line)
        ));
    }
    doc.push_str("</g>");
}
