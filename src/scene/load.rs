use std::path::{Path, PathBuf};

use base64::Engine as _;

use crate::foundation::error::{ReelError, ReelResult};
use crate::scene::model::SceneDocument;

/// Resolves a source reference (URI or inline payload) into a parsed document.
pub trait SourceLoader: Send {
    fn load(&self, source: &str) -> ReelResult<SceneDocument>;
}

/// Loader for `data:` URIs, inline JSON and filesystem paths.
///
/// Relative paths resolve against `base_dir`. Remote URLs are rejected.
#[derive(Clone, Debug)]
pub struct DefaultSourceLoader {
    base_dir: PathBuf,
}

impl DefaultSourceLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl Default for DefaultSourceLoader {
    fn default() -> Self {
        Self::new(".")
    }
}

impl SourceLoader for DefaultSourceLoader {
    #[tracing::instrument(skip(self, source), fields(len = source.len()))]
    fn load(&self, source: &str) -> ReelResult<SceneDocument> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(ReelError::load("empty source"));
        }

        if let Some(rest) = trimmed.strip_prefix("data:") {
            let bytes = decode_data_uri(rest)?;
            return SceneDocument::from_json_slice(&bytes);
        }

        if trimmed.starts_with('{') {
            return SceneDocument::from_json_str(trimmed);
        }

        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return Err(ReelError::load(format!(
                "remote sources are not supported: '{trimmed}'"
            )));
        }

        let path = Path::new(trimmed);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        };
        tracing::debug!(path = %path.display(), "loading scenes document from file");
        SceneDocument::from_path(path)
    }
}

/// Decode the payload of a `data:` URI (the part after `data:`).
fn decode_data_uri(rest: &str) -> ReelResult<Vec<u8>> {
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| ReelError::load("data uri has no ',' separator"))?;

    let mut parts = header.split(';');
    let mime = parts.next().unwrap_or_default().trim();
    if !mime.is_empty() && !mime.eq_ignore_ascii_case("application/json") {
        return Err(ReelError::load(format!(
            "unsupported data uri media type '{mime}'"
        )));
    }

    if parts.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| ReelError::load(format!("invalid base64 payload: {e}")))
    } else {
        let decoded = urlencoding::decode(payload)
            .map_err(|e| ReelError::load(format!("invalid percent-encoded payload: {e}")))?;
        Ok(decoded.into_owned().into_bytes())
    }
}
