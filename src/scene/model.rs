use std::path::Path;

use crate::foundation::error::{ReelError, ReelResult};

/// Minimum derived length of a narrated scene, and the length of a silent auto scene.
pub const DEFAULT_SCENE_MS: f64 = 2000.0;
/// Narration pacing used by the auto duration rule.
pub const MS_PER_SPOKEN_WORD: f64 = 350.0;

/// A parsed scenes document: ordered scenes plus optional background audio.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SceneDocument {
    pub scenes: Vec<SceneSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
}

/// One timed segment of the presentation.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneSpec {
    #[serde(default)]
    pub html: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    #[serde(default)]
    pub duration: SceneDuration,
    #[serde(default)]
    pub pause_background: bool,
}

/// Declared scene length. `Auto` derives it from the narration.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum SceneDuration {
    #[default]
    Auto,
    Seconds(f64),
}

impl serde::Serialize for SceneDuration {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            SceneDuration::Auto => s.serialize_str("auto"),
            SceneDuration::Seconds(v) => s.serialize_f64(*v),
        }
    }
}

impl<'de> serde::Deserialize<'de> for SceneDuration {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(f64),
            Str(String),
        }

        let raw = Option::<Raw>::deserialize(d)?;
        let secs = match raw {
            None => return Ok(SceneDuration::Auto),
            Some(Raw::Num(v)) => v,
            Some(Raw::Str(s)) => {
                let s = s.trim();
                if s.is_empty() || s.eq_ignore_ascii_case("auto") {
                    return Ok(SceneDuration::Auto);
                }
                s.parse::<f64>().map_err(|_| {
                    serde::de::Error::custom(format!("invalid scene duration '{s}'"))
                })?
            }
        };
        // A zero duration is treated as unset.
        if secs == 0.0 {
            return Ok(SceneDuration::Auto);
        }
        Ok(SceneDuration::Seconds(secs))
    }
}

impl SceneSpec {
    /// Duration rule: explicit seconds win; otherwise narration length at
    /// [`MS_PER_SPOKEN_WORD`] with a [`DEFAULT_SCENE_MS`] floor.
    pub fn derived_duration_ms(&self) -> f64 {
        match self.duration {
            SceneDuration::Seconds(secs) => (secs * 1000.0).max(0.0),
            SceneDuration::Auto => match self.speech.as_deref() {
                Some(speech) => {
                    (word_count(speech) as f64 * MS_PER_SPOKEN_WORD).max(DEFAULT_SCENE_MS)
                }
                None => DEFAULT_SCENE_MS,
            },
        }
    }

    /// Narration text, if non-empty.
    pub fn caption(&self) -> Option<&str> {
        self.speech.as_deref().filter(|s| !s.trim().is_empty())
    }
}

/// Count of whitespace-delimited non-empty tokens.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

impl SceneDocument {
    pub fn from_json_str(s: &str) -> ReelResult<Self> {
        let doc: SceneDocument = serde_json::from_str(s)
            .map_err(|e| ReelError::load(format!("invalid scenes document: {e}")))?;
        doc.validate()?;
        Ok(doc)
    }

    pub fn from_json_slice(bytes: &[u8]) -> ReelResult<Self> {
        let doc: SceneDocument = serde_json::from_slice(bytes)
            .map_err(|e| ReelError::load(format!("invalid scenes document: {e}")))?;
        doc.validate()?;
        Ok(doc)
    }

    pub fn from_path(path: impl AsRef<Path>) -> ReelResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            ReelError::load(format!("failed to read '{}': {e}", path.display()))
        })?;
        Self::from_json_slice(&bytes)
    }

    pub fn validate(&self) -> ReelResult<()> {
        if self.scenes.is_empty() {
            return Err(ReelError::load("document has no scenes"));
        }
        for (i, scene) in self.scenes.iter().enumerate() {
            if let SceneDuration::Seconds(secs) = scene.duration
                && (!secs.is_finite() || secs < 0.0)
            {
                return Err(ReelError::load(format!(
                    "scene {i} has invalid duration {secs}"
                )));
            }
        }
        Ok(())
    }
}
