//! Scene list → absolute millisecond timeline.
//!
//! Intervals are half-open `[start_ms, end_ms)`, contiguous and ordered: each scene's end is the
//! exact same `f64` as the next scene's start.

use crate::scene::model::SceneSpec;

/// A scene placed on the timeline.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessedScene {
    pub spec: SceneSpec,
    pub start_ms: f64,
    pub end_ms: f64,
}

impl ProcessedScene {
    pub fn duration_ms(&self) -> f64 {
        self.end_ms - self.start_ms
    }

    pub fn contains(&self, t_ms: f64) -> bool {
        self.start_ms <= t_ms && t_ms < self.end_ms
    }

    /// Offset of `t_ms` into this scene, clamped at zero.
    pub fn local_ms(&self, t_ms: f64) -> f64 {
        (t_ms - self.start_ms).max(0.0)
    }
}

/// Immutable timeline computed once per load.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneTimeline {
    scenes: Vec<ProcessedScene>,
    total_ms: f64,
}

impl SceneTimeline {
    /// Apply the duration rule to each scene and assign intervals in order.
    pub fn build(specs: &[SceneSpec]) -> Self {
        let mut total_ms = 0.0;
        let scenes = specs
            .iter()
            .map(|spec| {
                let start_ms = total_ms;
                total_ms += spec.derived_duration_ms();
                ProcessedScene {
                    spec: spec.clone(),
                    start_ms,
                    end_ms: total_ms,
                }
            })
            .collect();
        Self { scenes, total_ms }
    }

    pub fn scenes(&self) -> &[ProcessedScene] {
        &self.scenes
    }

    pub fn get(&self, idx: usize) -> Option<&ProcessedScene> {
        self.scenes.get(idx)
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn total_duration_ms(&self) -> f64 {
        self.total_ms
    }

    /// Clamp `t_ms` into `[0, total]`.
    pub fn clamp(&self, t_ms: f64) -> f64 {
        if t_ms.is_nan() {
            return 0.0;
        }
        t_ms.clamp(0.0, self.total_ms)
    }

    /// Index of the scene whose interval contains `t_ms`.
    ///
    /// Times at or past the end map to the last scene, negative times to the first. Returns `None`
    /// for an empty timeline.
    pub fn locate(&self, t_ms: f64) -> Option<usize> {
        let last = self.scenes.len().checked_sub(1)?;
        if t_ms >= self.total_ms {
            return Some(last);
        }
        let idx = self.scenes.partition_point(|s| s.end_ms <= t_ms);
        Some(idx.min(last))
    }

    /// Forward-only scan from `from` for the first scene whose end exceeds `t_ms`.
    ///
    /// `t_ms` must not be earlier than the start of scene `from`; playback only moves forward
    /// between seeks, so the scan is O(1) amortized.
    pub fn advance_from(&self, from: usize, t_ms: f64) -> usize {
        let last = self.scenes.len().saturating_sub(1);
        let mut idx = from.min(last);
        while idx < last && self.scenes[idx].end_ms <= t_ms {
            idx += 1;
        }
        idx
    }
}
