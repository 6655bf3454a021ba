/// Notifications a [`Player`](crate::Player) sends to its subscribers.
#[derive(Clone, Debug, PartialEq)]
pub enum PlayerEvent {
    LoadedMetadata { duration_ms: f64 },
    Play,
    Pause,
    TimeUpdate { current_ms: f64 },
    Ended,
    SceneChange { index: usize },
    Error { message: String },
}

impl PlayerEvent {
    /// Lowercase event name as hosts know it (`"timeupdate"`, `"ended"`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            Self::LoadedMetadata { .. } => "loadedmetadata",
            Self::Play => "play",
            Self::Pause => "pause",
            Self::TimeUpdate { .. } => "timeupdate",
            Self::Ended => "ended",
            Self::SceneChange { .. } => "scenechange",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_match_host_vocabulary() {
        assert_eq!(PlayerEvent::LoadedMetadata { duration_ms: 1.0 }.name(), "loadedmetadata");
        assert_eq!(PlayerEvent::TimeUpdate { current_ms: 0.0 }.name(), "timeupdate");
        assert_eq!(PlayerEvent::SceneChange { index: 1 }.name(), "scenechange");
        assert_eq!(PlayerEvent::Ended.name(), "ended");
    }
}
