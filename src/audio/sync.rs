use crate::audio::channel::AudioChannel;
use crate::timeline::ProcessedScene;

/// Offsets within this distance of their target are left alone to avoid audible stutter.
pub const RESYNC_TOLERANCE_MS: f64 = 200.0;

/// Background-channel bookkeeping owned by the player.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AudioSyncState {
    /// The active scene suppressed background audio.
    pub paused_by_scene: bool,
    /// Background position to restore once suppression ends.
    pub resume_ms: f64,
    /// `timeline - background position` while following normally.
    pub drift_ms: f64,
}

/// Keeps the background and per-scene channels aligned with the visible scene.
pub struct AudioSync {
    background: Box<dyn AudioChannel>,
    scene: Box<dyn AudioChannel>,
    state: AudioSyncState,
    volume: f32,
    muted: bool,
}

impl AudioSync {
    pub fn new(background: Box<dyn AudioChannel>, scene: Box<dyn AudioChannel>) -> Self {
        Self {
            background,
            scene,
            state: AudioSyncState::default(),
            volume: 1.0,
            muted: false,
        }
    }

    pub fn state(&self) -> AudioSyncState {
        self.state
    }

    pub fn background(&self) -> &dyn AudioChannel {
        self.background.as_ref()
    }

    pub fn scene_channel(&self) -> &dyn AudioChannel {
        self.scene.as_ref()
    }

    fn has_background(&self) -> bool {
        self.background.source().is_some()
    }

    /// Load (or unload) the document-level background track.
    pub fn load_background(&mut self, uri: Option<&str>) {
        self.state = AudioSyncState::default();
        if let Err(e) = self.background.load(uri) {
            tracing::warn!(channel = "background", error = %e, "background audio unavailable");
        }
        self.background.set_volume(self.effective_volume());
    }

    /// Seek: background goes to the absolute time unless the scene suppresses it.
    pub fn on_seek(&mut self, t_ms: f64, scene: &ProcessedScene, playing: bool) {
        if self.has_background() {
            if scene.spec.pause_background {
                self.background.pause();
                self.state.resume_ms = t_ms;
                self.state.paused_by_scene = true;
            } else {
                self.state.paused_by_scene = false;
                self.state.drift_ms = 0.0;
                set_position(self.background.as_mut(), "background", t_ms);
                if playing {
                    play(self.background.as_mut(), "background");
                }
            }
        }
        self.sync_scene_channel(t_ms, scene, playing);
    }

    /// Playback started at `t_ms` inside `scene`.
    pub fn on_play(&mut self, t_ms: f64, scene: &ProcessedScene) {
        if self.has_background() {
            if scene.spec.pause_background {
                if !self.state.paused_by_scene {
                    self.state.resume_ms = self.background.position_ms();
                    self.state.paused_by_scene = true;
                }
            } else {
                self.follow_background(t_ms, true);
            }
        }
        self.sync_scene_channel(t_ms, scene, true);
    }

    /// Playback crossed into `next`.
    pub fn on_transition(&mut self, t_ms: f64, next: &ProcessedScene, playing: bool) {
        if self.has_background() {
            match (self.state.paused_by_scene, next.spec.pause_background) {
                (true, false) => {
                    set_position(self.background.as_mut(), "background", self.state.resume_ms);
                    self.state.drift_ms = t_ms - self.state.resume_ms;
                    self.state.paused_by_scene = false;
                    if playing {
                        play(self.background.as_mut(), "background");
                    }
                }
                (false, true) => {
                    self.state.resume_ms = self.background.position_ms();
                    self.background.pause();
                    self.state.paused_by_scene = true;
                }
                (true, true) => {}
                (false, false) => self.follow_background(t_ms, playing),
            }
        }
        self.sync_scene_channel(t_ms, next, playing);
    }

    /// Stop both channels. Sync bookkeeping is kept for the next `on_play`.
    pub fn pause_all(&mut self) {
        self.background.pause();
        self.scene.pause();
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.apply_volume();
    }

    /// Mute keeps the configured volume so unmuting restores it.
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.apply_volume();
    }

    fn effective_volume(&self) -> f32 {
        if self.muted { 0.0 } else { self.volume }
    }

    fn apply_volume(&mut self) {
        let v = self.effective_volume();
        self.background.set_volume(v);
        self.scene.set_volume(v);
    }

    fn follow_background(&mut self, t_ms: f64, playing: bool) {
        let target = (t_ms - self.state.drift_ms).max(0.0);
        if (self.background.position_ms() - target).abs() > RESYNC_TOLERANCE_MS {
            set_position(self.background.as_mut(), "background", target);
        }
        if playing {
            play(self.background.as_mut(), "background");
        }
    }

    fn sync_scene_channel(&mut self, t_ms: f64, scene: &ProcessedScene, playing: bool) {
        let Some(uri) = scene.spec.audio.as_deref() else {
            self.scene.pause();
            return;
        };

        if self.scene.source().as_deref() != Some(uri) {
            if let Err(e) = self.scene.load(Some(uri)) {
                tracing::warn!(channel = "scene", uri, error = %e, "scene audio unavailable");
            }
            self.scene.set_volume(self.effective_volume());
        }

        let target = scene.local_ms(t_ms);
        if (self.scene.position_ms() - target).abs() > RESYNC_TOLERANCE_MS {
            set_position(self.scene.as_mut(), "scene", target);
        }
        if playing {
            play(self.scene.as_mut(), "scene");
        } else {
            self.scene.pause();
        }
    }
}

fn set_position(ch: &mut dyn AudioChannel, role: &'static str, ms: f64) {
    if let Err(e) = ch.set_position_ms(ms) {
        tracing::debug!(channel = role, error = %e, "reposition rejected");
    }
}

fn play(ch: &mut dyn AudioChannel, role: &'static str) {
    if let Err(e) = ch.play() {
        tracing::debug!(channel = role, error = %e, "play rejected");
    }
}
