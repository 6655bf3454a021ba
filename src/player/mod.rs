//! Playback clock: a state machine advanced by wall-clock deltas.
//!
//! The host calls [`Player::tick`] at whatever cadence it likes (or uses [`Player::run`]).
//! Every tick measures the real elapsed time since the previous one, so variable pacing never
//! changes where playback lands.

pub(crate) mod events;
pub(crate) mod pacing;

use std::sync::{Arc, mpsc};

use crate::audio::sync::AudioSync;
use crate::foundation::clock::Clock;
use crate::foundation::error::{ReelError, ReelResult};
use crate::player::events::PlayerEvent;
use crate::player::pacing::Pacer;
use crate::render::surface::{Renderer, ScenePresentation, VisualState};
use crate::scene::load::{DefaultSourceLoader, SourceLoader};
use crate::scene::model::SceneDocument;
use crate::timeline::SceneTimeline;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PlaybackState {
    /// Nothing played yet since the last load.
    #[default]
    Idle,
    Playing,
    Paused,
    Ended,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still playing; schedule another tick.
    Continue,
    /// This tick reached the end of the timeline.
    Ended,
    /// Not playing; nothing was advanced.
    Stopped,
}

pub struct Player {
    clock: Arc<dyn Clock>,
    loader: Box<dyn SourceLoader>,
    renderer: Box<dyn Renderer>,
    audio: AudioSync,
    document: Option<SceneDocument>,
    timeline: SceneTimeline,
    current_ms: f64,
    scene_index: usize,
    state: PlaybackState,
    last_tick_ms: f64,
    show_captions: bool,
    listeners: Vec<mpsc::Sender<PlayerEvent>>,
}

impl Player {
    /// A player that loads sources with [`DefaultSourceLoader`] rooted at the working directory.
    pub fn new(clock: Arc<dyn Clock>, renderer: Box<dyn Renderer>, audio: AudioSync) -> Self {
        Self {
            clock,
            loader: Box::new(DefaultSourceLoader::default()),
            renderer,
            audio,
            document: None,
            timeline: SceneTimeline::default(),
            current_ms: 0.0,
            scene_index: 0,
            state: PlaybackState::Idle,
            last_tick_ms: 0.0,
            show_captions: true,
            listeners: Vec::new(),
        }
    }

    pub fn with_loader(mut self, loader: Box<dyn SourceLoader>) -> Self {
        self.loader = loader;
        self
    }

    /// Register for events. Dropped receivers are pruned on the next emit.
    pub fn subscribe(&mut self) -> mpsc::Receiver<PlayerEvent> {
        let (tx, rx) = mpsc::channel();
        self.listeners.push(tx);
        rx
    }

    /// Fetch and load a document. Playback pauses first; on failure the player keeps the
    /// document it had before, paused.
    #[tracing::instrument(skip(self, source))]
    pub fn load(&mut self, source: &str) -> ReelResult<()> {
        self.pause();
        match self.loader.load(source) {
            Ok(doc) => self.load_document(doc),
            Err(e) => {
                tracing::warn!(error = %e, "source failed to load");
                self.emit(PlayerEvent::Error {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    pub fn load_document(&mut self, doc: SceneDocument) -> ReelResult<()> {
        if let Err(e) = doc.validate() {
            self.emit(PlayerEvent::Error {
                message: e.to_string(),
            });
            return Err(e);
        }
        if self.state == PlaybackState::Playing {
            self.pause();
        }

        self.timeline = SceneTimeline::build(&doc.scenes);
        self.audio.load_background(doc.audio.as_deref());
        self.document = Some(doc);
        self.current_ms = 0.0;
        self.scene_index = 0;
        self.state = PlaybackState::Idle;

        self.present_current();
        if let Some(scene) = self.timeline.get(0) {
            self.audio.on_seek(0.0, scene, false);
        }

        let duration_ms = self.timeline.total_duration_ms();
        tracing::info!(scenes = self.timeline.len(), duration_ms, "document loaded");
        self.emit(PlayerEvent::LoadedMetadata { duration_ms });
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.document.is_some() && !self.timeline.is_empty()
    }

    pub fn document(&self) -> Option<&SceneDocument> {
        self.document.as_ref()
    }

    pub fn play(&mut self) {
        if !self.is_loaded() {
            tracing::debug!("play() ignored: nothing loaded");
            return;
        }
        if self.state == PlaybackState::Playing {
            return;
        }
        if self.state == PlaybackState::Ended {
            self.seek_to(0.0);
        }

        self.state = PlaybackState::Playing;
        self.last_tick_ms = self.clock.now_ms();
        if let Some(scene) = self.timeline.get(self.scene_index) {
            self.audio.on_play(self.current_ms, scene);
        }
        self.emit(PlayerEvent::Play);
    }

    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.state = PlaybackState::Paused;
        self.audio.pause_all();
        self.emit(PlayerEvent::Pause);
    }

    /// Jump to `t_ms` (clamped) without changing play/pause, except that leaving the end
    /// moves an ended player to paused.
    pub fn seek_to(&mut self, t_ms: f64) {
        if !self.is_loaded() {
            return;
        }
        let t = self.timeline.clamp(t_ms);
        self.current_ms = t;
        let idx = self.timeline.locate(t).unwrap_or(0);
        if idx != self.scene_index {
            self.scene_index = idx;
            self.emit(PlayerEvent::SceneChange { index: idx });
        }
        self.present_current();

        let playing = self.state == PlaybackState::Playing;
        if let Some(scene) = self.timeline.get(idx) {
            self.audio.on_seek(t, scene, playing);
        }
        if playing {
            self.last_tick_ms = self.clock.now_ms();
        }
        if self.state == PlaybackState::Ended && t < self.timeline.total_duration_ms() {
            self.state = PlaybackState::Paused;
        }
        self.emit(PlayerEvent::TimeUpdate { current_ms: t });
    }

    /// Advance by the wall-clock time elapsed since the previous tick.
    pub fn tick(&mut self) -> TickOutcome {
        if self.state != PlaybackState::Playing {
            return TickOutcome::Stopped;
        }
        let now = self.clock.now_ms();
        let delta = (now - self.last_tick_ms).max(0.0);
        self.last_tick_ms = now;
        self.current_ms += delta;

        let total = self.timeline.total_duration_ms();
        if self.current_ms >= total {
            self.finish_at_end(total);
            return TickOutcome::Ended;
        }

        let next = self.timeline.advance_from(self.scene_index, self.current_ms);
        if next != self.scene_index {
            self.scene_index = next;
            tracing::debug!(scene = next, t_ms = self.current_ms, "scene transition");
            self.present_current();
            if let Some(scene) = self.timeline.get(next) {
                self.audio.on_transition(self.current_ms, scene, true);
            }
            self.emit(PlayerEvent::SceneChange { index: next });
        }
        self.emit(PlayerEvent::TimeUpdate {
            current_ms: self.current_ms,
        });
        TickOutcome::Continue
    }

    /// Play from the current position until the timeline ends or playback is paused.
    pub fn run(&mut self, pacer: &mut dyn Pacer) -> PlaybackState {
        self.play();
        while self.tick() == TickOutcome::Continue {
            pacer.wait();
        }
        self.state
    }

    fn finish_at_end(&mut self, total: f64) {
        self.current_ms = total;
        let last = self.timeline.len().saturating_sub(1);
        if last != self.scene_index {
            self.scene_index = last;
            self.present_current();
            self.emit(PlayerEvent::SceneChange { index: last });
        }
        self.state = PlaybackState::Ended;
        self.audio.pause_all();
        tracing::info!(t_ms = total, "playback ended");
        self.emit(PlayerEvent::Pause);
        self.emit(PlayerEvent::TimeUpdate { current_ms: total });
        self.emit(PlayerEvent::Ended);
    }

    fn present_current(&mut self) {
        let result = match self.timeline.get(self.scene_index) {
            Some(scene) => {
                let view = ScenePresentation {
                    scene_index: self.scene_index,
                    markup: &scene.spec.html,
                    caption: if self.show_captions {
                        scene.spec.caption()
                    } else {
                        None
                    },
                };
                self.renderer.present(&view)
            }
            None => Ok(()),
        };
        if let Err(e) = result {
            tracing::warn!(scene = self.scene_index, error = %e, "scene failed to render");
            self.emit(PlayerEvent::Error {
                message: e.to_string(),
            });
        }
    }

    fn emit(&mut self, event: PlayerEvent) {
        tracing::trace!(event = event.name(), "player event");
        self.listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn set_captions(&mut self, visible: bool) {
        if self.show_captions == visible {
            return;
        }
        self.show_captions = visible;
        if self.is_loaded() {
            self.present_current();
        }
    }

    pub fn captions(&self) -> bool {
        self.show_captions
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.audio.set_volume(volume);
    }

    pub fn volume(&self) -> f32 {
        self.audio.volume()
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.audio.set_muted(muted);
    }

    pub fn muted(&self) -> bool {
        self.audio.muted()
    }

    pub fn current_time_ms(&self) -> f64 {
        self.current_ms
    }

    pub fn set_current_time_ms(&mut self, t_ms: f64) {
        self.seek_to(t_ms);
    }

    pub fn duration_ms(&self) -> f64 {
        self.timeline.total_duration_ms()
    }

    pub fn paused(&self) -> bool {
        self.state != PlaybackState::Playing
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn scene_index(&self) -> usize {
        self.scene_index
    }

    pub fn timeline(&self) -> &SceneTimeline {
        &self.timeline
    }

    pub fn audio(&self) -> &AudioSync {
        &self.audio
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Current visual state of the renderer.
    pub fn snapshot(&self) -> ReelResult<VisualState> {
        if !self.is_loaded() {
            return Err(ReelError::render("no document loaded"));
        }
        self.renderer.snapshot()
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("state", &self.state)
            .field("current_ms", &self.current_ms)
            .field("scene_index", &self.scene_index)
            .field("duration_ms", &self.timeline.total_duration_ms())
            .finish_non_exhaustive()
    }
}
