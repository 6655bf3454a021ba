use crate::foundation::error::{ReelError, ReelResult};

/// Control surface of one playable audio source.
///
/// `play` may be refused (no source, undecodable media); callers treat that as non-fatal.
pub trait AudioChannel: Send {
    /// Swap the loaded source. `None` unloads. Playback stops and the position resets to zero.
    fn load(&mut self, uri: Option<&str>) -> ReelResult<()>;
    fn source(&self) -> Option<String>;
    fn play(&mut self) -> ReelResult<()>;
    fn pause(&mut self);
    fn is_playing(&self) -> bool;
    fn position_ms(&self) -> f64;
    fn set_position_ms(&mut self, ms: f64) -> ReelResult<()>;
    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32);
}

/// Silent channel that only keeps control state. Its position never advances on its own.
#[derive(Clone, Debug)]
pub struct NullAudioChannel {
    source: Option<String>,
    playing: bool,
    position_ms: f64,
    volume: f32,
}

impl NullAudioChannel {
    pub fn new() -> Self {
        Self {
            source: None,
            playing: false,
            position_ms: 0.0,
            volume: 1.0,
        }
    }
}

impl Default for NullAudioChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioChannel for NullAudioChannel {
    fn load(&mut self, uri: Option<&str>) -> ReelResult<()> {
        self.source = uri.map(str::to_owned);
        self.playing = false;
        self.position_ms = 0.0;
        Ok(())
    }

    fn source(&self) -> Option<String> {
        self.source.clone()
    }

    fn play(&mut self) -> ReelResult<()> {
        if self.source.is_none() {
            return Err(ReelError::audio("no source loaded"));
        }
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn position_ms(&self) -> f64 {
        self.position_ms
    }

    fn set_position_ms(&mut self, ms: f64) -> ReelResult<()> {
        self.position_ms = ms.max(0.0);
        Ok(())
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }
}
