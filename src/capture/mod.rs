//! Real-time capture: sample playback onto a fixed frame grid and encode frames off-thread.

pub(crate) mod encoder;
pub(crate) mod grid;
pub(crate) mod queue;
pub(crate) mod sampler;
