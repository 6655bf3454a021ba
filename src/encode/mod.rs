pub(crate) mod ffmpeg;
pub(crate) mod mux;
pub(crate) mod workspace;
