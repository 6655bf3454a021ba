pub(crate) mod channel;
pub(crate) mod pcm;
pub(crate) mod recorder;
pub(crate) mod sync;
