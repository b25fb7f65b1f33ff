// Decode pipeline boundary
// The player drives demux + decode through this trait and never touches codec state itself

use crate::error::Result;
use crate::media::MediaInfo;
use crate::unit::{DecodedUnit, StreamKind};

/// Pull-based source of decoded units.
///
/// Implementations are not required to be usable from two threads at once;
/// callers serialize access (the player holds one lock around every call).
pub trait DecodePipeline: Send {
    /// Open `uri`, discover streams and prepare one decoder per selected stream
    fn prepare(&mut self, uri: &str) -> Result<MediaInfo>;

    /// Next decoded video unit, or `None` if none is available right now
    fn next_video_unit(&mut self) -> Option<DecodedUnit>;

    /// Next decoded audio unit, or `None` if none is available right now
    fn next_audio_unit(&mut self) -> Option<DecodedUnit>;

    /// Whether `kind` has reached end of stream (or does not exist).
    ///
    /// `None` from `next_*_unit` with this returning `false` means the stream
    /// is only starved for the moment.
    fn is_exhausted(&self, kind: StreamKind) -> bool;

    /// Reposition the source and flush decoder-internal buffers
    fn seek(&mut self, seconds: f64) -> Result<()>;

    /// Release decoders and close the source
    fn shutdown(&mut self);
}

impl<P: DecodePipeline + ?Sized> DecodePipeline for Box<P> {
    fn prepare(&mut self, uri: &str) -> Result<MediaInfo> {
        (**self).prepare(uri)
    }

    fn next_video_unit(&mut self) -> Option<DecodedUnit> {
        (**self).next_video_unit()
    }

    fn next_audio_unit(&mut self) -> Option<DecodedUnit> {
        (**self).next_audio_unit()
    }

    fn is_exhausted(&self, kind: StreamKind) -> bool {
        (**self).is_exhausted(kind)
    }

    fn seek(&mut self, seconds: f64) -> Result<()> {
        (**self).seek(seconds)
    }

    fn shutdown(&mut self) {
        (**self).shutdown()
    }
}
