// Core types and traits for the Cadence playback engine

pub mod callback;
pub mod config;
pub mod error;
pub mod media;
pub mod pipeline;
pub mod state;
pub mod unit;

// Re-export commonly used types
pub use callback::{CallbackEvent, CallbackManager, PlayerCallback};
pub use config::{DecodeMode, PlayerConfig};
pub use error::{PlayerError, Result};
pub use media::{MediaInfo, StreamInfo, StreamParams};
pub use pipeline::DecodePipeline;
pub use state::{PlaybackStatus, PlayerState, PlayerStateContainer};
pub use unit::{AudioBlock, DecodedUnit, Payload, PixelFormat, StreamKind, VideoFrame};
