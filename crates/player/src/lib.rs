// Synchronization and pipeline control for Cadence

pub mod control;
pub mod player;
pub mod sync;
pub mod worker;

pub use control::{PlaybackController, SeekController};
pub use player::MediaPlayer;
pub use sync::{SyncController, TickReport};
pub use worker::ThreadedPipeline;
