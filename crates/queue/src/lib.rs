// Bounded buffers between the decode, tick and device threads

pub mod frame_channel;
pub mod sample_ring;

pub use frame_channel::BoundedFrameChannel;
pub use sample_ring::{SampleRing, SharedSampleRing};
