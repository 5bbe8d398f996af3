//! Frame-in-flight synchronization.

mod frame_synchronizer;

pub use frame_synchronizer::FrameSynchronizer;
