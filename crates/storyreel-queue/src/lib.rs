//! In-process job tracking for StoryReel.
//!
//! This crate provides:
//! - A [`JobStore`] abstraction with an in-memory implementation
//! - [`JobTracker`], which drives jobs through their state machine
//! - Broadcast [`JobEvent`]s for polling-free progress observation

pub mod error;
pub mod store;
pub mod tracker;

pub use error::{QueueError, QueueResult};
pub use store::{InMemoryJobStore, JobMutation, JobStore};
pub use tracker::{JobEvent, JobEventStream, JobHandle, JobTracker};
