//! Bounded, concurrent experience replay buffers for off-policy
//! learning pipelines.
//!
//! A replay buffer is a fixed-capacity ring of opaque payloads (most
//! often environment transitions) that a producer writes into and a
//! consumer draws randomized batches from. This crate provides two
//! variants sharing one storage core:
//!
//! - [`buffer::ReplayBuffer`] draws indices uniformly with replacement.
//! - [`buffer::PrioritizedBuffer`] draws indices with probability
//!   proportional to a per-slot priority, tracked with a pair of
//!   segment trees, and returns importance-sampling weights alongside
//!   each batch.
//!
//! Both variants are content-agnostic: they never inspect the payload
//! type `T` directly, instead delegating batch assembly to an injected
//! [`collate::Collate`] strategy, and optionally overlap sampling with
//! consumer work through a bounded background [`prefetch`] pipeline.
//!
//! # Example
//!
//! ```
//! use replay::{ReplayBuffer, ReplayBufferConfig};
//! use replay::collate::RecordCollate;
//!
//! let config = ReplayBufferConfig::new(1024).unwrap();
//! let buffer = ReplayBuffer::new(config, RecordCollate);
//! let mut row = replay::collate::Record::new();
//! row.insert("reward".to_string(), vec![1.0]);
//! buffer.add(row);
//! let batch = buffer.sample(1).unwrap();
//! assert_eq!(batch["reward"].rows, 1);
//! ```

pub mod buffer;
pub mod collate;
pub mod config;
pub mod constants;
pub mod device;
pub mod error;
pub mod metrics;
pub mod prefetch;
pub mod segment_tree;
pub mod storage;

pub use buffer::{PrioritizedBuffer, PrioritizedSample, ReplayBuffer};
pub use config::{PrioritizedConfig, ReplayBufferConfig};
pub use error::{ReplayError, Result};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
