//! # index-version
//!
//! Version descriptors for a partitioned search index.
//!
//! A [`version::Version`] names the immutable set of segments a reader may
//! open, together with the schema road-map, the data-source locator and the
//! fence lineage that lets readers fast-forward across writer failovers.
//!
//! ## Features
//!
//! - Versioned JSON documents with legacy migration and self-repair
//! - Fence-aware fast-forward checks between versions
//! - Savepoint tracking for partition checkpoints
//! - Pluggable storage backends (file, memory)

pub mod checkpoint;
pub mod cli;
pub mod error;
pub mod storage;
pub mod version;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
