//! # tagpool
//!
//! A tagged, elastic worker pool: user-supplied units of work execute
//! across a bounded population of workers partitioned into named groups of
//! reserved slots.
//!
//! ## Core Ideas
//!
//! - **Per-tag capacity reservations**: each group holds a reserved number
//!   of execution slots, and a generic overflow group lends slots to any
//!   group whose own reservation is saturated.
//! - **Live capacity reallocation**: group sizes can be adjusted while
//!   work is in flight, optionally exchanging slots with the generic
//!   reserve so total capacity is conserved, without ever cancelling
//!   running work.
//! - **Backpressured ingestion**: bulk submission consumes its input
//!   lazily, so a large or infinite stream never materialises more task
//!   records than there is capacity to run.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use tagpool::builders::TagPoolBuilder;
//!
//! let pool = TagPoolBuilder::<u64>::new()
//!     .reserve("encode", 2)
//!     .generic_slots(2)
//!     .build()?;
//!
//! let ingest = pool.ingest(1..=100u64, "encode", |n| Ok(n * n));
//! ingest.wait()?;
//! pool.stop(true);
//!
//! let squares: Vec<u64> = pool.iter().collect();
//! assert_eq!(squares.len(), 100);
//! # Ok::<(), tagpool::core::PoolError>(())
//! ```
//!
//! Results are delivered in completion order, either to callbacks
//! (per-task or pool-default) or through the blocking result iterator,
//! never both. See [`core::TagPool`] for the full surface.

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core admission control, slot accounting, and dispatch.
pub mod core;
/// Configuration models for pools and executors.
pub mod config;
/// Builders to construct pools from code or configuration.
pub mod builders;
/// Tokio adapters for the blocking pool surface.
#[cfg(feature = "tokio-runtime")]
pub mod runtime;
/// Shared utilities.
pub mod util;
