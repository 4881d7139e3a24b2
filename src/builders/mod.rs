//! Builders to construct pools from code or configuration.

pub mod pool_builder;

pub use pool_builder::{build_pool, TagPoolBuilder};
