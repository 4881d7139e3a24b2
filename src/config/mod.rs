//! Configuration models for pools and executors.

pub mod pool;

pub use pool::PoolConfig;
