//! Tokio adapters for the blocking pool surface.

mod bridge;
