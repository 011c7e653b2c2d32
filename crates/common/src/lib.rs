//! Event primitives shared across all graft crates.

pub mod events;
