//! Application layer: assembles the engine from configuration.

pub mod lifecycle;

pub use lifecycle::{Lifecycle, LifecycleBuilder, LifecycleEngine};
