//! Device residency.

pub mod flush;

pub use flush::{flush, flush_world, DeviceFence, SparseBinder};
