//! Sparse voxel DAG data model and storage seams

pub mod config;
pub mod pointer;
pub mod color;
pub mod store;
pub mod memory;

pub use config::{DagConfig, NodeCoord};
pub use pointer::{ColorPtr, NodePtr};
pub use color::VbrColor;
pub use store::{ColorStore, DagStore, PageBind, PagedPool};
pub use memory::{MemoryColorDag, MemoryDag};
