//! Model import.

pub mod vox;

pub use vox::{stamp_file, VoxError, VoxModel};
