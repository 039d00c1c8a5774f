//! Voxdag - sparse voxel DAG editing engine
//!
//! Edits a hierarchical sparse voxel structure through spatial predicates
//! (box, sphere, imported point sets) and schedules those edits so that at
//! most one mutation is in flight while the structure is read for rendering.

pub mod core;
pub mod dag;
pub mod edit;
pub mod import;
pub mod render;
