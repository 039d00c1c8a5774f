//! Predicate capability shapes.
//!
//! A spatial predicate answers "does this region need visiting, and how" at
//! two granularities: whole subtrees (`edit_node`) and single voxels
//! (`edit_voxel`). Color-aware predicates additionally compute a color
//! through an in/out slot. The traversal never inspects the concrete
//! predicate type; it dispatches through these traits.

use crate::dag::{DagConfig, NodeCoord, NodePtr, VbrColor};

/// Node-granularity edit decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditAction {
    /// Skip the subtree, keep it as is.
    NotAffected,
    /// Replace the entire subtree with "all voxels present".
    Fill,
    /// Replace the entire subtree with "all voxels absent".
    /// Only legal for destructive edits.
    Clear,
    /// Recurse into children; the only case the traversal descends.
    Proceed,
}

/// Sphere brush behavior.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EditMode {
    /// Add voxels.
    #[default]
    Fill,
    /// Remove voxels; never color-aware.
    Dig,
    /// Recolor existing voxels; never creates or removes any.
    Paint,
}

/// A predicate that only flips presence.
pub trait VoxelEditor {
    /// Decide the fate of a whole node region.
    fn edit_node(&self, config: &DagConfig, coord: &NodeCoord, ptr: NodePtr) -> EditAction;

    /// Decide presence of a single voxel where node-level pruning could not
    /// resolve the region. `coord` is at the voxel level.
    fn edit_voxel(&self, config: &DagConfig, coord: &NodeCoord, voxel: bool) -> bool;
}

/// A predicate that computes presence and color together.
///
/// On entry the color slot holds the aggregate color of the existing
/// subtree or voxel (unset when divergent or absent); on exit it holds the
/// color the edit wants recorded. An unset output at node granularity
/// forces per-voxel resolution.
pub trait VbrVoxelEditor {
    fn edit_node(
        &self,
        config: &DagConfig,
        coord: &NodeCoord,
        ptr: NodePtr,
        color: &mut VbrColor,
    ) -> EditAction;

    fn edit_voxel(
        &self,
        config: &DagConfig,
        coord: &NodeCoord,
        voxel: bool,
        color: &mut VbrColor,
    ) -> bool;
}
