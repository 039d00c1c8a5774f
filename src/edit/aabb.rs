//! Axis-aligned box fill predicate.

use glam::UVec3;

use crate::dag::{DagConfig, NodeCoord, NodePtr, VbrColor};
use crate::edit::editor::{EditAction, VbrVoxelEditor, VoxelEditor};

/// Fills the inclusive-exclusive box `[min, max)` in voxel coordinates
/// with a uniform color.
///
/// Boundary convention is exact: a node is outside when its exclusive
/// upper bound reaches `min` or its lower bound reaches `max` on any axis.
#[derive(Clone, Copy, Debug)]
pub struct BoxBrush {
    pub min: UVec3,
    pub max: UVec3,
    pub color: VbrColor,
}

impl BoxBrush {
    fn voxel_in_range(&self, coord: &NodeCoord) -> bool {
        coord.pos.cmpge(self.min).all() && coord.pos.cmplt(self.max).all()
    }

    fn node_action(&self, config: &DagConfig, coord: &NodeCoord) -> EditAction {
        let vl = config.voxel_level();
        let lb = coord.lower_bound_at(vl);
        let ub = coord.upper_bound_at(vl);
        if ub.cmple(self.min).any() || lb.cmpge(self.max).any() {
            return EditAction::NotAffected;
        }
        if lb.cmpge(self.min).all() && ub.cmple(self.max).all() {
            return EditAction::Fill;
        }
        EditAction::Proceed
    }
}

impl VoxelEditor for BoxBrush {
    fn edit_node(&self, config: &DagConfig, coord: &NodeCoord, _ptr: NodePtr) -> EditAction {
        self.node_action(config, coord)
    }

    fn edit_voxel(&self, _config: &DagConfig, coord: &NodeCoord, voxel: bool) -> bool {
        voxel || self.voxel_in_range(coord)
    }
}

impl VbrVoxelEditor for BoxBrush {
    fn edit_node(
        &self,
        config: &DagConfig,
        coord: &NodeCoord,
        ptr: NodePtr,
        color: &mut VbrColor,
    ) -> EditAction {
        let action = self.node_action(config, coord);
        if action == EditAction::Fill || ptr.is_null() || *color == self.color {
            *color = self.color;
        } else {
            *color = VbrColor::UNSET;
        }
        action
    }

    fn edit_voxel(
        &self,
        _config: &DagConfig,
        coord: &NodeCoord,
        voxel: bool,
        color: &mut VbrColor,
    ) -> bool {
        let in_range = self.voxel_in_range(coord);
        if in_range || !voxel {
            *color = self.color;
        }
        voxel || in_range
    }
}
