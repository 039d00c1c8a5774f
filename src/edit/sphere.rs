//! Sphere brush predicate: fill, dig, paint.

use glam::{I64Vec3, UVec3};

use crate::dag::{DagConfig, NodeCoord, NodePtr, VbrColor};
use crate::edit::editor::{EditAction, EditMode, VbrVoxelEditor, VoxelEditor};

/// Edits the ball of squared radius `r2` around `center` (voxel
/// coordinates), in one of three modes.
///
/// Node decisions use squared-distance bounds so no square root is taken;
/// all arithmetic is 64-bit wide, which cannot overflow for coordinates up
/// to 2^20 and radii up to 2^11.
#[derive(Clone, Copy, Debug)]
pub struct SphereBrush {
    pub mode: EditMode,
    pub center: UVec3,
    pub r2: u64,
    pub color: VbrColor,
}

impl SphereBrush {
    pub fn new(mode: EditMode, center: UVec3, radius: f32, color: VbrColor) -> Self {
        // Square before truncating so fractional radii keep their reach.
        let r = f64::from(radius.max(0.0));
        Self {
            mode,
            center,
            r2: (r * r) as u64,
            color,
        }
    }

    fn voxel_in_range(&self, coord: &NodeCoord) -> bool {
        let d = coord.pos.as_i64vec3() - self.center.as_i64vec3();
        let d2 = (d.x * d.x + d.y * d.y + d.z * d.z) as u64;
        d2 <= self.r2
    }

    /// Upper bound on the squared distance from any point of the node to
    /// the center: per-axis max of the two bound distances, summed.
    fn max_d2(lb_d: I64Vec3, ub_d: I64Vec3) -> u64 {
        let lb2 = lb_d * lb_d;
        let ub2 = ub_d * ub_d;
        let m = lb2.max(ub2);
        (m.x + m.y + m.z) as u64
    }

    /// Lower bound on the squared distance: a bound distance contributes
    /// only when the node lies entirely on one side of the center.
    fn min_d2(lb_d: I64Vec3, ub_d: I64Vec3) -> u64 {
        let mut n2 = 0i64;
        if lb_d.x > 0 {
            n2 += lb_d.x * lb_d.x;
        }
        if ub_d.x < 0 {
            n2 += ub_d.x * ub_d.x;
        }
        if lb_d.y > 0 {
            n2 += lb_d.y * lb_d.y;
        }
        if ub_d.y < 0 {
            n2 += ub_d.y * ub_d.y;
        }
        if lb_d.z > 0 {
            n2 += lb_d.z * lb_d.z;
        }
        if ub_d.z < 0 {
            n2 += ub_d.z * ub_d.z;
        }
        n2 as u64
    }

    fn node_action(&self, config: &DagConfig, coord: &NodeCoord) -> EditAction {
        let vl = config.voxel_level();
        let lb_d = coord.lower_bound_at(vl).as_i64vec3() - self.center.as_i64vec3();
        let ub_d = coord.upper_bound_at(vl).as_i64vec3() - self.center.as_i64vec3();

        if Self::max_d2(lb_d, ub_d) <= self.r2 {
            return match self.mode {
                EditMode::Dig => EditAction::Clear,
                EditMode::Fill | EditMode::Paint => EditAction::Fill,
            };
        }
        if Self::min_d2(lb_d, ub_d) > self.r2 {
            EditAction::NotAffected
        } else {
            EditAction::Proceed
        }
    }
}

impl VoxelEditor for SphereBrush {
    fn edit_node(&self, config: &DagConfig, coord: &NodeCoord, ptr: NodePtr) -> EditAction {
        let mut action = self.node_action(config, coord);
        // Painting never creates voxels; a subtree that does not exist is
        // left alone (explicit null only).
        if self.mode == EditMode::Paint && (action == EditAction::Fill || ptr.is_null()) {
            action = if ptr.is_null() {
                EditAction::NotAffected
            } else {
                EditAction::Proceed
            };
        }
        action
    }

    fn edit_voxel(&self, _config: &DagConfig, coord: &NodeCoord, voxel: bool) -> bool {
        match self.mode {
            EditMode::Paint => voxel,
            EditMode::Fill => voxel || self.voxel_in_range(coord),
            EditMode::Dig => voxel && !self.voxel_in_range(coord),
        }
    }
}

impl VbrVoxelEditor for SphereBrush {
    fn edit_node(
        &self,
        config: &DagConfig,
        coord: &NodeCoord,
        ptr: NodePtr,
        color: &mut VbrColor,
    ) -> EditAction {
        debug_assert!(self.mode != EditMode::Dig, "dig edits are never color-aware");
        let mut action = self.node_action(config, coord);
        if action == EditAction::Fill {
            *color = self.color;
            if self.mode == EditMode::Paint {
                action = EditAction::NotAffected;
            }
        } else if ptr.is_null() || *color == self.color {
            *color = self.color;
        } else {
            *color = VbrColor::UNSET;
        }
        if self.mode == EditMode::Paint && ptr.is_null() {
            action = EditAction::NotAffected;
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
        debug_assert!(self.mode != EditMode::Dig, "dig edits are never color-aware");
        let in_range = self.voxel_in_range(coord);
        if in_range || !voxel {
            *color = self.color;
        }
        match self.mode {
            EditMode::Fill => voxel || in_range,
            _ => voxel,
        }
    }
}
