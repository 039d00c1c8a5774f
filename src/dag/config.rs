//! Hierarchy configuration and node-region coordinates.

use glam::UVec3;

/// Coordinates stay below 2^21 so per-axis squared distances fit in i64
/// with room for the three-axis sum.
pub const MAX_LEVEL_COUNT: u32 = 21;

/// Configuration of the voxel hierarchy.
///
/// Levels run from 0 (the root, one node covering the whole volume) down to
/// `level_count` (single voxels). Leaf mask nodes live at `level_count - 1`,
/// each covering a 2x2x2 block of voxels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DagConfig {
    level_count: u32,
}

impl DagConfig {
    /// Create a configuration with the given level count.
    ///
    /// Resolution per axis is `2^level_count` voxels.
    pub fn new(level_count: u32) -> Self {
        assert!(
            (2..=MAX_LEVEL_COUNT).contains(&level_count),
            "level_count must be in 2..={MAX_LEVEL_COUNT}"
        );
        Self { level_count }
    }

    /// The level at which coordinates address single voxels.
    pub fn voxel_level(&self) -> u32 {
        self.level_count
    }

    /// The level of 2x2x2 leaf mask nodes.
    pub fn leaf_level(&self) -> u32 {
        self.level_count - 1
    }

    /// Per-axis resolution in voxels.
    pub fn resolution(&self) -> u32 {
        1 << self.level_count
    }
}

/// An axis-aligned cubical region at a given hierarchy level.
///
/// `pos` is the integer lower bound in node units at `level`. Produced by
/// the traversal, consumed only by predicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeCoord {
    pub pos: UVec3,
    pub level: u32,
}

impl NodeCoord {
    /// The root region covering the whole volume.
    pub const ROOT: NodeCoord = NodeCoord {
        pos: UVec3::ZERO,
        level: 0,
    };

    pub fn new(pos: UVec3, level: u32) -> Self {
        Self { pos, level }
    }

    /// Inclusive lower bound of this region in units of `level` (>= own level).
    pub fn lower_bound_at(&self, level: u32) -> UVec3 {
        debug_assert!(level >= self.level);
        let s = level - self.level;
        UVec3::new(self.pos.x << s, self.pos.y << s, self.pos.z << s)
    }

    /// Exclusive upper bound of this region in units of `level` (>= own level).
    pub fn upper_bound_at(&self, level: u32) -> UVec3 {
        debug_assert!(level >= self.level);
        let s = level - self.level;
        UVec3::new(
            (self.pos.x + 1) << s,
            (self.pos.y + 1) << s,
            (self.pos.z + 1) << s,
        )
    }

    /// Child region for an octant in 0..8 (x = bit 0, y = bit 1, z = bit 2).
    pub fn child(&self, octant: u32) -> NodeCoord {
        debug_assert!(octant < 8);
        NodeCoord {
            pos: UVec3::new(
                self.pos.x * 2 + (octant & 1),
                self.pos.y * 2 + ((octant >> 1) & 1),
                self.pos.z * 2 + ((octant >> 2) & 1),
            ),
            level: self.level + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_at_level() {
        let coord = NodeCoord::new(UVec3::new(1, 2, 3), 3);
        assert_eq!(coord.lower_bound_at(3), UVec3::new(1, 2, 3));
        assert_eq!(coord.upper_bound_at(3), UVec3::new(2, 3, 4));
        assert_eq!(coord.lower_bound_at(6), UVec3::new(8, 16, 24));
        assert_eq!(coord.upper_bound_at(6), UVec3::new(16, 24, 32));
    }

    #[test]
    fn test_child_octants() {
        let coord = NodeCoord::new(UVec3::new(2, 0, 1), 4);
        assert_eq!(coord.child(0).pos, UVec3::new(4, 0, 2));
        assert_eq!(coord.child(1).pos, UVec3::new(5, 0, 2));
        assert_eq!(coord.child(2).pos, UVec3::new(4, 1, 2));
        assert_eq!(coord.child(4).pos, UVec3::new(4, 0, 3));
        assert_eq!(coord.child(7).pos, UVec3::new(5, 1, 3));
        assert_eq!(coord.child(7).level, 5);
    }

    #[test]
    fn test_children_tile_parent() {
        let coord = NodeCoord::new(UVec3::new(3, 1, 2), 2);
        let vl = 5;
        for octant in 0..8 {
            let child = coord.child(octant);
            let lb = child.lower_bound_at(vl);
            let ub = child.upper_bound_at(vl);
            assert!(lb.cmpge(coord.lower_bound_at(vl)).all());
            assert!(ub.cmple(coord.upper_bound_at(vl)).all());
        }
    }

    #[test]
    fn test_config_resolution() {
        let config = DagConfig::new(6);
        assert_eq!(config.resolution(), 64);
        assert_eq!(config.voxel_level(), 6);
        assert_eq!(config.leaf_level(), 5);
    }

    #[test]
    #[should_panic]
    fn test_config_rejects_oversized() {
        DagConfig::new(22);
    }
}
