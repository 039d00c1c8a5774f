//! In-memory reference storage engine.
//!
//! Content-interned presence DAG and color octree behind the `DagStore` /
//! `ColorStore` seams. Identical subtrees share one entry regardless of
//! position, so repeating an edit reproduces the same root handle. Page
//! allocation is tracked so the flush stage can bind freshly grown pages.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::Instant;

use glam::UVec3;
use rayon::prelude::*;

use crate::dag::{
    ColorPtr, ColorStore, DagConfig, DagStore, NodeCoord, NodePtr, PageBind, PagedPool, VbrColor,
};
use crate::edit::editor::EditAction;
use crate::edit::protocol::EditorProtocol;

/// Entries per page in the node pool.
const NODE_PAGE_LEN: usize = 4096;
/// Entries per page in the color pools.
const COLOR_PAGE_LEN: usize = 4096;
/// Subtree recursion is handed to the worker pool above this level.
const PARALLEL_DEPTH: u32 = 2;

/// An interning arena with page-granular bind tracking.
struct Paged<T> {
    label: &'static str,
    page_len: usize,
    inner: Mutex<PagedInner<T>>,
}

struct PagedInner<T> {
    entries: Vec<T>,
    index: HashMap<T, u32>,
    /// Entry count at the last committed flush.
    bound_len: usize,
}

impl<T: Copy + Eq + Hash> Paged<T> {
    fn new(label: &'static str, page_len: usize) -> Self {
        Self {
            label,
            page_len,
            inner: Mutex::new(PagedInner {
                entries: Vec::new(),
                index: HashMap::new(),
                bound_len: 0,
            }),
        }
    }

    fn intern(&self, value: T) -> u32 {
        let mut inner = self.inner.lock().unwrap();
        if let Some(&index) = inner.index.get(&value) {
            return index;
        }
        let index = inner.entries.len() as u32;
        inner.entries.push(value);
        inner.index.insert(value, index);
        if inner.entries.len() % self.page_len == 1 && index != 0 {
            log::debug!(
                "{} pool grew to page {}",
                self.label,
                inner.entries.len() / self.page_len
            );
        }
        index
    }

    fn get(&self, index: u32) -> T {
        self.inner.lock().unwrap().entries[index as usize]
    }

    fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    /// Swap in a rebuilt arena. All pages become pending again.
    fn replace(&self, entries: Vec<T>, index: HashMap<T, u32>) {
        let mut inner = self.inner.lock().unwrap();
        inner.entries = entries;
        inner.index = index;
        inner.bound_len = 0;
    }
}

impl<T: Copy + Eq + Hash> PagedPool for Paged<T> {
    fn pending_binds(&self) -> Vec<PageBind> {
        let inner = self.inner.lock().unwrap();
        if inner.entries.len() <= inner.bound_len {
            return Vec::new();
        }
        let first = inner.bound_len / self.page_len;
        let last = (inner.entries.len() - 1) / self.page_len;
        (first..=last)
            .map(|page| PageBind {
                pool: self.label,
                page: page as u32,
            })
            .collect()
    }

    fn commit_binds(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.bound_len = inner.entries.len();
    }
}

/// A node in the presence DAG.
///
/// Branches hold eight child handles; leaves hold a 2x2x2 presence bitmask
/// (bit = octant index). The absent subtree is the null handle, never an
/// interned node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum MemNode {
    Branch([NodePtr; 8]),
    Leaf(u8),
}

/// Compacted arena built by `gc`, waiting to be installed.
struct StagedGc {
    entries: Vec<MemNode>,
    index: HashMap<MemNode, u32>,
}

/// Content-interned presence DAG.
pub struct MemoryDag {
    config: DagConfig,
    nodes: Paged<MemNode>,
    staged: Mutex<Option<StagedGc>>,
}

impl MemoryDag {
    pub fn new(config: DagConfig) -> Self {
        Self {
            config,
            nodes: Paged::new("dag_nodes", NODE_PAGE_LEN),
            staged: Mutex::new(None),
        }
    }

    /// The node pool for flush enumeration.
    pub fn pool(&self) -> &dyn PagedPool {
        &self.nodes
    }

    /// Unique interned nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn intern(&self, node: MemNode) -> NodePtr {
        NodePtr::from_index(self.nodes.intern(node))
    }

    fn get(&self, ptr: NodePtr) -> Option<MemNode> {
        ptr.index().map(|i| self.nodes.get(i as u32))
    }

    /// Canonical all-present subtree rooted at `level`.
    fn full(&self, level: u32) -> NodePtr {
        let mut ptr = self.intern(MemNode::Leaf(0xff));
        let mut l = self.config.leaf_level();
        while l > level {
            ptr = self.intern(MemNode::Branch([ptr; 8]));
            l -= 1;
        }
        ptr
    }

    fn children_of(&self, ptr: NodePtr) -> [NodePtr; 8] {
        match self.get(ptr) {
            Some(MemNode::Branch(children)) => children,
            Some(MemNode::Leaf(_)) => {
                debug_assert!(false, "leaf node above leaf level");
                [NodePtr::NULL; 8]
            }
            None => [NodePtr::NULL; 8],
        }
    }

    fn leaf_mask(&self, ptr: NodePtr) -> u8 {
        match self.get(ptr) {
            Some(MemNode::Leaf(mask)) => mask,
            Some(MemNode::Branch(_)) => {
                debug_assert!(false, "branch node at leaf level");
                0
            }
            None => 0,
        }
    }

    fn edit_rec<P: EditorProtocol>(
        &self,
        protocol: &P,
        coord: NodeCoord,
        ptr: NodePtr,
        subtree: &mut P::Subtree,
    ) -> NodePtr {
        match protocol.node(&self.config, &coord, ptr, subtree) {
            EditAction::NotAffected => ptr,
            EditAction::Clear => NodePtr::NULL,
            EditAction::Fill => self.full(coord.level),
            EditAction::Proceed if coord.level == self.config.leaf_level() => {
                let mask = self.leaf_mask(ptr);
                let mut out_mask = 0u8;
                let mut subs: [P::Subtree; 8] =
                    std::array::from_fn(|o| protocol.child(subtree, o));
                for (octant, sub) in subs.iter_mut().enumerate() {
                    let voxel = coord.child(octant as u32);
                    let present = mask & (1 << octant) != 0;
                    if protocol.voxel(&self.config, &voxel, present, sub) {
                        out_mask |= 1 << octant;
                    }
                }
                protocol.assemble(subtree, subs);
                if out_mask == 0 {
                    NodePtr::NULL
                } else {
                    self.intern(MemNode::Leaf(out_mask))
                }
            }
            EditAction::Proceed => {
                let children = self.children_of(ptr);
                let mut subs: [P::Subtree; 8] =
                    std::array::from_fn(|o| protocol.child(subtree, o));
                let mut out = [NodePtr::NULL; 8];
                if coord.level < PARALLEL_DEPTH && coord.level + 3 < self.config.leaf_level() {
                    out.as_mut_slice()
                        .par_iter_mut()
                        .zip(subs.as_mut_slice().par_iter_mut())
                        .enumerate()
                        .for_each(|(octant, (slot, sub))| {
                            *slot = self.edit_rec(
                                protocol,
                                coord.child(octant as u32),
                                children[octant],
                                sub,
                            );
                        });
                } else {
                    for octant in 0..8 {
                        out[octant] = self.edit_rec(
                            protocol,
                            coord.child(octant as u32),
                            children[octant],
                            &mut subs[octant],
                        );
                    }
                }
                protocol.assemble(subtree, subs);
                if out.iter().all(|p| p.is_null()) {
                    NodePtr::NULL
                } else {
                    self.intern(MemNode::Branch(out))
                }
            }
        }
    }

    /// Presence of a single voxel under `root`.
    pub fn voxel(&self, root: NodePtr, pos: UVec3) -> bool {
        debug_assert!(pos.max_element() < self.config.resolution());
        let vl = self.config.voxel_level();
        let mut ptr = root;
        for level in 0..vl {
            if ptr.is_null() {
                return false;
            }
            let bit = vl - 1 - level;
            let octant = (((pos.x >> bit) & 1)
                | (((pos.y >> bit) & 1) << 1)
                | (((pos.z >> bit) & 1) << 2)) as usize;
            if level == vl - 1 {
                return self.leaf_mask(ptr) & (1 << octant) != 0;
            }
            ptr = self.children_of(ptr)[octant];
        }
        false
    }

    fn copy_reachable(
        &self,
        ptr: NodePtr,
        level: u32,
        entries: &mut Vec<MemNode>,
        index: &mut HashMap<MemNode, u32>,
        memo: &mut HashMap<NodePtr, NodePtr>,
    ) -> NodePtr {
        if ptr.is_null() {
            return NodePtr::NULL;
        }
        if let Some(&copied) = memo.get(&ptr) {
            return copied;
        }
        let node = match self.get(ptr) {
            Some(MemNode::Leaf(mask)) => MemNode::Leaf(mask),
            Some(MemNode::Branch(children)) => MemNode::Branch(
                children.map(|child| self.copy_reachable(child, level + 1, entries, index, memo)),
            ),
            None => return NodePtr::NULL,
        };
        let new_ptr = match index.get(&node) {
            Some(&i) => NodePtr::from_index(i),
            None => {
                let i = entries.len() as u32;
                entries.push(node);
                index.insert(node, i);
                NodePtr::from_index(i)
            }
        };
        memo.insert(ptr, new_ptr);
        new_ptr
    }
}

impl DagStore for MemoryDag {
    fn config(&self) -> &DagConfig {
        &self.config
    }

    fn edit<P: EditorProtocol>(&self, root: NodePtr, protocol: &P) -> (NodePtr, Option<ColorPtr>) {
        let mut subtree = protocol.root_subtree();
        let new_root = self.edit_rec(protocol, NodeCoord::ROOT, root, &mut subtree);
        (new_root, protocol.finish(subtree))
    }

    fn gc(&self, root: NodePtr) -> NodePtr {
        let start = Instant::now();
        let before = self.nodes.len();
        let mut entries = Vec::new();
        let mut index = HashMap::new();
        let mut memo = HashMap::new();
        let new_root = self.copy_reachable(root, 0, &mut entries, &mut index, &mut memo);
        let after = entries.len();
        *self.staged.lock().unwrap() = Some(StagedGc { entries, index });
        log::debug!(
            "gc staged {} -> {} nodes in {:.2} ms",
            before,
            after,
            start.elapsed().as_secs_f64() * 1000.0
        );
        new_root
    }

    fn commit_gc(&self) {
        if let Some(staged) = self.staged.lock().unwrap().take() {
            self.nodes.replace(staged.entries, staged.index);
        }
    }
}

/// Interned color octree: uniform leaves plus branch nodes.
///
/// Uniform subtrees are level-agnostic, so a bulk fill is a single leaf
/// entry shared by every level it covers.
pub struct MemoryColorDag {
    uniforms: Paged<VbrColor>,
    branches: Paged<[ColorPtr; 8]>,
}

impl MemoryColorDag {
    pub fn new() -> Self {
        Self {
            uniforms: Paged::new("color_leaves", COLOR_PAGE_LEN),
            branches: Paged::new("color_nodes", COLOR_PAGE_LEN),
        }
    }

    /// The branch-node pool for flush enumeration.
    pub fn node_pool(&self) -> &dyn PagedPool {
        &self.branches
    }

    /// The uniform-leaf pool for flush enumeration.
    pub fn leaf_pool(&self) -> &dyn PagedPool {
        &self.uniforms
    }

    /// Color of a single voxel under `root`.
    pub fn voxel_color(&self, root: ColorPtr, pos: UVec3, config: &DagConfig) -> VbrColor {
        let vl = config.voxel_level();
        let mut ptr = root;
        for level in 0..vl {
            if ptr.is_null() || ptr.leaf_index().is_some() {
                break;
            }
            let bit = vl - 1 - level;
            let octant = (((pos.x >> bit) & 1)
                | (((pos.y >> bit) & 1) << 1)
                | (((pos.z >> bit) & 1) << 2)) as usize;
            ptr = self.child(ptr, octant);
        }
        self.aggregate(ptr)
    }
}

impl Default for MemoryColorDag {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorStore for MemoryColorDag {
    fn aggregate(&self, ptr: ColorPtr) -> VbrColor {
        match ptr.leaf_index() {
            Some(i) => self.uniforms.get(i as u32),
            None => VbrColor::UNSET,
        }
    }

    fn child(&self, ptr: ColorPtr, octant: usize) -> ColorPtr {
        debug_assert!(octant < 8);
        if ptr.leaf_index().is_some() {
            return ptr;
        }
        match ptr.branch_index() {
            Some(i) => self.branches.get(i as u32)[octant],
            None => ColorPtr::NULL,
        }
    }

    fn uniform(&self, color: VbrColor) -> ColorPtr {
        ColorPtr::from_leaf(self.uniforms.intern(color))
    }

    fn branch(&self, children: [ColorPtr; 8]) -> ColorPtr {
        let first = children[0];
        let collapsible = first.is_null() || first.leaf_index().is_some();
        if collapsible && children.iter().all(|&c| c == first) {
            return first;
        }
        ColorPtr::from_branch(self.branches.intern(children))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::editor::{VbrVoxelEditor, VoxelEditor};
    use crate::edit::protocol::StatelessEdit;
    use crate::edit::BoxBrush;

    struct FillEverything;

    impl VoxelEditor for FillEverything {
        fn edit_node(&self, _: &DagConfig, _: &NodeCoord, _: NodePtr) -> EditAction {
            EditAction::Fill
        }
        fn edit_voxel(&self, _: &DagConfig, _: &NodeCoord, _: bool) -> bool {
            true
        }
    }

    #[test]
    fn test_full_subtree_is_canonical() {
        let dag = MemoryDag::new(DagConfig::new(4));
        let a = dag.full(0);
        let b = dag.full(0);
        assert_eq!(a, b);
        // One leaf plus one branch per level above it.
        assert_eq!(dag.node_count(), 4);
    }

    #[test]
    fn test_fill_everything_equals_full() {
        let dag = MemoryDag::new(DagConfig::new(4));
        let (root, color) = dag.edit(NodePtr::NULL, &StatelessEdit(&FillEverything));
        assert_eq!(root, dag.full(0));
        assert!(color.is_none());
        assert!(dag.voxel(root, UVec3::new(0, 0, 0)));
        assert!(dag.voxel(root, UVec3::new(15, 15, 15)));
    }

    #[test]
    fn test_box_edit_sets_exact_voxels() {
        let config = DagConfig::new(5);
        let dag = MemoryDag::new(config);
        let colors = MemoryColorDag::new();
        let brush = BoxBrush {
            min: UVec3::new(3, 3, 3),
            max: UVec3::new(9, 7, 5),
            color: VbrColor::rgb8(0xff0000),
        };
        let (root, color_root) =
            dag.edit_vbr(NodePtr::NULL, &brush, &colors, ColorPtr::NULL);
        for x in 0..32 {
            for y in 0..32 {
                for z in 0..32 {
                    let pos = UVec3::new(x, y, z);
                    let inside = (3..9).contains(&x) && (3..7).contains(&y) && (3..5).contains(&z);
                    assert_eq!(dag.voxel(root, pos), inside, "presence at {pos:?}");
                    if inside {
                        assert_eq!(
                            colors.voxel_color(color_root, pos, &config),
                            VbrColor::rgb8(0xff0000)
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_edit_is_structurally_idempotent() {
        let dag = MemoryDag::new(DagConfig::new(6));
        let colors = MemoryColorDag::new();
        let brush = BoxBrush {
            min: UVec3::new(0, 0, 0),
            max: UVec3::new(10, 10, 10),
            color: VbrColor::rgb8(0x00ffff),
        };
        let (r1, c1) = dag.edit_vbr(NodePtr::NULL, &brush, &colors, ColorPtr::NULL);
        let (r2, c2) = dag.edit_vbr(r1, &brush, &colors, c1);
        assert_eq!(r1, r2);
        assert_eq!(c1, c2);
    }

    #[test]
    fn test_refill_after_dig_restores_previous_root() {
        use crate::edit::{EditMode, SphereBrush};

        let dag = MemoryDag::new(DagConfig::new(6));
        let fill = BoxBrush {
            min: UVec3::new(4, 4, 4),
            max: UVec3::new(28, 28, 28),
            color: VbrColor::UNSET,
        };
        let filled = dag.edit_stateless(NodePtr::NULL, &fill);

        let dig = SphereBrush::new(EditMode::Dig, UVec3::new(16, 16, 16), 5.0, VbrColor::UNSET);
        let dug = dag.edit_stateless(filled, &dig);
        assert_ne!(dug, filled);
        assert!(!dag.voxel(dug, UVec3::new(16, 16, 16)));
        assert!(dag.voxel(dug, UVec3::new(5, 5, 5)));

        // Interning makes restoration exact: refilling the box hands back
        // the pre-dig root.
        assert_eq!(dag.edit_stateless(dug, &fill), filled);
    }

    #[test]
    fn test_paint_recolors_without_touching_presence() {
        use crate::edit::{EditMode, SphereBrush};

        let config = DagConfig::new(5);
        let dag = MemoryDag::new(config);
        let colors = MemoryColorDag::new();
        let fill = BoxBrush {
            min: UVec3::ZERO,
            max: UVec3::new(16, 16, 16),
            color: VbrColor::rgb8(0xff0000),
        };
        let (root, color_root) = dag.edit_vbr(NodePtr::NULL, &fill, &colors, ColorPtr::NULL);

        let center = UVec3::new(8, 8, 8);
        let paint = SphereBrush::new(EditMode::Paint, center, 4.0, VbrColor::rgb8(0x00ff00));
        let (painted, painted_colors) = dag.edit_vbr(root, &paint, &colors, color_root);
        assert_eq!(painted, root);

        for x in 0..16 {
            for y in 0..16 {
                for z in 0..16 {
                    let pos = UVec3::new(x, y, z);
                    let d = pos.as_i64vec3() - center.as_i64vec3();
                    let in_sphere = (d.x * d.x + d.y * d.y + d.z * d.z) as u64 <= 16;
                    let expect = if in_sphere { 0x00ff00 } else { 0xff0000 };
                    assert_eq!(
                        colors.voxel_color(painted_colors, pos, &config),
                        VbrColor::rgb8(expect),
                        "color at {pos:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_gc_preserves_structure() {
        let dag = MemoryDag::new(DagConfig::new(5));
        let brush = BoxBrush {
            min: UVec3::new(1, 1, 1),
            max: UVec3::new(20, 20, 20),
            color: VbrColor::UNSET,
        };
        let root = dag.edit_stateless(NodePtr::NULL, &brush);
        // Orphan some nodes by shrinking the region.
        let brush2 = BoxBrush {
            min: UVec3::new(1, 1, 1),
            max: UVec3::new(4, 4, 4),
            color: VbrColor::UNSET,
        };
        let root2 = dag.edit_stateless(NodePtr::NULL, &brush2);
        let before = dag.node_count();
        let new_root = dag.gc(root2);

        // Staged only: every pre-compaction handle still reads correctly.
        assert_eq!(dag.node_count(), before);
        assert!(dag.voxel(root, UVec3::new(10, 10, 10)));
        assert!(dag.voxel(root2, UVec3::new(2, 2, 2)));
        assert!(!dag.voxel(root2, UVec3::new(10, 10, 10)));

        dag.commit_gc();
        assert!(dag.node_count() <= before);
        for x in 0..32 {
            for y in 0..32 {
                for z in 0..32 {
                    let pos = UVec3::new(x, y, z);
                    let inside = (1..4).contains(&x) && (1..4).contains(&y) && (1..4).contains(&z);
                    assert_eq!(dag.voxel(new_root, pos), inside);
                }
            }
        }
    }

    #[test]
    fn test_pending_binds_accumulate_and_commit() {
        let dag = MemoryDag::new(DagConfig::new(4));
        assert!(dag.pool().pending_binds().is_empty());
        let _ = dag.full(0);
        let pending = dag.pool().pending_binds();
        assert_eq!(
            pending,
            vec![PageBind {
                pool: "dag_nodes",
                page: 0
            }]
        );
        dag.pool().commit_binds();
        assert!(dag.pool().pending_binds().is_empty());
    }

    #[test]
    fn test_color_branch_collapses_uniform_children() {
        let colors = MemoryColorDag::new();
        let red = colors.uniform(VbrColor::rgb8(0xff0000));
        assert_eq!(colors.branch([red; 8]), red);
        assert_eq!(colors.branch([ColorPtr::NULL; 8]), ColorPtr::NULL);
        let blue = colors.uniform(VbrColor::rgb8(0x0000ff));
        let mixed = colors.branch([red, blue, red, red, red, red, red, red]);
        assert!(mixed.branch_index().is_some());
        assert_eq!(colors.aggregate(mixed), VbrColor::UNSET);
        assert_eq!(colors.child(mixed, 1), blue);
        assert_eq!(colors.child(red, 3), red);
    }

    // Exercised indirectly everywhere, but pin down the in/out color slot
    // contract once at the store level.
    struct PaintRoot(VbrColor);

    impl VbrVoxelEditor for PaintRoot {
        fn edit_node(
            &self,
            _: &DagConfig,
            _: &NodeCoord,
            _: NodePtr,
            color: &mut VbrColor,
        ) -> EditAction {
            *color = self.0;
            EditAction::Fill
        }
        fn edit_voxel(
            &self,
            _: &DagConfig,
            _: &NodeCoord,
            voxel: bool,
            color: &mut VbrColor,
        ) -> bool {
            *color = self.0;
            voxel
        }
    }

    #[test]
    fn test_vbr_edit_returns_color_root() {
        let config = DagConfig::new(4);
        let dag = MemoryDag::new(config);
        let colors = MemoryColorDag::new();
        let (root, color_root) = dag.edit_vbr(
            NodePtr::NULL,
            &PaintRoot(VbrColor::rgb8(0x123456)),
            &colors,
            ColorPtr::NULL,
        );
        assert_eq!(root, dag.full(0));
        assert_eq!(
            colors.voxel_color(color_root, UVec3::new(7, 0, 3), &config),
            VbrColor::rgb8(0x123456)
        );
    }
}
