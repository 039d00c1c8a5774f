//! Storage engine seams.
//!
//! The edit core drives these traits; the paged GPU-resident storage
//! engine and the device layer live behind them. `MemoryDag` and
//! `MemoryColorDag` provide the in-memory reference implementation.

use crate::dag::{ColorPtr, DagConfig, NodePtr, VbrColor};
use crate::edit::editor::{VbrVoxelEditor, VoxelEditor};
use crate::edit::protocol::{EditorProtocol, StatelessEdit, VbrEdit};

/// A pending page-to-device-memory binding.
///
/// Enumerated by paged pools after an edit or GC grows or rebuilds their
/// backing storage, and consumed in one batched sparse-bind submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageBind {
    /// Which pool the page belongs to.
    pub pool: &'static str,
    /// Page index within the pool.
    pub page: u32,
}

/// A pool whose backing pages must be bound to device memory before its
/// contents are visible to the renderer.
pub trait PagedPool {
    /// Pages allocated since the last committed flush.
    fn pending_binds(&self) -> Vec<PageBind>;

    /// Mark all currently pending pages as bound. Called only after the
    /// device signalled completion of the batched bind.
    fn commit_binds(&self);
}

/// The presence structure: run a predicate over the tree from a root,
/// producing a new root.
pub trait DagStore: Send + Sync {
    fn config(&self) -> &DagConfig;

    /// Apply an edit protocol starting at `root`. Returns the new node root
    /// and, for color-aware protocols, the new color root.
    fn edit<P: EditorProtocol>(&self, root: NodePtr, protocol: &P) -> (NodePtr, Option<ColorPtr>);

    /// Stage a compaction of the structure reachable from `root`, producing
    /// the root it will have once committed.
    ///
    /// Existing handles, including `root` itself, stay valid until
    /// `commit_gc` installs the compacted storage; the returned root is
    /// only dereferenceable after that. Readers holding pre-compaction
    /// roots are therefore unaffected while the compaction is in flight.
    /// No edit may run between staging and commit.
    fn gc(&self, root: NodePtr) -> NodePtr;

    /// Install the arena staged by `gc`, invalidating every handle not
    /// reachable from the root `gc` returned. No-op when nothing is staged.
    fn commit_gc(&self);

    /// Run a presence-only predicate.
    fn edit_stateless<E: VoxelEditor + Sync>(&self, root: NodePtr, editor: &E) -> NodePtr
    where
        Self: Sized,
    {
        self.edit(root, &StatelessEdit(editor)).0
    }

    /// Run a color-aware predicate against a presence root and its paired
    /// color root, updating both in lock-step.
    fn edit_vbr<E: VbrVoxelEditor + Sync, C: ColorStore>(
        &self,
        root: NodePtr,
        editor: &E,
        colors: &C,
        color_root: ColorPtr,
    ) -> (NodePtr, ColorPtr)
    where
        Self: Sized,
    {
        let adapter = VbrEdit {
            editor,
            colors,
            color_root,
        };
        let (new_root, new_color_root) = self.edit(root, &adapter);
        (new_root, new_color_root.unwrap_or(ColorPtr::NULL))
    }
}

/// The color structure driven in lock-step with presence edits.
///
/// Construction methods intern: structurally equal subtrees yield equal
/// handles. Implementations use interior mutability so a parallel edit
/// traversal can build nodes through a shared reference.
pub trait ColorStore: Send + Sync {
    /// Uniform color of the subtree, or unset when divergent or absent.
    fn aggregate(&self, ptr: ColorPtr) -> VbrColor;

    /// Descend into an octant. A uniform subtree descends to itself.
    fn child(&self, ptr: ColorPtr, octant: usize) -> ColorPtr;

    /// A subtree uniformly holding `color`.
    fn uniform(&self, color: VbrColor) -> ColorPtr;

    /// Assemble eight children, collapsing back to a uniform or absent
    /// subtree when they agree.
    fn branch(&self, children: [ColorPtr; 8]) -> ColorPtr;
}
