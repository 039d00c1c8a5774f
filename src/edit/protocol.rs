//! Editor protocol adapter.
//!
//! Normalizes a spatial predicate into the single shape the storage
//! engine's traversal consumes, regardless of which concrete predicate and
//! which capability shape (plain or color-aware) is active. The color-aware
//! adapter drives a parallel color structure in lock-step so one logical
//! edit updates presence and color atomically. No business logic lives
//! here; only impedance matching.

use crate::dag::{ColorPtr, ColorStore, DagConfig, NodeCoord, NodePtr, VbrColor};
use crate::edit::editor::{EditAction, VbrVoxelEditor, VoxelEditor};

/// The normalized traversal protocol.
///
/// `Subtree` is per-subtree context threaded through descent (the color
/// subtree pointer for color-aware edits, `()` otherwise). The traversal
/// calls `node` at every visited level, `child`/`assemble` around
/// recursion, `voxel` at the finest granularity, and `finish` once on the
/// root context.
pub trait EditorProtocol: Sync {
    type Subtree: Send;

    /// Context for the root of the traversal.
    fn root_subtree(&self) -> Self::Subtree;

    /// Node-granularity decision. May rewrite the context (e.g. replace the
    /// color subtree on a bulk fill).
    fn node(
        &self,
        config: &DagConfig,
        coord: &NodeCoord,
        ptr: NodePtr,
        subtree: &mut Self::Subtree,
    ) -> EditAction;

    /// Derive the context for one octant before recursing into it.
    fn child(&self, subtree: &Self::Subtree, octant: usize) -> Self::Subtree;

    /// Voxel-granularity decision; `coord` is at the voxel level and the
    /// context addresses exactly that voxel.
    fn voxel(
        &self,
        config: &DagConfig,
        coord: &NodeCoord,
        voxel: bool,
        subtree: &mut Self::Subtree,
    ) -> bool;

    /// Fold the eight child contexts back into the parent after recursion.
    fn assemble(&self, subtree: &mut Self::Subtree, children: [Self::Subtree; 8]);

    /// Extract the color root once the traversal returns, if any.
    fn finish(&self, subtree: Self::Subtree) -> Option<ColorPtr>;
}

/// Adapter for presence-only predicates (e.g. digging).
pub struct StatelessEdit<'a, E>(pub &'a E);

impl<E: VoxelEditor + Sync> EditorProtocol for StatelessEdit<'_, E> {
    type Subtree = ();

    fn root_subtree(&self) -> Self::Subtree {}

    fn node(
        &self,
        config: &DagConfig,
        coord: &NodeCoord,
        ptr: NodePtr,
        _subtree: &mut Self::Subtree,
    ) -> EditAction {
        self.0.edit_node(config, coord, ptr)
    }

    fn child(&self, _subtree: &Self::Subtree, _octant: usize) -> Self::Subtree {}

    fn voxel(
        &self,
        config: &DagConfig,
        coord: &NodeCoord,
        voxel: bool,
        _subtree: &mut Self::Subtree,
    ) -> bool {
        self.0.edit_voxel(config, coord, voxel)
    }

    fn assemble(&self, _subtree: &mut Self::Subtree, _children: [Self::Subtree; 8]) {}

    fn finish(&self, _subtree: Self::Subtree) -> Option<ColorPtr> {
        None
    }
}

/// Per-subtree color context carried through a color-aware edit.
pub struct ColorCtx {
    ptr: ColorPtr,
}

/// Adapter pairing a color-aware predicate with the color structure it
/// edits in lock-step.
pub struct VbrEdit<'a, E, C> {
    pub editor: &'a E,
    pub colors: &'a C,
    pub color_root: ColorPtr,
}

impl<E, C> EditorProtocol for VbrEdit<'_, E, C>
where
    E: VbrVoxelEditor + Sync,
    C: ColorStore,
{
    type Subtree = ColorCtx;

    fn root_subtree(&self) -> ColorCtx {
        ColorCtx {
            ptr: self.color_root,
        }
    }

    fn node(
        &self,
        config: &DagConfig,
        coord: &NodeCoord,
        ptr: NodePtr,
        subtree: &mut ColorCtx,
    ) -> EditAction {
        let mut color = self.colors.aggregate(subtree.ptr);
        let action = self.editor.edit_node(config, coord, ptr, &mut color);
        match action {
            EditAction::Fill => subtree.ptr = self.colors.uniform(color),
            EditAction::Clear => subtree.ptr = ColorPtr::NULL,
            // A set color on an untouched existing subtree is a bulk
            // recolor (paint over a fully covered region) or, by interning,
            // a no-op when it already matches.
            EditAction::NotAffected => {
                if color.is_set() && !ptr.is_null() {
                    subtree.ptr = self.colors.uniform(color);
                }
            }
            EditAction::Proceed => {}
        }
        action
    }

    fn child(&self, subtree: &ColorCtx, octant: usize) -> ColorCtx {
        ColorCtx {
            ptr: self.colors.child(subtree.ptr, octant),
        }
    }

    fn voxel(
        &self,
        config: &DagConfig,
        coord: &NodeCoord,
        voxel: bool,
        subtree: &mut ColorCtx,
    ) -> bool {
        let mut color = self.colors.aggregate(subtree.ptr);
        let present = self.editor.edit_voxel(config, coord, voxel, &mut color);
        subtree.ptr = if present {
            self.colors.uniform(color)
        } else {
            ColorPtr::NULL
        };
        present
    }

    fn assemble(&self, subtree: &mut ColorCtx, children: [ColorCtx; 8]) {
        subtree.ptr = self.colors.branch(children.map(|c| c.ptr));
    }

    fn finish(&self, subtree: ColorCtx) -> Option<ColorPtr> {
        Some(subtree.ptr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::{DagConfig, MemoryColorDag, NodeCoord};
    use glam::UVec3;

    struct FillAll(VbrColor);

    impl VbrVoxelEditor for FillAll {
        fn edit_node(
            &self,
            _config: &DagConfig,
            _coord: &NodeCoord,
            _ptr: NodePtr,
            color: &mut VbrColor,
        ) -> EditAction {
            *color = self.0;
            EditAction::Fill
        }

        fn edit_voxel(
            &self,
            _config: &DagConfig,
            _coord: &NodeCoord,
            _voxel: bool,
            color: &mut VbrColor,
        ) -> bool {
            *color = self.0;
            true
        }
    }

    #[test]
    fn test_vbr_fill_writes_uniform_color_node() {
        let colors = MemoryColorDag::new();
        let editor = FillAll(VbrColor::rgb8(0x102030));
        let adapter = VbrEdit {
            editor: &editor,
            colors: &colors,
            color_root: ColorPtr::NULL,
        };
        let config = DagConfig::new(4);

        let mut ctx = adapter.root_subtree();
        let action = adapter.node(&config, &NodeCoord::ROOT, NodePtr::NULL, &mut ctx);
        assert_eq!(action, EditAction::Fill);

        let root = adapter.finish(ctx).unwrap();
        assert_eq!(colors.aggregate(root), VbrColor::rgb8(0x102030));
    }

    #[test]
    fn test_vbr_voxel_absent_clears_color() {
        struct DigAll;
        impl VbrVoxelEditor for DigAll {
            fn edit_node(
                &self,
                _config: &DagConfig,
                _coord: &NodeCoord,
                _ptr: NodePtr,
                _color: &mut VbrColor,
            ) -> EditAction {
                EditAction::Proceed
            }
            fn edit_voxel(
                &self,
                _config: &DagConfig,
                _coord: &NodeCoord,
                _voxel: bool,
                _color: &mut VbrColor,
            ) -> bool {
                false
            }
        }

        let colors = MemoryColorDag::new();
        let adapter = VbrEdit {
            editor: &DigAll,
            colors: &colors,
            color_root: colors.uniform(VbrColor::rgb8(0xffffff)),
        };
        let config = DagConfig::new(4);
        let mut ctx = adapter.root_subtree();
        let coord = NodeCoord::new(UVec3::ZERO, config.voxel_level());
        assert!(!adapter.voxel(&config, &coord, true, &mut ctx));
        assert!(adapter.finish(ctx).unwrap().is_null());
    }

    #[test]
    fn test_stateless_has_no_color_root() {
        struct Nop;
        impl VoxelEditor for Nop {
            fn edit_node(
                &self,
                _config: &DagConfig,
                _coord: &NodeCoord,
                _ptr: NodePtr,
            ) -> EditAction {
                EditAction::NotAffected
            }
            fn edit_voxel(&self, _config: &DagConfig, _coord: &NodeCoord, voxel: bool) -> bool {
                voxel
            }
        }
        let adapter = StatelessEdit(&Nop);
        assert!(adapter.finish(adapter.root_subtree()).is_none());
    }
}
