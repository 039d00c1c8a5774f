//! Opaque handles into the storage engine.
//!
//! The edit core only compares, copies and returns these; it never
//! dereferences them. Zero is the valid "absent subtree" value.

/// Handle to a presence-DAG subtree or leaf.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct NodePtr(u32);

impl NodePtr {
    /// The absent/empty subtree.
    pub const NULL: NodePtr = NodePtr(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Raw handle value, for logging and comparison only.
    pub fn raw(self) -> u32 {
        self.0
    }

    pub(crate) fn from_index(index: u32) -> Self {
        NodePtr(index + 1)
    }

    pub(crate) fn index(self) -> Option<usize> {
        (self.0 != 0).then(|| self.0 as usize - 1)
    }
}

const COLOR_LEAF_BIT: u32 = 1 << 31;

/// Handle into the color structure.
///
/// Internally tagged as a uniform-leaf or branch entry; the tag is only
/// interpreted by the owning color pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ColorPtr(u32);

impl ColorPtr {
    /// The absent color subtree.
    pub const NULL: ColorPtr = ColorPtr(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Raw handle value, for logging and comparison only.
    pub fn raw(self) -> u32 {
        self.0
    }

    pub(crate) fn from_leaf(index: u32) -> Self {
        debug_assert!(index + 1 < COLOR_LEAF_BIT);
        ColorPtr((index + 1) | COLOR_LEAF_BIT)
    }

    pub(crate) fn from_branch(index: u32) -> Self {
        debug_assert!(index + 1 < COLOR_LEAF_BIT);
        ColorPtr(index + 1)
    }

    pub(crate) fn leaf_index(self) -> Option<usize> {
        (self.0 & COLOR_LEAF_BIT != 0).then(|| (self.0 & !COLOR_LEAF_BIT) as usize - 1)
    }

    pub(crate) fn branch_index(self) -> Option<usize> {
        (self.0 != 0 && self.0 & COLOR_LEAF_BIT == 0).then(|| self.0 as usize - 1)
    }
}
