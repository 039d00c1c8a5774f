//! Sparse page binding.
//!
//! Edits grow the pools on the CPU side; nothing is renderable until the
//! fresh pages are bound to device memory. Flushing gathers every pending
//! bind across the pools into one queue submission, waits for the device
//! to signal it, and only then marks the pages bound. On failure the
//! pending set is left intact, so the next flush retries the same pages
//! and the current roots stay valid throughout.

use crate::core::Result;
use crate::dag::{MemoryColorDag, MemoryDag, PageBind, PagedPool};

/// Completion handle for a queued bind submission.
pub trait DeviceFence {
    /// Block until the device has executed the submission.
    fn wait(&self) -> Result<()>;
}

/// The device queue that owns sparse memory binding.
pub trait SparseBinder {
    type Fence: DeviceFence;

    /// Queue one batched bind of the given pages.
    fn queue_bind(&self, binds: &[PageBind]) -> Result<Self::Fence>;
}

/// Bind all pending pages of `pools` in one submission.
pub fn flush<B: SparseBinder>(pools: &[&dyn PagedPool], binder: &B) -> Result<()> {
    let mut binds: Vec<PageBind> = Vec::new();
    for pool in pools {
        binds.extend(pool.pending_binds());
    }
    if binds.is_empty() {
        return Ok(());
    }
    log::debug!("flushing {} page binds", binds.len());
    let fence = binder.queue_bind(&binds)?;
    fence.wait()?;
    for pool in pools {
        pool.commit_binds();
    }
    Ok(())
}

/// Flush the three pools a world renders from: presence nodes, color
/// branch nodes and color leaves.
pub fn flush_world<B: SparseBinder>(
    dag: &MemoryDag,
    colors: &MemoryColorDag,
    binder: &B,
) -> Result<()> {
    flush(
        &[dag.pool(), colors.node_pool(), colors.leaf_pool()],
        binder,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Error;
    use crate::dag::{DagConfig, DagStore, NodePtr, VbrColor};
    use crate::edit::BoxBrush;
    use glam::UVec3;
    use std::sync::Mutex;

    struct OkFence;

    impl DeviceFence for OkFence {
        fn wait(&self) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct StubBinder {
        fail: bool,
        submissions: Mutex<Vec<Vec<PageBind>>>,
    }

    impl SparseBinder for StubBinder {
        type Fence = OkFence;

        fn queue_bind(&self, binds: &[PageBind]) -> Result<OkFence> {
            if self.fail {
                return Err(Error::Device("bind rejected".into()));
            }
            self.submissions.lock().unwrap().push(binds.to_vec());
            Ok(OkFence)
        }
    }

    fn edited_world() -> (MemoryDag, MemoryColorDag) {
        let dag = MemoryDag::new(DagConfig::new(5));
        let colors = MemoryColorDag::new();
        let brush = BoxBrush {
            min: UVec3::ZERO,
            max: UVec3::new(8, 8, 8),
            color: VbrColor::rgb8(0x884422),
        };
        let _ = dag.edit_vbr(NodePtr::NULL, &brush, &colors, crate::dag::ColorPtr::NULL);
        (dag, colors)
    }

    #[test]
    fn test_flush_batches_all_pools_once() {
        let (dag, colors) = edited_world();
        let binder = StubBinder::default();
        flush_world(&dag, &colors, &binder).unwrap();

        let submissions = binder.submissions.lock().unwrap();
        assert_eq!(submissions.len(), 1);
        let pools: Vec<&str> = submissions[0].iter().map(|b| b.pool).collect();
        assert!(pools.contains(&"dag_nodes"));
        assert!(pools.contains(&"color_leaves"));

        drop(submissions);
        assert!(dag.pool().pending_binds().is_empty());
        assert!(colors.leaf_pool().pending_binds().is_empty());
    }

    #[test]
    fn test_flush_with_nothing_pending_skips_submission() {
        let (dag, colors) = edited_world();
        let binder = StubBinder::default();
        flush_world(&dag, &colors, &binder).unwrap();
        flush_world(&dag, &colors, &binder).unwrap();
        assert_eq!(binder.submissions.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_failed_bind_keeps_pages_pending() {
        let (dag, colors) = edited_world();
        let binder = StubBinder {
            fail: true,
            ..Default::default()
        };
        assert!(flush_world(&dag, &colors, &binder).is_err());
        assert!(!dag.pool().pending_binds().is_empty());

        // Retry succeeds and binds the same pages.
        let retry = StubBinder::default();
        flush_world(&dag, &colors, &retry).unwrap();
        assert!(dag.pool().pending_binds().is_empty());
    }

    #[test]
    fn test_failed_fence_wait_keeps_pages_pending() {
        struct FailFence;
        impl DeviceFence for FailFence {
            fn wait(&self) -> Result<()> {
                Err(Error::Device("device lost".into()))
            }
        }
        struct FailWaitBinder;
        impl SparseBinder for FailWaitBinder {
            type Fence = FailFence;
            fn queue_bind(&self, _binds: &[PageBind]) -> Result<FailFence> {
                Ok(FailFence)
            }
        }

        let (dag, colors) = edited_world();
        assert!(flush_world(&dag, &colors, &FailWaitBinder).is_err());
        assert!(!dag.pool().pending_binds().is_empty());
    }
}
