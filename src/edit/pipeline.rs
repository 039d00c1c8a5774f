//! Single-slot asynchronous edit pipeline.
//!
//! Edits run on a dedicated worker thread while the caller keeps rendering
//! from the previous roots. At most one request is in flight; a submit
//! while the slot is busy is dropped, which is the backpressure model for
//! interactive strokes. `poll` publishes a completed result without
//! blocking, swapping both roots in one step so a frame never sees a
//! presence root paired with a stale color root.

use std::fmt;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Instant;

use crate::dag::{ColorPtr, NodePtr};

/// Roots produced by one edit request.
///
/// `color_root` is `None` for requests that do not touch colors (digging,
/// GC); the pipeline then keeps the previous color root. A request whose
/// new roots only become dereferenceable once published (GC staging) can
/// attach a commit action; `poll` runs it on the caller thread immediately
/// before the swap, so readers of the previous roots are never invalidated
/// early.
pub struct EditResult {
    pub node_root: NodePtr,
    pub color_root: Option<ColorPtr>,
    commit: Option<Box<dyn FnOnce() + Send>>,
}

impl EditResult {
    pub fn new(node_root: NodePtr, color_root: Option<ColorPtr>) -> Self {
        Self {
            node_root,
            color_root,
            commit: None,
        }
    }

    /// Attach an action to run at publish time, before the roots swap.
    pub fn with_commit(mut self, commit: impl FnOnce() + Send + 'static) -> Self {
        self.commit = Some(Box::new(commit));
        self
    }
}

impl fmt::Debug for EditResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditResult")
            .field("node_root", &self.node_root)
            .field("color_root", &self.color_root)
            .field("commit", &self.commit.is_some())
            .finish()
    }
}

/// Observable state of the single request slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    /// No request in flight; submits are accepted.
    Idle,
    /// A request is running on the worker.
    Submitted,
    /// The worker finished; the next `poll` publishes the result.
    Completed,
}

type Job = Box<dyn FnOnce() -> EditResult + Send>;

/// Owns the current roots and the worker that replaces them.
pub struct EditPipeline {
    node_root: NodePtr,
    color_root: ColorPtr,
    busy: bool,
    jobs: Option<mpsc::Sender<Job>>,
    slot: Arc<Mutex<Option<EditResult>>>,
    worker: Option<JoinHandle<()>>,
}

impl EditPipeline {
    /// Spawn the worker and start from the given roots.
    pub fn new(node_root: NodePtr, color_root: ColorPtr) -> crate::core::Result<Self> {
        let (tx, rx) = mpsc::channel::<Job>();
        let slot = Arc::new(Mutex::new(None));
        let worker_slot = Arc::clone(&slot);
        let worker = std::thread::Builder::new()
            .name("dag-edit".into())
            .spawn(move || {
                while let Ok(job) = rx.recv() {
                    let start = Instant::now();
                    let result = job();
                    log::debug!(
                        "edit request finished in {:.2} ms",
                        start.elapsed().as_secs_f64() * 1000.0
                    );
                    *worker_slot.lock().unwrap() = Some(result);
                }
            })?;
        Ok(Self {
            node_root,
            color_root,
            busy: false,
            jobs: Some(tx),
            slot,
            worker: Some(worker),
        })
    }

    /// Roots the caller should render from right now.
    pub fn roots(&self) -> (NodePtr, ColorPtr) {
        (self.node_root, self.color_root)
    }

    pub fn state(&self) -> SlotState {
        if !self.busy {
            SlotState::Idle
        } else if self.slot.lock().unwrap().is_some() {
            SlotState::Completed
        } else {
            SlotState::Submitted
        }
    }

    /// Submit an edit against the current roots. Returns `false` without
    /// side effects when a request is already in flight.
    pub fn submit_edit<F>(&mut self, edit: F) -> bool
    where
        F: FnOnce(NodePtr, ColorPtr) -> EditResult + Send + 'static,
    {
        let (node_root, color_root) = (self.node_root, self.color_root);
        self.submit(Box::new(move || edit(node_root, color_root)))
    }

    /// Submit a compaction of the presence structure. Shares the slot with
    /// edits; a GC result normally carries no color root and a commit
    /// action installing the compacted storage (see `EditResult`).
    pub fn submit_gc<F>(&mut self, gc: F) -> bool
    where
        F: FnOnce(NodePtr) -> EditResult + Send + 'static,
    {
        let node_root = self.node_root;
        self.submit(Box::new(move || gc(node_root)))
    }

    fn submit(&mut self, job: Job) -> bool {
        if self.busy {
            log::trace!("edit slot busy, dropping request");
            return false;
        }
        let Some(jobs) = &self.jobs else {
            return false;
        };
        if jobs.send(job).is_err() {
            log::error!("edit worker is gone, dropping request");
            return false;
        }
        self.busy = true;
        true
    }

    /// Publish a completed request, if any. Never blocks; returns the new
    /// roots when something was published.
    pub fn poll(&mut self) -> Option<(NodePtr, ColorPtr)> {
        if !self.busy {
            return None;
        }
        let mut result = self.slot.lock().unwrap().take()?;
        if let Some(commit) = result.commit.take() {
            commit();
        }
        self.node_root = result.node_root;
        if let Some(color_root) = result.color_root {
            self.color_root = color_root;
        }
        self.busy = false;
        Some((self.node_root, self.color_root))
    }
}

impl Drop for EditPipeline {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop.
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
