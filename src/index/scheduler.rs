//! Merge schedulers decide where merges run.
//!
//! The writer hands every merge to its [`MergeScheduler`] as a
//! [`MergeTask`] and later collects [`FinishedMerge`]s to install. The
//! [`SerialMergeScheduler`] runs the merge on the spot; the
//! [`BackgroundMergeScheduler`] runs each merge on its own thread and
//! reports through a channel, so the writer can keep indexing while large
//! segments are rewritten.

use std::fmt;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, error, warn};

use crate::error::{GlaiveError, Result};
use crate::segment::merge::{MergeOutput, merge_segments};
use crate::segment::reader::SegmentReader;
use crate::storage::Storage;

/// One merge to run.
#[derive(Debug, Clone)]
pub struct MergeTask {
    /// Writer-assigned id.
    pub id: u64,
    /// Writer epoch at scheduling time; a rollback bumps the epoch.
    pub epoch: u64,
    /// Inputs as seen when the merge was scheduled, deletions included.
    pub inputs: Vec<SegmentReader>,
    /// Name of the segment to create.
    pub output: String,
}

impl MergeTask {
    /// Run the merge on the current thread.
    pub fn run(self, storage: &dyn Storage) -> FinishedMerge {
        debug!(
            "Merging {} segments into {}",
            self.inputs.len(),
            self.output
        );
        let result = merge_segments(storage, &self.inputs, &self.output);
        FinishedMerge { task: self, result }
    }
}

/// A merge that ran, successfully or not.
#[derive(Debug)]
pub struct FinishedMerge {
    /// The task that ran.
    pub task: MergeTask,
    /// The merge output.
    pub result: Result<MergeOutput>,
}

/// Runs merge tasks.
pub trait MergeScheduler: Send + fmt::Debug {
    /// Start a merge.
    fn schedule(&mut self, storage: Arc<dyn Storage>, task: MergeTask) -> Result<()>;

    /// Merges that finished since the last call, without blocking.
    fn take_finished(&mut self) -> Vec<FinishedMerge>;

    /// Block until every scheduled merge finished and return them.
    fn wait_all(&mut self) -> Vec<FinishedMerge>;

    /// Number of merges scheduled but not yet taken.
    fn pending(&self) -> usize;

    /// Short name for logging.
    fn name(&self) -> &'static str;
}

/// Runs each merge synchronously inside [`MergeScheduler::schedule`].
#[derive(Debug, Default)]
pub struct SerialMergeScheduler {
    finished: Vec<FinishedMerge>,
}

impl SerialMergeScheduler {
    /// Create a serial scheduler.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MergeScheduler for SerialMergeScheduler {
    fn schedule(&mut self, storage: Arc<dyn Storage>, task: MergeTask) -> Result<()> {
        self.finished.push(task.run(storage.as_ref()));
        Ok(())
    }

    fn take_finished(&mut self) -> Vec<FinishedMerge> {
        std::mem::take(&mut self.finished)
    }

    fn wait_all(&mut self) -> Vec<FinishedMerge> {
        self.take_finished()
    }

    fn pending(&self) -> usize {
        self.finished.len()
    }

    fn name(&self) -> &'static str {
        "serial"
    }
}

/// Runs every merge on a dedicated worker thread.
///
/// Workers only read their immutable inputs and write the new segment's
/// files; installing the result is left to the writer. Dropping the
/// scheduler joins all workers.
pub struct BackgroundMergeScheduler {
    sender: Sender<FinishedMerge>,
    receiver: Receiver<FinishedMerge>,
    workers: Vec<thread::JoinHandle<()>>,
    pending: usize,
}

impl BackgroundMergeScheduler {
    /// Create a background scheduler.
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        BackgroundMergeScheduler {
            sender,
            receiver,
            workers: Vec::new(),
            pending: 0,
        }
    }

    fn reap_workers(&mut self) {
        let (done, running): (Vec<_>, Vec<_>) =
            self.workers.drain(..).partition(|worker| worker.is_finished());
        self.workers = running;
        for worker in done {
            if worker.join().is_err() {
                error!("Merge worker panicked");
            }
        }
    }
}

impl Default for BackgroundMergeScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BackgroundMergeScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundMergeScheduler")
            .field("workers", &self.workers.len())
            .field("pending", &self.pending)
            .finish()
    }
}

impl MergeScheduler for BackgroundMergeScheduler {
    fn schedule(&mut self, storage: Arc<dyn Storage>, task: MergeTask) -> Result<()> {
        self.reap_workers();
        let sender = self.sender.clone();
        let worker = thread::Builder::new()
            .name(format!("glaive-merge-{}", task.id))
            .spawn(move || {
                let finished = task.run(storage.as_ref());
                if sender.send(finished).is_err() {
                    warn!("Merge finished after its scheduler was dropped");
                }
            })
            .map_err(|e| GlaiveError::index(format!("Failed to spawn merge thread: {e}")))?;
        self.workers.push(worker);
        self.pending += 1;
        Ok(())
    }

    fn take_finished(&mut self) -> Vec<FinishedMerge> {
        let finished: Vec<FinishedMerge> = self.receiver.try_iter().collect();
        self.pending -= finished.len();
        self.reap_workers();
        finished
    }

    fn wait_all(&mut self) -> Vec<FinishedMerge> {
        let mut finished = Vec::with_capacity(self.pending);
        while self.pending > 0 {
            match self.receiver.recv() {
                Ok(merge) => {
                    finished.push(merge);
                    self.pending -= 1;
                }
                // unreachable while we hold a sender
                Err(_) => break,
            }
        }
        self.reap_workers();
        finished
    }

    fn pending(&self) -> usize {
        self.pending
    }

    fn name(&self) -> &'static str {
        "background"
    }
}

impl Drop for BackgroundMergeScheduler {
    fn drop(&mut self) {
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("Merge worker panicked");
            }
        }
    }
}
