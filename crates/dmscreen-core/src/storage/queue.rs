//! Fire-and-forget persistence: an inspectable queue of pending writes.
//!
//! The session updates its in-memory state first and submits a [`WriteJob`].
//! A background worker calls [`flush`] to apply the jobs in order. Failed jobs
//! are logged and dropped; in-memory state is never rolled back.

use super::gateway::SceneGateway;
use super::{Storage, StorageResult};
use crate::node::{Node, NodeData, Scene};
use crate::viewport::Viewport;
use kurbo::{Point, Size};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A pending persistence write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteJob {
    CreateNode {
        scene_id: String,
        node: Node,
    },
    SaveNodePosition {
        scene_id: String,
        node_id: String,
        position: Point,
    },
    SaveNodeSize {
        scene_id: String,
        node_id: String,
        size: Size,
    },
    SaveNodeData {
        scene_id: String,
        node_id: String,
        data: NodeData,
    },
    DeleteNode {
        scene_id: String,
        node_id: String,
    },
    CreateScene {
        scene: Scene,
    },
    RenameScene {
        scene_id: String,
        name: String,
    },
    DeleteScene {
        scene_id: String,
    },
    SaveViewport {
        scene_id: String,
        viewport: Viewport,
    },
}

impl WriteJob {
    /// Scene the job writes to.
    pub fn scene_id(&self) -> &str {
        match self {
            WriteJob::CreateNode { scene_id, .. }
            | WriteJob::SaveNodePosition { scene_id, .. }
            | WriteJob::SaveNodeSize { scene_id, .. }
            | WriteJob::SaveNodeData { scene_id, .. }
            | WriteJob::DeleteNode { scene_id, .. }
            | WriteJob::RenameScene { scene_id, .. }
            | WriteJob::DeleteScene { scene_id }
            | WriteJob::SaveViewport { scene_id, .. } => scene_id,
            WriteJob::CreateScene { scene } => &scene.id,
        }
    }

    /// Short description for logs.
    pub fn describe(&self) -> String {
        match self {
            WriteJob::CreateNode { scene_id, node } => format!("create node {scene_id}/{}", node.id),
            WriteJob::SaveNodePosition {
                scene_id, node_id, ..
            } => format!("save position {scene_id}/{node_id}"),
            WriteJob::SaveNodeSize {
                scene_id, node_id, ..
            } => format!("save size {scene_id}/{node_id}"),
            WriteJob::SaveNodeData {
                scene_id, node_id, ..
            } => format!("save data {scene_id}/{node_id}"),
            WriteJob::DeleteNode { scene_id, node_id } => format!("delete node {scene_id}/{node_id}"),
            WriteJob::CreateScene { scene } => format!("create scene {}", scene.id),
            WriteJob::RenameScene { scene_id, .. } => format!("rename scene {scene_id}"),
            WriteJob::DeleteScene { scene_id } => format!("delete scene {scene_id}"),
            WriteJob::SaveViewport { scene_id, .. } => format!("save viewport {scene_id}"),
        }
    }

    /// Whether a newer `other` makes this pending job redundant.
    fn superseded_by(&self, other: &WriteJob) -> bool {
        match (self, other) {
            (
                WriteJob::SaveNodeData {
                    scene_id: a_scene,
                    node_id: a_node,
                    ..
                },
                WriteJob::SaveNodeData {
                    scene_id: b_scene,
                    node_id: b_node,
                    ..
                },
            ) => a_scene == b_scene && a_node == b_node,
            _ => false,
        }
    }

    async fn apply<S: Storage + ?Sized>(&self, gateway: &SceneGateway<S>) -> StorageResult<()> {
        match self {
            WriteJob::CreateNode { scene_id, node } => gateway.create_node(scene_id, node).await,
            WriteJob::SaveNodePosition {
                scene_id,
                node_id,
                position,
            } => gateway.save_node_position(scene_id, node_id, *position).await,
            WriteJob::SaveNodeSize {
                scene_id,
                node_id,
                size,
            } => gateway.save_node_size(scene_id, node_id, *size).await,
            WriteJob::SaveNodeData {
                scene_id,
                node_id,
                data,
            } => gateway.save_node_data(scene_id, node_id, data).await,
            WriteJob::DeleteNode { scene_id, node_id } => {
                gateway.delete_node(scene_id, node_id).await
            }
            WriteJob::CreateScene { scene } => gateway.save_scene(scene).await,
            WriteJob::RenameScene { scene_id, name } => gateway.rename_scene(scene_id, name).await,
            WriteJob::DeleteScene { scene_id } => gateway.delete_scene(scene_id).await,
            WriteJob::SaveViewport { scene_id, viewport } => {
                gateway.save_viewport(scene_id, *viewport).await
            }
        }
    }
}

/// Cloneable handle to a FIFO of pending writes.
#[derive(Debug, Clone, Default)]
pub struct WriteQueue {
    jobs: Arc<Mutex<VecDeque<WriteJob>>>,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn jobs(&self) -> MutexGuard<'_, VecDeque<WriteJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a write. Never blocks on I/O.
    ///
    /// A pending data save for the same node is replaced in place, so a burst
    /// of volume changes results in a single write.
    pub fn submit(&self, job: WriteJob) {
        let mut jobs = self.jobs();
        if let Some(pending) = jobs.iter_mut().find(|pending| pending.superseded_by(&job)) {
            log::trace!("Coalescing {}", job.describe());
            *pending = job;
            return;
        }
        log::trace!("Queued {}", job.describe());
        jobs.push_back(job);
    }

    /// Snapshot of the pending jobs, oldest first.
    pub fn pending(&self) -> Vec<WriteJob> {
        self.jobs().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs().is_empty()
    }

    /// Remove and return every pending job.
    pub fn drain(&self) -> Vec<WriteJob> {
        self.jobs().drain(..).collect()
    }
}

/// Outcome of one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub applied: usize,
    pub failed: usize,
}

/// Apply every pending job in submission order.
///
/// Jobs submitted while the flush runs wait for the next one. Each flush
/// drains its own batch, so callers that can flush concurrently must
/// serialise the calls to keep batches in submission order.
pub async fn flush<S: Storage + ?Sized>(
    queue: &WriteQueue,
    gateway: &SceneGateway<S>,
) -> FlushReport {
    let mut report = FlushReport::default();
    for job in queue.drain() {
        match job.apply(gateway).await {
            Ok(()) => report.applied += 1,
            Err(e) => {
                log::error!("Failed to {}: {}", job.describe(), e);
                report.failed += 1;
            }
        }
    }
    if report.applied > 0 || report.failed > 0 {
        log::debug!(
            "Flushed {} writes ({} failed)",
            report.applied + report.failed,
            report.failed
        );
    }
    report
}
