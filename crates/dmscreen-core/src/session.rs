//! The session controller: the single owner of the canvas store.
//!
//! Layout events run to completion one at a time. Each operation updates the
//! store synchronously and submits the matching persistence job to the
//! [`WriteQueue`]; it never waits for storage.

use crate::config::{LayoutConfig, ScreenConfig};
use crate::layout::{LayoutItem, Resolution, resolve};
use crate::midi::{Dispatch, MidiCommand};
use crate::module::{ModuleConfig, ModuleKind};
use crate::node::{Node, Scene};
use crate::snap::{snap_point, snap_to_grid};
use crate::storage::{SceneGateway, Storage, StorageError, WriteJob, WriteQueue, flush};
use crate::store::CanvasStore;
use crate::viewport::Viewport;
use kurbo::{Point, Size};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Unknown node: {0}")]
    UnknownNode(String),
    #[error("Unknown scene: {0}")]
    UnknownScene(String),
    #[error("Cannot delete the last scene")]
    LastScene,
    #[error("A {found} config does not fit a {expected} module")]
    KindMismatch {
        expected: ModuleKind,
        found: ModuleKind,
    },
    #[error("Invalid viewport: offset and zoom must be finite")]
    InvalidViewport,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Owns the canvas store and turns user intents into store updates and writes.
#[derive(Debug)]
pub struct CanvasSession {
    store: CanvasStore,
    layout: LayoutConfig,
    viewport_size: Size,
    queue: WriteQueue,
}

impl CanvasSession {
    pub fn new(config: &ScreenConfig, queue: WriteQueue) -> Self {
        let mut store = CanvasStore::new();
        store.add_scene(Scene::default_scene());
        Self {
            store,
            layout: config.layout,
            viewport_size: config.viewport_size,
            queue,
        }
    }

    pub fn store(&self) -> &CanvasStore {
        &self.store
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    pub fn queue(&self) -> &WriteQueue {
        &self.queue
    }

    fn scene_id(&self) -> String {
        self.store.current_scene_id().to_string()
    }

    fn require_node(&self, node_id: &str) -> SessionResult<&Node> {
        self.store
            .node(node_id)
            .ok_or_else(|| SessionError::UnknownNode(node_id.to_string()))
    }

    /// Resolve `item` against every node of the current scene.
    fn resolve(&self, item: &LayoutItem<'_>) -> Resolution {
        let others: Vec<LayoutItem<'_>> = self.store.nodes().iter().map(Node::layout_item).collect();
        resolve(item, &others, &self.layout)
    }

    // --- Layout ---

    /// Update the position of a node being dragged. Nothing is resolved or saved.
    pub fn drag_node(&mut self, node_id: &str, point: Point) -> SessionResult<()> {
        if self.store.update_node(node_id, |node| node.position = point) {
            Ok(())
        } else {
            Err(SessionError::UnknownNode(node_id.to_string()))
        }
    }

    /// Finish a drag: snap the drop point if grid snap is on, then move the node
    /// to the nearest position that does not overlap another node.
    pub fn drop_node(&mut self, node_id: &str, point: Point) -> SessionResult<Point> {
        let node = self.require_node(node_id)?;
        let tentative = snap_point(point, self.store.grid_snap(), self.layout.grid_size).point;
        let resolution = self.resolve(&node.layout_item().at(tentative));
        let position = resolution.point();

        self.store.update_node(node_id, |node| node.position = position);
        log::debug!("Dropped {} at ({}, {}) via {:?}", node_id, position.x, position.y, resolution);
        self.queue.submit(WriteJob::SaveNodePosition {
            scene_id: self.scene_id(),
            node_id: node_id.to_string(),
            position,
        });
        Ok(position)
    }

    /// Add a module at the centre of the visible canvas.
    pub fn add_module(&mut self, kind: ModuleKind) -> Node {
        let centre = Point::new(self.viewport_size.width / 2.0, self.viewport_size.height / 2.0);
        self.add_module_at(kind, centre)
    }

    /// Add a module at a screen point.
    ///
    /// The point is mapped to canvas coordinates and always snapped to the
    /// grid, whatever the grid snap toggle says, then resolved against every
    /// existing node.
    pub fn add_module_at(&mut self, kind: ModuleKind, screen_point: Point) -> Node {
        let world = self.store.viewport().screen_to_world(screen_point);
        let start = snap_to_grid(world, self.layout.grid_size).point;
        let mut node = Node::new(self.scene_id(), kind, start);
        let position = self.resolve(&node.layout_item()).point();
        node.position = position;

        log::info!(
            "Added {} module {} at ({}, {})",
            kind,
            node.id,
            node.position.x,
            node.position.y
        );
        self.store.add_node(node.clone());
        self.queue.submit(WriteJob::CreateNode {
            scene_id: self.scene_id(),
            node: node.clone(),
        });
        node
    }

    /// Resize a node, clamped to the configured bounds. Collisions are not
    /// resolved on resize.
    pub fn resize_node(&mut self, node_id: &str, size: Size) -> SessionResult<Size> {
        let size = self.layout.clamp_size(size);
        if !self.store.update_node(node_id, |node| node.size = size) {
            return Err(SessionError::UnknownNode(node_id.to_string()));
        }
        self.queue.submit(WriteJob::SaveNodeSize {
            scene_id: self.scene_id(),
            node_id: node_id.to_string(),
            size,
        });
        Ok(size)
    }

    fn submit_node_data(&self, node_id: &str) {
        if let Some(node) = self.store.node(node_id) {
            self.queue.submit(WriteJob::SaveNodeData {
                scene_id: self.scene_id(),
                node_id: node_id.to_string(),
                data: node.data.clone(),
            });
        }
    }

    /// Check that `config` belongs to the kind of the node.
    pub fn check_config(&self, node_id: &str, config: &ModuleConfig) -> SessionResult<()> {
        let expected = self.require_node(node_id)?.kind;
        if config.kind() != expected {
            return Err(SessionError::KindMismatch {
                expected,
                found: config.kind(),
            });
        }
        Ok(())
    }

    /// Replace a node's configuration. The config must belong to the node's kind.
    pub fn update_node_config(&mut self, node_id: &str, config: ModuleConfig) -> SessionResult<()> {
        self.check_config(node_id, &config)?;
        self.store.update_node(node_id, |node| node.data.config = config);
        self.submit_node_data(node_id);
        Ok(())
    }

    /// Attach a content record to a node, or detach it with `None`.
    pub fn set_node_reference(&mut self, node_id: &str, reference_id: Option<String>) -> SessionResult<()> {
        if !self
            .store
            .update_node(node_id, |node| node.data.reference_id = reference_id)
        {
            return Err(SessionError::UnknownNode(node_id.to_string()));
        }
        self.submit_node_data(node_id);
        Ok(())
    }

    pub fn delete_node(&mut self, node_id: &str) -> SessionResult<Node> {
        let node = self
            .store
            .remove_node(node_id)
            .ok_or_else(|| SessionError::UnknownNode(node_id.to_string()))?;
        if self.store.modal().is_some_and(|m| m.module_id == node_id) {
            self.store.close_modal();
        }
        self.queue.submit(WriteJob::DeleteNode {
            scene_id: self.scene_id(),
            node_id: node_id.to_string(),
        });
        Ok(node)
    }

    /// Set the live viewport of the current scene. Zoom is clamped; a
    /// non-finite component is rejected.
    pub fn set_viewport(&mut self, viewport: Viewport) -> SessionResult<()> {
        let viewport = viewport.sanitized().ok_or(SessionError::InvalidViewport)?;
        self.store.set_viewport(viewport);
        let scene_id = self.scene_id();
        self.store.update_scene(&scene_id, |scene| scene.viewport = viewport);
        self.queue.submit(WriteJob::SaveViewport { scene_id, viewport });
        Ok(())
    }

    /// Set the viewport of any scene. The live viewport only changes for the
    /// current one.
    pub fn set_scene_viewport(&mut self, scene_id: &str, viewport: Viewport) -> SessionResult<()> {
        let viewport = viewport.sanitized().ok_or(SessionError::InvalidViewport)?;
        if scene_id == self.store.current_scene_id() {
            return self.set_viewport(viewport);
        }
        if !self.store.update_scene(scene_id, |scene| scene.viewport = viewport) {
            return Err(SessionError::UnknownScene(scene_id.to_string()));
        }
        self.queue.submit(WriteJob::SaveViewport {
            scene_id: scene_id.to_string(),
            viewport,
        });
        Ok(())
    }

    // --- Scenes ---

    /// Create a scene and make it current. Without a name it is called `scene N`.
    pub fn create_scene(&mut self, name: Option<String>) -> Scene {
        let name = name.unwrap_or_else(|| format!("scene {}", self.store.scenes().len() + 1));
        let scene = Scene::new(crate::content::new_id(), name);
        self.queue.submit(WriteJob::CreateScene {
            scene: scene.clone(),
        });
        self.store.add_scene(scene.clone());
        self.enter_scene(scene.clone(), Vec::new());
        log::info!("Created scene {} ({})", scene.name, scene.id);
        scene
    }

    pub fn rename_scene(&mut self, scene_id: &str, name: &str) -> SessionResult<()> {
        if !self
            .store
            .update_scene(scene_id, |scene| scene.name = name.to_string())
        {
            return Err(SessionError::UnknownScene(scene_id.to_string()));
        }
        self.queue.submit(WriteJob::RenameScene {
            scene_id: scene_id.to_string(),
            name: name.to_string(),
        });
        Ok(())
    }

    /// Delete a scene. The last remaining scene cannot be deleted.
    ///
    /// When the current scene is deleted the first remaining scene becomes
    /// current and its id is returned so the caller can load its nodes.
    pub fn delete_scene(&mut self, scene_id: &str) -> SessionResult<Option<String>> {
        if self.store.scene(scene_id).is_none() {
            return Err(SessionError::UnknownScene(scene_id.to_string()));
        }
        if self.store.scenes().len() <= 1 {
            return Err(SessionError::LastScene);
        }
        self.store.remove_scene(scene_id);
        self.queue.submit(WriteJob::DeleteScene {
            scene_id: scene_id.to_string(),
        });
        log::info!("Deleted scene {}", scene_id);

        if self.store.current_scene_id() != scene_id {
            return Ok(None);
        }
        let next = match self.store.scenes().first() {
            Some(scene) => scene.clone(),
            None => Scene::default_scene(),
        };
        let next_id = next.id.clone();
        self.enter_scene(next, Vec::new());
        Ok(Some(next_id))
    }

    /// Make `scene` current with the given nodes.
    pub fn enter_scene(&mut self, mut scene: Scene, nodes: Vec<Node>) {
        scene.viewport = scene.viewport.sanitized().unwrap_or_else(|| {
            log::warn!("Scene {} has an invalid viewport, resetting it", scene.id);
            Viewport::default()
        });
        self.store.set_current_scene(&scene.id);
        self.store.set_viewport(scene.viewport);
        self.store.set_nodes(nodes);
        self.store.set_selected_node(None);
        self.store.close_modal();
        let id = scene.id.clone();
        if !self.store.update_scene(&id, |existing| *existing = scene.clone()) {
            self.store.add_scene(scene);
        }
    }

    /// Switch to a persisted scene, loading its viewport and nodes.
    ///
    /// Pending writes are flushed first so the loaded state includes them.
    pub async fn load_scene<S: Storage + ?Sized>(
        &mut self,
        gateway: &SceneGateway<S>,
        scene_id: &str,
    ) -> SessionResult<()> {
        flush(&self.queue, gateway).await;
        let scene = match gateway.load_scene(scene_id).await {
            Ok(scene) => scene,
            Err(StorageError::NotFound(_)) => {
                return Err(SessionError::UnknownScene(scene_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let nodes = gateway.load_scene_nodes(scene_id).await?;
        log::info!("Loaded scene {} with {} nodes", scene_id, nodes.len());
        self.enter_scene(scene, nodes);
        Ok(())
    }

    /// Load the scene list, creating the default scene on first run, and
    /// enter the current scene (or the first one if it no longer exists).
    pub async fn load_scenes<S: Storage + ?Sized>(
        &mut self,
        gateway: &SceneGateway<S>,
    ) -> SessionResult<()> {
        gateway.ensure_default_scene().await?;
        let scenes = gateway.list_scenes().await?;
        let current = self.scene_id();
        let target = if scenes.iter().any(|s| s.id == current) {
            current
        } else {
            scenes
                .first()
                .map(|s| s.id.clone())
                .unwrap_or_else(|| crate::node::DEFAULT_SCENE_ID.to_string())
        };
        self.store.set_scenes(scenes);
        self.load_scene(gateway, &target).await
    }

    // --- MIDI ---

    /// Apply a MIDI command to its target module in the current scene.
    ///
    /// Returns false when the target is not on the current scene or the
    /// command does not apply to the module.
    pub fn apply_midi(&mut self, dispatch: &Dispatch) -> bool {
        let Some(kind) = self.store.node(&dispatch.node_id).map(|n| n.kind) else {
            return false;
        };
        let node_id = dispatch.node_id.as_str();

        match (kind, dispatch.command, dispatch.channel_id.as_deref()) {
            (ModuleKind::AudioChannel, MidiCommand::SetVolume { value }, None) => {
                let value = value.clamp(0.0, 1.0);
                self.store.update_node(node_id, |node| {
                    if let ModuleConfig::AudioChannel { volume, .. } = &mut node.data.config {
                        *volume = value;
                    }
                });
                self.submit_node_data(node_id);
                true
            }
            (ModuleKind::AudioScene, MidiCommand::SetVolume { value }, Some(channel_id)) => {
                self.store
                    .playback_mut(node_id)
                    .channel_volumes
                    .insert(channel_id.to_string(), value.clamp(0.0, 1.0));
                true
            }
            (ModuleKind::AudioChannel | ModuleKind::AudioScene, MidiCommand::TogglePlay, None) => {
                let playback = self.store.playback_mut(node_id);
                playback.playing = !playback.playing;
                true
            }
            (ModuleKind::AudioChannel | ModuleKind::AudioScene, MidiCommand::Stop, None) => {
                self.store.playback_mut(node_id).playing = false;
                true
            }
            _ => false,
        }
    }

    // --- UI flags ---

    pub fn select(&mut self, node_id: Option<&str>) -> SessionResult<()> {
        if let Some(id) = node_id {
            self.require_node(id)?;
        }
        self.store.set_selected_node(node_id.map(str::to_string));
        Ok(())
    }

    /// Open the detail modal of a node.
    pub fn open_modal(&mut self, node_id: &str) -> SessionResult<()> {
        let kind = self.require_node(node_id)?.kind;
        self.store.open_modal(node_id, kind.as_str());
        Ok(())
    }

    pub fn close_modal(&mut self) {
        self.store.close_modal();
    }

    pub fn set_grid_snap(&mut self, enabled: bool) {
        self.store.set_grid_snap(enabled);
    }

    pub fn trigger_refresh(&mut self) -> u64 {
        self.store.trigger_refresh()
    }
}
