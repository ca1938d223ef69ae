//! Canvas state for one session.

use crate::node::{DEFAULT_SCENE_ID, Node, Scene};
use crate::viewport::Viewport;
use serde::Serialize;
use std::collections::HashMap;

/// Which module's detail modal is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModalState {
    pub module_id: String,
    pub module_type: String,
}

/// Runtime playback state of an audio module. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Playback {
    pub playing: bool,
    /// Per-channel volume overrides for audio scenes.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub channel_volumes: HashMap<String, f64>,
}

/// The current scene, its nodes, the viewport and UI flags.
///
/// All writes go through the methods below; last writer wins.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasStore {
    scenes: Vec<Scene>,
    current_scene_id: String,
    nodes: Vec<Node>,
    viewport: Viewport,
    grid_snap: bool,
    selected_node_id: Option<String>,
    modal: Option<ModalState>,
    refresh_counter: u64,
    playback: HashMap<String, Playback>,
}

impl Default for CanvasStore {
    fn default() -> Self {
        Self {
            scenes: Vec::new(),
            current_scene_id: DEFAULT_SCENE_ID.to_string(),
            nodes: Vec::new(),
            viewport: Viewport::default(),
            grid_snap: true,
            selected_node_id: None,
            modal: None,
            refresh_counter: 0,
            playback: HashMap::new(),
        }
    }
}

impl CanvasStore {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Scenes ---

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn scene(&self, scene_id: &str) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.id == scene_id)
    }

    pub fn current_scene_id(&self) -> &str {
        &self.current_scene_id
    }

    pub fn current_scene(&self) -> Option<&Scene> {
        self.scene(&self.current_scene_id)
    }

    pub fn set_scenes(&mut self, scenes: Vec<Scene>) {
        self.scenes = scenes;
    }

    pub fn set_current_scene(&mut self, scene_id: &str) {
        self.current_scene_id = scene_id.to_string();
    }

    pub fn add_scene(&mut self, scene: Scene) {
        self.scenes.push(scene);
    }

    /// Apply `update` to a scene. Returns false if there is no such scene.
    pub fn update_scene(&mut self, scene_id: &str, update: impl FnOnce(&mut Scene)) -> bool {
        match self.scenes.iter_mut().find(|s| s.id == scene_id) {
            Some(scene) => {
                update(scene);
                true
            }
            None => false,
        }
    }

    pub fn remove_scene(&mut self, scene_id: &str) -> Option<Scene> {
        let index = self.scenes.iter().position(|s| s.id == scene_id)?;
        Some(self.scenes.remove(index))
    }

    // --- Nodes ---

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    /// Replace the nodes, e.g. after loading a scene. Runtime playback is reset.
    pub fn set_nodes(&mut self, nodes: Vec<Node>) {
        self.nodes = nodes;
        self.playback.clear();
    }

    pub fn add_node(&mut self, node: Node) {
        self.nodes.push(node);
    }

    /// Apply `update` to a node. Returns false if there is no such node.
    pub fn update_node(&mut self, node_id: &str, update: impl FnOnce(&mut Node)) -> bool {
        match self.nodes.iter_mut().find(|n| n.id == node_id) {
            Some(node) => {
                update(node);
                true
            }
            None => false,
        }
    }

    /// Remove a node, clearing the selection if it pointed at it.
    pub fn remove_node(&mut self, node_id: &str) -> Option<Node> {
        let index = self.nodes.iter().position(|n| n.id == node_id)?;
        if self.selected_node_id.as_deref() == Some(node_id) {
            self.selected_node_id = None;
        }
        self.playback.remove(node_id);
        Some(self.nodes.remove(index))
    }

    // --- View and UI flags ---

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn grid_snap(&self) -> bool {
        self.grid_snap
    }

    pub fn set_grid_snap(&mut self, enabled: bool) {
        self.grid_snap = enabled;
    }

    pub fn selected_node_id(&self) -> Option<&str> {
        self.selected_node_id.as_deref()
    }

    pub fn set_selected_node(&mut self, node_id: Option<String>) {
        self.selected_node_id = node_id;
    }

    pub fn modal(&self) -> Option<&ModalState> {
        self.modal.as_ref()
    }

    pub fn open_modal(&mut self, module_id: &str, module_type: &str) {
        self.modal = Some(ModalState {
            module_id: module_id.to_string(),
            module_type: module_type.to_string(),
        });
    }

    pub fn close_modal(&mut self) {
        self.modal = None;
    }

    pub fn refresh_counter(&self) -> u64 {
        self.refresh_counter
    }

    /// Signal modules to reload their content.
    pub fn trigger_refresh(&mut self) -> u64 {
        self.refresh_counter += 1;
        self.refresh_counter
    }

    // --- Playback ---

    pub fn playback(&self, node_id: &str) -> Option<&Playback> {
        self.playback.get(node_id)
    }

    pub fn playback_mut(&mut self, node_id: &str) -> &mut Playback {
        self.playback.entry(node_id.to_string()).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleKind;
    use kurbo::Point;

    #[test]
    fn test_initial_state() {
        let store = CanvasStore::new();
        assert_eq!(store.current_scene_id(), "default");
        assert!(store.grid_snap());
        assert!(store.nodes().is_empty());
        assert!(store.modal().is_none());
        assert_eq!(store.refresh_counter(), 0);
        assert_eq!(store.viewport(), Viewport::default());
    }

    #[test]
    fn test_remove_selected_node_clears_selection() {
        let mut store = CanvasStore::new();
        let node = Node::new("default", ModuleKind::Note, Point::ZERO);
        let other = Node::new("default", ModuleKind::Note, Point::new(400.0, 0.0));
        let id = node.id.clone();
        let other_id = other.id.clone();
        store.add_node(node);
        store.add_node(other);

        store.set_selected_node(Some(other_id.clone()));
        store.remove_node(&id);
        assert_eq!(store.selected_node_id(), Some(other_id.as_str()));

        store.remove_node(&other_id);
        assert_eq!(store.selected_node_id(), None);
        assert!(store.remove_node(&other_id).is_none());
    }

    #[test]
    fn test_modal() {
        let mut store = CanvasStore::new();
        store.open_modal("n1", "note");
        assert_eq!(store.modal().map(|m| m.module_id.as_str()), Some("n1"));
        store.close_modal();
        assert!(store.modal().is_none());
    }

    #[test]
    fn test_refresh_counter_increments() {
        let mut store = CanvasStore::new();
        assert_eq!(store.trigger_refresh(), 1);
        assert_eq!(store.trigger_refresh(), 2);
    }

    #[test]
    fn test_update_scene() {
        let mut store = CanvasStore::new();
        store.add_scene(Scene::default_scene());
        assert!(store.update_scene("default", |s| s.name = "Tavern".to_string()));
        assert!(!store.update_scene("missing", |_| {}));
        assert_eq!(store.current_scene().map(|s| s.name.as_str()), Some("Tavern"));
    }

    #[test]
    fn test_set_nodes_resets_playback() {
        let mut store = CanvasStore::new();
        store.playback_mut("n1").playing = true;
        store.set_nodes(Vec::new());
        assert!(store.playback("n1").is_none());
    }
}
