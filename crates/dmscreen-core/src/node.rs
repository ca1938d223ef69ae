//! Scenes and the module nodes placed on them.

use crate::content::{new_id, now};
use crate::layout::LayoutItem;
use crate::module::{ModuleConfig, ModuleKind};
use crate::storage::{Collection, Record};
use crate::viewport::Viewport;
use kurbo::{Point, Rect, Size};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Id of the scene every installation starts with.
pub const DEFAULT_SCENE_ID: &str = "default";
/// Display name of the default scene.
pub const DEFAULT_SCENE_NAME: &str = "Main Canvas";

/// Payload carried by a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    /// Content record this module displays, if one has been attached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    pub config: ModuleConfig,
    #[serde(default)]
    pub label: String,
}

/// A module placed on a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub scene_id: String,
    #[serde(rename = "type")]
    pub kind: ModuleKind,
    pub position: Point,
    pub size: Size,
    pub data: NodeData,
}

impl Node {
    /// Create a node of `kind` with a fresh id, the default size and config.
    pub fn new(scene_id: impl Into<String>, kind: ModuleKind, position: Point) -> Self {
        Self {
            id: new_id(),
            scene_id: scene_id.into(),
            kind,
            position,
            size: kind.default_size(),
            data: NodeData {
                reference_id: None,
                config: ModuleConfig::default_for(kind),
                label: kind.label(),
            },
        }
    }

    /// Rectangle covered by the node.
    pub fn rect(&self) -> Rect {
        Rect::from_origin_size(self.position, self.size)
    }

    /// View of this node for the layout engine.
    pub fn layout_item(&self) -> LayoutItem<'_> {
        LayoutItem {
            id: &self.id,
            position: self.position,
            size: Some(self.size),
            kind: Some(self.kind),
        }
    }
}

impl Record for Node {
    const COLLECTION: Collection = Collection::Nodes;

    fn record_id(&self) -> &str {
        &self.id
    }
}

/// A named canvas with its own nodes and viewport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub viewport: Viewport,
    #[serde(default = "now", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default = "now", with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Scene {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let timestamp = now();
        Self {
            id: id.into(),
            name: name.into(),
            viewport: Viewport::default(),
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// The pre-provisioned "Main Canvas" scene.
    pub fn default_scene() -> Self {
        Self::new(DEFAULT_SCENE_ID, DEFAULT_SCENE_NAME)
    }
}

impl Record for Scene {
    const COLLECTION: Collection = Collection::Scenes;

    fn record_id(&self) -> &str {
        &self.id
    }

    fn touch(&mut self) {
        self.updated_at = now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_node_uses_kind_defaults() {
        let node = Node::new("default", ModuleKind::Statblock, Point::new(40.0, 60.0));
        assert_eq!(node.size, Size::new(320.0, 400.0));
        assert_eq!(node.data.label, "Statblock");
        assert_eq!(node.data.config, ModuleConfig::Statblock);
        assert!(node.data.reference_id.is_none());
        assert_eq!(node.rect(), Rect::new(40.0, 60.0, 360.0, 460.0));
    }

    #[test]
    fn test_node_ids_are_unique() {
        let a = Node::new("default", ModuleKind::Note, Point::ZERO);
        let b = Node::new("default", ModuleKind::Note, Point::ZERO);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_node_wire_format() {
        let node = Node::new("default", ModuleKind::AudioChannel, Point::new(20.0, 0.0));
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "audio-channel");
        assert_eq!(json["sceneId"], "default");
        assert_eq!(json["data"]["config"]["kind"], "audio-channel");

        let back: Node = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_default_scene() {
        let scene = Scene::default_scene();
        assert_eq!(scene.id, "default");
        assert_eq!(scene.name, "Main Canvas");
        assert_eq!(scene.viewport, Viewport::default());
    }
}
