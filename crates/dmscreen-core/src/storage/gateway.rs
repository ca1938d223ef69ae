//! Scene and node persistence on top of a [`Storage`] backend.

use super::records::{Record, delete_record, list_records, load_record, save_record};
use super::{Storage, StorageError, StorageResult};
use crate::node::{DEFAULT_SCENE_ID, Node, NodeData, Scene};
use crate::viewport::Viewport;
use kurbo::{Point, Size};
use std::sync::Arc;

/// Loads and saves scene layouts.
pub struct SceneGateway<S: Storage + ?Sized> {
    storage: Arc<S>,
}

impl<S: Storage + ?Sized> Clone for SceneGateway<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<S: Storage + ?Sized> SceneGateway<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Get a reference to the storage backend.
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Create the default scene if it does not exist yet.
    pub async fn ensure_default_scene(&self) -> StorageResult<Scene> {
        match load_record::<S, Scene>(&self.storage, DEFAULT_SCENE_ID).await {
            Ok(scene) => Ok(scene),
            Err(StorageError::NotFound(_)) => {
                let scene = Scene::default_scene();
                save_record(self.storage.as_ref(), &scene).await?;
                log::info!("Created default scene");
                Ok(scene)
            }
            Err(e) => Err(e),
        }
    }

    /// All scenes, oldest first.
    pub async fn list_scenes(&self) -> StorageResult<Vec<Scene>> {
        let mut scenes: Vec<Scene> = list_records(self.storage.as_ref()).await?;
        scenes.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(scenes)
    }

    pub async fn load_scene(&self, scene_id: &str) -> StorageResult<Scene> {
        load_record(self.storage.as_ref(), scene_id).await
    }

    pub async fn save_scene(&self, scene: &Scene) -> StorageResult<()> {
        save_record(self.storage.as_ref(), scene).await
    }

    pub async fn rename_scene(&self, scene_id: &str, name: &str) -> StorageResult<()> {
        let mut scene = self.load_scene(scene_id).await?;
        scene.name = name.to_string();
        scene.touch();
        self.save_scene(&scene).await
    }

    pub async fn save_viewport(&self, scene_id: &str, viewport: Viewport) -> StorageResult<()> {
        let mut scene = self.load_scene(scene_id).await?;
        scene.viewport = viewport;
        scene.touch();
        self.save_scene(&scene).await
    }

    /// Delete a scene together with all of its nodes.
    pub async fn delete_scene(&self, scene_id: &str) -> StorageResult<()> {
        for node in self.load_scene_nodes(scene_id).await? {
            delete_record::<S, Node>(&self.storage, &node.id).await?;
        }
        delete_record::<S, Scene>(&self.storage, scene_id).await
    }

    pub async fn load_scene_nodes(&self, scene_id: &str) -> StorageResult<Vec<Node>> {
        let nodes: Vec<Node> = list_records(self.storage.as_ref()).await?;
        Ok(nodes.into_iter().filter(|n| n.scene_id == scene_id).collect())
    }

    async fn load_node(&self, scene_id: &str, node_id: &str) -> StorageResult<Node> {
        let node: Node = load_record(self.storage.as_ref(), node_id).await?;
        if node.scene_id != scene_id {
            return Err(StorageError::NotFound(format!("{scene_id}/{node_id}")));
        }
        Ok(node)
    }

    pub async fn create_node(&self, scene_id: &str, node: &Node) -> StorageResult<()> {
        if node.scene_id != scene_id {
            let mut node = node.clone();
            node.scene_id = scene_id.to_string();
            return save_record(self.storage.as_ref(), &node).await;
        }
        save_record(self.storage.as_ref(), node).await
    }

    pub async fn save_node_position(
        &self,
        scene_id: &str,
        node_id: &str,
        position: Point,
    ) -> StorageResult<()> {
        let mut node = self.load_node(scene_id, node_id).await?;
        node.position = position;
        save_record(self.storage.as_ref(), &node).await
    }

    pub async fn save_node_size(
        &self,
        scene_id: &str,
        node_id: &str,
        size: Size,
    ) -> StorageResult<()> {
        let mut node = self.load_node(scene_id, node_id).await?;
        node.size = size;
        save_record(self.storage.as_ref(), &node).await
    }

    pub async fn save_node_data(
        &self,
        scene_id: &str,
        node_id: &str,
        data: &NodeData,
    ) -> StorageResult<()> {
        let mut node = self.load_node(scene_id, node_id).await?;
        node.data = data.clone();
        save_record(self.storage.as_ref(), &node).await
    }

    pub async fn delete_node(&self, scene_id: &str, node_id: &str) -> StorageResult<()> {
        match self.load_node(scene_id, node_id).await {
            Ok(_) => delete_record::<S, Node>(&self.storage, node_id).await,
            Err(StorageError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{ModuleConfig, ModuleKind};
    use crate::storage::MemoryStorage;
    use crate::storage::test_util::block_on;

    fn gateway() -> SceneGateway<MemoryStorage> {
        SceneGateway::new(Arc::new(MemoryStorage::new()))
    }

    #[test]
    fn test_default_scene_is_created_once() {
        let gateway = gateway();
        let first = block_on(gateway.ensure_default_scene()).unwrap();
        block_on(gateway.rename_scene("default", "Tavern")).unwrap();
        let second = block_on(gateway.ensure_default_scene()).unwrap();

        assert_eq!(first.name, "Main Canvas");
        assert_eq!(second.name, "Tavern");
        assert_eq!(block_on(gateway.list_scenes()).unwrap().len(), 1);
    }

    #[test]
    fn test_node_updates() {
        let gateway = gateway();
        let node = Node::new("default", ModuleKind::AudioChannel, Point::ZERO);
        block_on(gateway.create_node("default", &node)).unwrap();

        block_on(gateway.save_node_position("default", &node.id, Point::new(40.0, 60.0))).unwrap();
        block_on(gateway.save_node_size("default", &node.id, Size::new(300.0, 200.0))).unwrap();
        let mut data = node.data.clone();
        data.config = ModuleConfig::AudioChannel {
            volume: 0.9,
            looping: false,
        };
        block_on(gateway.save_node_data("default", &node.id, &data)).unwrap();

        let nodes = block_on(gateway.load_scene_nodes("default")).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].position, Point::new(40.0, 60.0));
        assert_eq!(nodes[0].size, Size::new(300.0, 200.0));
        assert_eq!(nodes[0].data.config.volume(), Some(0.9));
    }

    #[test]
    fn test_node_belongs_to_scene() {
        let gateway = gateway();
        let node = Node::new("a", ModuleKind::Note, Point::ZERO);
        block_on(gateway.create_node("a", &node)).unwrap();

        let result = block_on(gateway.save_node_position("b", &node.id, Point::ZERO));
        assert!(matches!(result, Err(StorageError::NotFound(_))));
        assert!(block_on(gateway.load_scene_nodes("b")).unwrap().is_empty());
    }

    #[test]
    fn test_delete_scene_cascades() {
        let gateway = gateway();
        block_on(gateway.save_scene(&Scene::new("s1", "Dungeon"))).unwrap();
        block_on(gateway.save_scene(&Scene::new("s2", "Forest"))).unwrap();
        let doomed = Node::new("s1", ModuleKind::Note, Point::ZERO);
        let kept = Node::new("s2", ModuleKind::Note, Point::ZERO);
        block_on(gateway.create_node("s1", &doomed)).unwrap();
        block_on(gateway.create_node("s2", &kept)).unwrap();

        block_on(gateway.delete_scene("s1")).unwrap();

        assert!(block_on(gateway.load_scene("s1")).is_err());
        assert!(block_on(gateway.load_scene_nodes("s1")).unwrap().is_empty());
        assert_eq!(block_on(gateway.load_scene_nodes("s2")).unwrap().len(), 1);
    }

    #[test]
    fn test_save_viewport() {
        let gateway = gateway();
        block_on(gateway.ensure_default_scene()).unwrap();
        block_on(gateway.save_viewport("default", Viewport::new(10.0, -5.0, 1.5))).unwrap();

        let scene = block_on(gateway.load_scene("default")).unwrap();
        assert_eq!(scene.viewport, Viewport::new(10.0, -5.0, 1.5));
    }

    #[test]
    fn test_delete_missing_node_is_ok() {
        let gateway = gateway();
        block_on(gateway.delete_node("default", "ghost")).unwrap();
    }
}
