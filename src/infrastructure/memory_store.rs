//! In-memory project tree backing the `FileStore` interface.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::file_tree;
use crate::domain::traits::FileStore;
use crate::domain::types::FileNode;

#[derive(Debug, Default)]
pub struct MemoryFileStore {
    tree: RwLock<Vec<FileNode>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with an existing tree, e.g. a project template.
    pub fn with_tree(tree: Vec<FileNode>) -> Self {
        Self {
            tree: RwLock::new(tree),
        }
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn upsert(&self, path: &str, content: &str) -> Result<()> {
        if file_tree::normalize(path).is_empty() {
            anyhow::bail!("Invalid file path: {:?}", path);
        }
        file_tree::add_file(&mut *self.tree.write().await, path, content);
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<()> {
        file_tree::remove(&mut *self.tree.write().await, path);
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Option<String>> {
        let tree = self.tree.read().await;
        Ok(file_tree::find(&tree, path)
            .filter(|node| node.is_file())
            .and_then(|node| node.content.clone()))
    }

    async fn tree(&self) -> Vec<FileNode> {
        self.tree.read().await.clone()
    }
}
