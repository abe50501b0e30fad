use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Source of raw file bytes by identifier. Synchronous and non-blocking from
/// the engine's point of view.
pub trait AssetStore: Send + Sync {
    fn file_buffer(&self, file_id: &str) -> Option<Vec<u8>>;
}

/// Files under a root directory; the id is the path relative to the root.
pub struct DirAssetStore {
    root: PathBuf,
}

impl DirAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, file_id: &str) -> Option<PathBuf> {
        let rel = Path::new(file_id);
        // Only plain relative paths; no escaping the root.
        if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
            return None;
        }
        Some(self.root.join(rel))
    }
}

impl AssetStore for DirAssetStore {
    fn file_buffer(&self, file_id: &str) -> Option<Vec<u8>> {
        let path = self.resolve(file_id)?;
        match std::fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                debug!(file_id, path = %path.display(), "asset read failed: {e}");
                None
            }
        }
    }
}

/// In-memory assets, e.g. bundled into the binary or fetched ahead of time.
#[derive(Default)]
pub struct MemoryAssetStore {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, file_id: impl Into<String>, bytes: Vec<u8>) {
        self.files.write().insert(file_id.into(), bytes);
    }

    pub fn remove(&self, file_id: &str) -> Option<Vec<u8>> {
        self.files.write().remove(file_id)
    }
}

impl AssetStore for MemoryAssetStore {
    fn file_buffer(&self, file_id: &str) -> Option<Vec<u8>> {
        self.files.read().get(file_id).cloned()
    }
}
