use image::RgbaImage;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

pub mod atlas;
pub mod skeletal;
pub mod skeleton_binary;
pub mod skeleton_json;

/// Opaque key of a decoded image registered with the [`TextureStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageHandle {
    id: u64,
    width: u32,
    height: u32,
}

impl ImageHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

struct StoredTexture {
    label: String,
    image: Arc<RgbaImage>,
}

/// Decoded bitmaps, addressable by [`ImageHandle`]. This is the register call a host renderer
/// uploads from.
#[derive(Default)]
pub struct TextureStore {
    textures: HashMap<u64, StoredTexture>,
    next_id: u64,
}

impl TextureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, label: &str, image: RgbaImage) -> ImageHandle {
        self.next_id += 1;
        let handle = ImageHandle { id: self.next_id, width: image.width(), height: image.height() };
        self.textures.insert(handle.id, StoredTexture { label: label.to_string(), image: Arc::new(image) });
        handle
    }

    pub fn release(&mut self, handle: ImageHandle) -> bool {
        self.textures.remove(&handle.id).is_some()
    }

    pub fn image(&self, handle: ImageHandle) -> Option<Arc<RgbaImage>> {
        self.textures.get(&handle.id).map(|stored| Arc::clone(&stored.image))
    }

    pub fn label(&self, handle: ImageHandle) -> Option<&str> {
        self.textures.get(&handle.id).map(|stored| stored.label.as_str())
    }

    pub fn is_registered(&self, handle: ImageHandle) -> bool {
        self.textures.contains_key(&handle.id)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

/// Loaded images keyed by base file name. The relative path each image arrived under is indexed
/// separately so exact-path references can win over base-name matches.
#[derive(Debug, Default)]
pub struct ImageCache {
    by_name: HashMap<String, ImageHandle>,
    by_path: HashMap<String, ImageHandle>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts under `base_name` (last write wins) and indexes `relative_path`. Returns handles
    /// that are no longer reachable through either key.
    pub fn insert(&mut self, base_name: &str, relative_path: &str, handle: ImageHandle) -> Vec<ImageHandle> {
        let mut displaced = Vec::new();
        if let Some(previous) = self.by_name.insert(base_name.to_string(), handle) {
            if previous != handle {
                debug!("[assets] image cache key '{base_name}' replaced by '{relative_path}'");
                displaced.push(previous);
            }
        }
        if relative_path != base_name {
            if let Some(previous) = self.by_path.insert(relative_path.to_string(), handle) {
                if previous != handle && !displaced.contains(&previous) {
                    displaced.push(previous);
                }
            }
        }
        displaced.retain(|old| !self.references(*old));
        displaced
    }

    fn references(&self, handle: ImageHandle) -> bool {
        self.by_name.values().chain(self.by_path.values()).any(|existing| *existing == handle)
    }

    pub fn get(&self, base_name: &str) -> Option<ImageHandle> {
        self.by_name.get(base_name).copied()
    }

    pub fn get_by_path(&self, relative_path: &str) -> Option<ImageHandle> {
        self.by_path.get(relative_path).copied()
    }

    /// Sorted base-name keys.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.by_name.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Sorted relative paths of images that arrived inside a directory.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.by_path.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Assembled skeleton definitions keyed by a per-load unique key.
#[derive(Default)]
pub struct SkeletonCache {
    skeletons: HashMap<String, Arc<skeletal::SkeletonDefinition>>,
}

impl SkeletonCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_key() -> String {
        format!("spine-{}", Uuid::new_v4())
    }

    pub fn insert(&mut self, key: &str, skeleton: Arc<skeletal::SkeletonDefinition>) {
        self.skeletons.insert(key.to_string(), skeleton);
    }

    pub fn get(&self, key: &str) -> Option<Arc<skeletal::SkeletonDefinition>> {
        self.skeletons.get(key).cloned()
    }

    /// True if any cached skeleton's atlas still draws from `handle`.
    pub fn uses_texture(&self, handle: ImageHandle) -> bool {
        self.skeletons.values().any(|skeleton| skeleton.uses_texture(handle))
    }

    pub fn remove(&mut self, key: &str) -> Option<Arc<skeletal::SkeletonDefinition>> {
        self.skeletons.remove(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.skeletons.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.skeletons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skeletons.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(store: &mut TextureStore, label: &str) -> ImageHandle {
        store.register(label, RgbaImage::new(2, 3))
    }

    #[test]
    fn register_reports_dimensions_and_unique_ids() {
        let mut store = TextureStore::new();
        let a = handle(&mut store, "a.png");
        let b = handle(&mut store, "b.png");
        assert_ne!(a.id(), b.id());
        assert_eq!((a.width(), a.height()), (2, 3));
        assert_eq!(store.label(b), Some("b.png"));
        assert!(store.release(a));
        assert!(!store.is_registered(a));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn last_write_wins_per_base_name() {
        let mut store = TextureStore::new();
        let mut cache = ImageCache::new();
        let first = handle(&mut store, "hero.png");
        let second = handle(&mut store, "hero.png");
        assert!(cache.insert("hero.png", "hero.png", first).is_empty());
        assert_eq!(cache.insert("hero.png", "hero.png", second), vec![first]);
        assert_eq!(cache.get("hero.png"), Some(second));
        assert_eq!(cache.keys(), vec!["hero.png".to_string()]);
    }

    #[test]
    fn path_index_keeps_shadowed_images_reachable() {
        let mut store = TextureStore::new();
        let mut cache = ImageCache::new();
        let left = handle(&mut store, "a/img.png");
        let right = handle(&mut store, "b/img.png");
        cache.insert("img.png", "a/img.png", left);
        let displaced = cache.insert("img.png", "b/img.png", right);
        assert!(displaced.is_empty(), "left image is still indexed by its path");
        assert_eq!(cache.get("img.png"), Some(right));
        assert_eq!(cache.get_by_path("a/img.png"), Some(left));
        assert_eq!(cache.paths(), vec!["a/img.png".to_string(), "b/img.png".to_string()]);
    }

    #[test]
    fn skeleton_keys_are_unique() {
        assert_ne!(SkeletonCache::next_key(), SkeletonCache::next_key());
        assert!(SkeletonCache::next_key().starts_with("spine-"));
    }
}
