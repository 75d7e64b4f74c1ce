use super::entry::{base_name, normalize_relative_path};
use crate::assets::atlas::TextureLookup;
use crate::assets::{ImageCache, ImageHandle};
use log::warn;

/// An atlas page whose image was not found under any key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedTexture {
    pub page: String,
    pub attempted: Vec<String>,
}

/// Maps atlas page names onto cached images. Page names are relative to the atlas file, so the
/// path next to the atlas is tried first, then the referenced string as given, then its base name.
pub struct TextureResolver<'c> {
    cache: &'c ImageCache,
    atlas_dir: String,
}

impl<'c> TextureResolver<'c> {
    /// A resolver for an atlas sitting at the drop root.
    pub fn new(cache: &'c ImageCache) -> Self {
        Self { cache, atlas_dir: String::new() }
    }

    /// A resolver for the atlas at `atlas_path`, relative to the drop root.
    pub fn for_atlas(cache: &'c ImageCache, atlas_path: &str) -> Self {
        let normalized = normalize_relative_path(atlas_path);
        let atlas_dir = normalized.rsplit_once('/').map(|(dir, _)| dir.to_string()).unwrap_or_default();
        Self { cache, atlas_dir }
    }

    pub fn atlas_dir(&self) -> &str {
        &self.atlas_dir
    }

    /// Keys tried for `name`, in order.
    pub fn attempted(&self, name: &str) -> Vec<String> {
        let mut chain = Vec::with_capacity(3);
        if let Some(beside) = self.beside_atlas(name) {
            chain.push(beside);
        }
        chain.push(name.to_string());
        let base = base_name(name);
        if base != name {
            chain.push(base.to_string());
        }
        chain
    }

    pub fn resolve(&self, name: &str) -> Option<ImageHandle> {
        self.beside_atlas(name)
            .and_then(|path| self.cache.get_by_path(&path))
            .or_else(|| self.cache.get_by_path(&normalize_relative_path(name)))
            .or_else(|| self.cache.get(name))
            .or_else(|| self.cache.get(base_name(name)))
    }

    fn beside_atlas(&self, name: &str) -> Option<String> {
        if self.atlas_dir.is_empty() {
            return None;
        }
        Some(format!("{}/{}", self.atlas_dir, normalize_relative_path(name)))
    }
}

impl TextureLookup for TextureResolver<'_> {
    fn lookup(&self, name: &str) -> Option<ImageHandle> {
        let found = self.resolve(name);
        if found.is_none() {
            warn!(
                "[ingest] atlas page '{name}' has no image; tried {:?}, cached keys {:?}",
                self.attempted(name),
                self.cache.keys()
            );
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::TextureStore;
    use image::RgbaImage;

    #[test]
    fn exact_path_wins_over_base_name() {
        let mut store = TextureStore::new();
        let mut cache = ImageCache::new();
        let first = store.register("a/img.png", RgbaImage::new(1, 1));
        let second = store.register("b/img.png", RgbaImage::new(2, 2));
        cache.insert("img.png", "b/img.png", second);
        cache.insert("img.png", "a/img.png", first);
        let resolver = TextureResolver::new(&cache);
        assert_eq!(resolver.lookup("b/img.png"), Some(second));
        assert_eq!(resolver.lookup("img.png"), Some(first));
    }

    #[test]
    fn falls_back_to_the_base_name() {
        let mut store = TextureStore::new();
        let mut cache = ImageCache::new();
        let hero = store.register("hero.png", RgbaImage::new(1, 1));
        cache.insert("hero.png", "hero.png", hero);
        let resolver = TextureResolver::new(&cache);
        assert_eq!(resolver.lookup("textures/hero.png"), Some(hero));
        assert_eq!(resolver.lookup("textures\\hero.png"), Some(hero));
        assert_eq!(resolver.lookup("textures/villain.png"), None);
    }

    #[test]
    fn attempted_chain_lists_exact_then_base() {
        let cache = ImageCache::new();
        let resolver = TextureResolver::new(&cache);
        assert_eq!(resolver.attempted("textures/hero.png"), vec!["textures/hero.png", "hero.png"]);
        assert_eq!(resolver.attempted("hero.png"), vec!["hero.png"]);
        let nested = TextureResolver::for_atlas(&cache, "rig\\hero.atlas");
        assert_eq!(nested.atlas_dir(), "rig");
        assert_eq!(nested.attempted("hero.png"), vec!["rig/hero.png", "hero.png"]);
    }

    #[test]
    fn pages_resolve_relative_to_the_atlas_first() {
        let mut store = TextureStore::new();
        let mut cache = ImageCache::new();
        let blue = store.register("hero/skins/blue/hero.png", RgbaImage::new(16, 16));
        let red = store.register("hero/skins/red/hero.png", RgbaImage::new(8, 8));
        cache.insert("hero.png", "hero/skins/blue/hero.png", blue);
        cache.insert("hero.png", "hero/skins/red/hero.png", red);

        let resolver = TextureResolver::for_atlas(&cache, "hero/hero.atlas");
        assert_eq!(resolver.lookup("skins/blue/hero.png"), Some(blue));
        assert_eq!(resolver.lookup("./skins/red/hero.png"), Some(red));
        assert_eq!(TextureResolver::new(&cache).lookup("skins/blue/hero.png"), Some(red), "base name holds the last write");
    }
}
