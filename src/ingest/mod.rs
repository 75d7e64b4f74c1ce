pub mod assemble;
pub mod classify;
pub mod entry;
pub mod error;
pub mod loader;
pub mod resolve;

pub use assemble::{PendingInstance, SkeletonAssembler};
pub use classify::{classify, AssetRole, ClassifiedBundle, IngestibleBundle, SkeletonFormat};
pub use entry::{expand_paths, DroppedEntry};
pub use error::{BundleRole, FileFailure, IngestError, ParseStage};
pub use resolve::{TextureResolver, UnresolvedTexture};

use crate::assets::skeletal::SkeletonDefinition;
use crate::assets::{ImageCache, SkeletonCache, TextureStore};
use classify::ClassificationConflict;
use log::{debug, info};
use std::sync::Arc;

/// What a successful ingest produced, for logs and host UI.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub skeleton_name: String,
    pub format: SkeletonFormat,
    pub atlas_path: String,
    pub skeleton_path: String,
    pub image_paths: Vec<String>,
    pub page_count: usize,
    pub region_count: usize,
    pub unresolved: Vec<UnresolvedTexture>,
    pub unrecognized: Vec<String>,
    pub conflicts: Vec<ClassificationConflict>,
    pub skins: Vec<Arc<str>>,
    pub animations: Vec<Arc<str>>,
    pub version: Option<Arc<str>>,
    pub hash: Option<Arc<str>>,
}

impl IngestReport {
    pub fn summary(&self) -> String {
        let version = self.version.as_deref().unwrap_or("unknown");
        format!(
            "'{}' ({} {}, {} image(s), {} page(s), {} region(s), {} skin(s), {} animation(s), {} unresolved page(s))",
            self.skeleton_name,
            self.format.label(),
            version,
            self.image_paths.len(),
            self.page_count,
            self.region_count,
            self.skins.len(),
            self.animations.len(),
            self.unresolved.len()
        )
    }
}

pub struct IngestOutcome {
    pub key: String,
    pub definition: Arc<SkeletonDefinition>,
    pub report: IngestReport,
}

/// Runs one dropped bundle through classification, decoding, texture resolution and assembly.
/// The caches only change after every file decoded.
pub async fn ingest_entries(
    entries: Vec<DroppedEntry>,
    images: &mut ImageCache,
    textures: &mut TextureStore,
    skeletons: &mut SkeletonCache,
) -> Result<IngestOutcome, IngestError> {
    let bundle = classify(entries).into_ingestible()?;
    let loaded = loader::load_bundle(&bundle).await?;

    let mut image_paths = Vec::with_capacity(loaded.images.len());
    for image in loaded.images {
        let handle = textures.register(&image.relative_path, image.image);
        for displaced in images.insert(&image.base_name, &image.relative_path, handle) {
            if skeletons.uses_texture(displaced) {
                debug!("[ingest] image {} replaced by '{}' stays alive for a cached atlas", displaced.id(), image.relative_path);
                continue;
            }
            debug!("[ingest] releasing image {} replaced by '{}'", displaced.id(), image.relative_path);
            textures.release(displaced);
        }
        image_paths.push(image.relative_path);
    }

    let skeleton_name = bundle.skeleton.file_stem().to_string();
    let resolver = TextureResolver::for_atlas(images, &bundle.atlas.relative_path);
    let assembled =
        SkeletonAssembler::new(bundle.format).assemble(&loaded.atlas_text, &loaded.skeleton, &resolver, &skeleton_name)?;

    let definition = Arc::new(assembled.definition);
    let key = SkeletonCache::next_key();
    skeletons.insert(&key, Arc::clone(&definition));
    info!("[ingest] cached skeleton '{skeleton_name}' under '{key}'");

    let report = IngestReport {
        skeleton_name,
        format: bundle.format,
        atlas_path: bundle.atlas.relative_path.clone(),
        skeleton_path: bundle.skeleton.relative_path.clone(),
        image_paths,
        page_count: assembled.atlas.pages.len(),
        region_count: assembled.atlas.regions.len(),
        unresolved: assembled.unresolved,
        unrecognized: bundle.unrecognized,
        conflicts: bundle.conflicts,
        skins: definition.skin_names(),
        animations: definition.animation_names(),
        version: definition.version.clone(),
        hash: definition.hash.clone(),
    };
    Ok(IngestOutcome { key, definition, report })
}
