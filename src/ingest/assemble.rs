use super::classify::SkeletonFormat;
use super::error::{IngestError, ParseStage};
use super::loader::SkeletonPayload;
use super::resolve::{TextureResolver, UnresolvedTexture};
use crate::assets::atlas::{parse_atlas, AtlasDescriptor};
use crate::assets::skeletal::SkeletonDefinition;
use crate::assets::skeleton_binary::decode_skeleton_binary;
use crate::assets::skeleton_json::decode_skeleton_json;
use anyhow::anyhow;
use log::{info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct Assembled {
    pub atlas: Arc<AtlasDescriptor>,
    pub definition: SkeletonDefinition,
    pub unresolved: Vec<UnresolvedTexture>,
}

/// Builds a skeleton definition with the decoder named by the bundle's format tag.
pub struct SkeletonAssembler {
    format: SkeletonFormat,
}

impl SkeletonAssembler {
    pub fn new(format: SkeletonFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> SkeletonFormat {
        self.format
    }

    pub fn assemble(
        &self,
        atlas_text: &str,
        payload: &SkeletonPayload,
        textures: &TextureResolver<'_>,
        name: &str,
    ) -> Result<Assembled, IngestError> {
        let atlas = parse_atlas(atlas_text, textures)
            .map_err(|cause| IngestError::SkeletonParseFailure { stage: ParseStage::Atlas, cause })?;
        let unresolved: Vec<UnresolvedTexture> = atlas
            .pages_without_texture()
            .map(|page| UnresolvedTexture { page: page.name.to_string(), attempted: textures.attempted(&page.name) })
            .collect();
        for texture in &unresolved {
            warn!("[ingest] regions on page '{}' will render without a texture", texture.page);
        }

        let decoded = match (self.format, payload) {
            (SkeletonFormat::Text, SkeletonPayload::Text(text)) => decode_skeleton_json(text, &atlas),
            (SkeletonFormat::Binary, SkeletonPayload::Binary(bytes)) => decode_skeleton_binary(bytes, &atlas),
            (format, _) => Err(anyhow!("payload does not match the {} skeleton format", format.label())),
        };
        let mut definition =
            decoded.map_err(|cause| IngestError::SkeletonParseFailure { stage: ParseStage::Skeleton, cause })?;
        definition.name = Arc::from(name);
        let atlas = Arc::new(atlas);
        definition.atlas = Arc::clone(&atlas);
        info!(
            "[ingest] assembled skeleton '{name}': {} bones, {} slots, {} skin(s), {} animation(s)",
            definition.bones.len(),
            definition.slots.len(),
            definition.skins.len(),
            definition.animations.len()
        );
        Ok(Assembled { atlas, definition, unresolved })
    }
}

/// A cached skeleton waiting out the readiness delay before it is instantiated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInstance {
    pub key: String,
    pub generation: u64,
    pub ready_at: Instant,
}

impl PendingInstance {
    pub fn schedule(key: String, generation: u64, cached_at: Instant, delay: Duration) -> Self {
        Self { key, generation, ready_at: cached_at + delay }
    }

    pub fn is_ready(&self, now: Instant) -> bool {
        now >= self.ready_at
    }
}
