use crate::assets::{ImageCache, SkeletonCache, TextureStore};
use crate::camera::{Layer, ViewportCamera};
use crate::config::ViewerConfig;
use crate::ingest::{self, expand_paths, DroppedEntry, IngestError, IngestReport, PendingInstance};
use crate::instance::{SkeletonInstance, TrackEntry};
use anyhow::{anyhow, Result};
use glam::Vec2;
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::dpi::PhysicalSize;

/// Receives the one-line message for a failed ingest. The host decides how to present it.
pub trait AlertSink {
    fn alert(&mut self, message: &str);
}

impl AlertSink for Vec<String> {
    fn alert(&mut self, message: &str) {
        self.push(message.to_string());
    }
}

/// A skeleton that just became the displayed instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Instantiated {
    pub key: String,
    pub scale: f32,
    pub skins: Vec<Arc<str>>,
    pub animations: Vec<Arc<str>>,
}

/// Everything one viewer window owns: caches, camera and the displayed skeleton.
pub struct ViewerSession {
    images: ImageCache,
    textures: TextureStore,
    skeletons: SkeletonCache,
    camera: ViewportCamera,
    instance: Option<SkeletonInstance>,
    pending: Option<PendingInstance>,
    generation: u64,
    instantiate_delay: Duration,
    last_report: Option<IngestReport>,
}

impl ViewerSession {
    pub fn new(config: &ViewerConfig, surface: PhysicalSize<u32>) -> Self {
        Self {
            images: ImageCache::new(),
            textures: TextureStore::new(),
            skeletons: SkeletonCache::new(),
            camera: ViewportCamera::new(surface, config.camera.clone(), config.grid.clone()),
            instance: None,
            pending: None,
            generation: 0,
            instantiate_delay: config.ingest.instantiate_delay(),
            last_report: None,
        }
    }

    pub fn images(&self) -> &ImageCache {
        &self.images
    }

    pub fn textures(&self) -> &TextureStore {
        &self.textures
    }

    pub fn skeletons(&self) -> &SkeletonCache {
        &self.skeletons
    }

    pub fn camera(&self) -> &ViewportCamera {
        &self.camera
    }

    pub fn instance(&self) -> Option<&SkeletonInstance> {
        self.instance.as_ref()
    }

    pub fn pending(&self) -> Option<&PendingInstance> {
        self.pending.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn last_report(&self) -> Option<&IngestReport> {
        self.last_report.as_ref()
    }

    /// Ingests one bundle and schedules its instantiation. On failure the displayed instance is
    /// left alone, but anything still pending from an earlier drop is superseded.
    pub async fn ingest(&mut self, entries: Vec<DroppedEntry>) -> Result<IngestReport, IngestError> {
        self.generation += 1;
        let generation = self.generation;
        if let Some(stale) = self.pending.take() {
            info!("[session] drop #{generation} supersedes pending skeleton '{}'", stale.key);
        }
        let outcome = ingest::ingest_entries(entries, &mut self.images, &mut self.textures, &mut self.skeletons).await?;
        info!("[session] {}", outcome.report.summary());
        self.pending = Some(PendingInstance::schedule(outcome.key, generation, Instant::now(), self.instantiate_delay));
        self.last_report = Some(outcome.report.clone());
        Ok(outcome.report)
    }

    /// Expands dropped paths and ingests them as one bundle, reporting failures through `alerts`.
    pub fn ingest_dropped(&mut self, paths: &[PathBuf], alerts: &mut dyn AlertSink) -> Option<IngestReport> {
        let result = expand_paths(paths).and_then(|entries| {
            info!("[session] dropped {} path(s) expanded to {} file(s)", paths.len(), entries.len());
            pollster::block_on(self.ingest(entries))
        });
        match result {
            Ok(report) => Some(report),
            Err(err) => {
                error!("[session] ingest failed: {err}");
                alerts.alert(&err.user_message());
                None
            }
        }
    }

    /// Deadline of the pending instantiation, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|pending| pending.ready_at)
    }

    /// Instantiates the pending skeleton once its deadline has passed.
    pub fn poll_pending(&mut self, now: Instant) -> Option<Instantiated> {
        if !self.pending.as_ref().is_some_and(|pending| pending.is_ready(now)) {
            return None;
        }
        let pending = self.pending.take()?;
        if pending.generation != self.generation {
            warn!("[session] discarding stale pending skeleton '{}' (generation {})", pending.key, pending.generation);
            return None;
        }
        let Some(definition) = self.skeletons.get(&pending.key) else {
            warn!("[session] cached skeleton '{}' disappeared before instantiation", pending.key);
            return None;
        };

        let mut instance = SkeletonInstance::new(pending.key.clone(), definition);
        let scale = self.camera.fit_to_view(&mut instance);
        let skins = instance.skin_names();
        let animations = instance.animation_names();
        info!("[session] '{}' skins: {}", pending.key, join_names(&skins));
        info!("[session] '{}' animations: {}", pending.key, join_names(&animations));
        if let Some(previous) = self.instance.replace(instance) {
            info!("[session] replaced displayed skeleton '{}'", previous.key());
        }
        Some(Instantiated { key: pending.key, scale, skins, animations })
    }

    pub fn pointer_down(&mut self, position: Vec2) {
        self.camera.pointer_down(position);
    }

    pub fn pointer_move(&mut self, position: Vec2) -> bool {
        self.camera.pointer_move(position)
    }

    pub fn pointer_up(&mut self) {
        self.camera.pointer_up();
    }

    /// Returns the new scale, or `None` when nothing is displayed.
    pub fn wheel(&mut self, delta_y: f32) -> Option<f32> {
        let instance = self.instance.as_mut()?;
        Some(self.camera.apply_wheel(delta_y, instance))
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        self.camera.resize(size);
    }

    pub fn layers(&self) -> Vec<Layer<'_>> {
        self.camera.layers(self.instance.as_ref())
    }

    pub fn set_skin(&mut self, name: &str) -> Result<()> {
        self.instance.as_mut().ok_or_else(|| anyhow!("No skeleton is displayed"))?.set_skin(name)
    }

    /// Plays `name` once on track 0.
    pub fn select_animation(&mut self, name: &str) -> Result<TrackEntry> {
        let instance = self.instance.as_mut().ok_or_else(|| anyhow!("No skeleton is displayed"))?;
        instance.set_animation(0, name, false).cloned()
    }
}

fn join_names(names: &[Arc<str>]) -> String {
    if names.is_empty() {
        return "(none)".to_string();
    }
    names.iter().map(|name| &**name).collect::<Vec<_>>().join(", ")
}
