use crate::assets::skeletal::{Bounds, SkeletonDefinition, Skin};
use anyhow::{anyhow, bail, Result};
use glam::Vec2;
use log::info;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct TrackEntry {
    pub animation: Arc<str>,
    pub looped: bool,
    pub duration: f32,
}

/// Highest animation track index plus one.
pub const MAX_TRACKS: usize = 16;

/// A displayable skeleton built from shared, immutable definition data.
pub struct SkeletonInstance {
    key: String,
    data: Arc<SkeletonDefinition>,
    position: Vec2,
    scale: f32,
    skin: Option<usize>,
    slot_attachments: Vec<Option<Arc<str>>>,
    tracks: Vec<Option<TrackEntry>>,
}

impl SkeletonInstance {
    pub fn new(key: impl Into<String>, data: Arc<SkeletonDefinition>) -> Self {
        let slot_attachments = data.setup_attachments();
        Self { key: key.into(), data, position: Vec2::ZERO, scale: 1.0, skin: None, slot_attachments, tracks: Vec::new() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn definition(&self) -> &Arc<SkeletonDefinition> {
        &self.data
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
    }

    fn current_skin(&self) -> Option<&Skin> {
        self.skin.and_then(|index| self.data.skins.get(index))
    }

    pub fn skin_name(&self) -> Option<&str> {
        self.current_skin().map(|skin| &*skin.name)
    }

    pub fn skin_names(&self) -> Vec<Arc<str>> {
        self.data.skin_names()
    }

    pub fn animation_names(&self) -> Vec<Arc<str>> {
        self.data.animation_names()
    }

    pub fn slot_attachment(&self, slot: usize) -> Option<&str> {
        self.slot_attachments.get(slot).and_then(|name| name.as_deref())
    }

    /// Axis-aligned bounds of the visible attachments in skeleton space, ignoring position and scale.
    pub fn local_bounds(&self) -> Bounds {
        self.data.bounds(self.current_skin(), &self.slot_attachments)
    }

    /// Switches skin and returns every slot to its setup attachment.
    pub fn set_skin(&mut self, name: &str) -> Result<()> {
        let index = self
            .data
            .skins
            .iter()
            .position(|skin| &*skin.name == name)
            .ok_or_else(|| anyhow!("Skin not found: {name}"))?;
        self.skin = Some(index);
        self.slot_attachments = self.data.setup_attachments();
        info!("[viewer] skin '{name}' applied to '{}'", self.data.name);
        Ok(())
    }

    pub fn set_animation(&mut self, track: usize, name: &str, looped: bool) -> Result<&TrackEntry> {
        if track >= MAX_TRACKS {
            bail!("Track {track} is out of range (at most {MAX_TRACKS} tracks)");
        }
        let animation = self.data.find_animation(name).ok_or_else(|| anyhow!("Animation not found: {name}"))?;
        let entry = TrackEntry { animation: Arc::clone(&animation.name), looped, duration: animation.duration };
        if self.tracks.len() <= track {
            self.tracks.resize(track + 1, None);
        }
        info!("[viewer] track {track} playing '{name}' (loop: {looped}) on '{}'", self.data.name);
        Ok(self.tracks[track].insert(entry))
    }

    pub fn track(&self, index: usize) -> Option<&TrackEntry> {
        self.tracks.get(index).and_then(Option::as_ref)
    }

    pub fn clear_tracks(&mut self) {
        self.tracks.clear();
    }
}
