use super::entry::{base_name, DroppedEntry};
use super::error::{BundleRole, IngestError};
use log::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkeletonFormat {
    Text,
    Binary,
}

impl SkeletonFormat {
    pub fn label(self) -> &'static str {
        match self {
            SkeletonFormat::Text => "json",
            SkeletonFormat::Binary => "binary",
        }
    }
}

/// The role a dropped file plays in a bundle. Computed once per entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetRole {
    Atlas,
    SkeletonText,
    SkeletonBinary,
    Image,
    Unrecognized,
}

pub fn classify_entry(entry: &DroppedEntry) -> AssetRole {
    match entry.extension().as_deref() {
        Some("atlas") => AssetRole::Atlas,
        Some("json") => AssetRole::SkeletonText,
        Some("skel") => AssetRole::SkeletonBinary,
        _ if entry.is_image() => AssetRole::Image,
        _ => AssetRole::Unrecognized,
    }
}

#[derive(Debug, Clone)]
pub struct ImageEntry {
    pub base_name: String,
    pub relative_path: String,
    pub entry: DroppedEntry,
}

/// Two files competed for the same single-file slot; `kept` won because it was seen last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationConflict {
    pub role: BundleRole,
    pub kept: String,
    pub replaced: String,
}

#[derive(Debug, Default)]
pub struct ClassifiedBundle {
    pub atlas: Option<DroppedEntry>,
    pub skeleton: Option<(DroppedEntry, SkeletonFormat)>,
    pub images: Vec<ImageEntry>,
    pub unrecognized: Vec<DroppedEntry>,
    pub superseded: Vec<DroppedEntry>,
    pub conflicts: Vec<ClassificationConflict>,
}

/// A bundle that passed the completeness check and may be decoded.
#[derive(Debug, Clone)]
pub struct IngestibleBundle {
    pub atlas: DroppedEntry,
    pub skeleton: DroppedEntry,
    pub format: SkeletonFormat,
    pub images: Vec<ImageEntry>,
    pub unrecognized: Vec<String>,
    pub conflicts: Vec<ClassificationConflict>,
}

/// Partitions a fully expanded drop into bundle slots.
pub fn classify<I>(entries: I) -> ClassifiedBundle
where
    I: IntoIterator<Item = DroppedEntry>,
{
    let mut bundle = ClassifiedBundle::default();
    for entry in entries {
        match classify_entry(&entry) {
            AssetRole::Atlas => {
                if let Some(previous) = bundle.atlas.replace(entry) {
                    bundle.record_conflict(BundleRole::Atlas, previous);
                }
            }
            AssetRole::SkeletonText => bundle.set_skeleton(entry, SkeletonFormat::Text),
            AssetRole::SkeletonBinary => bundle.set_skeleton(entry, SkeletonFormat::Binary),
            AssetRole::Image => bundle.images.push(ImageEntry {
                base_name: base_name(&entry.relative_path).to_string(),
                relative_path: entry.relative_path.clone(),
                entry,
            }),
            AssetRole::Unrecognized => {
                info!("[ingest] ignoring '{}': not an atlas, skeleton or image", entry.relative_path);
                bundle.unrecognized.push(entry);
            }
        }
    }
    bundle
}

impl ClassifiedBundle {
    fn set_skeleton(&mut self, entry: DroppedEntry, format: SkeletonFormat) {
        if let Some((previous, _)) = self.skeleton.replace((entry, format)) {
            self.record_conflict(BundleRole::Skeleton, previous);
        }
    }

    fn record_conflict(&mut self, role: BundleRole, replaced: DroppedEntry) {
        let kept = match role {
            BundleRole::Atlas => self.atlas.as_ref().map(|entry| entry.relative_path.clone()),
            BundleRole::Skeleton => self.skeleton.as_ref().map(|(entry, _)| entry.relative_path.clone()),
        }
        .unwrap_or_default();
        warn!(
            "[ingest] multiple {role} files dropped; using '{kept}' and ignoring '{}'",
            replaced.relative_path
        );
        self.conflicts.push(ClassificationConflict {
            role,
            kept,
            replaced: replaced.relative_path.clone(),
        });
        self.superseded.push(replaced);
    }

    pub fn skeleton_format(&self) -> Option<SkeletonFormat> {
        self.skeleton.as_ref().map(|(_, format)| *format)
    }

    /// Number of entries held across every category.
    pub fn entry_count(&self) -> usize {
        usize::from(self.atlas.is_some())
            + usize::from(self.skeleton.is_some())
            + self.images.len()
            + self.unrecognized.len()
            + self.superseded.len()
    }

    pub fn missing_roles(&self) -> Vec<BundleRole> {
        let mut missing = Vec::new();
        if self.atlas.is_none() {
            missing.push(BundleRole::Atlas);
        }
        if self.skeleton.is_none() {
            missing.push(BundleRole::Skeleton);
        }
        missing
    }

    pub fn into_ingestible(self) -> Result<IngestibleBundle, IngestError> {
        let missing = self.missing_roles();
        match (self.atlas, self.skeleton) {
            (Some(atlas), Some((skeleton, format))) => Ok(IngestibleBundle {
                atlas,
                skeleton,
                format,
                images: self.images,
                unrecognized: self.unrecognized.into_iter().map(|entry| entry.relative_path).collect(),
                conflicts: self.conflicts,
            }),
            _ => Err(IngestError::IncompleteBundle { missing }),
        }
    }
}
