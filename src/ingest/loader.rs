use super::classify::{ImageEntry, IngestibleBundle, SkeletonFormat};
use super::entry::{DroppedEntry, EntrySource};
use super::error::{FileFailure, IngestError};
use futures::channel::oneshot;
use futures::future::{join3, join_all};
use image::RgbaImage;
use log::{debug, info};
use std::thread;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkeletonPayload {
    Text(String),
    Binary(Vec<u8>),
}

impl SkeletonPayload {
    pub fn len(&self) -> usize {
        match self {
            SkeletonPayload::Text(text) => text.len(),
            SkeletonPayload::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct LoadedImage {
    pub base_name: String,
    pub relative_path: String,
    pub image: RgbaImage,
}

/// Every payload of a bundle, decoded.
pub struct LoadedBundle {
    pub atlas_text: String,
    pub skeleton: SkeletonPayload,
    pub images: Vec<LoadedImage>,
}

/// Starts every read and decode of the bundle on its own worker thread and waits for all of
/// them. Any failure rejects the whole bundle with one error naming each failed file.
pub async fn load_bundle(bundle: &IngestibleBundle) -> Result<LoadedBundle, IngestError> {
    let atlas = load_text(&bundle.atlas);
    let skeleton = load_skeleton(&bundle.skeleton, bundle.format);
    let images = join_all(bundle.images.iter().map(load_image));
    let (atlas, skeleton, images) = join3(atlas, skeleton, images).await;

    let mut failures = Vec::new();
    let atlas = settle(atlas, &mut failures);
    let skeleton = settle(skeleton, &mut failures);
    let images: Vec<LoadedImage> = images.into_iter().filter_map(|image| settle(image, &mut failures)).collect();

    match (atlas, skeleton) {
        (Some(atlas_text), Some(skeleton)) if failures.is_empty() => {
            info!(
                "[ingest] decoded atlas '{}' ({} bytes), {} skeleton '{}' ({} bytes) and {} image(s)",
                bundle.atlas.relative_path,
                atlas_text.len(),
                bundle.format.label(),
                bundle.skeleton.relative_path,
                skeleton.len(),
                images.len()
            );
            Ok(LoadedBundle { atlas_text, skeleton, images })
        }
        _ => Err(IngestError::DecodeFailure { failures }),
    }
}

fn settle<T>(result: Result<T, FileFailure>, failures: &mut Vec<FileFailure>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(failure) => {
            failures.push(failure);
            None
        }
    }
}

/// Runs `work` on a dedicated thread. The returned future resolves when the thread reports back.
async fn off_thread<T, F>(entry: &DroppedEntry, work: F) -> Result<T, FileFailure>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, String> + Send + 'static,
{
    let (sender, receiver) = oneshot::channel();
    thread::Builder::new()
        .name(format!("ingest:{}", entry.name))
        .spawn(move || {
            let _ = sender.send(work());
        })
        .map_err(|err| failure(entry, format!("could not start a decode thread: {err}")))?;
    match receiver.await {
        Ok(result) => result.map_err(|reason| failure(entry, reason)),
        Err(oneshot::Canceled) => Err(failure(entry, "decode thread stopped before reporting")),
    }
}

fn read(source: &EntrySource) -> Result<Vec<u8>, String> {
    source.read_bytes().map_err(|err| err.to_string())
}

fn failure(entry: &DroppedEntry, reason: impl Into<String>) -> FileFailure {
    FileFailure { relative_path: entry.relative_path.clone(), reason: reason.into() }
}

fn decode_text(bytes: Vec<u8>) -> Result<String, String> {
    let text = String::from_utf8(bytes).map_err(|err| format!("not valid UTF-8: {err}"))?;
    Ok(match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    })
}

async fn load_text(entry: &DroppedEntry) -> Result<String, FileFailure> {
    let source = entry.source.clone();
    off_thread(entry, move || decode_text(read(&source)?)).await
}

async fn load_skeleton(entry: &DroppedEntry, format: SkeletonFormat) -> Result<SkeletonPayload, FileFailure> {
    let source = entry.source.clone();
    off_thread(entry, move || {
        let bytes = read(&source)?;
        match format {
            SkeletonFormat::Text => decode_text(bytes).map(SkeletonPayload::Text),
            SkeletonFormat::Binary => Ok(SkeletonPayload::Binary(bytes)),
        }
    })
    .await
}

async fn load_image(image: &ImageEntry) -> Result<LoadedImage, FileFailure> {
    let source = image.entry.source.clone();
    let base_name = image.base_name.clone();
    let relative_path = image.relative_path.clone();
    off_thread(&image.entry, move || {
        let bytes = read(&source)?;
        let rgba = image::load_from_memory(&bytes).map_err(|err| err.to_string())?.to_rgba8();
        debug!("[ingest] decoded image '{relative_path}' ({}x{})", rgba.width(), rgba.height());
        Ok(LoadedImage { base_name, relative_path, image: rgba })
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::classify::classify;
    use futures::future::join;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;
    use std::sync::{Arc, Barrier};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([255, 0, 0, 255]));
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    fn bundle(entries: Vec<DroppedEntry>) -> IngestibleBundle {
        classify(entries).into_ingestible().unwrap()
    }

    #[test]
    fn loads_every_payload() {
        let bundle = bundle(vec![
            DroppedEntry::from_bytes("hero.atlas", "\u{feff}hero.png\n".as_bytes().to_vec()),
            DroppedEntry::from_bytes("hero.skel", vec![0u8, 1, 2]),
            DroppedEntry::from_bytes("hero.png", png(4, 2)),
        ]);
        let loaded = pollster::block_on(load_bundle(&bundle)).unwrap();
        assert_eq!(loaded.atlas_text, "hero.png\n");
        assert_eq!(loaded.skeleton, SkeletonPayload::Binary(vec![0, 1, 2]));
        assert_eq!(loaded.images.len(), 1);
        assert_eq!(loaded.images[0].image.dimensions(), (4, 2));
    }

    #[test]
    fn every_failed_file_is_reported_once() {
        let bundle = bundle(vec![
            DroppedEntry::from_bytes("hero.atlas", vec![0xFF, 0xFE, 0x00]),
            DroppedEntry::from_bytes("hero.json", "{}".as_bytes().to_vec()),
            DroppedEntry::from_bytes("good.png", png(1, 1)),
            DroppedEntry::from_bytes("broken.png", vec![1, 2, 3]),
        ]);
        let err = pollster::block_on(load_bundle(&bundle)).err().unwrap();
        match err {
            IngestError::DecodeFailure { failures } => {
                let paths: Vec<&str> = failures.iter().map(|failure| failure.relative_path.as_str()).collect();
                assert_eq!(paths, vec!["hero.atlas", "broken.png"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn decodes_leave_the_calling_thread() {
        let entry = DroppedEntry::from_bytes("hero.png", png(1, 1));
        let caller = thread::current().id();
        let worker = pollster::block_on(off_thread(&entry, || Ok(thread::current().id()))).unwrap();
        assert_ne!(worker, caller);
    }

    #[test]
    fn decodes_overlap() {
        // Each job waits for the other, so this only finishes if both run at once.
        let meeting = Arc::new(Barrier::new(2));
        let (left, right) = (Arc::clone(&meeting), Arc::clone(&meeting));
        let entry = DroppedEntry::from_bytes("a.png", png(1, 1));
        let (a, b) = pollster::block_on(join(
            off_thread(&entry, move || Ok(left.wait().is_leader())),
            off_thread(&entry, move || Ok(right.wait().is_leader())),
        ));
        assert_ne!(a.unwrap(), b.unwrap());
    }

    #[test]
    fn worker_errors_name_the_file() {
        let entry = DroppedEntry::from_bytes("skins/broken.png", vec![9, 9]);
        let err = pollster::block_on(off_thread(&entry, || Err::<(), _>("bad header".to_string()))).unwrap_err();
        assert_eq!(err.relative_path, "skins/broken.png");
        assert_eq!(err.reason, "bad header");
    }
}
