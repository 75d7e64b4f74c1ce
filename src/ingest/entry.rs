use super::error::IngestError;
use image::ImageFormat;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where the bytes of a dropped file live.
#[derive(Debug, Clone)]
pub enum EntrySource {
    File(PathBuf),
    Memory(Arc<[u8]>),
}

impl EntrySource {
    /// Blocking read; the loader calls this from a worker thread.
    pub fn read_bytes(&self) -> io::Result<Vec<u8>> {
        match self {
            EntrySource::File(path) => fs::read(path),
            EntrySource::Memory(bytes) => Ok(bytes.to_vec()),
        }
    }
}

/// A leaf file from a drop, after directory expansion.
#[derive(Debug, Clone)]
pub struct DroppedEntry {
    pub name: String,
    pub relative_path: String,
    pub mime: Option<&'static str>,
    pub source: EntrySource,
}

impl DroppedEntry {
    pub fn from_path(path: impl Into<PathBuf>, relative_path: impl Into<String>) -> Self {
        Self::new(relative_path.into(), EntrySource::File(path.into()))
    }

    pub fn from_bytes(relative_path: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::new(relative_path.into(), EntrySource::Memory(bytes.into()))
    }

    fn new(relative_path: String, source: EntrySource) -> Self {
        let relative_path = normalize_relative_path(&relative_path);
        let name = base_name(&relative_path).to_string();
        let mime = ImageFormat::from_path(&name).ok().map(|format| format.to_mime_type());
        Self { name, relative_path, mime, source }
    }

    /// Lower-cased extension of the base name, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name).extension().and_then(|ext| ext.to_str()).map(|ext| ext.to_ascii_lowercase())
    }

    pub fn is_image(&self) -> bool {
        self.mime.is_some_and(|mime| mime.starts_with("image/"))
    }

    pub fn file_stem(&self) -> &str {
        match self.name.rfind('.') {
            Some(dot) if dot > 0 => &self.name[..dot],
            _ => &self.name,
        }
    }
}

/// Strips every directory segment, accepting both separator styles.
pub fn base_name(path: &str) -> &str {
    path.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(path)
}

pub fn normalize_relative_path(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let mut trimmed = unified.as_str();
    while let Some(rest) = trimmed.strip_prefix("./") {
        trimmed = rest;
    }
    trimmed.trim_start_matches('/').to_string()
}

/// Expands dropped paths into leaf entries. Directories are walked recursively and every
/// traversed directory name becomes a segment of the entry's relative path.
pub fn expand_paths<I, P>(paths: I) -> Result<Vec<DroppedEntry>, IngestError>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut entries = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let name = display_name(path);
        if path.is_dir() {
            expand_dir(path, &name, &mut entries)?;
        } else {
            entries.push(DroppedEntry::from_path(path, name));
        }
    }
    Ok(entries)
}

fn expand_dir(dir: &Path, prefix: &str, out: &mut Vec<DroppedEntry>) -> Result<(), IngestError> {
    let expansion_error = |source| IngestError::Expansion { path: dir.to_path_buf(), source };
    let mut children = fs::read_dir(dir)
        .map_err(expansion_error)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<io::Result<Vec<_>>>()
        .map_err(expansion_error)?;
    children.sort();
    for child in children {
        let relative = format!("{prefix}/{}", display_name(&child));
        if child.is_dir() {
            expand_dir(&child, &relative, out)?;
        } else {
            out.push(DroppedEntry::from_path(child, relative));
        }
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
