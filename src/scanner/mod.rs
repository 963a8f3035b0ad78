pub mod metadata;

use crate::SUPPORTED_EXTENSIONS;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// An audio file found on disk. Built per analysis run and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFileDescriptor {
    pub path: PathBuf,
    /// File name with extension, e.g. `SFX_Mecha_Attack_01.wav`.
    pub filename: String,
    /// File name without extension, e.g. `SFX_Mecha_Attack_01`.
    pub basename: String,
}

impl AudioFileDescriptor {
    pub fn from_path(path: &Path) -> Self {
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let basename = path
            .file_stem()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            path,
            filename,
            basename,
        }
    }
}

/// True if the path has one of the recognised audio extensions, ignoring case.
pub fn is_audio_file(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    SUPPORTED_EXTENSIONS.contains(&ext.as_str())
}

/// Walk `dir` recursively and yield every audio file in discovery order.
///
/// Entries that cannot be read are skipped. Directory contents are visited
/// sorted by file name so repeated runs see the same order.
pub fn collect_audio_files(dir: &Path) -> impl Iterator<Item = AudioFileDescriptor> {
    WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file() && is_audio_file(entry.path()))
        .map(|entry| AudioFileDescriptor::from_path(entry.path()))
}
