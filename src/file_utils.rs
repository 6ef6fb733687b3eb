use anyhow::{Context, Result};
use log::{debug, error, info};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use crate::charset::LanguageTag;
use crate::errors::PersistError;
use crate::subtitle_processor::SubtitleCandidate;

// @module: File and directory utilities

/// Extensions treated as playable media when walking directories
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "mpg", "mpeg", "ogv", "ts", "mts",
    "m2ts", "rm", "rmvb",
];

/// Extensions of text subtitles a player can load next to the media
pub const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "ass", "ssa", "sub", "smi", "txt", "idx"];

/// Upper bound on `-N` markers tried for one target name
pub const MAX_COLLISION_MARKERS: u32 = 999;

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_file()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    // @checks: Extension in the given list, case-insensitively
    pub fn has_extension<P: AsRef<Path>>(path: P, extensions: &[&str]) -> bool {
        path.as_ref()
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| extensions.contains(&ext.as_str()))
    }

    /// True for files with a known video extension
    pub fn is_video_file<P: AsRef<Path>>(path: P) -> bool {
        let path = path.as_ref();
        path.is_file() && Self::has_extension(path, VIDEO_EXTENSIONS)
    }

    /// Expand inputs into media files: files are kept as given, directories
    /// are walked for video files in sorted order
    pub fn collect_media_files<P: AsRef<Path>>(inputs: &[P]) -> Result<Vec<PathBuf>> {
        let mut result = Vec::new();
        for input in inputs {
            let input = input.as_ref();
            if input.is_file() {
                result.push(input.to_path_buf());
            } else if input.is_dir() {
                let mut found = Vec::new();
                for entry in WalkDir::new(input).follow_links(true) {
                    let entry = entry.context("Failed to read directory entry")?;
                    if Self::is_video_file(entry.path()) {
                        found.push(entry.into_path());
                    }
                }
                found.sort();
                result.extend(found);
            } else {
                return Err(anyhow::anyhow!("Input path does not exist: {:?}", input));
            }
        }
        Ok(result)
    }

    /// Text subtitles next to `media` that share its file stem
    pub fn find_sidecar_subtitles<P: AsRef<Path>>(media: P) -> Vec<PathBuf> {
        let media = media.as_ref();
        let (Some(dir), Some(stem)) = (media.parent(), media.file_stem()) else {
            return Vec::new();
        };
        let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };
        let stem = stem.to_string_lossy().to_string();

        let Ok(entries) = fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut sidecars: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && Self::has_extension(p, SUBTITLE_EXTENSIONS))
            .filter(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().starts_with(&stem))
                    .unwrap_or(false)
            })
            .collect();
        sidecars.sort();
        sidecars
    }
}

/// Writes subtitles next to the media file (or into an override directory)
/// without ever replacing an existing file
#[derive(Debug, Clone)]
pub struct SubtitleWriter {
    // @field: Directory override; the media file's directory when None
    save_dir: Option<PathBuf>,
}

impl SubtitleWriter {
    pub fn new(save_dir: Option<PathBuf>) -> Self {
        Self { save_dir }
    }

    /// `<dir>/<media stem>`, the prefix every subtitle name starts with
    pub fn base_path(&self, media: &Path) -> PathBuf {
        let stem = media.file_stem().unwrap_or_default();
        let dir = match &self.save_dir {
            Some(dir) => dir.clone(),
            None => media.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        dir.join(stem)
    }

    /// Name before collision handling: `<base>.<tag|position>.<ext>`
    pub fn target_path(&self, media: &Path, language: LanguageTag, position: usize, extension: &str) -> PathBuf {
        let suffix = match language {
            LanguageTag::Und => position.to_string(),
            tag => tag.as_str().to_string(),
        };
        with_suffix(&self.base_path(media), &format!(".{}", suffix), &sanitize_extension(extension))
    }

    /// Write every non-duplicate candidate, setting `persisted_path` on the
    /// ones that were written. Failures are logged per candidate.
    /// Returns the number of files written.
    pub fn persist(&self, media: &Path, candidates: &mut [SubtitleCandidate]) -> usize {
        self.persist_until(media, candidates, &CancellationToken::new()).unwrap_or(0)
    }

    /// Like `persist`, but checks `cancel` before every write. Once it fires,
    /// the files written by this call are removed again and None is returned.
    pub fn persist_until(
        &self,
        media: &Path,
        candidates: &mut [SubtitleCandidate],
        cancel: &CancellationToken,
    ) -> Option<usize> {
        if let Some(dir) = &self.save_dir {
            if let Err(e) = FileManager::ensure_dir(dir) {
                error!("{:#}", e);
            }
        }

        let mut written = 0;
        let survivors = candidates.iter_mut().filter(|c| !c.is_duplicate);
        for (position, candidate) in survivors.enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            let target = self.target_path(media, candidate.language, position, &candidate.extension);
            match write_new(&target, &candidate.content) {
                Ok(path) => {
                    info!("Saved the subtitle as {:?}", path);
                    candidate.persisted_path = Some(path);
                    written += 1;
                }
                Err(e) => error!("{}", e),
            }
        }

        if cancel.is_cancelled() {
            roll_back(candidates);
            return None;
        }
        Some(written)
    }
}

// Removes every file recorded in `persisted_path` and clears the field.
fn roll_back(candidates: &mut [SubtitleCandidate]) {
    for candidate in candidates.iter_mut() {
        if let Some(path) = candidate.persisted_path.take() {
            match fs::remove_file(&path) {
                Ok(()) => debug!("Removed {:?} after cancellation", path),
                Err(e) => error!("Failed to remove {:?} after cancellation: {}", path, e),
            }
        }
    }
}

/// Leading dots and path separators removed; `srt` when nothing is left
pub fn sanitize_extension(extension: &str) -> String {
    let cleaned: String = extension
        .trim()
        .trim_start_matches('.')
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '\0'))
        .collect();
    if cleaned.is_empty() { "srt".to_string() } else { cleaned.to_lowercase() }
}

fn with_suffix(base: &Path, suffix: &str, extension: &str) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(suffix);
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

// Inserts "-N" before the extension.
fn with_marker(target: &Path, marker: u32) -> PathBuf {
    let stem = target.file_stem().unwrap_or_default().to_string_lossy();
    let name = match target.extension() {
        Some(ext) => format!("{}-{}.{}", stem, marker, ext.to_string_lossy()),
        None => format!("{}-{}", stem, marker),
    };
    target.with_file_name(name)
}

/// Create `target`, or the first free `-N` variant of it, and write `content`
pub fn write_new(target: &Path, content: &[u8]) -> Result<PathBuf, PersistError> {
    create_and_fill(target, |file| file.write_all(content))
}

// A file whose fill fails is removed so no partial subtitle keeps the name.
fn create_and_fill<F>(target: &Path, mut fill: F) -> Result<PathBuf, PersistError>
where
    F: FnMut(&mut File) -> std::io::Result<()>,
{
    for marker in 0..=MAX_COLLISION_MARKERS {
        let path = if marker == 0 { target.to_path_buf() } else { with_marker(target, marker) };
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                if let Err(source) = fill(&mut file) {
                    drop(file);
                    if let Err(e) = fs::remove_file(&path) {
                        error!("Failed to remove partial file {:?}: {}", path, e);
                    }
                    return Err(PersistError::Io { path, source });
                }
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!("{:?} already exists, trying another name", path);
            }
            Err(source) => return Err(PersistError::Io { path, source }),
        }
    }
    Err(PersistError::NoFreeName { base: target.to_path_buf() })
}
