/*!
 * Common test utilities for the subfetch test suite
 */

use anyhow::Result;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use subfetch::app_config::Config;
use subfetch::player::PlayerControl;

/// Route library logs through env_logger once per test binary
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &[u8]) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Bytes of a fake media file; every window differs from its neighbours
pub fn media_bytes(size: usize) -> Vec<u8> {
    (0..size).map(|i| ((i * 31 + i / 4096) % 251) as u8).collect()
}

/// Creates a fake media file of `size` bytes
pub fn create_media_file(dir: &Path, filename: &str, size: usize) -> Result<PathBuf> {
    create_test_file(dir, filename, &media_bytes(size))
}

/// A short SRT document
pub fn sample_srt(line: &str) -> Vec<u8> {
    format!(
        "1\n00:00:01,000 --> 00:00:04,000\n{line}\n\n2\n00:00:05,000 --> 00:00:09,000\n{line} again\n\n",
        line = line
    )
    .into_bytes()
}

/// Gzip-compress `data`
pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("in-memory gzip write");
    encoder.finish().expect("in-memory gzip finish")
}

/// One file in a test package; `content` is written as given
pub struct PackedFile {
    pub extension: &'static str,
    pub content: Vec<u8>,
}

impl PackedFile {
    /// A file whose content is gzip-compressed
    pub fn gz(extension: &'static str, plain: &[u8]) -> Self {
        Self { extension, content: gzip(plain) }
    }

    /// A file whose content is sent raw
    pub fn raw(extension: &'static str, content: &[u8]) -> Self {
        Self { extension, content: content.to_vec() }
    }
}

/// Encode packages in the repository's response layout
pub fn package_body(packages: &[(&str, Vec<PackedFile>)]) -> Vec<u8> {
    let mut body = vec![packages.len() as u8];
    for (description, files) in packages {
        body.extend_from_slice(&0u32.to_be_bytes());
        body.extend_from_slice(&(description.len() as u32).to_be_bytes());
        body.extend_from_slice(description.as_bytes());
        body.extend_from_slice(&0u32.to_be_bytes());
        body.push(files.len() as u8);
        for file in files {
            body.extend_from_slice(&0u32.to_be_bytes());
            body.extend_from_slice(&(file.extension.len() as u32).to_be_bytes());
            body.extend_from_slice(file.extension.as_bytes());
            body.extend_from_slice(&(file.content.len() as u32).to_be_bytes());
            body.extend_from_slice(&file.content);
        }
    }
    body
}

/// Default config with a zero-second backoff schedule of `attempts` entries
pub fn quick_config(attempts: usize) -> Config {
    let mut config = Config::default();
    config.fetch.backoff_secs = vec![0; attempts];
    config
}

/// Player that records every command it receives
#[derive(Debug, Default, Clone)]
pub struct RecordingPlayer {
    pub loaded: Arc<Mutex<Vec<PathBuf>>>,
    pub selected: Arc<Mutex<Vec<usize>>>,
}

impl RecordingPlayer {
    pub fn loaded(&self) -> Vec<PathBuf> {
        self.loaded.lock().unwrap().clone()
    }

    pub fn selected(&self) -> Vec<usize> {
        self.selected.lock().unwrap().clone()
    }
}

impl PlayerControl for RecordingPlayer {
    fn load_subtitle(&self, path: &Path) {
        self.loaded.lock().unwrap().push(path.to_path_buf());
    }

    fn select_subtitle(&self, index: usize) {
        self.selected.lock().unwrap().push(index);
    }
}

/// Every regular file directly inside `dir`, sorted
pub fn list_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).filter(|p| p.is_file()).collect())
        .unwrap_or_default();
    files.sort();
    files
}

/// "你好世界" in GB2312
pub const GB2312_HELLO: &[u8] = b"\xC4\xE3\xBA\xC3\xCA\xC0\xBD\xE7";

/// An SRT document whose text is GB2312-encoded
pub fn gb2312_srt() -> Vec<u8> {
    let mut srt = b"1\n00:00:01,000 --> 00:00:04,000\n".to_vec();
    srt.extend_from_slice(GB2312_HELLO);
    srt.extend_from_slice(b"\n\n");
    srt
}

/// A response with a Chinese srt, an exact copy of it, an English ass and
/// one uncompressed file
pub fn subtitle_package() -> Vec<u8> {
    package_body(&[
        ("delay=0", vec![PackedFile::gz("srt", &gb2312_srt()), PackedFile::gz("srt", &gb2312_srt())]),
        ("", vec![PackedFile::gz("ass", &sample_srt("Hello")), PackedFile::raw("srt", b"plain")]),
    ])
}

/// Creates a named pipe with no reader attached
#[cfg(unix)]
pub fn create_fifo(dir: &Path, name: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    let c_path = std::ffi::CString::new(path.to_string_lossy().as_bytes())?;
    let status = unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) };
    anyhow::ensure!(status == 0, "mkfifo failed: {}", std::io::Error::last_os_error());
    Ok(path)
}
