/*!
 * Content fingerprint for media files.
 *
 * The key is four MD5 digests over 4 KiB windows of the file, joined with
 * `;`. The window order is part of the remote lookup scheme and must not
 * change.
 */

use md5::{Digest, Md5};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::errors::FingerprintError;

/// Size of each hashed window
pub const WINDOW_SIZE: u64 = 4096;

/// Files up to this size get the degenerate fingerprint
pub const MIN_HASHABLE_SIZE: u64 = 8192;

/// Fingerprint of a media file as understood by the subtitle repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFingerprint {
    /// Path the fingerprint was computed from
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Hex MD5 digests of the four windows, in lookup order
    pub chunk_hashes: [String; 4],
}

impl MediaFingerprint {
    /// Fingerprint a file, reading its size from metadata
    pub fn compute<P: AsRef<Path>>(path: P) -> Result<Self, FingerprintError> {
        let path = path.as_ref();
        let size = std::fs::metadata(path)
            .map_err(|source| FingerprintError { path: path.to_path_buf(), source })?
            .len();
        Self::compute_with_size(path, size)
    }

    /// Fingerprint a file whose size is already known
    pub fn compute_with_size<P: AsRef<Path>>(path: P, size: u64) -> Result<Self, FingerprintError> {
        let path = path.as_ref();
        if size <= MIN_HASHABLE_SIZE {
            return Ok(Self::degenerate(path, size));
        }

        let wrap = |source| FingerprintError { path: path.to_path_buf(), source };
        let mut file = File::open(path).map_err(wrap)?;
        let mut window = vec![0u8; WINDOW_SIZE as usize];
        let mut chunk_hashes: [String; 4] = Default::default();

        for (slot, offset) in chunk_hashes.iter_mut().zip(window_offsets(size)) {
            file.seek(SeekFrom::Start(offset)).map_err(wrap)?;
            let filled = read_window(&mut file, &mut window).map_err(wrap)?;
            *slot = format!("{:x}", Md5::digest(&window[..filled]));
        }

        Ok(Self { path: path.to_path_buf(), size, chunk_hashes })
    }

    /// The fixed fingerprint used for files too small to sample
    pub fn degenerate<P: AsRef<Path>>(path: P, size: u64) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            size,
            chunk_hashes: Default::default(),
        }
    }

    /// True when the file was too small to sample
    pub fn is_degenerate(&self) -> bool {
        self.chunk_hashes.iter().all(String::is_empty)
    }

    /// The lookup key sent as `filehash`
    pub fn key(&self) -> String {
        self.chunk_hashes.join(";")
    }
}

impl std::fmt::Display for MediaFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Window offsets in lookup order
pub fn window_offsets(size: u64) -> [u64; 4] {
    [4096, size * 2 / 3, size / 3, size - 8192]
}

// Reads until the window is full or the file ends.
fn read_window(file: &mut File, window: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < window.len() {
        match file.read(&mut window[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
