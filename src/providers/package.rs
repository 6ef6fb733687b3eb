/*!
 * Decoder for the repository's packaged response.
 *
 * Layout (big-endian, read front to back):
 *
 * ```text
 * i8  package_count
 * per package:
 *     u32 package_length          (ignored)
 *     u32 desc_length, desc bytes (may carry "delay=<ms>")
 *     u32 (ignored), u8 file_count
 *     per file:
 *         u32 (ignored)
 *         u32 ext_length, ext bytes
 *         u32 content_length, content bytes (gzip)
 * ```
 */

use flate2::read::GzDecoder;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Read;

use crate::errors::ProtocolError;
use crate::subtitle_processor::SubtitleCandidate;

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

static DELAY_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"delay\s*=\s*(-?\d+)").expect("delay marker pattern is valid"));

/// Decoded response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageResponse {
    /// Successfully inflated subtitle files, in package order
    pub candidates: Vec<SubtitleCandidate>,
    /// Files dropped because they were not valid gzip
    pub malformed_files: usize,
    /// Number of packages announced by the server
    pub package_count: usize,
}

impl PackageResponse {
    /// No usable subtitle; the caller should retry
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

struct PackageReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PackageReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], ProtocolError> {
        let available = self.buf.len() - self.pos;
        if len > available {
            return Err(ProtocolError::Truncated { field, needed: len, available });
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, ProtocolError> {
        Ok(self.take(1, field)?[0])
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, ProtocolError> {
        let b = self.take(4, field)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    // u32 length prefix followed by that many bytes
    fn block(&mut self, field: &'static str) -> Result<&'a [u8], ProtocolError> {
        let len = self.u32(field)? as usize;
        self.take(len, field)
    }
}

/// Parse a full response body.
///
/// A truncated body fails the whole parse; a single non-gzip file is dropped
/// and counted in `malformed_files`.
pub fn parse_package(body: &[u8]) -> Result<PackageResponse, ProtocolError> {
    let mut reader = PackageReader::new(body);
    let package_count = (reader.u8("package_count")? as i8).max(0) as usize;
    let mut response = PackageResponse { package_count, ..Default::default() };

    for package in 0..package_count {
        let _package_length = reader.u32("package_length")?;
        let description = String::from_utf8_lossy(reader.block("description")?);
        let delay_ms = parse_delay(&description);
        if !description.is_empty() {
            debug!("Package {} description: {}", package, description);
        }

        let _ = reader.u32("file_header")?;
        let file_count = reader.u8("file_count")?;

        for file in 0..file_count {
            let _ = reader.u32("file_length")?;
            let extension = String::from_utf8_lossy(reader.block("extension")?).trim().to_string();
            let content = reader.block("content")?;

            match inflate(content) {
                Some(inflated) => {
                    response.candidates.push(SubtitleCandidate::new(extension, delay_ms, inflated));
                }
                None => {
                    warn!("Dropping malformed file {} of package {} (.{})", file, package, extension);
                    response.malformed_files += 1;
                }
            }
        }
    }

    debug!(
        "{} subtitle(s) decoded, {} malformed",
        response.candidates.len(),
        response.malformed_files
    );
    Ok(response)
}

/// Extract the millisecond offset from a package description
pub fn parse_delay(description: &str) -> i64 {
    DELAY_MARKER
        .captures(description)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

fn inflate(content: &[u8]) -> Option<Vec<u8>> {
    if !content.starts_with(&GZIP_MAGIC) {
        return None;
    }
    let mut inflated = Vec::new();
    match GzDecoder::new(content).read_to_end(&mut inflated) {
        Ok(_) => Some(inflated),
        Err(e) => {
            debug!("gzip inflate failed: {}", e);
            None
        }
    }
}
