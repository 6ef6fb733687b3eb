use log::debug;
use std::path::PathBuf;

use crate::charset::{self, Charset, DetectionMode, LanguageTag};

// @module: Subtitle candidates, encoding normalization and duplicate filtering

/// Default similarity above which two candidates count as duplicates
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.9;

/// One subtitle file received from the repository
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleCandidate {
    // @field: File extension reported by the server (e.g. "srt", "ass")
    pub extension: String,

    // @field: Timing offset from the package description
    pub delay_ms: i64,

    // @field: Inflated bytes; UTF-8 once normalized
    pub content: Vec<u8>,

    // @field: Detected source encoding, set by normalize()
    pub encoding: Option<Charset>,

    // @field: Coarse language tag
    pub language: LanguageTag,

    // @field: Set by the duplicate filter
    pub is_duplicate: bool,

    // @field: Where the candidate was written, if it was
    pub persisted_path: Option<PathBuf>,
}

impl SubtitleCandidate {
    /// Create a candidate from already-inflated content
    pub fn new(extension: impl Into<String>, delay_ms: i64, content: Vec<u8>) -> Self {
        Self {
            extension: extension.into(),
            delay_ms,
            content,
            encoding: None,
            language: LanguageTag::Und,
            is_duplicate: false,
            persisted_path: None,
        }
    }

    /// Detect the content encoding and rewrite the content as UTF-8
    pub fn normalize(&mut self, mode: DetectionMode) {
        let (detection, converted) = charset::guess_and_convert(&self.content, mode);
        debug!(
            "Subtitle .{} looks like {} ({})",
            self.extension, detection.charset, detection.language
        );
        self.encoding = Some(detection.charset);
        self.language = detection.language;
        self.content = converted;
    }
}

/// Normalize every candidate in place
pub fn normalize_all(candidates: &mut [SubtitleCandidate], mode: DetectionMode) {
    for candidate in candidates.iter_mut() {
        candidate.normalize(mode);
    }
}

/// Byte-frequency similarity: twice the multiset intersection over the total
/// length. An upper bound on the true edit-based ratio, computed in O(n).
pub fn quick_ratio(a: &[u8], b: &[u8]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let mut available = [0usize; 256];
    for &byte in a {
        available[byte as usize] += 1;
    }
    let mut matches = 0usize;
    for &byte in b {
        let slot = &mut available[byte as usize];
        if *slot > 0 {
            *slot -= 1;
            matches += 1;
        }
    }
    2.0 * matches as f64 / total as f64
}

/// Marks near-identical candidates as duplicates
#[derive(Debug, Clone, Copy)]
pub struct DuplicateFilter {
    threshold: f64,
}

impl Default for DuplicateFilter {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

impl DuplicateFilter {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Flag later candidates that match an earlier survivor. Earlier
    /// candidates are always kept; already-flagged ones never flag others.
    /// Returns the number of survivors.
    pub fn mark(&self, candidates: &mut [SubtitleCandidate]) -> usize {
        for i in 0..candidates.len() {
            if candidates[i].is_duplicate {
                continue;
            }
            for j in (i + 1)..candidates.len() {
                let (head, tail) = candidates.split_at_mut(j);
                let (keep, other) = (&head[i], &mut tail[0]);
                if other.is_duplicate
                    || keep.extension != other.extension
                    || keep.language != other.language
                {
                    continue;
                }
                let similarity = quick_ratio(&keep.content, &other.content);
                debug!("Similarity of #{} and #{} is {:.3}", i, j, similarity);
                if similarity > self.threshold {
                    other.is_duplicate = true;
                }
            }
        }

        let survivors = candidates.iter().filter(|c| !c.is_duplicate).count();
        debug!("{} subtitle(s) kept after duplicate filtering", survivors);
        survivors
    }
}

/// Non-duplicate, persisted candidates in package order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubtitleBundle {
    subtitles: Vec<SubtitleCandidate>,
}

impl SubtitleBundle {
    /// Keep only candidates that survived deduplication and were written
    pub fn from_candidates(candidates: Vec<SubtitleCandidate>) -> Self {
        let subtitles = candidates
            .into_iter()
            .filter(|c| !c.is_duplicate && c.persisted_path.is_some())
            .collect();
        Self { subtitles }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.subtitles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.subtitles.len()
    }

    pub fn subtitles(&self) -> &[SubtitleCandidate] {
        &self.subtitles
    }

    /// Persisted paths in package order
    pub fn paths(&self) -> Vec<PathBuf> {
        self.subtitles
            .iter()
            .filter_map(|s| s.persisted_path.clone())
            .collect()
    }
}
