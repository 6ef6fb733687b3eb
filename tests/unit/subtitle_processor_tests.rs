/*!
 * Tests for subtitle candidates and the duplicate filter
 */

use subfetch::charset::{Charset, DetectionMode, LanguageTag};
use subfetch::subtitle_processor::{normalize_all, quick_ratio, DuplicateFilter, SubtitleBundle, SubtitleCandidate};
use crate::common;

fn candidate(extension: &str, content: &[u8]) -> SubtitleCandidate {
    SubtitleCandidate::new(extension, 0, content.to_vec())
}

/// Two identical candidates leave one survivor
#[test]
fn test_mark_withIdenticalCandidates_shouldKeepFirst() {
    let srt = common::sample_srt("Same text");
    let mut candidates = vec![candidate("srt", &srt), candidate("srt", &srt)];

    let survivors = DuplicateFilter::default().mark(&mut candidates);

    assert_eq!(survivors, 1);
    assert!(!candidates[0].is_duplicate);
    assert!(candidates[1].is_duplicate);
}

/// Same content with different extensions is kept twice
#[test]
fn test_mark_withDifferentExtensions_shouldKeepBoth() {
    let srt = common::sample_srt("Same text");
    let mut candidates = vec![candidate("srt", &srt), candidate("ass", &srt)];

    assert_eq!(DuplicateFilter::default().mark(&mut candidates), 2);
}

/// Same content with different language tags is kept twice
#[test]
fn test_mark_withDifferentLanguages_shouldKeepBoth() {
    let srt = common::sample_srt("Same text");
    let mut first = candidate("srt", &srt);
    first.language = LanguageTag::Chs;
    let mut second = candidate("srt", &srt);
    second.language = LanguageTag::Cht;
    let mut candidates = vec![first, second];

    assert_eq!(DuplicateFilter::default().mark(&mut candidates), 2);
}

/// Dissimilar content is kept
#[test]
fn test_mark_withDissimilarContent_shouldKeepBoth() {
    let mut candidates = vec![
        candidate("srt", &common::sample_srt("aaaaaaaaaaaaaaaaaaaa")),
        candidate("srt", &common::sample_srt("zzzzzzzzzzzzzzzzzzzz 0123456789")),
    ];

    assert_eq!(DuplicateFilter::default().mark(&mut candidates), 2);
}

/// Several copies collapse to the first; order of survivors is kept
#[test]
fn test_mark_withInterleavedCopies_shouldPreserveOrder() {
    let a = common::sample_srt("First subtitle");
    let b = b"totally different content #################".to_vec();
    let mut candidates = vec![
        candidate("srt", &a),
        candidate("srt", &b),
        candidate("srt", &a),
        candidate("srt", &b),
    ];

    DuplicateFilter::default().mark(&mut candidates);

    let flags: Vec<bool> = candidates.iter().map(|c| c.is_duplicate).collect();
    assert_eq!(flags, vec![false, false, true, true]);
}

/// The threshold is strict: a ratio equal to it does not mark
#[test]
fn test_mark_withRatioAtThreshold_shouldNotMark() {
    let a = b"aaaaaaaaaa".to_vec();
    let b = b"aaaaaaaaab".to_vec();
    let ratio = quick_ratio(&a, &b);
    let mut candidates = vec![candidate("srt", &a), candidate("srt", &b)];

    assert_eq!(DuplicateFilter::new(ratio).mark(&mut candidates), 2);
    assert!(ratio > 0.85);
    assert_eq!(DuplicateFilter::new(0.85).mark(&mut candidates), 1);
}

/// Normalization sets encoding and language from the content
#[test]
fn test_normalize_all_withGb2312Content_shouldConvertAndTag() {
    let mut candidates = vec![
        candidate("srt", b"\xC4\xE3\xBA\xC3\xCA\xC0\xBD\xE7"),
        candidate("srt", b"plain english"),
    ];

    normalize_all(&mut candidates, DetectionMode::Naive);

    assert_eq!(candidates[0].encoding, Some(Charset::Gb2312));
    assert_eq!(candidates[0].language, LanguageTag::Chs);
    assert_eq!(candidates[0].content, "你好世界".as_bytes());
    assert_eq!(candidates[1].language, LanguageTag::Eng);
}

/// Bundles only carry persisted survivors
#[test]
fn test_bundle_withMixedCandidates_shouldKeepPersistedSurvivors() {
    let mut written = candidate("srt", b"one");
    written.persisted_path = Some("/tmp/a.srt".into());
    let unwritten = candidate("srt", b"two");
    let mut duplicate = candidate("srt", b"three");
    duplicate.is_duplicate = true;
    duplicate.persisted_path = Some("/tmp/b.srt".into());

    let bundle = SubtitleBundle::from_candidates(vec![written, unwritten, duplicate]);

    assert_eq!(bundle.len(), 1);
    assert_eq!(bundle.paths(), vec![std::path::PathBuf::from("/tmp/a.srt")]);
}

/// The dropped count is the input size minus the survivors returned
#[test]
fn test_mark_withOneCopyAmongThree_shouldDropOne() {
    let srt = common::sample_srt("Same text");
    let other = common::sample_srt("Completely different words here");
    let mut candidates = vec![candidate("srt", &srt), candidate("srt", &other), candidate("srt", &srt)];

    let survivors = DuplicateFilter::default().mark(&mut candidates);

    assert_eq!(survivors, 2);
    assert_eq!(candidates.len() - survivors, 1);
    assert_eq!(candidates.iter().filter(|c| c.is_duplicate).count(), 1);
}
