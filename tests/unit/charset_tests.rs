/*!
 * Tests for encoding detection and conversion
 */

use anyhow::Result;
use std::fs;
use subfetch::charset::{
    convert_file_to_utf8, detect, detect_with_mode, guess_and_convert, Charset, DetectionMode, LanguageTag,
};
use crate::common;

/// "你好世界" in GB2312
const GB2312_HELLO: &[u8] = b"\xC4\xE3\xBA\xC3\xCA\xC0\xBD\xE7";

fn repeat(bytes: &[u8], times: usize) -> Vec<u8> {
    bytes.repeat(times)
}

/// Plain English text is ascii/eng
#[test]
fn test_detect_withAsciiText_shouldReturnAsciiEng() {
    let detection = detect(&common::sample_srt("Hello there"));
    assert_eq!(detection.charset, Charset::Ascii);
    assert_eq!(detection.language, LanguageTag::Eng);
    assert_eq!(detection.bom_len, 0);
}

/// Valid UTF-8 CJK is utf_8/und
#[test]
fn test_detect_withUtf8Chinese_shouldReturnUtf8() {
    let detection = detect("1\n00:00:01,000 --> 00:00:02,000\n中文字幕\n".as_bytes());
    assert_eq!(detection.charset, Charset::Utf8);
    assert_eq!(detection.charset.name(), "utf_8");
    assert_eq!(detection.language, LanguageTag::Und);
}

/// GB2312 level-1 pairs are gb2312/chs
#[test]
fn test_detect_withGb2312Pairs_shouldReturnChs() {
    let detection = detect(&repeat(GB2312_HELLO, 10));
    assert_eq!(detection.charset, Charset::Gb2312);
    assert_eq!(detection.language, LanguageTag::Chs);
}

/// BIG5 pairs with low trail bytes are big5/cht
#[test]
fn test_detect_withBig5LowTrail_shouldReturnCht() {
    // "你" in BIG5 is A7 41
    let detection = detect(&repeat(b"\xA7\x41\xA4\xA4", 20));
    assert_eq!(detection.charset, Charset::Big5);
    assert_eq!(detection.language, LanguageTag::Cht);
}

/// GBK extension pairs that BIG5 cannot explain are gbk/chi
#[test]
fn test_detect_withGbkExtension_shouldReturnChi() {
    let detection = detect(&repeat(b"\x81\x80", 50));
    assert_eq!(detection.charset, Charset::Gbk);
    assert_eq!(detection.language, LanguageTag::Chi);
}

/// A UTF-16LE byte-order mark decides immediately
#[test]
fn test_guess_and_convert_withUtf16LeBom_shouldStripBomAndDecode() {
    let mut bytes = vec![0xFF, 0xFE];
    for unit in "字幕 ok".encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }

    let (detection, converted) = guess_and_convert(&bytes, DetectionMode::Naive);

    assert_eq!(detection.charset.name(), "utf_16_le");
    assert_eq!(detection.bom_len, 2);
    assert_eq!(detection.language, LanguageTag::Und);
    assert_eq!(converted, "字幕 ok".as_bytes());
}

/// A UTF-8 BOM is removed on conversion
#[test]
fn test_guess_and_convert_withUtf8Bom_shouldDropBom() {
    let (detection, converted) = guess_and_convert(b"\xEF\xBB\xBFabc", DetectionMode::Naive);
    assert_eq!(detection.charset, Charset::Utf8);
    assert_eq!(converted, b"abc");
}

/// A few stray bytes stay within tolerance
#[test]
fn test_detect_withSingleStrayByte_shouldStillBeUtf8() {
    let mut bytes = "中文".repeat(100).into_bytes();
    bytes.push(0xFF);
    assert_eq!(detect(&bytes).charset, Charset::Utf8);
}

/// GB2312 content converts to the same text in UTF-8
#[test]
fn test_guess_and_convert_withGb2312_shouldProduceUtf8() {
    let (detection, converted) = guess_and_convert(GB2312_HELLO, DetectionMode::Naive);
    assert_eq!(detection.charset, Charset::Gb2312);
    assert_eq!(String::from_utf8(converted).unwrap(), "你好世界");
}

/// Undecodable input still yields valid UTF-8
#[test]
fn test_guess_and_convert_withGarbage_shouldNeverFail() {
    let garbage: Vec<u8> = (0..600u32).map(|i| (0x80 + (i * 7) % 0x7F) as u8).collect();
    let (_, converted) = guess_and_convert(&garbage, DetectionMode::Naive);
    assert!(String::from_utf8(converted).is_ok());
}

/// Statistical mode uses trail-pair ratios
#[test]
fn test_detect_withStatisticalMode_shouldUsePairRatio() {
    let gb2312 = detect_with_mode(&repeat(GB2312_HELLO, 10), DetectionMode::Statistical);
    assert_eq!(gb2312.charset, Charset::Gb2312);

    let big5 = detect_with_mode(&repeat(b"\xA7\x41", 30), DetectionMode::Statistical);
    assert_eq!(big5.charset, Charset::Big5);

    let mut gbk = repeat(b"\xB0\xA1", 10);
    gbk.extend_from_slice(b"\xAA\x40");
    let gbk = detect_with_mode(&gbk, DetectionMode::Statistical);
    assert_eq!(gbk.charset, Charset::Gbk);
    assert_eq!(gbk.language, LanguageTag::Chi);
}

/// A GB2312 file is rewritten as UTF-8; a UTF-8 file is left alone
#[test]
fn test_convert_file_to_utf8_withMixedFiles_shouldOnlyRewriteLegacy() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let legacy = common::create_test_file(temp_dir.path(), "a.chs.srt", GB2312_HELLO)?;
    let modern = common::create_test_file(temp_dir.path(), "b.srt", "你好".as_bytes())?;

    let legacy_detection = convert_file_to_utf8(&legacy, DetectionMode::Naive)?;
    let modern_detection = convert_file_to_utf8(&modern, DetectionMode::Naive)?;

    assert_eq!(legacy_detection.charset, Charset::Gb2312);
    assert_eq!(fs::read_to_string(&legacy)?, "你好世界");
    assert_eq!(modern_detection.charset, Charset::Utf8);
    assert_eq!(fs::read(&modern)?, "你好".as_bytes());
    Ok(())
}
