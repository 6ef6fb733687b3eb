/*!
 * Best-effort encoding detection for subtitle text.
 *
 * Subtitles from the repository carry no charset label. The detector checks
 * for a byte-order mark, then samples the multi-byte part of the buffer and
 * scores it against published byte-range tables for UTF-8, GB2312/GBK and
 * BIG5. The first encoding that explains all but a small fraction of the
 * sample wins. Detection never fails: the worst case is `ascii`/`eng` with a
 * lossy UTF-8 repair of the content.
 */

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::Path;

/// Byte encodings the detector can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Charset {
    Utf8,
    Utf16Be,
    Utf16Le,
    Utf32Be,
    Utf32Le,
    Gb2312,
    Gbk,
    Big5,
    Ascii,
}

impl Charset {
    // @returns: Codec name as used in logs and CLI output
    pub fn name(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf_8",
            Self::Utf16Be => "utf_16_be",
            Self::Utf16Le => "utf_16_le",
            Self::Utf32Be => "utf_32_be",
            Self::Utf32Le => "utf_32_le",
            Self::Gb2312 => "gb2312",
            Self::Gbk => "gbk",
            Self::Big5 => "big5",
            Self::Ascii => "ascii",
        }
    }

    /// True when content in this encoding is already valid UTF-8
    pub fn is_utf8_compatible(&self) -> bool {
        matches!(self, Self::Utf8 | Self::Ascii)
    }
}

impl std::fmt::Display for Charset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Coarse language tag derived from the encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LanguageTag {
    /// Undetermined
    #[default]
    Und,
    /// Simplified Chinese
    Chs,
    /// Traditional Chinese
    Cht,
    /// Chinese, script unknown
    Chi,
    /// English
    Eng,
}

impl LanguageTag {
    // @returns: Tag as used in file names
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Und => "und",
            Self::Chs => "chs",
            Self::Cht => "cht",
            Self::Chi => "chi",
            Self::Eng => "eng",
        }
    }
}

impl std::fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How GB2312/GBK/BIG5 are told apart once UTF-8 is ruled out
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMode {
    /// Fixed priority GB2312 > BIG5 > GBK by unmatched-byte count
    #[default]
    Naive,
    /// Ratio of low-trail to high-trail byte pairs
    Statistical,
}

/// Result of classifying a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub charset: Charset,
    pub language: LanguageTag,
    /// Length of the byte-order mark, zero if none
    pub bom_len: usize,
}

/// Maximum number of sample bytes scored
pub const SAMPLE_LIMIT: usize = 2048;

/// Fraction of sample bytes allowed to stay unexplained
pub const UNMATCHED_TOLERANCE: f64 = 0.005;

/// Statistical mode: low/high trail ratio below which GBK beats BIG5
pub const GBK_TRAIL_RATIO: f64 = 0.25;

// Inclusive byte ranges; one set per byte position of a code point.
type ByteSet = &'static [(u8, u8)];
type CodePoint = &'static [ByteSet];

const BOMS: &[(&[u8], Charset)] = &[
    (b"\x00\x00\xFE\xFF", Charset::Utf32Be),
    (b"\xFF\xFE\x00\x00", Charset::Utf32Le),
    (b"\xFE\xFF", Charset::Utf16Be),
    (b"\xFF\xFE", Charset::Utf16Le),
    (b"\xEF\xBB\xBF", Charset::Utf8),
];

const ASCII: ByteSet = &[(0x09, 0x0A), (0x0D, 0x0D), (0x20, 0x7E)];
const CONT: ByteSet = &[(0x80, 0xBF)];
const GBK_LOW_TRAIL: ByteSet = &[(0x40, 0x7E), (0x80, 0xA0)];
const BIG5_TRAIL: ByteSet = &[(0x40, 0x7E), (0xA1, 0xFE)];

// http://www.w3.org/International/questions/qa-forms-utf-8
const UTF8: &[CodePoint] = &[
    &[&[(0xC2, 0xDF)], CONT],
    &[&[(0xE0, 0xE0)], &[(0xA0, 0xBF)], CONT],
    &[&[(0xE1, 0xEC), (0xEE, 0xEF)], CONT, CONT],
    &[&[(0xED, 0xED)], &[(0x80, 0x9F)], CONT],
    &[&[(0xF0, 0xF0)], &[(0x90, 0xBF)], CONT, CONT],
    &[&[(0xF1, 0xF3)], CONT, CONT, CONT],
    &[&[(0xF4, 0xF4)], &[(0x80, 0x8F)], CONT, CONT],
];

// GBK levels 1 and 2 are exactly GB2312.
const GBK: &[CodePoint] = &[
    &[&[(0xA1, 0xA9)], &[(0xA1, 0xFE)]],
    &[&[(0xB0, 0xF7)], &[(0xA1, 0xFE)]],
    &[&[(0x81, 0xA0)], &[(0x40, 0x7E), (0x80, 0xFE)]],
    &[&[(0xAA, 0xFE)], GBK_LOW_TRAIL],
    &[&[(0xA8, 0xA9)], GBK_LOW_TRAIL],
    // user-defined areas
    &[&[(0xAA, 0xAF)], &[(0xA1, 0xFE)]],
    &[&[(0xF8, 0xFE)], &[(0xA1, 0xFE)]],
    &[&[(0xA1, 0xA7)], GBK_LOW_TRAIL],
];

const GB2312: &[CodePoint] = &[
    &[&[(0xA1, 0xA9)], &[(0xA1, 0xFE)]],
    &[&[(0xB0, 0xF7)], &[(0xA1, 0xFE)]],
];

const BIG5: &[CodePoint] = &[
    // frequently used characters
    &[&[(0xA4, 0xC5)], BIG5_TRAIL],
    &[&[(0xC6, 0xC6)], &[(0x40, 0x7E)]],
    &[&[(0xC6, 0xC6)], &[(0xA1, 0xFE)]],
    &[&[(0xC7, 0xC8)], BIG5_TRAIL],
    // less frequently used characters
    &[&[(0xC9, 0xF8)], BIG5_TRAIL],
    &[&[(0xF9, 0xF9)], &[(0x40, 0x7E), (0xA1, 0xD5)]],
    &[&[(0xF9, 0xF9)], &[(0xD6, 0xFE)]],
    // symbols
    &[&[(0xA1, 0xA2)], BIG5_TRAIL],
    &[&[(0xA3, 0xA3)], &[(0x40, 0x7E), (0xA1, 0xBF)]],
    &[&[(0xA3, 0xA3)], &[(0xC0, 0xFE)]],
    // user-defined areas
    &[&[(0xFA, 0xFE)], BIG5_TRAIL],
    &[&[(0x8E, 0xA0)], BIG5_TRAIL],
    &[&[(0x81, 0x8D)], BIG5_TRAIL],
];

fn in_set(set: ByteSet, byte: u8) -> bool {
    set.iter().any(|&(lo, hi)| (lo..=hi).contains(&byte))
}

fn is_ascii_text(byte: u8) -> bool {
    in_set(ASCII, byte)
}

fn code_points(charset: Charset) -> &'static [CodePoint] {
    match charset {
        Charset::Utf8 => UTF8,
        Charset::Gb2312 => GB2312,
        Charset::Gbk => GBK,
        Charset::Big5 => BIG5,
        _ => &[],
    }
}

// Length of the code point starting at `bytes[0]`, trying ASCII first.
fn match_at(bytes: &[u8], table: &[CodePoint]) -> Option<usize> {
    if is_ascii_text(bytes[0]) {
        return Some(1);
    }
    table
        .iter()
        .find(|cp| {
            cp.len() <= bytes.len()
                && cp.iter().zip(bytes).all(|(set, &b)| in_set(set, b))
        })
        .map(|cp| cp.len())
}

/// Byte counts from interpreting a sample with one encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interpretation {
    /// Bytes matched as standalone ASCII
    pub ascii: usize,
    /// Bytes matched as multi-byte code points
    pub multibyte: usize,
    /// Bytes no class explained
    pub unmatched: usize,
}

/// Scan `sample` left to right with `charset`'s code-point table
pub fn interpret(sample: &[u8], charset: Charset) -> Interpretation {
    let table = code_points(charset);
    let mut result = Interpretation::default();
    let mut i = 0;
    while i < sample.len() {
        match match_at(&sample[i..], table) {
            Some(1) if is_ascii_text(sample[i]) => {
                result.ascii += 1;
                i += 1;
            }
            Some(n) => {
                result.multibyte += n;
                i += n;
            }
            None => {
                result.unmatched += 1;
                i += 1;
            }
        }
    }
    result
}

/// Drop ASCII text bytes that are not the trail byte of a multi-byte
/// sequence and keep at most `SAMPLE_LIMIT` of what remains
pub fn sample(stream: &[u8]) -> Vec<u8> {
    stream
        .iter()
        .enumerate()
        .filter(|&(i, &b)| {
            !is_ascii_text(b) || (i > 0 && (0x80..=0xFE).contains(&stream[i - 1]))
        })
        .map(|(_, &b)| b)
        .take(SAMPLE_LIMIT)
        .collect()
}

fn passes(sample: &[u8], charset: Charset, threshold: usize) -> bool {
    let result = interpret(sample, charset);
    debug!("{} leaves {} of {} sample byte(s) unmatched", charset, result.unmatched, sample.len());
    result.unmatched <= threshold
}

// Non-overlapping count of lead 0xA1-0xFE followed by a trail in `trail`.
fn count_pairs(sample: &[u8], trail: (u8, u8)) -> usize {
    let mut count = 0;
    let mut i = 0;
    while i + 1 < sample.len() {
        if (0xA1..=0xFE).contains(&sample[i]) && (trail.0..=trail.1).contains(&sample[i + 1]) {
            count += 1;
            i += 2;
        } else {
            i += 1;
        }
    }
    count
}

/// Classify a buffer with the default naive priority
pub fn detect(stream: &[u8]) -> Detection {
    detect_with_mode(stream, DetectionMode::Naive)
}

/// Classify a buffer
pub fn detect_with_mode(stream: &[u8], mode: DetectionMode) -> Detection {
    for &(signature, charset) in BOMS {
        if stream.starts_with(signature) {
            return Detection { charset, language: LanguageTag::Und, bom_len: signature.len() };
        }
    }

    let guess = |charset, language| Detection { charset, language, bom_len: 0 };

    let sample = sample(stream);
    if !sample.iter().any(|&b| b >= 0x80) {
        return guess(Charset::Ascii, LanguageTag::Eng);
    }

    let threshold = (sample.len() as f64 * UNMATCHED_TOLERANCE) as usize;
    if passes(&sample, Charset::Utf8, threshold) {
        return guess(Charset::Utf8, LanguageTag::Und);
    }

    match mode {
        DetectionMode::Naive => {
            // Traditional Chinese subtitles are far more often BIG5 than GBK,
            // so BIG5 is tried before the full GBK table.
            for (charset, language) in [
                (Charset::Gb2312, LanguageTag::Chs),
                (Charset::Big5, LanguageTag::Cht),
                (Charset::Gbk, LanguageTag::Chi),
            ] {
                if passes(&sample, charset, threshold) {
                    return guess(charset, language);
                }
            }
            guess(Charset::Ascii, LanguageTag::Eng)
        }
        DetectionMode::Statistical => {
            let low = count_pairs(&sample, (0x40, 0x7E));
            let high = count_pairs(&sample, (0xA1, 0xFE));
            debug!("Trail byte pairs: {} low, {} high", low, high);
            if low == 0 {
                guess(Charset::Gb2312, LanguageTag::Chs)
            } else if high > 0 && (low as f64) / (high as f64) < GBK_TRAIL_RATIO {
                guess(Charset::Gbk, LanguageTag::Chi)
            } else {
                guess(Charset::Big5, LanguageTag::Cht)
            }
        }
    }
}

fn decode_utf32(bytes: &[u8], big_endian: bool) -> String {
    bytes
        .chunks(4)
        .map(|chunk| {
            if chunk.len() < 4 {
                return char::REPLACEMENT_CHARACTER;
            }
            let word = [chunk[0], chunk[1], chunk[2], chunk[3]];
            let value = if big_endian { u32::from_be_bytes(word) } else { u32::from_le_bytes(word) };
            char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER)
        })
        .collect()
}

/// Decode `body` (BOM already removed) from `charset` into UTF-8 bytes.
/// Malformed sequences become U+FFFD.
pub fn to_utf8(body: &[u8], charset: Charset) -> Vec<u8> {
    let decoded: Cow<'_, str> = match charset {
        Charset::Utf8 | Charset::Ascii => String::from_utf8_lossy(body),
        Charset::Utf16Be => encoding_rs::UTF_16BE.decode_without_bom_handling(body).0,
        Charset::Utf16Le => encoding_rs::UTF_16LE.decode_without_bom_handling(body).0,
        Charset::Utf32Be => Cow::Owned(decode_utf32(body, true)),
        Charset::Utf32Le => Cow::Owned(decode_utf32(body, false)),
        Charset::Gb2312 | Charset::Gbk => encoding_rs::GBK.decode_without_bom_handling(body).0,
        Charset::Big5 => encoding_rs::BIG5.decode_without_bom_handling(body).0,
    };
    match decoded {
        // Borrowed means the input was already valid UTF-8.
        Cow::Borrowed(_) => body.to_vec(),
        Cow::Owned(text) => text.into_bytes(),
    }
}

/// Detect the encoding of `stream` and return it re-encoded as UTF-8
pub fn guess_and_convert(stream: &[u8], mode: DetectionMode) -> (Detection, Vec<u8>) {
    let detection = detect_with_mode(stream, mode);
    let body = &stream[detection.bom_len..];
    (detection, to_utf8(body, detection.charset))
}

/// Rewrite a local subtitle file as UTF-8 when it is in another encoding.
/// Returns the detection so callers can report it.
pub fn convert_file_to_utf8<P: AsRef<Path>>(path: P, mode: DetectionMode) -> std::io::Result<Detection> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let (detection, converted) = guess_and_convert(&bytes, mode);
    if detection.charset.is_utf8_compatible() && detection.bom_len == 0 {
        return Ok(detection);
    }
    if converted.is_empty() && !bytes.is_empty() {
        warn!("Conversion of {:?} produced no text, leaving it untouched", path);
        return Ok(detection);
    }
    std::fs::write(path, &converted)?;
    debug!("Converted {:?} from {} to UTF-8", path, detection.charset);
    Ok(detection)
}
