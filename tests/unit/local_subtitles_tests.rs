/*!
 * Tests for the local subtitle record
 */

use anyhow::Result;
use std::path::PathBuf;
use subfetch::local_subtitles::LocalSubtitles;
use crate::common;

const IDENTIFY_OUTPUT: &str = "\
ID_VIDEO_ID=0
ID_AUDIO_ID=1
ID_SUBTITLE_ID=0
ID_SID_0_LANG=eng
ID_SUBTITLE_ID=2
ID_SID_2_LANG=CHS
ID_LENGTH=1420.00
";

/// Embedded Chinese tracks count as usable
#[test]
fn test_from_identify_output_withChineseTrack_shouldBeUsable() {
    let local = LocalSubtitles::from_identify_output(IDENTIFY_OUTPUT);

    assert_eq!(local.embedded_languages, vec!["eng".to_string(), "chs".to_string()]);
    assert!(local.external_files.is_empty());
    assert!(!local.has_vobsub);
    assert!(local.has_usable_text_subtitles());
}

/// A VobSub track alone is not usable text
#[test]
fn test_from_identify_output_withOnlyVobsub_shouldNotBeUsable() {
    let local = LocalSubtitles::from_identify_output("ID_VOBSUB_ID=0\nID_VID_0_LANG=en\n");

    assert!(local.has_vobsub);
    assert!(!local.has_usable_text_subtitles());
}

/// Empty output maps to an empty record
#[test]
fn test_from_identify_output_withNoSubtitles_shouldBeEmpty() {
    let local = LocalSubtitles::from_identify_output("");
    assert_eq!(local, LocalSubtitles::default());
    assert!(!local.has_usable_text_subtitles());
}

/// External files reported by the player count as usable
#[test]
fn test_from_identify_output_withExternalFile_shouldBeUsable() {
    let local = LocalSubtitles::from_identify_output(
        "ID_FILE_SUB_ID=0\nID_FILE_SUB_FILENAME=/m/film.en.srt\n",
    );

    assert_eq!(local.external_files, vec![PathBuf::from("/m/film.en.srt")]);
    assert!(local.has_usable_text_subtitles());
}

/// Sidecar files next to the media are found by stem
#[test]
fn test_scan_sidecars_withSidecar_shouldBeUsable() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let media = common::create_test_file(temp_dir.path(), "movie.avi", b"x")?;
    assert!(!LocalSubtitles::scan_sidecars(&media).has_usable_text_subtitles());

    common::create_test_file(temp_dir.path(), "movie.ass", b"x")?;
    let local = LocalSubtitles::scan_sidecars(&media);

    assert_eq!(local.external_files, vec![temp_dir.path().join("movie.ass")]);
    assert!(local.has_usable_text_subtitles());
    Ok(())
}
