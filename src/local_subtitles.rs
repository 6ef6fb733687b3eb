use log::debug;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::file_utils::FileManager;

// @module: Typed record of subtitles already available for a media file

/// Embedded track language codes that count as usable Chinese text
pub const CHINESE_TRACK_LANGUAGES: &[&str] = &["chs", "cht", "chn", "chi", "zh", "zho", "tw", "hk"];

/// Subtitles the player or the filesystem already offers for one item
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalSubtitles {
    // @field: Language codes of embedded text tracks
    pub embedded_languages: Vec<String>,

    // @field: External subtitle files the player found or that sit next to the media
    pub external_files: Vec<PathBuf>,

    // @field: A VobSub (image) track is present
    pub has_vobsub: bool,
}

impl LocalSubtitles {
    /// Map the `ID_*=value` lines of a player identify run into a record
    pub fn from_identify_output(output: &str) -> Self {
        let mut raw: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for line in output.lines() {
            if let Some((key, value)) = line.trim().split_once('=') {
                raw.entry(key).or_default().push(value);
            }
        }
        let values = |key: &str| raw.get(key).cloned().unwrap_or_default();

        let mut local = Self::default();
        for id in values("ID_SUBTITLE_ID") {
            let key = format!("ID_SID_{}_LANG", id);
            local
                .embedded_languages
                .extend(values(&key).into_iter().map(|lang| lang.trim().to_lowercase()));
        }
        if !values("ID_FILE_SUB_ID").is_empty() {
            local.external_files = values("ID_FILE_SUB_FILENAME").into_iter().map(PathBuf::from).collect();
        }
        local.has_vobsub = !values("ID_VOBSUB_ID").is_empty();

        debug!("Local subtitles from identify output: {:?}", local);
        local
    }

    /// Record the text subtitles sitting next to `media`
    pub fn scan_sidecars<P: AsRef<Path>>(media: P) -> Self {
        Self {
            external_files: FileManager::find_sidecar_subtitles(media),
            ..Default::default()
        }
    }

    /// True when fetching remote subtitles would add nothing
    pub fn has_usable_text_subtitles(&self) -> bool {
        let chinese_track = self
            .embedded_languages
            .iter()
            .any(|lang| CHINESE_TRACK_LANGUAGES.contains(&lang.as_str()));
        chinese_track || !self.external_files.is_empty()
    }
}
