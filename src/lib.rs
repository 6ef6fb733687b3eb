/*!
 * # subfetch - automatic subtitle acquisition
 *
 * A Rust library that finds subtitles for local media files on the
 * shooter.cn subtitle repository.
 *
 * ## Features
 *
 * - Content fingerprint of a media file (four MD5-hashed windows)
 * - Multipart lookup requests with host rotation and a backoff schedule
 * - Decoding of the repository's binary, gzip-packed response format
 * - Encoding detection and UTF-8 conversion for unlabeled CJK text
 * - Near-duplicate filtering of results
 * - Collision-safe persistence next to the media file
 * - Background fetches with cancellation, one per media item
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `fingerprint`: Media file fingerprint
 * - `providers`: Remote repository access:
 *   - `providers::request`: Lookup request builder
 *   - `providers::package`: Response decoder
 *   - `providers::shooter`: HTTP transport
 *   - `providers::mock`: Scripted transport for tests
 * - `charset`: Encoding detection and conversion
 * - `subtitle_processor`: Subtitle candidates and duplicate filtering
 * - `file_utils`: File system operations and subtitle persistence
 * - `local_subtitles`: Subtitles already available for a media item
 * - `player`: Player control collaborator
 * - `app_controller`: Acquisition workflow, background fetches and supervision
 * - `errors`: Custom error types for the application
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod charset;
pub mod errors;
pub mod file_utils;
pub mod fingerprint;
pub mod local_subtitles;
pub mod player;
pub mod providers;
pub mod subtitle_processor;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::{Controller, FetchHandle, FetchOutcome, FetchSupervisor, SkipReason};
pub use charset::{Charset, Detection, DetectionMode, LanguageTag};
pub use errors::{AppError, FingerprintError, PersistError, ProtocolError, TransportError};
pub use fingerprint::MediaFingerprint;
pub use local_subtitles::LocalSubtitles;
pub use player::{NullPlayer, PlayerControl, SlaveCommandPlayer};
pub use subtitle_processor::{DuplicateFilter, SubtitleBundle, SubtitleCandidate};
