use anyhow::Result;
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::app_config::Config;
use crate::errors::FingerprintError;
use crate::file_utils::{FileManager, SubtitleWriter};
use crate::fingerprint::MediaFingerprint;
use crate::local_subtitles::LocalSubtitles;
use crate::player::PlayerControl;
use crate::providers::shooter::ShooterClient;
use crate::providers::{parse_package, SubtitleRequest, Transport};
use crate::subtitle_processor::{normalize_all, DuplicateFilter, SubtitleBundle, SubtitleCandidate};

// @module: Application controller for subtitle acquisition

/// Why a fetch did not contact the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The media file is too small to fingerprint
    DegenerateFingerprint,
    /// The player or the filesystem already has usable text subtitles
    LocalSubtitlesPresent,
}

/// Final state of one acquisition
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Subtitles were found and written
    Fetched(SubtitleBundle),
    /// The request was built and logged but never sent
    DryRun(SubtitleRequest),
    /// Every attempt in the backoff schedule failed or came back empty
    Exhausted { attempts: usize },
    /// Nothing was sent
    Skipped(SkipReason),
    /// The fetch was cancelled before it could finish
    Cancelled,
}

impl FetchOutcome {
    // @returns: Written subtitles; empty unless Fetched
    pub fn bundle(&self) -> SubtitleBundle {
        match self {
            FetchOutcome::Fetched(bundle) => bundle.clone(),
            _ => SubtitleBundle::empty(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchOutcome::Cancelled)
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOutcome::Fetched(bundle) => write!(f, "fetched {} subtitle(s)", bundle.len()),
            FetchOutcome::DryRun(_) => write!(f, "dry run"),
            FetchOutcome::Exhausted { attempts } => write!(f, "no subtitles after {} attempt(s)", attempts),
            FetchOutcome::Skipped(SkipReason::DegenerateFingerprint) => write!(f, "skipped, file too small"),
            FetchOutcome::Skipped(SkipReason::LocalSubtitlesPresent) => write!(f, "skipped, local subtitles present"),
            FetchOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Result of the remote lookup stage
#[derive(Debug)]
pub enum Lookup {
    /// Candidates from the first non-empty response
    Found(Vec<SubtitleCandidate>),
    /// The lookup ended without candidates
    Done(FetchOutcome),
}

/// Main application controller for subtitle acquisition
#[derive(Debug, Clone)]
pub struct Controller {
    // @field: App configuration
    config: Config,

    // @field: Sends requests to the subtitle server
    transport: Arc<dyn Transport>,

    // @field: Fixed seed for host selection, random when None
    seed: Option<u64>,
}

impl Controller {
    // @method: Create a controller that talks to the real server
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(ShooterClient::new(config.fetch.timeout()));
        Ok(Self::with_transport(config, transport))
    }

    /// Create a controller around any transport
    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport, seed: None }
    }

    /// Make host and boundary choices reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    /// Query the server for `media`, walking the backoff schedule until a
    /// response carries at least one candidate
    pub async fn fetch(
        &self,
        media: &Path,
        fingerprint: &MediaFingerprint,
        cancel: &CancellationToken,
    ) -> Lookup {
        let mut rng = self.rng();

        if self.config.dry_run {
            let request = SubtitleRequest::build(media, fingerprint, &mut rng);
            info!("Dry run, not sending: {}", request.describe());
            return Lookup::Done(FetchOutcome::DryRun(request));
        }

        if fingerprint.is_degenerate() {
            warn!("{:?} is too small to identify, not querying the server", media);
            return Lookup::Done(FetchOutcome::Skipped(SkipReason::DegenerateFingerprint));
        }

        let schedule = self.config.fetch.backoff_schedule();
        for (attempt, delay) in schedule.iter().enumerate() {
            tokio::select! {
                _ = cancel.cancelled() => return Lookup::Done(FetchOutcome::Cancelled),
                _ = tokio::time::sleep(*delay) => {}
            }

            let request = SubtitleRequest::build(media, fingerprint, &mut rng);
            debug!("Attempt {}/{}: {}", attempt + 1, schedule.len(), request.url);

            let result = tokio::select! {
                _ = cancel.cancelled() => return Lookup::Done(FetchOutcome::Cancelled),
                result = self.transport.send(&request) => result,
            };

            let body = match result {
                Ok(body) => body,
                Err(e) => {
                    warn!("Attempt {} to {} failed: {}", attempt + 1, request.url, e);
                    continue;
                }
            };

            match parse_package(&body) {
                Ok(response) if !response.is_empty() => {
                    info!(
                        "Found {} subtitle(s) for {:?} on attempt {}",
                        response.candidates.len(),
                        media,
                        attempt + 1
                    );
                    return Lookup::Found(response.candidates);
                }
                Ok(response) => {
                    debug!(
                        "Attempt {} returned no usable subtitles ({} package(s), {} malformed file(s))",
                        attempt + 1,
                        response.package_count,
                        response.malformed_files
                    );
                }
                Err(e) => warn!("Attempt {} returned a bad response: {}", attempt + 1, e),
            }
        }

        Lookup::Done(FetchOutcome::Exhausted { attempts: schedule.len() })
    }

    /// Fingerprint, fetch, detect, deduplicate and persist subtitles for `media`
    pub async fn acquire(
        &self,
        media: &Path,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome, FingerprintError> {
        let path = media.to_path_buf();
        let fingerprint = match tokio::task::spawn_blocking(move || MediaFingerprint::compute(path)).await {
            Ok(result) => result?,
            Err(e) => {
                error!("Fingerprint task for {:?} failed: {}", media, e);
                return Ok(FetchOutcome::Exhausted { attempts: 0 });
            }
        };
        debug!("Fingerprint for {:?}: {}", media, fingerprint);

        let mut candidates = match self.fetch(media, &fingerprint, cancel).await {
            Lookup::Found(candidates) => candidates,
            Lookup::Done(outcome) => return Ok(outcome),
        };

        normalize_all(&mut candidates, self.config.fetch.detection);
        let filter = DuplicateFilter::new(self.config.fetch.similarity_threshold);
        let survivors = filter.mark(&mut candidates);
        let dropped = candidates.len() - survivors;
        if dropped > 0 {
            debug!("Dropped {} duplicate subtitle(s)", dropped);
        }

        let writer = SubtitleWriter::new(self.config.save_dir.clone());
        match writer.persist_until(media, &mut candidates, cancel) {
            Some(_) => Ok(FetchOutcome::Fetched(SubtitleBundle::from_candidates(candidates))),
            None => Ok(FetchOutcome::Cancelled),
        }
    }

    /// `acquire`, unless `local` already offers usable text subtitles
    pub async fn acquire_if_missing(
        &self,
        media: &Path,
        local: &LocalSubtitles,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome, FingerprintError> {
        if local.has_usable_text_subtitles() {
            info!("{:?} already has text subtitles, not fetching", media);
            return Ok(FetchOutcome::Skipped(SkipReason::LocalSubtitlesPresent));
        }
        self.acquire(media, cancel).await
    }

    /// Run `acquire_if_missing` on a background task and hand the written
    /// files to `player` when it completes
    pub fn spawn(&self, media: PathBuf, local: LocalSubtitles, player: Arc<dyn PlayerControl>) -> FetchHandle {
        let token = CancellationToken::new();
        let controller = self.clone();
        let task_token = token.clone();
        let task_media = media.clone();

        let task = tokio::spawn(async move {
            let outcome = match controller.acquire_if_missing(&task_media, &local, &task_token).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("{}", e);
                    FetchOutcome::Exhausted { attempts: 0 }
                }
            };
            // Files written before a late cancel stay on disk and in the
            // outcome; the player only hears about fetches still wanted.
            if task_token.is_cancelled() {
                debug!("Fetch for {:?} no longer wanted, not notifying the player", task_media);
                return match outcome {
                    FetchOutcome::Fetched(_) => outcome,
                    _ => FetchOutcome::Cancelled,
                };
            }
            let notified = outcome.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || notify_player(player.as_ref(), &notified)).await {
                error!("Player notification for {:?} failed: {}", task_media, e);
            }
            outcome
        });

        FetchHandle { media, token, task }
    }

    /// Fetch subtitles for every media file under `inputs`, one at a time
    pub async fn run(
        &self,
        inputs: &[PathBuf],
        force: bool,
        player: Arc<dyn PlayerControl>,
    ) -> Result<Vec<(PathBuf, FetchOutcome)>> {
        let media_files = FileManager::collect_media_files(inputs)?;
        if media_files.is_empty() {
            warn!("No media files found");
        }

        let mut results = Vec::with_capacity(media_files.len());
        for media in media_files {
            let local = if force { LocalSubtitles::default() } else { LocalSubtitles::scan_sidecars(&media) };
            let outcome = self.spawn(media.clone(), local, player.clone()).join().await;
            info!("{:?}: {}", media, outcome);
            results.push((media, outcome));
        }
        Ok(results)
    }
}

fn notify_player(player: &dyn PlayerControl, outcome: &FetchOutcome) {
    let FetchOutcome::Fetched(bundle) = outcome else {
        return;
    };
    let paths = bundle.paths();
    if paths.is_empty() {
        return;
    }
    for path in &paths {
        player.load_subtitle(path);
    }
    player.select_subtitle(0);
}

/// A fetch running on a background task
#[derive(Debug)]
pub struct FetchHandle {
    media: PathBuf,
    token: CancellationToken,
    task: JoinHandle<FetchOutcome>,
}

impl FetchHandle {
    pub fn media(&self) -> &Path {
        &self.media
    }

    /// Ask the fetch to stop. Unless it already wrote its files, the result
    /// will be `Cancelled`
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the outcome
    pub async fn join(self) -> FetchOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Fetch task for {:?} failed: {}", self.media, e);
                FetchOutcome::Exhausted { attempts: 0 }
            }
        }
    }
}

/// Keeps at most one fetch in flight, tied to the item being played
#[derive(Debug)]
pub struct FetchSupervisor {
    controller: Controller,
    player: Arc<dyn PlayerControl>,
    current: Option<FetchHandle>,
}

impl FetchSupervisor {
    pub fn new(controller: Controller, player: Arc<dyn PlayerControl>) -> Self {
        Self { controller, player, current: None }
    }

    /// Start fetching for `media`. A fetch already running for the same item
    /// is left alone; one for another item is cancelled first.
    /// Returns true when a new fetch was started.
    pub fn begin(&mut self, media: &Path, local: LocalSubtitles) -> bool {
        if let Some(current) = &self.current {
            if current.media() == media && !current.is_finished() {
                debug!("Fetch for {:?} already in flight", media);
                return false;
            }
        }
        if let Some(previous) = self.current.take() {
            previous.cancel();
        }
        self.current = Some(self.controller.spawn(media.to_path_buf(), local, self.player.clone()));
        true
    }

    /// Playback moved on: cancel whatever is in flight and hand back its handle
    pub fn advance(&mut self) -> Option<FetchHandle> {
        let handle = self.current.take()?;
        handle.cancel();
        Some(handle)
    }

    pub fn current(&self) -> Option<&FetchHandle> {
        self.current.as_ref()
    }

    /// Wait for the current fetch, if any
    pub async fn finish(&mut self) -> Option<FetchOutcome> {
        match self.current.take() {
            Some(handle) => Some(handle.join().await),
            None => None,
        }
    }
}
