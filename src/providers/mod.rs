/*!
 * Remote subtitle repository access.
 *
 * - `request`: builds the multipart lookup request
 * - `package`: decodes the binary response framing
 * - `shooter`: HTTP transport backed by reqwest
 * - `mock`: scripted transport for tests and offline runs
 */

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt::Debug;

use crate::errors::TransportError;

pub mod mock;
pub mod package;
pub mod request;
pub mod shooter;

pub use package::{parse_package, PackageResponse};
pub use request::SubtitleRequest;

/// Sends one lookup request and returns the raw response body
///
/// Implementations perform exactly one attempt; retries, host rotation and
/// backoff belong to the caller.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Issue `request` and return the response body
    async fn send(&self, request: &SubtitleRequest) -> Result<Bytes, TransportError>;
}
