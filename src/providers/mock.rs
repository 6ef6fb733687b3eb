/*!
 * Scripted transport for tests and offline runs.
 *
 * - `MockTransport::replying()` - Always returns the same body
 * - `MockTransport::failing()` - Always fails with a connection error
 * - `MockTransport::scripted()` - Plays back a list of outcomes, then fails
 */

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::errors::TransportError;
use crate::providers::{SubtitleRequest, Transport};

/// One scripted reply
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Return this body
    Body(Vec<u8>),
    /// Fail with a connection error
    Fail,
    /// Wait before returning the body
    Slow { delay: Duration, body: Vec<u8> },
}

/// Transport that records requests and plays back scripted replies
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    script: Arc<Mutex<VecDeque<MockReply>>>,
    fallback: Option<Vec<u8>>,
    requests: Arc<Mutex<Vec<SubtitleRequest>>>,
    calls: Arc<AtomicUsize>,
}

impl MockTransport {
    /// Every call returns `body`
    pub fn replying(body: Vec<u8>) -> Self {
        Self { fallback: Some(body), ..Default::default() }
    }

    /// Every call fails
    pub fn failing() -> Self {
        Self::default()
    }

    /// Calls consume `replies` in order; once exhausted every call fails
    pub fn scripted(replies: Vec<MockReply>) -> Self {
        Self {
            script: Arc::new(Mutex::new(replies.into())),
            ..Default::default()
        }
    }

    /// Number of `send` calls so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Copies of every request received
    pub fn requests(&self) -> Vec<SubtitleRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &SubtitleRequest) -> Result<Bytes, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let reply = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .or_else(|| self.fallback.clone().map(MockReply::Body));

        match reply {
            Some(MockReply::Body(body)) => Ok(Bytes::from(body)),
            Some(MockReply::Slow { delay, body }) => {
                tokio::time::sleep(delay).await;
                Ok(Bytes::from(body))
            }
            Some(MockReply::Fail) | None => {
                Err(TransportError::Connection("mock transport refused".to_string()))
            }
        }
    }
}
