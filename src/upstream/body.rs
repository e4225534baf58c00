//! Incremental access to an upstream response body.

use std::fmt;
use std::time::Duration;

use axum::body::{Body, BodyDataStream};
use bytes::Bytes;
use futures_util::StreamExt;

use crate::upstream::error::UpstreamError;
use crate::upstream::pool::PoolPermit;

/// Upstream response body, pulled one chunk at a time.
///
/// Holds the pool slot for the exchange; dropping the body (completed,
/// failed or abandoned) frees it.
pub struct UpstreamBody {
    chunks: BodyDataStream,
    url: String,
    stall_timeout: Duration,
    finished: bool,
    _permit: PoolPermit,
}

impl UpstreamBody {
    pub(crate) fn new(body: Body, url: String, stall_timeout: Duration, permit: PoolPermit) -> Self {
        Self {
            chunks: body.into_data_stream(),
            url,
            stall_timeout,
            finished: false,
            _permit: permit,
        }
    }

    /// Next chunk in arrival order, `None` at end of stream.
    ///
    /// Waiting longer than the stall timeout for a chunk is a Timeout even
    /// when earlier chunks were delivered. After the first error the body
    /// reports end of stream.
    pub async fn next_chunk(&mut self) -> Option<Result<Bytes, UpstreamError>> {
        if self.finished {
            return None;
        }

        let next = tokio::time::timeout(self.stall_timeout, self.chunks.next()).await;
        let item = match next {
            Ok(Some(Ok(chunk))) => return Some(Ok(chunk)),
            Ok(Some(Err(e))) => Some(Err(UpstreamError::from_body(&self.url, &e, self.stall_timeout))),
            Ok(None) => None,
            Err(_) => Some(Err(UpstreamError::timeout(
                self.url.clone(),
                self.stall_timeout,
                "no data received from upstream",
            ))),
        };
        self.finished = true;
        item
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Debug for UpstreamBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamBody")
            .field("url", &self.url)
            .field("stall_timeout", &self.stall_timeout)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
