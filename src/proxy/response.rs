//! Response body policy: read deadlines and buffering.
//!
//! # Responsibilities
//! - Enforce the route's read timeout between upstream body frames
//! - Collect bodies up to the route's buffer budget
//! - Hand oversized bodies back to streaming without losing the prefix
//!
//! # Design Decisions
//! - The read timeout is an idle deadline: it re-arms after every frame,
//!   bounding upstream silence rather than total transfer time
//! - Exceeding the buffer budget is not an error: the collected prefix
//!   is replayed ahead of the live remainder
//! - A timeout while still buffering surfaces as a 504 because nothing
//!   has been sent downstream yet; once streaming, errors abort the
//!   connection mid-body, which is all HTTP allows

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::{Body, Bytes};
use futures_util::stream::{self, Stream, StreamExt};
use http_body_util::BodyStream;
use tokio::time::{Instant, Sleep};

use crate::proxy::error::GatewayError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Idle deadline elapsed while waiting for the next body frame.
#[derive(Debug)]
pub struct ReadTimedOut;

impl std::fmt::Display for ReadTimedOut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "read timed out between body frames")
    }
}

impl std::error::Error for ReadTimedOut {}

/// Stream of data frames with an idle deadline between frames.
pub struct TimedFrames<B>
where
    B: hyper::body::Body,
{
    inner: BodyStream<B>,
    idle: Duration,
    deadline: Pin<Box<Sleep>>,
    armed: bool,
}

impl<B> TimedFrames<B>
where
    B: hyper::body::Body,
{
    pub fn new(body: B, idle: Duration) -> Self {
        Self {
            inner: BodyStream::new(body),
            idle,
            deadline: Box::pin(tokio::time::sleep(idle)),
            armed: false,
        }
    }
}

impl<B> Stream for TimedFrames<B>
where
    B: hyper::body::Body<Data = Bytes> + Unpin,
    B::Error: Into<BoxError>,
{
    type Item = Result<Bytes, BoxError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match this.inner.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(frame))) => {
                    this.armed = false;
                    // Trailer frames are dropped; only data flows downstream.
                    match frame.into_data() {
                        Ok(data) => return Poll::Ready(Some(Ok(data))),
                        Err(_) => continue,
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    this.armed = false;
                    return Poll::Ready(Some(Err(e.into())));
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => {
                    if !this.armed {
                        this.deadline.as_mut().reset(Instant::now() + this.idle);
                        this.armed = true;
                    }
                    return match this.deadline.as_mut().poll(cx) {
                        Poll::Ready(()) => {
                            Poll::Ready(Some(Err(Box::new(ReadTimedOut) as BoxError)))
                        }
                        Poll::Pending => Poll::Pending,
                    };
                }
            }
        }
    }
}

/// Apply a route's buffering profile to an upstream body.
///
/// Bodies within `max_bytes` come back as one in-memory chunk; larger
/// bodies switch to streaming with the collected prefix replayed first.
pub async fn apply_buffering<B>(
    body: B,
    max_bytes: usize,
    idle: Duration,
    upstream: &str,
) -> Result<Body, GatewayError>
where
    B: hyper::body::Body<Data = Bytes> + Unpin + Send + 'static,
    B::Error: Into<BoxError>,
{
    let mut frames = TimedFrames::new(body, idle);
    let mut collected: Vec<Bytes> = Vec::new();
    let mut total = 0usize;

    while let Some(chunk) = frames.next().await {
        let chunk = chunk.map_err(|e| classify_body_error(upstream, idle, e))?;
        total += chunk.len();
        collected.push(chunk);

        if total > max_bytes {
            let prefix = stream::iter(collected.into_iter().map(Ok::<Bytes, BoxError>));
            return Ok(Body::from_stream(prefix.chain(frames)));
        }
    }

    Ok(Body::from(concat_chunks(collected, total)))
}

/// Stream an upstream body with the idle deadline applied, no buffering.
pub fn streamed<B>(body: B, idle: Duration) -> Body
where
    B: hyper::body::Body<Data = Bytes> + Unpin + Send + 'static,
    B::Error: Into<BoxError>,
{
    Body::from_stream(TimedFrames::new(body, idle))
}

fn concat_chunks(chunks: Vec<Bytes>, total: usize) -> Bytes {
    if chunks.len() == 1 {
        return chunks.into_iter().next().unwrap_or_default();
    }
    let mut buf = Vec::with_capacity(total);
    for chunk in &chunks {
        buf.extend_from_slice(chunk);
    }
    Bytes::from(buf)
}

fn classify_body_error(upstream: &str, idle: Duration, error: BoxError) -> GatewayError {
    if error.is::<ReadTimedOut>() {
        GatewayError::Timeout {
            name: upstream.to_string(),
            phase: "read",
            after: idle,
        }
    } else {
        GatewayError::Protocol {
            name: upstream.to_string(),
            source: error,
        }
    }
}
