// Framed event stream
// Single-writer delivery of outbound events onto one response body

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::models::event::FRAME_HEADER_LEN;
use crate::models::{Event, EventKind};

/// Interval between keepalive frames
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Stream cancelled")]
    Cancelled,

    #[error("Stream write failed: {0}")]
    Io(String),

    #[error("Event encoding failed: {0}")]
    Encode(String),

    #[error("Malformed frame: {0}")]
    Malformed(String),
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        StreamError::Io(err.to_string())
    }
}

impl From<rmp_serde::encode::Error> for StreamError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        StreamError::Encode(err.to_string())
    }
}

pub type StreamResult<T> = Result<T, StreamError>;

/// Destination of outbound events
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn write(&self, event: Event) -> StreamResult<()>;

    fn is_cancelled(&self) -> bool;
}

// ============================================================================
// EventStream
// ============================================================================

/// Writes framed events to `W`, one frame at a time.
///
/// The lock is held across encode, write and flush, so frames from concurrent
/// producers never interleave.
pub struct EventStream<W> {
    writer: Mutex<W>,
    cancel: CancellationToken,
    clean: bool,
}

impl<W> EventStream<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W, cancel: CancellationToken, clean: bool) -> Self {
        Self {
            writer: Mutex::new(writer),
            cancel,
            clean,
        }
    }

    pub async fn write_event(&self, event: Event) -> StreamResult<()> {
        let mut writer = self.writer.lock().await;

        if let Event::Error(message) = &event {
            log::debug!("[stream] error: {}", message);
        }

        if self.cancel.is_cancelled() {
            return Err(StreamError::Cancelled);
        }

        let event = if self.clean { event.cleaned() } else { event };
        let frame = event.encode()?;

        // a cancel mid-write may leave a partial frame; the body is being dropped anyway
        tokio::select! {
            result = writer.write_all(&frame) => result?,
            _ = self.cancel.cancelled() => return Err(StreamError::Cancelled),
        }

        if self.cancel.is_cancelled() {
            return Err(StreamError::Cancelled);
        }

        writer.flush().await?;

        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W> EventStream<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Write an Alive frame every `period` until the token is cancelled
    pub fn spawn_keepalive(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let stream = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

            loop {
                tokio::select! {
                    _ = stream.cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = stream.write_event(Event::Alive).await {
                            log::debug!("[stream] keepalive stopped: {}", e);
                            break;
                        }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl<W> EventSink for EventStream<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write(&self, event: Event) -> StreamResult<()> {
        self.write_event(event).await
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

// ============================================================================
// Frame decoding
// ============================================================================

/// One decoded frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub kind: EventKind,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Decode a string payload
    pub fn text(&self) -> StreamResult<String> {
        rmp_serde::from_slice(&self.payload).map_err(|e| StreamError::Malformed(e.to_string()))
    }

    /// Decode a tool call payload
    pub fn tool(&self) -> StreamResult<crate::models::ToolCall> {
        rmp_serde::from_slice(&self.payload).map_err(|e| StreamError::Malformed(e.to_string()))
    }
}

/// Split a byte buffer into frames; trailing partial frames are an error
pub fn parse_frames(mut bytes: &[u8]) -> StreamResult<Vec<Frame>> {
    let mut frames = Vec::new();

    while !bytes.is_empty() {
        if bytes.len() < FRAME_HEADER_LEN {
            return Err(StreamError::Malformed("truncated header".to_string()));
        }

        let kind = EventKind::from_tag(bytes[0])
            .ok_or_else(|| StreamError::Malformed(format!("unknown tag {}", bytes[0])))?;
        let length = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;

        let end = FRAME_HEADER_LEN + length;
        if bytes.len() < end {
            return Err(StreamError::Malformed("truncated payload".to_string()));
        }

        frames.push(Frame {
            kind,
            payload: bytes[FRAME_HEADER_LEN..end].to_vec(),
        });

        bytes = &bytes[end..];
    }

    Ok(frames)
}

// ============================================================================
// Test support
// ============================================================================
