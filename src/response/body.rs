//! Body sources and the capability descriptor that selects body strategies.
//!
//! A provider hands each [`Response`](crate::Response) exactly one
//! `BodySource`. The response takes it out on the first body read, so the
//! source (and whatever transport handle it owns) is consumed at most once.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;

use crate::error::{BodyKind, RequestError, TransportError};
use crate::task::ExchangeGuard;

use super::events::{EventEmitter, ResponseEvent};

/// Which body representations a provider can materialize.
///
/// Text and JSON are always available; the other representations depend on
/// the host platform and are fixed when the response is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyCapabilities {
    /// `array_buffer()` is available.
    pub array_buffer: bool,
    /// `blob()` is available.
    pub blob: bool,
    /// `form_data()` is available.
    pub form_data: bool,
}

impl BodyCapabilities {
    /// Every representation is available.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            array_buffer: true,
            blob: true,
            form_data: true,
        }
    }

    /// Only text and JSON.
    #[must_use]
    pub const fn text_only() -> Self {
        Self {
            array_buffer: false,
            blob: false,
            form_data: false,
        }
    }

    /// Returns true if `kind` can be produced.
    #[must_use]
    pub fn supports(&self, kind: BodyKind) -> bool {
        match kind {
            BodyKind::Text | BodyKind::Json => true,
            BodyKind::ArrayBuffer => self.array_buffer,
            BodyKind::Blob => self.blob,
            BodyKind::FormData => self.form_data,
        }
    }
}

impl Default for BodyCapabilities {
    fn default() -> Self {
        Self::all()
    }
}

/// Accumulates chunks and publishes `Data`/`Progress` for each one.
pub(crate) struct BodyBuffer<'a> {
    events: &'a EventEmitter,
    buffer: BytesMut,
    size: u64,
}

impl<'a> BodyBuffer<'a> {
    pub(crate) fn new(events: &'a EventEmitter) -> Self {
        Self {
            events,
            buffer: BytesMut::new(),
            size: 0,
        }
    }

    pub(crate) fn push(&mut self, chunk: Bytes) {
        self.size += chunk.len() as u64;
        self.buffer.extend_from_slice(&chunk);
        self.events.emit(&ResponseEvent::Data { chunk });
        self.events.emit(&ResponseEvent::Progress {
            total_bytes: self.size,
        });
    }

    pub(crate) fn finish(self) -> Bytes {
        self.buffer.freeze()
    }
}

/// One-shot producer of a response body.
#[async_trait]
pub(crate) trait BodySource: Send {
    /// Drains the body into a single buffer.
    ///
    /// Implementations run their transport waits through `guard` and abort
    /// the transport when the guard rejects.
    async fn collect(
        self: Box<Self>,
        events: &EventEmitter,
        guard: &ExchangeGuard,
    ) -> Result<Bytes, RequestError>;
}

/// A body that is already in memory.
pub(crate) struct BufferedBody {
    bytes: Bytes,
}

impl BufferedBody {
    pub(crate) fn new(bytes: Bytes) -> Self {
        Self { bytes }
    }
}

#[async_trait]
impl BodySource for BufferedBody {
    async fn collect(
        self: Box<Self>,
        events: &EventEmitter,
        _guard: &ExchangeGuard,
    ) -> Result<Bytes, RequestError> {
        let mut buffer = BodyBuffer::new(events);
        if !self.bytes.is_empty() {
            buffer.push(self.bytes);
        }
        Ok(buffer.finish())
    }
}

/// A body streamed from a live transport connection.
///
/// Dropping the stream closes the connection, so losing the guard race
/// aborts the transfer.
pub(crate) struct StreamBody {
    url: String,
    stream: BoxStream<'static, Result<Bytes, TransportError>>,
}

impl StreamBody {
    /// `url` must already be redacted.
    pub(crate) fn new(
        url: impl Into<String>,
        stream: BoxStream<'static, Result<Bytes, TransportError>>,
    ) -> Self {
        Self {
            url: url.into(),
            stream,
        }
    }
}

#[async_trait]
impl BodySource for StreamBody {
    async fn collect(
        self: Box<Self>,
        events: &EventEmitter,
        guard: &ExchangeGuard,
    ) -> Result<Bytes, RequestError> {
        let Self { url, mut stream } = *self;
        let mut buffer = BodyBuffer::new(events);
        guard
            .run(async {
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk.map_err(|e| RequestError::transport(&url, e))?;
                    buffer.push(chunk);
                }
                Ok(())
            })
            .await?;
        Ok(buffer.finish())
    }
}
