use bytes::Bytes;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::io;

use crate::protocol::anthropic::EventKind;

/// Ordered, append-only destination for serialized SSE frames.
///
/// Each `frame` is one complete `event: ...\ndata: ...\n\n` block. The frame
/// buffer is reused by the caller, so implementations copy what they keep.
pub trait EventSink {
    type Error: std::error::Error + Send + Sync + 'static;

    fn write_frame(&mut self, kind: EventKind, frame: &str) -> Result<(), Self::Error>;

    /// Called once after the last frame of a response.
    fn close(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// In-memory sink. Frames are queued as [`Bytes`] until drained.
#[derive(Debug, Default)]
pub struct FrameQueue {
    frames: VecDeque<(EventKind, Bytes)>,
    closed: bool,
}

impl FrameQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn pop(&mut self) -> Option<Bytes> {
        self.frames.pop_front().map(|(_, frame)| frame)
    }

    /// Remove every queued frame, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = Bytes> + '_ {
        self.frames.drain(..).map(|(_, frame)| frame)
    }

    /// Event kinds of the queued frames, oldest first.
    #[must_use]
    pub fn kinds(&self) -> Vec<EventKind> {
        self.frames.iter().map(|(kind, _)| *kind).collect()
    }

    /// Queued frames as text, oldest first.
    #[must_use]
    pub fn frames(&self) -> Vec<&str> {
        self.frames
            .iter()
            .filter_map(|(_, frame)| std::str::from_utf8(frame).ok())
            .collect()
    }
}

impl EventSink for FrameQueue {
    type Error = Infallible;

    fn write_frame(&mut self, kind: EventKind, frame: &str) -> Result<(), Self::Error> {
        self.frames
            .push_back((kind, Bytes::copy_from_slice(frame.as_bytes())));
        Ok(())
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        self.closed = true;
        Ok(())
    }
}

/// Blocking sink over any [`io::Write`]. Flushes on close.
#[derive(Debug)]
pub struct WriterSink<W: io::Write> {
    inner: W,
}

impl<W: io::Write> WriterSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: io::Write> EventSink for WriterSink<W> {
    type Error = io::Error;

    fn write_frame(&mut self, _kind: EventKind, frame: &str) -> Result<(), Self::Error> {
        self.inner.write_all(frame.as_bytes())
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        self.inner.flush()
    }
}
