//! Structured logging for archive operations.
//!
//! Progress bars and terminal UI are out of scope for this crate (the
//! caller owns that), but every block, segment, fragment, crypto
//! operation, and I/O span still gets a structured [`log`] record so a
//! caller can wire up its own observability. [`Span`] is an RAII timer:
//! build one at the start of an operation, and it emits a `log::debug!`
//! record carrying `bytes_in`, `bytes_out`, `duration_ms`, `method`, and
//! `threads` fields when dropped (or when [`Span::finish`] is called
//! explicitly, which also returns the elapsed duration).

use std::time::{Duration, Instant};

/// What kind of operation a [`Span`] is timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    /// A whole container block (header + segments).
    Block,
    /// A single segment within a block.
    Segment,
    /// A content-defined chunk / fragment.
    Fragment,
    /// A key derivation or cipher pass.
    Crypto,
    /// A raw read or write against the underlying stream.
    Io,
}

impl SpanKind {
    fn as_str(self) -> &'static str {
        match self {
            SpanKind::Block => "block",
            SpanKind::Segment => "segment",
            SpanKind::Fragment => "fragment",
            SpanKind::Crypto => "crypto",
            SpanKind::Io => "io",
        }
    }
}

/// An in-flight timed operation.
///
/// Counters default to zero and the method label defaults to absent;
/// set what's relevant with the builder methods before the span is
/// dropped or [`finish`](Span::finish)ed.
#[derive(Debug)]
pub struct Span {
    kind: SpanKind,
    started: Instant,
    bytes_in: u64,
    bytes_out: u64,
    method: Option<u8>,
    threads: Option<usize>,
    finished: bool,
}

impl Span {
    /// Starts timing a new span of the given kind.
    pub fn start(kind: SpanKind) -> Self {
        Self {
            kind,
            started: Instant::now(),
            bytes_in: 0,
            bytes_out: 0,
            method: None,
            threads: None,
            finished: false,
        }
    }

    /// Records bytes read during this span.
    pub fn bytes_in(mut self, n: u64) -> Self {
        self.bytes_in = n;
        self
    }

    /// Records bytes written/produced during this span.
    pub fn bytes_out(mut self, n: u64) -> Self {
        self.bytes_out = n;
        self
    }

    /// Records the method preset in effect for this span.
    pub fn method(mut self, method: u8) -> Self {
        self.method = Some(method);
        self
    }

    /// Records the worker thread count involved in this span.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Emits the structured log record now and returns the elapsed
    /// duration. Calling this is optional; [`Drop`] does the same thing
    /// for callers who don't need the duration back.
    pub fn finish(mut self) -> Duration {
        self.emit()
    }

    fn emit(&mut self) -> Duration {
        if self.finished {
            return self.started.elapsed();
        }
        self.finished = true;
        let elapsed = self.started.elapsed();
        log::debug!(
            "span={} bytes_in={} bytes_out={} duration_ms={} method={} threads={}",
            self.kind.as_str(),
            self.bytes_in,
            self.bytes_out,
            elapsed.as_millis(),
            self.method
                .map(|m| m.to_string())
                .unwrap_or_else(|| "-".to_string()),
            self.threads
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
        elapsed
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        self.emit();
    }
}
