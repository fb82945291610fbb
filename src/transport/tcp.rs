//! Reconnecting TCP receiver for the NDJSON reading stream.
//!
//! The receiver owns the connection lifecycle: connect with timeout, frame
//! the byte stream into lines, decode each line, and push decoded readings
//! onto the bounded readings queue. On connect failure, read timeout, or
//! EOF it re-enters an exponential backoff loop (doubling, capped, ±20%
//! jitter) and retries until shutdown. Partial lines are discarded on
//! disconnect.

use chrono::Utc;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::{BackoffConfig, TcpClientConfig};
use crate::domain::Reading;
use crate::error::{MonSrvError, Result};
use crate::runtime::{BoundedQueue, Shutdown};
use crate::transport::ndjson::{decode_line, DecodeError};

/// Receiver-side counters, shared with observability consumers
#[derive(Debug, Default)]
pub struct TransportStats {
    /// Frames successfully decoded and enqueued
    pub frames_decoded: AtomicU64,
    /// JSON parse and schema failures
    pub decode_errors: AtomicU64,
    /// Frames with an unrecognized `type`
    pub unknown_types: AtomicU64,
    /// Frames discarded for exceeding the line limit
    pub oversized_lines: AtomicU64,
    /// Connection attempts after the first
    pub reconnects: AtomicU64,
}

/// Exponential backoff state (doubling, capped, ±20% jitter)
struct Backoff {
    cfg: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    fn new(cfg: BackoffConfig) -> Self {
        Self { cfg, attempt: 0 }
    }

    fn reset(&mut self) {
        self.attempt = 0;
    }

    fn next_delay(&mut self) -> Duration {
        let base = (self.cfg.init_ms.saturating_mul(1u64 << self.attempt.min(20)))
            .min(self.cfg.cap_ms) as f64;
        self.attempt = self.attempt.saturating_add(1);

        let jitter_range = base * 0.2;
        let jittered = if jitter_range > 0.0 {
            base + rand::thread_rng().gen_range(-jitter_range..jitter_range)
        } else {
            base
        };
        Duration::from_millis(jittered.max(0.0) as u64)
    }
}

/// Splits a byte stream into lines, enforcing a maximum line length.
///
/// When the accumulated partial line exceeds `max_len` the framer drops
/// bytes until the next newline and reports the discard.
struct LineFramer {
    buf: Vec<u8>,
    max_len: usize,
    skipping: bool,
}

impl LineFramer {
    fn new(max_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_len,
            skipping: false,
        }
    }

    /// Feed a chunk; returns complete lines and the number of oversized
    /// frames discarded while processing it.
    fn push(&mut self, chunk: &[u8]) -> (Vec<Vec<u8>>, u64) {
        let mut lines = Vec::new();
        let mut oversized = 0;

        for &byte in chunk {
            if self.skipping {
                if byte == b'\n' {
                    self.skipping = false;
                }
                continue;
            }
            if byte == b'\n' {
                let line = std::mem::take(&mut self.buf);
                if !line.is_empty() {
                    lines.push(line);
                }
                continue;
            }
            self.buf.push(byte);
            if self.buf.len() > self.max_len {
                self.buf.clear();
                self.skipping = true;
                oversized += 1;
            }
        }

        (lines, oversized)
    }
}

/// Reconnecting NDJSON stream receiver
pub struct TcpReceiver {
    cfg: TcpClientConfig,
    spectral_lengths: HashMap<String, usize>,
    queue: Arc<BoundedQueue<Reading>>,
    shutdown: Shutdown,
    stats: Arc<TransportStats>,
}

impl TcpReceiver {
    pub fn new(
        cfg: TcpClientConfig,
        spectral_lengths: HashMap<String, usize>,
        queue: Arc<BoundedQueue<Reading>>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            cfg,
            spectral_lengths,
            queue,
            shutdown,
            stats: Arc::new(TransportStats::default()),
        }
    }

    /// Shared receiver counters
    pub fn stats(&self) -> Arc<TransportStats> {
        self.stats.clone()
    }

    /// Run the connect/stream/reconnect loop until shutdown
    pub async fn run(self) {
        let mut backoff = Backoff::new(self.cfg.reconnect_backoff.clone());
        let mut first_attempt = true;

        while !self.shutdown.is_triggered() {
            if !first_attempt {
                self.stats.reconnects.fetch_add(1, Ordering::Relaxed);
            }
            first_attempt = false;

            match self.connect_and_stream(&mut backoff).await {
                Ok(()) => {
                    if self.shutdown.is_triggered() {
                        break;
                    }
                    info!("Reading source closed the connection; reconnecting");
                }
                Err(e) => {
                    if self.shutdown.is_triggered() {
                        break;
                    }
                    warn!("Reading stream error: {}", e);
                }
            }

            let delay = backoff.next_delay();
            debug!("Waiting {:?} before reconnect attempt", delay);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown.wait() => break,
            }
        }

        info!("TCP receiver stopped");
    }

    /// Connect and stream until EOF, error, or shutdown.
    ///
    /// Returns `Ok(())` on clean EOF; any partial line accumulated in the
    /// framer is discarded with the connection.
    async fn connect_and_stream(&self, backoff: &mut Backoff) -> Result<()> {
        let addr = format!("{}:{}", self.cfg.host, self.cfg.port);
        let io_timeout = self.cfg.timeout();

        let mut stream = match timeout(io_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(MonSrvError::network(format!("connect {}: {}", addr, e))),
            Err(_) => {
                return Err(MonSrvError::Timeout(format!("connect {}", addr)));
            }
        };
        info!("Connected to reading source at {}", addr);
        backoff.reset();

        let mut framer = LineFramer::new(self.cfg.max_line_bytes);
        let mut chunk = [0u8; 4096];

        loop {
            let read = tokio::select! {
                r = timeout(io_timeout, stream.read(&mut chunk)) => r,
                _ = self.shutdown.wait() => return Ok(()),
            };

            let n = match read {
                Ok(Ok(0)) => return Ok(()),
                Ok(Ok(n)) => n,
                Ok(Err(e)) => return Err(MonSrvError::network(format!("read: {}", e))),
                Err(_) => return Err(MonSrvError::Timeout("read".into())),
            };

            let (lines, oversized) = framer.push(&chunk[..n]);
            if oversized > 0 {
                self.stats.oversized_lines.fetch_add(oversized, Ordering::Relaxed);
                warn!(
                    "Discarded {} frame(s) exceeding {} bytes",
                    oversized, self.cfg.max_line_bytes
                );
            }

            for raw in lines {
                self.handle_line(&raw);
            }
        }
    }

    fn handle_line(&self, raw: &[u8]) {
        let line = match std::str::from_utf8(raw) {
            Ok(s) => s.trim(),
            Err(_) => {
                self.stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                warn!("Dropping non-UTF8 frame ({} bytes)", raw.len());
                return;
            }
        };
        if line.is_empty() {
            return;
        }

        match decode_line(line, &self.spectral_lengths, Utc::now()) {
            Ok(reading) => {
                self.stats.frames_decoded.fetch_add(1, Ordering::Relaxed);
                if self.queue.push(reading) {
                    debug!(
                        "Readings queue full; dropped oldest (total dropped: {})",
                        self.queue.dropped()
                    );
                }
            }
            Err(DecodeError::UnknownType(t)) => {
                self.stats.unknown_types.fetch_add(1, Ordering::Relaxed);
                debug!("Skipping record with unknown type {:?}", t);
            }
            Err(e) => {
                self.stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                warn!("Bad frame skipped: {}", e);
            }
        }
    }
}
