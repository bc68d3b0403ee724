//! Stream ingestion loop.
//!
//! The loop cycles `Disconnected -> Connecting -> Streaming -> Disconnected`
//! for the life of the process. While streaming, messages are handled one at
//! a time in arrival order, each fully parsed and written to both indexes
//! before the next is pulled, which makes last-write-wins per (student, exam)
//! pair follow arrival order.
//!
//! There is no resume cursor: events published while disconnected are lost.

use crate::context::ServiceContext;
use crate::error::IngestError;
use crate::event::{self, StreamMessage};
use crate::source::{EventSource, MessageStream};
use crate::writer::DualIndexWriter;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Streaming,
}

/// Bounded exponential backoff between connection attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    max_retries: Option<u32>,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(30), 2.0)
    }
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            initial,
            max: max.max(initial),
            multiplier: if multiplier >= 1.0 { multiplier } else { 1.0 },
            max_retries: None,
        }
    }

    /// Give up after `max_retries` consecutive failed reconnects. `None`
    /// retries forever.
    pub fn with_max_retries(mut self, max_retries: Option<u32>) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Wait before the `attempt`-th retry (0-based), capped at the maximum.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let millis = self.initial.as_millis() as f64 * factor;
        if !millis.is_finite() || millis >= self.max.as_millis() as f64 {
            self.max
        } else {
            Duration::from_millis(millis as u64)
        }
    }

    /// Whether `failures` consecutive failed connects is past the limit.
    pub fn exhausted(&self, failures: u32) -> bool {
        matches!(self.max_retries, Some(max) if failures > max)
    }
}

/// Counters describing what the loop has done so far.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestStats {
    pub messages_received: u64,
    pub events_applied: u64,
    pub events_skipped: u64,
    pub parse_failures: u64,
    pub write_failures: u64,
    pub connections: u64,
    pub disconnects: u64,
    pub last_event_at: Option<DateTime<Utc>>,
}

/// What happened to one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Applied,
    Skipped,
    ParseFailed,
    WriteFailed,
}

/// Read-only view of a running loop, for status reporting.
#[derive(Clone)]
pub struct IngestMonitor {
    state: Arc<RwLock<ConnectionState>>,
    stats: Arc<Mutex<IngestStats>>,
}

impl IngestMonitor {
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    pub async fn stats(&self) -> IngestStats {
        self.stats.lock().await.clone()
    }
}

pub struct Ingestor {
    source: Arc<dyn EventSource>,
    writer: DualIndexWriter,
    backoff: Backoff,
    state: Arc<RwLock<ConnectionState>>,
    stats: Arc<Mutex<IngestStats>>,
}

impl Ingestor {
    pub fn new(source: Arc<dyn EventSource>, ctx: ServiceContext, backoff: Backoff) -> Self {
        Self {
            source,
            writer: DualIndexWriter::new(ctx),
            backoff,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            stats: Arc::new(Mutex::new(IngestStats::default())),
        }
    }

    pub fn monitor(&self) -> IngestMonitor {
        IngestMonitor {
            state: self.state.clone(),
            stats: self.stats.clone(),
        }
    }

    async fn set_state(&self, state: ConnectionState) {
        *self.state.write().await = state;
    }

    /// Runs until the process exits, or until reconnecting fails more often
    /// in a row than the backoff allows. A failed connect and a connection
    /// that ends without delivering a message both count as failures; only
    /// a connection that delivered at least one message resets the backoff.
    pub async fn run(&self) -> Result<(), IngestError> {
        let upstream = self.source.describe();
        let mut failures: u32 = 0;

        loop {
            self.set_state(ConnectionState::Connecting).await;
            tracing::debug!(upstream = %upstream, "connecting");

            let error = match self.source.connect().await {
                Ok(stream) => {
                    self.set_state(ConnectionState::Streaming).await;
                    let received_before = {
                        let mut stats = self.stats.lock().await;
                        stats.connections += 1;
                        stats.messages_received
                    };
                    tracing::info!(upstream = %upstream, "streaming score events");

                    let result = self.consume(stream).await;

                    self.set_state(ConnectionState::Disconnected).await;
                    let received = {
                        let mut stats = self.stats.lock().await;
                        stats.disconnects += 1;
                        stats.messages_received - received_before
                    };
                    let error = match result {
                        Ok(()) => IngestError::Stream("upstream closed the stream".to_string()),
                        Err(e) => e,
                    };
                    if received > 0 {
                        failures = 0;
                        tracing::warn!(upstream = %upstream, messages = received, error = %error, "stream ended");
                        None
                    } else {
                        Some(error)
                    }
                }
                Err(e) => {
                    self.set_state(ConnectionState::Disconnected).await;
                    Some(e)
                }
            };

            let delay = match error {
                None => self.backoff.delay(0),
                Some(e) => {
                    failures = failures.saturating_add(1);
                    if self.backoff.exhausted(failures) {
                        tracing::error!(upstream = %upstream, attempts = failures, error = %e, "giving up on upstream");
                        return Err(IngestError::RetriesExhausted { attempts: failures });
                    }
                    tracing::warn!(upstream = %upstream, attempt = failures, error = %e, "connection failed");
                    self.backoff.delay(failures - 1)
                }
            };

            tracing::info!(delay_ms = delay.as_millis() as u64, "reconnecting after delay");
            tokio::time::sleep(delay).await;
        }
    }

    /// Drains one connection's messages. `Ok` when the stream ends cleanly,
    /// `Err` when it breaks off.
    pub async fn consume(&self, mut stream: MessageStream) -> Result<(), IngestError> {
        while let Some(item) = stream.next().await {
            let message = item?;
            self.handle_message(&message).await;
        }
        Ok(())
    }

    /// Parses and indexes one message. Failures are logged and counted,
    /// never propagated.
    pub async fn handle_message(&self, message: &StreamMessage) -> MessageOutcome {
        self.stats.lock().await.messages_received += 1;

        let outcome = match event::parse(message) {
            Ok(None) => {
                tracing::trace!(event = message.kind(), "ignoring non-score event");
                MessageOutcome::Skipped
            }
            Err(e) => {
                tracing::warn!(error = %e, data = %message.data, "dropping malformed score event");
                MessageOutcome::ParseFailed
            }
            Ok(Some(event)) => match self.writer.write(&event).await {
                Ok(()) => MessageOutcome::Applied,
                Err(e) => {
                    tracing::error!(
                        student_id = %event.student_id,
                        exam_id = %event.exam_id,
                        index = %e.index,
                        error = %e,
                        "dropping score event"
                    );
                    MessageOutcome::WriteFailed
                }
            },
        };

        let mut stats = self.stats.lock().await;
        match outcome {
            MessageOutcome::Applied => {
                stats.events_applied += 1;
                stats.last_event_at = Some(Utc::now());
            }
            MessageOutcome::Skipped => stats.events_skipped += 1,
            MessageOutcome::ParseFailed => stats.parse_failures += 1,
            MessageOutcome::WriteFailed => stats.write_failures += 1,
        }
        outcome
    }
}
