// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Consuming-side per-message orchestration.
//!
//! For every inbound broker delivery: decode the frame if it is still
//! wire-encoded, transcode it to a JSON record, then either forward it
//! immediately (batching disabled) or run it through the batch
//! accumulator. Delivery tags are reported for acknowledgment only once
//! the forward call toward the telemetry sink has been issued.

use crate::batch::{BatchAccumulator, BatchAdd};
use crate::frame;
use crate::record::{ParseError, Record};
use crate::sink::{SinkGone, TelemetryHandle};
use std::fmt;

/// Relay errors surfaced per delivery.
#[derive(Debug)]
pub enum RelayError {
    /// The line had too few fields to transcode.
    Parse(ParseError),
    /// JSON rendering failed.
    Render(serde_json::Error),
    /// The record hit the batch limit under the reject policy.
    BatchOverflow { record: String },
    /// The telemetry client channel closed.
    SinkClosed,
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::Parse(e) => write!(f, "parse error: {}", e),
            RelayError::Render(e) => write!(f, "render error: {}", e),
            RelayError::BatchOverflow { record } => {
                write!(f, "record of {} bytes rejected by full batch", record.len())
            }
            RelayError::SinkClosed => write!(f, "telemetry sink channel closed"),
        }
    }
}

impl std::error::Error for RelayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RelayError::Parse(e) => Some(e),
            RelayError::Render(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ParseError> for RelayError {
    fn from(e: ParseError) -> Self {
        RelayError::Parse(e)
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::Render(e)
    }
}

impl From<SinkGone> for RelayError {
    fn from(_: SinkGone) -> Self {
        RelayError::SinkClosed
    }
}

/// What happened to one inbound delivery.
#[derive(Debug, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Forwarded immediately (batching disabled); acknowledge these tags.
    Forwarded { acked: Vec<u64> },
    /// Added to the open batch; its tag is parked until the batch ships.
    Buffered,
    /// The record hit the size limit; `retained` says whether the policy
    /// carried it into the next cycle. Its tag stays unacknowledged unless
    /// retained.
    Overflowed { retained: bool },
    /// Arrival while full shipped the existing batch (the arriving record
    /// itself is not part of it); acknowledge these tags.
    FlushedBatch { acked: Vec<u64>, members: usize },
}

impl RelayOutcome {
    /// Tags to acknowledge now.
    pub fn acked_tags(&self) -> &[u64] {
        match self {
            RelayOutcome::Forwarded { acked } => acked,
            RelayOutcome::FlushedBatch { acked, .. } => acked,
            _ => &[],
        }
    }
}

/// Per-message relay pipeline for the consuming side.
pub struct RelayPipeline {
    topic: String,
    sink: TelemetryHandle,
    batch: Option<BatchAccumulator>,
    pending_tags: Vec<u64>,
    carried_tag: Option<u64>,
}

impl RelayPipeline {
    /// `batch` of `None` disables batching (every record is forwarded on
    /// its own, as a zero-size configuration does).
    pub fn new(topic: String, sink: TelemetryHandle, batch: Option<BatchAccumulator>) -> Self {
        Self {
            topic,
            sink,
            batch,
            pending_tags: Vec::new(),
            carried_tag: None,
        }
    }

    pub fn is_batching(&self) -> bool {
        self.batch.is_some()
    }

    /// Handle one inbound broker delivery.
    pub async fn on_delivery(
        &mut self,
        delivery_tag: u64,
        payload: &str,
    ) -> Result<RelayOutcome, RelayError> {
        let line = if is_wire_encoded(payload) {
            frame::decode_tokens(payload)
        } else {
            payload.trim_end_matches(&['\r', '\n'][..]).to_string()
        };
        let serialized = Record::from_line(&line)?.to_json()?;

        let Some(batch) = self.batch.as_mut() else {
            log::info!("Publishing single message to target topic");
            self.sink.publish(&self.topic, serialized).await?;
            return Ok(RelayOutcome::Forwarded {
                acked: vec![delivery_tag],
            });
        };

        if batch.is_full() {
            // Ship the existing batch; the arriving record is not added to
            // it and is not guaranteed inclusion in the next one.
            log::info!("Publishing a batch message to target topic");
            let members = batch.len();
            let rendered = batch.render();
            self.sink.publish(&self.topic, rendered).await?;

            let mut acked = std::mem::take(&mut self.pending_tags);
            acked.push(delivery_tag);
            batch.reset();
            if let Some(tag) = self.carried_tag.take() {
                self.pending_tags.push(tag);
            }
            return Ok(RelayOutcome::FlushedBatch { acked, members });
        }

        match batch.try_add(serialized) {
            BatchAdd::Added => {
                self.pending_tags.push(delivery_tag);
                Ok(RelayOutcome::Buffered)
            }
            BatchAdd::Overflow(Some(record)) => Err(RelayError::BatchOverflow { record }),
            BatchAdd::Overflow(None) => {
                let retained = batch.has_carry();
                if retained {
                    self.carried_tag = Some(delivery_tag);
                } else {
                    log::warn!(
                        "Batch full, dropping overflowing record for delivery tag {}",
                        delivery_tag
                    );
                }
                Ok(RelayOutcome::Overflowed { retained })
            }
        }
    }
}

/// A payload is still wire-encoded when it consists solely of decimal
/// tokens and spaces.
fn is_wire_encoded(payload: &str) -> bool {
    !payload.is_empty() && payload.chars().all(|c| c.is_ascii_digit() || c == ' ')
}
