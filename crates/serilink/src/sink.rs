// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Telemetry sink port seam.
//!
//! The cloud client is assumed to offer an asynchronous
//! publish-with-callback primitive. Handing a payload to its queue is the
//! "forward call has been issued" point the pipeline acknowledges against;
//! completion is not awaited, so delivery is at-least-once rather than
//! exactly-once.

use std::fmt;
use tokio::sync::mpsc;

/// One payload bound for the telemetry endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryPublish {
    pub topic: String,
    pub payload: String,
}

/// The telemetry client channel closed.
#[derive(Debug)]
pub struct SinkGone;

impl fmt::Display for SinkGone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "telemetry sink channel closed")
    }
}

impl std::error::Error for SinkGone {}

/// Sending half of the telemetry port.
#[derive(Clone)]
pub struct TelemetryHandle {
    tx: mpsc::Sender<TelemetryPublish>,
}

impl TelemetryHandle {
    pub fn new(tx: mpsc::Sender<TelemetryPublish>) -> Self {
        Self { tx }
    }

    /// Create a connected handle/receiver pair for a client driver.
    pub fn channel(depth: usize) -> (Self, mpsc::Receiver<TelemetryPublish>) {
        let (tx, rx) = mpsc::channel(depth);
        (Self { tx }, rx)
    }

    /// Issue one publish toward the telemetry endpoint.
    pub async fn publish(&self, topic: &str, payload: String) -> Result<(), SinkGone> {
        self.tx
            .send(TelemetryPublish {
                topic: topic.to_string(),
                payload,
            })
            .await
            .map_err(|_| SinkGone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_the_driver() {
        let (handle, mut rx) = TelemetryHandle::channel(4);
        handle.publish("telemetry/t", "{}".to_string()).await.expect("publish");

        let sent = rx.recv().await.expect("recv");
        assert_eq!(sent.topic, "telemetry/t");
        assert_eq!(sent.payload, "{}");
    }

    #[tokio::test]
    async fn test_publish_after_driver_drop_fails() {
        let (handle, rx) = TelemetryHandle::channel(4);
        drop(rx);
        assert!(handle.publish("t", String::new()).await.is_err());
    }
}
