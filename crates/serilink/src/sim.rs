// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process collaborators for tests, tools, and loopback runs.
//!
//! [`SimBroker`] drives the broker port contract over channels with an
//! in-memory queue: it completes each lifecycle step, confirms publishes,
//! and redelivers queued payloads to a consumer. It is a port driver for
//! local runs, not a broker implementation; a production deployment puts a
//! driver speaking the real broker protocol behind the same channel pair.
//!
//! The module also carries the mock sensor data generator used by the
//! frame simulator tool and the loopback feeds.

use crate::broker::{BrokerCommand, BrokerEvent, BrokerHandle};
use crate::delivery::ConfirmOutcome;
use crate::frame;
use crate::record;
use std::collections::VecDeque;
use tokio::sync::mpsc;

/// Headings of the fixed eight-field mock record.
pub const MOCK_HEADINGS: [&str; 8] = [
    "Total runtime",
    "FW ver",
    "Dev ID",
    "Type",
    "inputs",
    "state",
    "Sensor1",
    "Sensor2",
];

/// Flattened names-then-values row for one mock reading. Sensor values are
/// randomized; `timestamp` fills the `Total runtime` slot.
pub fn mock_fields(timestamp: &str) -> Vec<String> {
    let mut fields: Vec<String> = MOCK_HEADINGS.iter().map(|h| h.to_string()).collect();
    fields.push(timestamp.to_string());
    fields.push("V001".to_string());
    fields.push("0".to_string());
    fields.push("Sensor".to_string());
    fields.push("8".to_string());
    fields.push("Active".to_string());
    fields.push(fastrand::u32(0..=100).to_string());
    fields.push(fastrand::u32(0..=50).to_string());
    fields
}

/// One mock reading as a 16-field wire line.
pub fn mock_record_line(timestamp: &str) -> String {
    record::join_fields(&mock_fields(timestamp))
}

/// One mock reading as an encoded frame ready for the serial wire.
pub fn mock_frame(timestamp: &str) -> String {
    frame::encode_line(&mock_record_line(timestamp))
}

/// Client-side ends of a spawned [`SimBroker`].
pub struct SimBrokerParts {
    /// Command handle the control loop sends requests through.
    pub handle: BrokerHandle,
    /// Completion events for the control loop.
    pub events: mpsc::Receiver<BrokerEvent>,
    /// Tap of every published payload, in publish order.
    pub published: mpsc::UnboundedReceiver<String>,
    /// Injects payloads into the in-memory queue from outside.
    pub inject: mpsc::Sender<String>,
    /// The driver task.
    pub task: tokio::task::JoinHandle<()>,
}

/// In-process broker driver.
pub struct SimBroker {
    commands: mpsc::Receiver<BrokerCommand>,
    events: mpsc::Sender<BrokerEvent>,
    inject: mpsc::Receiver<String>,
    published_tap: mpsc::UnboundedSender<String>,
    queue: VecDeque<String>,
    consuming: bool,
    confirms: bool,
    next_delivery_tag: u64,
    next_confirm_tag: u64,
}

impl SimBroker {
    /// Spawn a sim driver with an empty queue.
    pub fn spawn(depth: usize) -> SimBrokerParts {
        Self::spawn_seeded(depth, Vec::new())
    }

    /// Spawn a sim driver whose queue already holds `seed` payloads.
    pub fn spawn_seeded(depth: usize, seed: Vec<String>) -> SimBrokerParts {
        let (handle, commands) = BrokerHandle::channel(depth);
        let (events_tx, events_rx) = mpsc::channel(depth);
        let (published_tap, published_rx) = mpsc::unbounded_channel();
        let (inject_tx, inject_rx) = mpsc::channel(depth);

        let broker = SimBroker {
            commands,
            events: events_tx,
            inject: inject_rx,
            published_tap,
            queue: seed.into(),
            consuming: false,
            confirms: false,
            next_delivery_tag: 0,
            next_confirm_tag: 0,
        };
        let task = tokio::spawn(broker.run());

        SimBrokerParts {
            handle,
            events: events_rx,
            published: published_rx,
            inject: inject_tx,
            task,
        }
    }

    async fn run(mut self) {
        let mut inject_open = true;
        loop {
            tokio::select! {
                maybe_cmd = self.commands.recv() => {
                    let Some(cmd) = maybe_cmd else { break };
                    if !self.handle_command(cmd).await {
                        break;
                    }
                }
                maybe_payload = self.inject.recv(), if inject_open => {
                    match maybe_payload {
                        Some(payload) => {
                            self.queue.push_back(payload);
                            if self.consuming && !self.deliver_pending().await {
                                break;
                            }
                        }
                        None => inject_open = false,
                    }
                }
            }
        }
        log::debug!("Sim broker driver stopped");
    }

    /// Returns false once the client side is gone.
    async fn handle_command(&mut self, cmd: BrokerCommand) -> bool {
        match cmd {
            BrokerCommand::Connect => self.send(BrokerEvent::Connected).await,
            BrokerCommand::OpenChannel => self.send(BrokerEvent::ChannelOpened).await,
            BrokerCommand::DeclareExchange { .. } => {
                self.send(BrokerEvent::ExchangeDeclared).await
            }
            BrokerCommand::DeclareQueue { .. } => self.send(BrokerEvent::QueueDeclared).await,
            BrokerCommand::BindQueue { .. } => self.send(BrokerEvent::QueueBound).await,
            BrokerCommand::EnableConfirms => {
                self.confirms = true;
                self.send(BrokerEvent::ConfirmsEnabled).await
            }
            BrokerCommand::Publish { payload } => {
                self.queue.push_back(payload.clone());
                let _ = self.published_tap.send(payload);
                if self.confirms {
                    self.next_confirm_tag += 1;
                    let confirm = BrokerEvent::Confirm {
                        delivery_tag: self.next_confirm_tag,
                        outcome: ConfirmOutcome::Ack,
                    };
                    if !self.send(confirm).await {
                        return false;
                    }
                }
                if self.consuming {
                    return self.deliver_pending().await;
                }
                true
            }
            BrokerCommand::Consume { .. } => {
                self.consuming = true;
                self.deliver_pending().await
            }
            BrokerCommand::Ack { delivery_tag } => {
                log::debug!("Delivery tag {} settled", delivery_tag);
                true
            }
            BrokerCommand::CancelConsumer => {
                self.consuming = false;
                true
            }
            BrokerCommand::CloseChannel => true,
            BrokerCommand::CloseConnection => {
                self.consuming = false;
                self.confirms = false;
                self.send(BrokerEvent::Closed {
                    reason: "connection closed by client".to_string(),
                })
                .await
            }
        }
    }

    async fn deliver_pending(&mut self) -> bool {
        while let Some(payload) = self.queue.pop_front() {
            self.next_delivery_tag += 1;
            let delivery = BrokerEvent::Delivery {
                delivery_tag: self.next_delivery_tag,
                payload,
            };
            if !self.send(delivery).await {
                return false;
            }
        }
        true
    }

    async fn send(&self, event: BrokerEvent) -> bool {
        self.events.send(event).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    #[test]
    fn test_mock_line_has_sixteen_fields() {
        let line = mock_record_line("2021-01-01 00:00:00");
        let record = Record::from_line(&line).expect("parse");
        assert_eq!(record.len(), 8);
        assert_eq!(record.get("FW ver"), Some("V001"));
        assert_eq!(record.get("Total runtime"), Some("2021-01-01 00:00:00"));
    }

    #[test]
    fn test_mock_frame_is_wire_encoded() {
        let frame = mock_frame("t");
        assert!(frame.ends_with("13 10"));
        assert!(frame
            .split(' ')
            .all(|t| t.parse::<u32>().is_ok()));
    }

    #[tokio::test]
    async fn test_sim_completes_lifecycle_steps() {
        let mut parts = SimBroker::spawn(16);

        parts.handle.send(BrokerCommand::Connect).await.expect("send");
        assert_eq!(parts.events.recv().await, Some(BrokerEvent::Connected));

        parts.handle.send(BrokerCommand::OpenChannel).await.expect("send");
        assert_eq!(parts.events.recv().await, Some(BrokerEvent::ChannelOpened));

        parts
            .handle
            .send(BrokerCommand::CloseConnection)
            .await
            .expect("send");
        assert!(matches!(
            parts.events.recv().await,
            Some(BrokerEvent::Closed { .. })
        ));
    }

    #[tokio::test]
    async fn test_sim_confirms_and_redelivers() {
        let mut parts = SimBroker::spawn(16);

        parts.handle.send(BrokerCommand::EnableConfirms).await.expect("send");
        assert_eq!(
            parts.events.recv().await,
            Some(BrokerEvent::ConfirmsEnabled)
        );

        parts
            .handle
            .send(BrokerCommand::Publish {
                payload: "97 13 10".to_string(),
            })
            .await
            .expect("send");

        assert_eq!(
            parts.events.recv().await,
            Some(BrokerEvent::Confirm {
                delivery_tag: 1,
                outcome: ConfirmOutcome::Ack,
            })
        );
        assert_eq!(parts.published.recv().await, Some("97 13 10".to_string()));

        parts
            .handle
            .send(BrokerCommand::Consume {
                queue: "serial_data".to_string(),
            })
            .await
            .expect("send");
        assert_eq!(
            parts.events.recv().await,
            Some(BrokerEvent::Delivery {
                delivery_tag: 1,
                payload: "97 13 10".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_sim_delivers_injected_payloads() {
        let mut parts = SimBroker::spawn(16);

        parts
            .handle
            .send(BrokerCommand::Consume {
                queue: "serial_data".to_string(),
            })
            .await
            .expect("send");

        parts.inject.send("97 13 10".to_string()).await.expect("inject");
        assert_eq!(
            parts.events.recv().await,
            Some(BrokerEvent::Delivery {
                delivery_tag: 1,
                payload: "97 13 10".to_string(),
            })
        );
    }
}
