// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Producing-side control loop.
//!
//! Drives the connection lifecycle to Ready, enables delivery
//! confirmations, then publishes one frame from the serial queue per
//! publish interval. Confirmation events feed the delivery tracker, which
//! is recreated per connection. Reconnects are serialized and checked
//! against the stopping flag; a deliberate stop drains the close sequence
//! before the loop exits.

use crate::broker::{BrokerCommand, BrokerEvent, BrokerGone, BrokerHandle, Topology};
use crate::delivery::{ConfirmOutcome, DeliveryTracker};
use crate::lifecycle::{ConnectionLifecycle, LifecycleStep};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::time::MissedTickBehavior;

/// Serial frames to broker publishes with delivery confirmations.
pub struct FramePublisher {
    broker: BrokerHandle,
    events: mpsc::Receiver<BrokerEvent>,
    frames: mpsc::Receiver<String>,
    topology: Topology,
    publish_interval: Duration,
    shutdown: Arc<Notify>,
}

impl FramePublisher {
    pub fn new(
        broker: BrokerHandle,
        events: mpsc::Receiver<BrokerEvent>,
        frames: mpsc::Receiver<String>,
        topology: Topology,
        publish_interval: Duration,
        shutdown: Arc<Notify>,
    ) -> Self {
        Self {
            broker,
            events,
            frames,
            topology,
            publish_interval,
            shutdown,
        }
    }

    /// Run until a deliberate stop completes or the broker driver goes
    /// away. A zero publish interval publishes as fast as frames arrive.
    pub async fn run(self) -> Result<(), BrokerGone> {
        let FramePublisher {
            broker,
            mut events,
            mut frames,
            topology,
            publish_interval,
            shutdown,
        } = self;

        let mut stopping = false;
        let tick_period = if publish_interval.is_zero() {
            Duration::from_millis(1)
        } else {
            publish_interval
        };

        'connection: loop {
            let mut lifecycle = ConnectionLifecycle::new(topology.clone());
            let mut tracker = DeliveryTracker::new();
            broker.send(lifecycle.start()).await?;

            let mut ticker = tokio::time::interval(tick_period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    maybe_event = events.recv() => {
                        let Some(event) = maybe_event else {
                            return Err(BrokerGone);
                        };
                        match event {
                            BrokerEvent::Confirm { delivery_tag, outcome } => {
                                let kind = match outcome {
                                    ConfirmOutcome::Ack => "ack",
                                    ConfirmOutcome::Nack => "nack",
                                };
                                log::info!("Received {} for delivery tag: {}", kind, delivery_tag);
                                tracker.on_confirm(delivery_tag, outcome);
                                log::info!(
                                    "Published {} messages, {} have yet to be confirmed, \
                                     {} were acked and {} were nacked",
                                    tracker.published(),
                                    tracker.in_flight(),
                                    tracker.acked(),
                                    tracker.nacked()
                                );
                            }
                            // The publisher does not consume.
                            BrokerEvent::Delivery { .. } => {}
                            other => match lifecycle.on_event(&other) {
                                LifecycleStep::Issue(command) => broker.send(command).await?,
                                LifecycleStep::Ready => {
                                    log::info!("Issuing Confirm.Select RPC command");
                                    broker.send(BrokerCommand::EnableConfirms).await?;
                                }
                                LifecycleStep::Reconnect { delay } => {
                                    if stopping {
                                        log::info!("Stopped");
                                        return Ok(());
                                    }
                                    tokio::select! {
                                        _ = tokio::time::sleep(delay) => {}
                                        _ = shutdown.notified() => {
                                            stopping = true;
                                        }
                                    }
                                    if stopping {
                                        log::info!("Stopped");
                                        return Ok(());
                                    }
                                    continue 'connection;
                                }
                                LifecycleStep::Stopped => {
                                    log::info!("Stopped");
                                    return Ok(());
                                }
                                LifecycleStep::Ignored => {}
                            },
                        }
                    }
                    _ = ticker.tick(), if lifecycle.is_ready() && !stopping => {
                        while let Ok(frame) = frames.try_recv() {
                            broker.send(BrokerCommand::Publish { payload: frame }).await?;
                            let tag = tracker.on_publish();
                            log::info!("Published message # {}", tag);
                            if !publish_interval.is_zero() {
                                break;
                            }
                        }
                    }
                    _ = shutdown.notified(), if !stopping => {
                        stopping = true;
                        for command in lifecycle.begin_close(false) {
                            broker.send(command).await?;
                        }
                    }
                }
            }
        }
    }
}
