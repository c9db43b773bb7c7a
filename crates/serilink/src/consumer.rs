// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Consuming-side control loop.
//!
//! Drives the connection lifecycle to Ready, starts consuming, and feeds
//! every delivery to the relay pipeline. Tags the pipeline reports are
//! acknowledged back to the broker; parse failures are logged and left
//! unacknowledged for redelivery. Reconnect and stop semantics match the
//! producing side: serialized reconnects, stopping flag checked before
//! every reconnect decision, close sequence drained before exit.

use crate::broker::{BrokerCommand, BrokerEvent, BrokerGone, BrokerHandle, Topology};
use crate::lifecycle::{ConnectionLifecycle, LifecycleStep};
use crate::pipeline::RelayPipeline;
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

/// Broker deliveries to telemetry sink relaying.
pub struct RelayConsumer {
    broker: BrokerHandle,
    events: mpsc::Receiver<BrokerEvent>,
    pipeline: RelayPipeline,
    topology: Topology,
    shutdown: Arc<Notify>,
}

impl RelayConsumer {
    pub fn new(
        broker: BrokerHandle,
        events: mpsc::Receiver<BrokerEvent>,
        pipeline: RelayPipeline,
        topology: Topology,
        shutdown: Arc<Notify>,
    ) -> Self {
        Self {
            broker,
            events,
            pipeline,
            topology,
            shutdown,
        }
    }

    /// Run until a deliberate stop completes or the broker driver goes
    /// away. The pipeline (and any open batch) survives reconnects;
    /// unacknowledged deliveries are redelivered by the broker.
    pub async fn run(self) -> Result<(), BrokerGone> {
        let RelayConsumer {
            broker,
            mut events,
            mut pipeline,
            topology,
            shutdown,
        } = self;

        let mut stopping = false;

        'connection: loop {
            let mut lifecycle = ConnectionLifecycle::new(topology.clone());
            broker.send(lifecycle.start()).await?;

            loop {
                tokio::select! {
                    maybe_event = events.recv() => {
                        let Some(event) = maybe_event else {
                            return Err(BrokerGone);
                        };
                        match event {
                            BrokerEvent::Delivery { delivery_tag, payload } => {
                                log::info!("Received message # {}", delivery_tag);
                                match pipeline.on_delivery(delivery_tag, &payload).await {
                                    Ok(outcome) => {
                                        for tag in outcome.acked_tags() {
                                            log::info!("Acknowledging message {}", tag);
                                            broker
                                                .send(BrokerCommand::Ack { delivery_tag: *tag })
                                                .await?;
                                        }
                                    }
                                    Err(e) => {
                                        log::error!(
                                            "Failed to relay message # {}: {}",
                                            delivery_tag,
                                            e
                                        );
                                    }
                                }
                            }
                            other => match lifecycle.on_event(&other) {
                                LifecycleStep::Issue(command) => broker.send(command).await?,
                                LifecycleStep::Ready => {
                                    broker
                                        .send(BrokerCommand::Consume {
                                            queue: topology.queue.clone(),
                                        })
                                        .await?;
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
                    _ = shutdown.notified(), if !stopping => {
                        stopping = true;
                        for command in lifecycle.begin_close(true) {
                            broker.send(command).await?;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::encode_line;
    use crate::lifecycle::RECONNECT_DELAY;
    use crate::sink::TelemetryHandle;

    const SAMPLE_LINE: &str = "Total runtime,FW ver,Dev ID,Type,inputs,state,Sensor1,Sensor2,\
                               2021-01-01T00:00:00,V001,0,Sensor,8,Active,42,7";

    /// Walk a scripted broker through the setup sequence.
    async fn complete_setup(
        commands: &mut mpsc::Receiver<BrokerCommand>,
        events: &mpsc::Sender<BrokerEvent>,
    ) {
        assert_eq!(commands.recv().await, Some(BrokerCommand::Connect));
        events.send(BrokerEvent::Connected).await.expect("event");
        assert_eq!(commands.recv().await, Some(BrokerCommand::OpenChannel));
        events.send(BrokerEvent::ChannelOpened).await.expect("event");
        assert!(matches!(
            commands.recv().await,
            Some(BrokerCommand::DeclareExchange { .. })
        ));
        events
            .send(BrokerEvent::ExchangeDeclared)
            .await
            .expect("event");
        assert!(matches!(
            commands.recv().await,
            Some(BrokerCommand::DeclareQueue { .. })
        ));
        events.send(BrokerEvent::QueueDeclared).await.expect("event");
        assert!(matches!(
            commands.recv().await,
            Some(BrokerCommand::BindQueue { .. })
        ));
        events.send(BrokerEvent::QueueBound).await.expect("event");
        assert!(matches!(
            commands.recv().await,
            Some(BrokerCommand::Consume { .. })
        ));
    }

    fn scripted_consumer() -> (
        mpsc::Receiver<BrokerCommand>,
        mpsc::Sender<BrokerEvent>,
        mpsc::Receiver<crate::sink::TelemetryPublish>,
        Arc<Notify>,
        tokio::task::JoinHandle<Result<(), BrokerGone>>,
    ) {
        let (handle, commands) = BrokerHandle::channel(32);
        let (events_tx, events_rx) = mpsc::channel(32);
        let (sink, sink_rx) = TelemetryHandle::channel(32);
        let shutdown = Arc::new(Notify::new());

        let consumer = RelayConsumer::new(
            handle,
            events_rx,
            RelayPipeline::new("telemetry/t".to_string(), sink, None),
            Topology::default(),
            shutdown.clone(),
        );
        let task = tokio::spawn(consumer.run());
        (commands, events_tx, sink_rx, shutdown, task)
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivery_is_relayed_and_acked() {
        let (mut commands, events, mut sink_rx, shutdown, task) = scripted_consumer();
        complete_setup(&mut commands, &events).await;

        events
            .send(BrokerEvent::Delivery {
                delivery_tag: 1,
                payload: encode_line(SAMPLE_LINE),
            })
            .await
            .expect("event");

        let forwarded = sink_rx.recv().await.expect("forwarded");
        assert!(forwarded.payload.starts_with('{'));
        assert_eq!(
            commands.recv().await,
            Some(BrokerCommand::Ack { delivery_tag: 1 })
        );

        shutdown.notify_one();
        assert_eq!(commands.recv().await, Some(BrokerCommand::CancelConsumer));
        assert_eq!(commands.recv().await, Some(BrokerCommand::CloseChannel));
        assert_eq!(commands.recv().await, Some(BrokerCommand::CloseConnection));
        events
            .send(BrokerEvent::Closed {
                reason: "closed by client".to_string(),
            })
            .await
            .expect("event");

        task.await.expect("join").expect("run");
        assert_eq!(commands.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unparseable_delivery_is_not_acked() {
        let (mut commands, events, _sink_rx, shutdown, task) = scripted_consumer();
        complete_setup(&mut commands, &events).await;

        events
            .send(BrokerEvent::Delivery {
                delivery_tag: 1,
                payload: "a,b,c".to_string(),
            })
            .await
            .expect("event");

        // The next command must be the close sequence, not an ack.
        shutdown.notify_one();
        assert_eq!(commands.recv().await, Some(BrokerCommand::CancelConsumer));
        assert_eq!(commands.recv().await, Some(BrokerCommand::CloseChannel));
        assert_eq!(commands.recv().await, Some(BrokerCommand::CloseConnection));
        events
            .send(BrokerEvent::Closed {
                reason: "closed by client".to_string(),
            })
            .await
            .expect("event");
        task.await.expect("join").expect("run");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_close_reconnects_after_delay() {
        let (mut commands, events, _sink_rx, shutdown, task) = scripted_consumer();
        complete_setup(&mut commands, &events).await;

        events
            .send(BrokerEvent::Closed {
                reason: "broker went away".to_string(),
            })
            .await
            .expect("event");

        // A fresh attempt starts after the fixed delay (auto-advanced).
        let started = tokio::time::Instant::now();
        assert_eq!(commands.recv().await, Some(BrokerCommand::Connect));
        assert!(started.elapsed() >= RECONNECT_DELAY);

        shutdown.notify_one();
        assert_eq!(commands.recv().await, Some(BrokerCommand::CancelConsumer));
        assert_eq!(commands.recv().await, Some(BrokerCommand::CloseChannel));
        assert_eq!(commands.recv().await, Some(BrokerCommand::CloseConnection));
        events
            .send(BrokerEvent::Closed {
                reason: "closed by client".to_string(),
            })
            .await
            .expect("event");
        task.await.expect("join").expect("run");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_reconnect_terminates_without_new_attempt() {
        let (mut commands, events, _sink_rx, shutdown, task) = scripted_consumer();
        complete_setup(&mut commands, &events).await;

        events
            .send(BrokerEvent::Closed {
                reason: "broker went away".to_string(),
            })
            .await
            .expect("event");
        shutdown.notify_one();

        // Depending on which signal the loop sees first it either returns
        // straight from the reconnect decision or drains the close
        // sequence; in neither case may a new connection attempt start.
        let mut remaining = Vec::new();
        while let Some(command) = commands.recv().await {
            if command == BrokerCommand::CloseConnection {
                // The loop may already have consumed the earlier close.
                let _ = events
                    .send(BrokerEvent::Closed {
                        reason: "closed by client".to_string(),
                    })
                    .await;
            }
            remaining.push(command);
        }
        assert!(!remaining.contains(&BrokerCommand::Connect));

        task.await.expect("join").expect("run");
    }
}
