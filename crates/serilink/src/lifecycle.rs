// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Connection lifecycle state machine.
//!
//! A strictly ordered forward machine driven by broker completion events:
//!
//! ```text
//! Disconnected -> Connecting -> ChannelOpening -> ExchangeDeclaring
//!              -> QueueDeclaring -> QueueBinding -> Ready
//! ```
//!
//! Each transition issues the next request; the nested completion
//! callbacks of the reference design are replaced by this enum plus a
//! single event-consuming control loop. On an unexpected close the machine
//! asks the loop to retry after a fixed delay with a fresh instance; a
//! deliberate close suppresses the retry and stops the loop instead.

use crate::broker::{BrokerCommand, BrokerEvent, Topology};
use std::time::Duration;

/// Delay before a reconnect attempt after an unexpected close.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    ChannelOpening,
    ExchangeDeclaring,
    QueueDeclaring,
    QueueBinding,
    Ready,
    Closing,
    Closed,
}

/// What the control loop should do after feeding an event to the machine.
#[derive(Debug, PartialEq, Eq)]
pub enum LifecycleStep {
    /// Issue this request and keep waiting for its completion.
    Issue(BrokerCommand),
    /// Setup is complete; the role loop may start publishing or consuming.
    Ready,
    /// Unexpected close: retry after the delay with a fresh machine.
    Reconnect { delay: Duration },
    /// Deliberate close completed; stop the loop.
    Stopped,
    /// Not a lifecycle transition in the current state.
    Ignored,
}

/// One connection attempt's lifecycle. Destroyed and recreated for every
/// reconnect; never moves backward.
#[derive(Debug)]
pub struct ConnectionLifecycle {
    state: ConnectionState,
    topology: Topology,
}

impl ConnectionLifecycle {
    pub fn new(topology: Topology) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            topology,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Ready
    }

    /// Begin connecting. Valid only from `Disconnected`.
    pub fn start(&mut self) -> BrokerCommand {
        log::info!("Connecting to broker");
        self.state = ConnectionState::Connecting;
        BrokerCommand::Connect
    }

    /// Feed one broker event to the machine.
    pub fn on_event(&mut self, event: &BrokerEvent) -> LifecycleStep {
        use ConnectionState::*;

        match (self.state, event) {
            (Connecting, BrokerEvent::Connected) => {
                log::info!("Connection opened");
                self.state = ChannelOpening;
                LifecycleStep::Issue(BrokerCommand::OpenChannel)
            }
            (ChannelOpening, BrokerEvent::ChannelOpened) => {
                log::info!("Channel opened");
                log::info!("Declaring exchange {}", self.topology.exchange);
                self.state = ExchangeDeclaring;
                LifecycleStep::Issue(BrokerCommand::DeclareExchange {
                    exchange: self.topology.exchange.clone(),
                    exchange_type: self.topology.exchange_type.clone(),
                })
            }
            (ExchangeDeclaring, BrokerEvent::ExchangeDeclared) => {
                log::info!("Exchange declared");
                log::info!("Declaring queue {}", self.topology.queue);
                self.state = QueueDeclaring;
                LifecycleStep::Issue(BrokerCommand::DeclareQueue {
                    queue: self.topology.queue.clone(),
                })
            }
            (QueueDeclaring, BrokerEvent::QueueDeclared) => {
                log::info!(
                    "Binding {} to {} with {}",
                    self.topology.exchange,
                    self.topology.queue,
                    self.topology.routing_key
                );
                self.state = QueueBinding;
                LifecycleStep::Issue(BrokerCommand::BindQueue {
                    queue: self.topology.queue.clone(),
                    exchange: self.topology.exchange.clone(),
                    routing_key: self.topology.routing_key.clone(),
                })
            }
            (QueueBinding, BrokerEvent::QueueBound) => {
                log::info!("Queue bound");
                self.state = Ready;
                LifecycleStep::Ready
            }
            (Closing, BrokerEvent::Closed { .. }) => {
                self.state = Closed;
                LifecycleStep::Stopped
            }
            (Closed, BrokerEvent::Closed { .. }) => LifecycleStep::Ignored,
            (_, BrokerEvent::Closed { reason }) => {
                log::warn!(
                    "Connection closed, reopening in {} seconds: {}",
                    RECONNECT_DELAY.as_secs(),
                    reason
                );
                self.state = Closed;
                LifecycleStep::Reconnect {
                    delay: RECONNECT_DELAY,
                }
            }
            (state, event) => {
                log::debug!("Ignoring {:?} in state {:?}", event, state);
                LifecycleStep::Ignored
            }
        }
    }

    /// Deliberate shutdown: the drain sequence, in order. The consumer
    /// subscription is cancelled first when one exists.
    pub fn begin_close(&mut self, cancel_consumer: bool) -> Vec<BrokerCommand> {
        log::info!("Stopping");
        self.state = ConnectionState::Closing;
        let mut commands = Vec::with_capacity(3);
        if cancel_consumer {
            commands.push(BrokerCommand::CancelConsumer);
        }
        commands.push(BrokerCommand::CloseChannel);
        commands.push(BrokerCommand::CloseConnection);
        commands
    }
}
