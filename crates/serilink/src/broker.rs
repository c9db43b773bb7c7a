// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Broker port seam.
//!
//! The broker's wire protocol is out of scope: it is assumed to offer
//! connect / open-channel / declare / bind / publish / consume / ack
//! primitives with asynchronous completion signals. Requests flow out as
//! [`BrokerCommand`]s through a channel handle; completions flow back as
//! [`BrokerEvent`]s on a companion channel, consumed by a single control
//! loop. A driver speaking the real broker protocol sits on the far side
//! of the channel pair; [`crate::sim::SimBroker`] is the in-process one.

use crate::delivery::ConfirmOutcome;
use std::fmt;
use tokio::sync::mpsc;

/// Fixed broker topology: one topic exchange, one durable queue, one
/// binding key. Configuration constants, not user input.
#[derive(Debug, Clone)]
pub struct Topology {
    pub exchange: String,
    pub exchange_type: String,
    pub queue: String,
    pub routing_key: String,
}

impl Default for Topology {
    fn default() -> Self {
        Self {
            exchange: "message".to_string(),
            exchange_type: "topic".to_string(),
            queue: "serial_data".to_string(),
            routing_key: "serial_data".to_string(),
        }
    }
}

/// Requests issued to the broker collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerCommand {
    Connect,
    OpenChannel,
    DeclareExchange {
        exchange: String,
        exchange_type: String,
    },
    DeclareQueue {
        queue: String,
    },
    BindQueue {
        queue: String,
        exchange: String,
        routing_key: String,
    },
    EnableConfirms,
    Publish {
        payload: String,
    },
    Consume {
        queue: String,
    },
    Ack {
        delivery_tag: u64,
    },
    CancelConsumer,
    CloseChannel,
    CloseConnection,
}

/// Completion signals from the broker collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    Connected,
    ChannelOpened,
    ExchangeDeclared,
    QueueDeclared,
    QueueBound,
    ConfirmsEnabled,
    Delivery { delivery_tag: u64, payload: String },
    Confirm { delivery_tag: u64, outcome: ConfirmOutcome },
    Closed { reason: String },
}

/// The broker command channel closed (driver gone).
#[derive(Debug)]
pub struct BrokerGone;

impl fmt::Display for BrokerGone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "broker command channel closed")
    }
}

impl std::error::Error for BrokerGone {}

/// Sending half of the broker port.
#[derive(Clone)]
pub struct BrokerHandle {
    tx: mpsc::Sender<BrokerCommand>,
}

impl BrokerHandle {
    pub fn new(tx: mpsc::Sender<BrokerCommand>) -> Self {
        Self { tx }
    }

    /// Create a connected handle/receiver pair for a driver.
    pub fn channel(depth: usize) -> (Self, mpsc::Receiver<BrokerCommand>) {
        let (tx, rx) = mpsc::channel(depth);
        (Self { tx }, rx)
    }

    /// Issue one request to the broker.
    pub async fn send(&self, command: BrokerCommand) -> Result<(), BrokerGone> {
        self.tx.send(command).await.map_err(|_| BrokerGone)
    }
}
