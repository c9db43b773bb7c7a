// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Serilink core — serial sensor line to cloud telemetry relay.
//!
//! Bridges a byte stream from a physical sensor line to a cloud telemetry
//! endpoint through an intermediate message broker. Raw readings are
//! encoded on the wire as decimal character codes, decoded back into a
//! structured record, packed into size-bounded batches, and forwarded with
//! acknowledgment only after successful hand-off downstream.
//!
//! ```text
//! raw bytes --> FrameDecoder --> text line --> Record --> BatchAccumulator
//!           --> RelayPipeline --> telemetry sink
//! ```
//!
//! The broker and the telemetry client are external collaborators reached
//! through channel port seams ([`broker`], [`sink`]); the connection
//! lifecycle toward the broker is an explicit state machine
//! ([`lifecycle`]) driven by completion events, and publish confirmations
//! are correlated by delivery tag ([`delivery`]). The producing and
//! consuming control loops live in [`publisher`] and [`consumer`].

pub mod batch;
pub mod broker;
pub mod config;
pub mod consumer;
pub mod delivery;
pub mod frame;
pub mod lifecycle;
pub mod pipeline;
pub mod publisher;
pub mod record;
pub mod sim;
pub mod sink;
pub mod source;

pub use batch::{BatchAccumulator, OverflowPolicy};
pub use broker::{BrokerCommand, BrokerEvent, BrokerHandle, Topology};
pub use config::{LogLevel, OperatingMode, RelayConfig};
pub use consumer::RelayConsumer;
pub use delivery::{ConfirmOutcome, DeliveryTracker};
pub use frame::FrameDecoder;
pub use lifecycle::{ConnectionLifecycle, ConnectionState};
pub use pipeline::{RelayOutcome, RelayPipeline};
pub use publisher::FramePublisher;
pub use record::Record;
pub use sink::TelemetryHandle;
