// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Size-bounded batching of serialized records into a JSON array.
//!
//! Members are trusted to already be valid JSON text; the accumulator
//! never re-parses them. The rendered form is `[` + join(`,`) + `]`, and
//! the configured byte limit applies to that rendered form.

use serde::{Deserialize, Serialize};

/// Default rendered-size limit in bytes (10 KiB).
pub const DEFAULT_MAX_BYTES: usize = 10_240;

/// Hard ceiling on the rendered-size limit (128 KiB). Configured values
/// above this are silently clamped.
pub const MAX_BYTES_CEILING: usize = 131_072;

/// What to do with the record whose addition would exceed the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Discard the candidate record (the reference behavior).
    #[default]
    DropNewest,
    /// Hold the candidate and seed the next accumulation cycle with it.
    RetainForNext,
    /// Hand the candidate back to the caller.
    Reject,
}

/// Outcome of one [`BatchAccumulator::try_add`] call.
#[derive(Debug, PartialEq, Eq)]
pub enum BatchAdd {
    Added,
    /// The limit was reached. Carries the candidate record back only under
    /// [`OverflowPolicy::Reject`].
    Overflow(Option<String>),
}

/// Accumulates serialized records into a byte-size-bounded JSON array.
#[derive(Debug)]
pub struct BatchAccumulator {
    members: Vec<String>,
    full: bool,
    max_bytes: usize,
    policy: OverflowPolicy,
    carried: Option<String>,
}

impl BatchAccumulator {
    /// Create an accumulator with the default overflow policy.
    pub fn new(max_bytes: usize) -> Self {
        Self::with_policy(max_bytes, OverflowPolicy::default())
    }

    pub fn with_policy(max_bytes: usize, policy: OverflowPolicy) -> Self {
        let max_bytes = if max_bytes < MAX_BYTES_CEILING {
            max_bytes
        } else {
            MAX_BYTES_CEILING
        };
        Self {
            members: Vec::new(),
            full: false,
            max_bytes,
            policy,
            carried: None,
        }
    }

    /// Effective limit after clamping.
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether the last overflow left a record carried to the next cycle.
    pub fn has_carry(&self) -> bool {
        self.carried.is_some()
    }

    /// Size of the rendered array in bytes.
    pub fn rendered_len(&self) -> usize {
        let commas = self.members.len().saturating_sub(1);
        2 + self.members.iter().map(String::len).sum::<usize>() + commas
    }

    /// Append a serialized record if the rendered size stays within the
    /// limit; otherwise mark the batch full and apply the overflow policy
    /// to the candidate.
    pub fn try_add(&mut self, record: String) -> BatchAdd {
        if self.rendered_len() + record.len() <= self.max_bytes {
            self.members.push(record);
            log::debug!("Batch size: {}", self.rendered_len());
            BatchAdd::Added
        } else {
            self.full = true;
            match self.policy {
                OverflowPolicy::DropNewest => BatchAdd::Overflow(None),
                OverflowPolicy::RetainForNext => {
                    self.carried = Some(record);
                    BatchAdd::Overflow(None)
                }
                OverflowPolicy::Reject => BatchAdd::Overflow(Some(record)),
            }
        }
    }

    /// Render the batch as a JSON array.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.rendered_len());
        out.push('[');
        out.push_str(&self.members.join(","));
        out.push(']');
        out
    }

    /// Clear members and the full flag, seeding the next cycle with the
    /// carried record when the policy retained one.
    pub fn reset(&mut self) {
        self.members.clear();
        self.full = false;
        if let Some(record) = self.carried.take() {
            self.try_add(record);
        }
    }
}
