// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Single-flight admission control
//!
//! Local inference is memory and CPU heavy. Running two at once on a small host
//! risks the OOM killer taking the whole process, so overlapping requests are
//! rejected immediately instead of queued. Callers retry.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Number of inferences allowed in flight at once
pub const MAX_IN_FLIGHT: usize = 1;

/// Gate that admits at most one request at a time
#[derive(Debug, Clone)]
pub struct AdmissionController {
    slots: Arc<Semaphore>,
}

/// Proof of holding the in-flight slot; the slot is freed when this is dropped
#[derive(Debug)]
#[must_use = "the slot is released as soon as the permit is dropped"]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionController {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Semaphore::new(MAX_IN_FLIGHT)),
        }
    }

    /// Take the slot without waiting. `None` means another request holds it.
    pub fn try_acquire(&self) -> Option<AdmissionPermit> {
        self.slots
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| AdmissionPermit { _permit: permit })
    }

    pub fn is_busy(&self) -> bool {
        self.slots.available_permits() == 0
    }
}

impl Default for AdmissionController {
    fn default() -> Self {
        Self::new()
    }
}

impl AdmissionPermit {
    /// Give the slot back now rather than at end of scope
    pub fn release(self) {}
}
