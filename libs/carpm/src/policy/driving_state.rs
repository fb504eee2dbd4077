// Copyright (C) 2025 The Android Open Source Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Driving State
//!
//! Holds the latest driving status and answers whether activities are restricted.

use drivingstatus::sensor::DrivingStatus;
use log::info;
use std::sync::{Mutex, PoisonError};

/// Latest driving status, readable from any thread.
///
/// Starts out unrestricted so nothing is blocked before the vehicle reports a status.
#[derive(Debug, Default)]
pub struct DrivingStateGate {
    latest: Mutex<DrivingStatus>,
}

impl DrivingStateGate {
    /// Creates an unrestricted gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the latest status restricts activities.
    pub fn is_restricted(&self) -> bool {
        self.latest().is_restricted()
    }

    /// The latest status.
    pub fn latest(&self) -> DrivingStatus {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a sample and returns whether it is restricted.
    pub fn update(&self, status: DrivingStatus) -> bool {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        if *latest != status {
            info!("Driving status: {} -> {}", *latest, status);
        }
        *latest = status;
        status.is_restricted()
    }

    /// Resets to the source's latest sample, treating a missing sample as unrestricted.
    pub fn reset(&self, latest: Option<DrivingStatus>) -> bool {
        self.update(latest.unwrap_or(DrivingStatus::UNRESTRICTED))
    }
}
