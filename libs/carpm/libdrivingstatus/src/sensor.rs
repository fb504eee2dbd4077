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

//! Read vehicle driving-status samples
//!

use anyhow::{bail, Result};
use async_trait::async_trait;
use log::{debug, info};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;

/// A driving-status sample: a bitmask of restrictions the current vehicle state imposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrivingStatus(pub i32);

impl DrivingStatus {
    /// No restriction. The vehicle is parked or otherwise safe for any interaction.
    pub const UNRESTRICTED: DrivingStatus = DrivingStatus(0);
    /// No video playback allowed.
    pub const NO_VIDEO: DrivingStatus = DrivingStatus(0x1);
    /// No text input allowed.
    pub const NO_KEYBOARD_INPUT: DrivingStatus = DrivingStatus(0x2);
    /// No voice input allowed.
    pub const NO_VOICE_INPUT: DrivingStatus = DrivingStatus(0x4);
    /// No setting or configuration changes allowed.
    pub const NO_CONFIG: DrivingStatus = DrivingStatus(0x8);
    /// Message length shown to the driver is limited.
    pub const LIMIT_MESSAGE_LEN: DrivingStatus = DrivingStatus(0x10);
    /// Every restriction above applies.
    pub const FULLY_RESTRICTED: DrivingStatus = DrivingStatus(0x1f);

    /// Whether any restriction is in effect.
    pub fn is_restricted(self) -> bool {
        self != Self::UNRESTRICTED
    }

    /// Whether every bit of `other` is set in this status.
    pub fn contains(self, other: DrivingStatus) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for DrivingStatus {
    fn default() -> Self {
        Self::UNRESTRICTED
    }
}

impl fmt::Display for DrivingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Asynchronous driving-status source operations.
#[async_trait]
pub trait AsyncDrivingStatusSource: Send + Sync {
    /// Starts delivering samples to `read`.
    fn subscribe(&self) -> Result<()>;

    /// Stops delivering samples. Samples published afterwards are only visible via `latest`.
    fn unsubscribe(&self);

    /// Returns the most recent sample, or `None` if the vehicle has not reported one yet.
    fn latest(&self) -> Option<DrivingStatus>;

    /// Waits for the next sample published while subscribed.
    async fn read(&self) -> Result<DrivingStatus>;
}

/// In-process driving-status source fed through `publish`.
///
/// Used where the vehicle HAL translation runs in the same process as the policy engine.
pub struct LocalDrivingStatusSource {
    latest: Mutex<Option<DrivingStatus>>,
    subscribed: AtomicBool,
    sender: mpsc::UnboundedSender<DrivingStatus>,
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<DrivingStatus>>,
}

impl LocalDrivingStatusSource {
    /// Creates a source that has not seen any sample yet.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            latest: Mutex::new(None),
            subscribed: AtomicBool::new(false),
            sender,
            receiver: tokio::sync::Mutex::new(receiver),
        }
    }

    /// Records a new sample and hands it to the subscriber, if any.
    pub fn publish(&self, status: DrivingStatus) {
        debug!("Driving status sample: {}", status);
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(status);
        if self.subscribed.load(Ordering::SeqCst) {
            // The receiver lives as long as `self`, so this cannot fail.
            let _ = self.sender.send(status);
        }
    }

    /// Whether a subscriber is currently registered.
    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::SeqCst)
    }
}

impl Default for LocalDrivingStatusSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AsyncDrivingStatusSource for LocalDrivingStatusSource {
    fn subscribe(&self) -> Result<()> {
        if !self.subscribed.swap(true, Ordering::SeqCst) {
            info!("Driving status subscriber registered");
        }
        Ok(())
    }

    fn unsubscribe(&self) {
        if self.subscribed.swap(false, Ordering::SeqCst) {
            info!("Driving status subscriber removed");
        }
        // Drop samples queued for the old subscriber.
        if let Ok(mut receiver) = self.receiver.try_lock() {
            while receiver.try_recv().is_ok() {}
        }
    }

    fn latest(&self) -> Option<DrivingStatus> {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn read(&self) -> Result<DrivingStatus> {
        let mut receiver = self.receiver.lock().await;
        match receiver.recv().await {
            Some(status) => Ok(status),
            None => bail!("Driving status channel closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restricted_bits() {
        assert!(!DrivingStatus::UNRESTRICTED.is_restricted());
        assert!(DrivingStatus::NO_VIDEO.is_restricted());
        assert!(DrivingStatus::FULLY_RESTRICTED.contains(DrivingStatus::NO_CONFIG));
        assert!(!DrivingStatus::NO_VIDEO.contains(DrivingStatus::NO_CONFIG));
        assert_eq!(DrivingStatus::default(), DrivingStatus::UNRESTRICTED);
    }

    #[tokio::test]
    async fn samples_only_delivered_while_subscribed() {
        let source = LocalDrivingStatusSource::new();
        assert_eq!(source.latest(), None);

        source.publish(DrivingStatus::NO_VIDEO);
        assert_eq!(source.latest(), Some(DrivingStatus::NO_VIDEO));

        source.subscribe().unwrap();
        source.publish(DrivingStatus::FULLY_RESTRICTED);
        assert_eq!(source.read().await.unwrap(), DrivingStatus::FULLY_RESTRICTED);

        source.unsubscribe();
        source.publish(DrivingStatus::UNRESTRICTED);
        assert_eq!(source.latest(), Some(DrivingStatus::UNRESTRICTED));

        source.subscribe().unwrap();
        source.publish(DrivingStatus::NO_CONFIG);
        assert_eq!(source.read().await.unwrap(), DrivingStatus::NO_CONFIG);
    }
}
