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

//! # Configuration
//!
//! Static settings of the car package manager, read from TOML.

use crate::common::ComponentName;
use crate::error::{CarPackageError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Component shown in place of an activity that is not allowed while driving.
pub const DEFAULT_ACTIVITY_BLOCKING_ACTIVITY: &str =
    "com.android.car/com.android.car.pm.ActivityBlockingActivity";

/// Default bound of the worker's task queue.
pub const DEFAULT_WORKER_QUEUE_SIZE: usize = 64;

/// Settings that drive activity blocking.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CarPackageConfig {
    /// Master switch. When off, init and release do nothing and every activity is backed by a
    /// safe one.
    pub enable_activity_blocking: bool,
    /// Flattened component of the blocking UI.
    pub activity_blocking_activity: String,
    /// Activities allowed while driving, as `pkg/cls,pkg,...`.
    pub default_activity_allowlist: String,
    /// How long to wait for policy services before firing the policy barrier anyway.
    pub policy_service_timeout_ms: Option<u64>,
    /// Bound of the worker's task queue.
    pub worker_queue_size: usize,
}

impl Default for CarPackageConfig {
    fn default() -> Self {
        Self {
            enable_activity_blocking: true,
            activity_blocking_activity: DEFAULT_ACTIVITY_BLOCKING_ACTIVITY.to_string(),
            default_activity_allowlist: String::new(),
            policy_service_timeout_ms: None,
            worker_queue_size: DEFAULT_WORKER_QUEUE_SIZE,
        }
    }
}

impl CarPackageConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| CarPackageError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            CarPackageError::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Checks the settings that cannot be expressed through types.
    pub fn validate(&self) -> Result<()> {
        self.blocking_activity()?;
        if self.worker_queue_size == 0 {
            return Err(CarPackageError::InvalidConfig(
                "worker_queue_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// The blocking UI component.
    pub fn blocking_activity(&self) -> Result<ComponentName> {
        ComponentName::unflatten_from_string(&self.activity_blocking_activity).ok_or_else(|| {
            CarPackageError::InvalidConfig(format!(
                "Invalid activity_blocking_activity {:?}",
                self.activity_blocking_activity
            ))
        })
    }

    /// Deadline for the initial policy services, if any.
    pub fn policy_service_timeout(&self) -> Option<Duration> {
        self.policy_service_timeout_ms.map(Duration::from_millis)
    }
}
