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

//! # Policy Engine
//!
//! Blocking entry point for hosts without their own Tokio runtime.
//!
//! The `CarPackagePolicyEngine` owns a runtime and the `CarPackageManager` running on it.

use crate::common::{AppBlockingControl, CallerIdentity, ComponentName};
use crate::config::CarPackageConfig;
use crate::error::Result;
use crate::package_info::CarAppBlockingPolicy;
use crate::package_manager::{CarPackageDependencies, CarPackageManager, PolicySnapshot};
use tokio::runtime::Runtime;

/// Synchronous wrapper around a `CarPackageManager`.
///
/// Its methods block, so they must not be called from within an async context.
pub struct CarPackagePolicyEngine {
    /// The embedded `CarPackageManager` that handles core logic.
    pub package_manager: CarPackageManager,
    /// The Tokio runtime for the CarPackageManager's async tasks.
    runtime: Runtime,
}

impl CarPackagePolicyEngine {
    /// Create a new CarPackagePolicyEngine and associated members.
    pub fn new(config: &CarPackageConfig, dependencies: CarPackageDependencies) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("Failed to create Tokio runtime for CarPackagePolicyEngine");
        let package_manager =
            runtime.block_on(async { CarPackageManager::new(config, dependencies) })?;

        Ok(Self { package_manager, runtime })
    }

    /// See `CarPackageManager::init`.
    pub fn init(&self) {
        self.package_manager.init();
    }

    /// See `CarPackageManager::release`.
    pub fn release(&self) {
        self.runtime.block_on(self.package_manager.release());
    }

    /// See `CarPackageManager::policy_snapshot`.
    pub fn policy_snapshot(&self) -> Result<PolicySnapshot> {
        self.runtime.block_on(self.package_manager.policy_snapshot())
    }

    /// Whether the latest driving status restricts activities.
    pub fn is_driving_restricted(&self) -> bool {
        self.package_manager.is_driving_restricted()
    }
}

impl AppBlockingControl for CarPackagePolicyEngine {
    fn set_app_blocking_policy(
        &self,
        caller: &CallerIdentity,
        client_id: &str,
        policy: Option<CarAppBlockingPolicy>,
        flags: u32,
    ) -> Result<()> {
        self.runtime.block_on(self.package_manager.set_app_blocking_policy(
            caller, client_id, policy, flags,
        ))
    }

    fn is_activity_allowed_while_driving(
        &self,
        package_name: &str,
        class_name: &str,
    ) -> Result<bool> {
        self.package_manager.is_activity_allowed_while_driving(package_name, class_name)
    }

    fn is_service_allowed_while_driving(&self, package_name: &str) -> Result<bool> {
        self.package_manager.is_service_allowed_while_driving(package_name)
    }

    fn is_activity_backed_by_safe_activity(&self, activity: &ComponentName) -> bool {
        self.package_manager.is_activity_backed_by_safe_activity(activity)
    }
}
