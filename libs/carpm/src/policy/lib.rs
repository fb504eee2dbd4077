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

//! # Car Package Policies
//!
//! This crate decides which applications may be shown while the vehicle is driving and
//! blocks the ones that may not.
//!
//! Policies come from three sources: a system allowlist derived from installed packages and
//! configuration, policy services discovered at startup, and clients calling the public API.
//! A background worker applies them and re-checks the top tasks whenever a policy or the
//! driving status changes.
//!
//! The primary entry points are `CarPackageManager` for async hosts and
//! `CarPackagePolicyEngine` for blocking ones.

/// Per-client allow and deny lists.
pub mod client_policy;
/// Shared data structures and the host service traits.
pub mod common;
/// TOML configuration.
pub mod config;
/// Tracks whether driving currently restricts activities.
pub mod driving_state;
/// Error type of the public API.
pub mod error;
/// Policy entries and installed package matching.
pub mod package_info;
/// Implements the worker and the async public API.
pub mod package_manager;
/// Provides the blocking public API.
pub mod policy_engine;
/// Connects to policy services.
pub mod policy_proxy;
/// Combined view over every policy source.
pub mod policy_store;
/// Builds the system allowlist.
pub mod system_allowlist;

pub use common::AppBlockingControl;
pub use config::CarPackageConfig;
pub use error::{CarPackageError, Result};
pub use package_manager::{CarPackageDependencies, CarPackageManager, PolicySnapshot};
pub use policy_engine::CarPackagePolicyEngine;
