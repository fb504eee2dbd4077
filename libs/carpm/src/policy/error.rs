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

//! # Errors
//!
//! Errors surfaced to callers of the car package manager.

use thiserror::Error;

/// Failures reported by the public policy API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CarPackageError {
    /// The caller lacks a required permission or acts on behalf of another package.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A name, policy or flag combination is missing or contradictory.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The host package database could not be reached.
    #[error("package database not ready: {0}")]
    NotReady(String),

    /// A policy provider could not be bound or produced no policy.
    #[error("policy provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The supplied configuration cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The policy worker is no longer running.
    #[error("car package manager worker stopped")]
    ServiceStopped,
}

/// Result alias for the public policy API.
pub type Result<T> = std::result::Result<T, CarPackageError>;

pub(crate) fn invalid_argument(message: impl Into<String>) -> CarPackageError {
    CarPackageError::InvalidArgument(message.into())
}
