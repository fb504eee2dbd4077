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

//! # Package Descriptors
//!
//! Allow and deny entries of app blocking policies, and the check that decides whether an
//! entry describes the package actually installed.

use crate::common::{PackageDatabase, Signature};
use crate::error::{invalid_argument, CarPackageError, Result};
use log::warn;

/// Signatures are not checked when the installed package is a system or updated system app.
pub const FLAG_SYSTEM_APP_TRUSTED: u32 = 0x1;
/// Every activity of the package is covered.
pub const FLAG_WHOLE_ACTIVITY_ALLOWED: u32 = 0x2;

/// The caller returns only after the policy has been applied.
pub const FLAG_SET_POLICY_WAIT_FOR_CHANGE: u32 = 0x1;
/// Add the lists to the existing policy of the client.
pub const FLAG_SET_POLICY_ADD: u32 = 0x2;
/// Remove the listed packages from the existing policy of the client.
pub const FLAG_SET_POLICY_REMOVE: u32 = 0x4;

/// One package entry of an app blocking policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppBlockingPackageInfo {
    /// Package the entry applies to.
    pub package_name: String,
    /// Exclusive lower version bound; 0 leaves it open.
    pub min_revision_code: i32,
    /// Exclusive upper version bound; 0 leaves it open.
    pub max_revision_code: i32,
    /// `FLAG_SYSTEM_APP_TRUSTED` and `FLAG_WHOLE_ACTIVITY_ALLOWED`.
    pub flags: u32,
    /// Accepted signing certificates.
    pub signatures: Option<Vec<Signature>>,
    /// Covered activity class names.
    pub activities: Option<Vec<String>>,
}

impl AppBlockingPackageInfo {
    /// Creates an entry.
    pub fn new(
        package_name: impl Into<String>,
        min_revision_code: i32,
        max_revision_code: i32,
        flags: u32,
        signatures: Option<Vec<Signature>>,
        activities: Option<Vec<String>>,
    ) -> Self {
        Self {
            package_name: package_name.into(),
            min_revision_code,
            max_revision_code,
            flags,
            signatures,
            activities,
        }
    }

    /// Checks that the entry is well formed.
    pub fn verify(&self) -> Result<()> {
        if self.package_name.is_empty() {
            return Err(invalid_argument("package name cannot be empty"));
        }
        if !self.is_system_app_trusted() && self.signatures.as_ref().map_or(true, Vec::is_empty) {
            return Err(invalid_argument(format!(
                "{}: non-system entry requires signatures",
                self.package_name
            )));
        }
        if self.is_whole_activity_allowed() && self.activities.as_ref().is_some_and(|a| !a.is_empty())
        {
            return Err(invalid_argument(format!(
                "{}: whole activity flag with explicit activities",
                self.package_name
            )));
        }
        Ok(())
    }

    /// Whether `FLAG_SYSTEM_APP_TRUSTED` is set.
    pub fn is_system_app_trusted(&self) -> bool {
        self.flags & FLAG_SYSTEM_APP_TRUSTED != 0
    }

    /// Whether `FLAG_WHOLE_ACTIVITY_ALLOWED` is set.
    pub fn is_whole_activity_allowed(&self) -> bool {
        self.flags & FLAG_WHOLE_ACTIVITY_ALLOWED != 0
    }

    /// Whether the entry covers the activity `class_name`.
    ///
    /// An entry without activities covers every activity of its package.
    pub fn is_activity_covered(&self, class_name: &str) -> bool {
        if self.is_whole_activity_allowed() {
            return true;
        }
        match &self.activities {
            None => true,
            Some(activities) if activities.is_empty() => true,
            Some(activities) => activities.iter().any(|a| a == class_name),
        }
    }

    /// Whether `version_code` lies in the entry's version range.
    ///
    /// Both bounds are exclusive, so `min == max` rejects every version.
    pub fn is_version_in_range(&self, version_code: i32) -> bool {
        match (self.min_revision_code, self.max_revision_code) {
            (0, 0) => true,
            (0, max) => max > version_code,
            (min, 0) => min < version_code,
            (min, max) => min < version_code && max > version_code,
        }
    }

    /// Whether the installed package satisfies the entry's signature and version constraints.
    ///
    /// A package database failure counts as a mismatch.
    pub fn is_installed_package_matching(&self, package_db: &dyn PackageDatabase) -> bool {
        match self.check_installed_package(package_db) {
            Ok(matching) => matching,
            Err(e) => {
                warn!("Treating {} as not matching: {}", self.package_name, e);
                false
            }
        }
    }

    fn check_installed_package(&self, package_db: &dyn PackageDatabase) -> Result<bool> {
        let package_info = package_db
            .get_package_info(&self.package_name)
            .map_err(|e| CarPackageError::NotReady(e.to_string()))?;
        let Some(package_info) = package_info else {
            return Ok(false);
        };
        if !self.is_system_app_trusted() || !package_info.is_system_or_updated_system_app() {
            let from_policy = self.signatures.as_deref().unwrap_or_default();
            if !is_any_signature_matching(&package_info.signatures, from_policy) {
                return Ok(false);
            }
        }
        Ok(self.is_version_in_range(package_info.version_code))
    }
}

/// Any signature from the policy equal to one of the package's counts as a match.
pub fn is_any_signature_matching(from_package: &[Signature], from_policy: &[Signature]) -> bool {
    from_policy.iter().any(|sig| from_package.contains(sig))
}

/// A client's allow and deny lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CarAppBlockingPolicy {
    /// Entries allowed while driving.
    pub allowlist: Option<Vec<AppBlockingPackageInfo>>,
    /// Entries denied while driving. They take precedence over every allowlist.
    pub denylist: Option<Vec<AppBlockingPackageInfo>>,
}

impl CarAppBlockingPolicy {
    /// Creates a policy from its two lists.
    pub fn new(
        allowlist: Option<Vec<AppBlockingPackageInfo>>,
        denylist: Option<Vec<AppBlockingPackageInfo>>,
    ) -> Self {
        Self { allowlist, denylist }
    }

    /// Verifies every entry of both lists.
    pub fn verify(&self) -> Result<()> {
        self.allowlist
            .iter()
            .chain(self.denylist.iter())
            .flatten()
            .try_for_each(AppBlockingPackageInfo::verify)
    }
}
