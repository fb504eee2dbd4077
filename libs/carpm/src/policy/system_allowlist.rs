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

//! # System Allowlist
//!
//! Builds the default allowlist: every system app is trusted for services, and activities are
//! allowed according to the configured allowlist string and manifest metadata.

use crate::client_policy::MatchedPackageInfo;
use crate::common::{AppMetadataReader, ComponentName, PackageDatabase};
use crate::error::{CarPackageError, Result};
use crate::package_info::{
    AppBlockingPackageInfo, FLAG_SYSTEM_APP_TRUSTED, FLAG_WHOLE_ACTIVITY_ALLOWED,
};
use log::{debug, warn};
use std::collections::{BTreeSet, HashMap};

/// Parses `pkg1/cls1,pkg2,pkg3/cls3`. An empty activity set stands for the whole package.
///
/// The blocking activity is always part of the result.
pub fn parse_config_allowlist(
    blocking_activity: &ComponentName,
    allowlist: &str,
) -> HashMap<String, BTreeSet<String>> {
    let mut package_to_activities: HashMap<String, BTreeSet<String>> = HashMap::new();
    package_to_activities.insert(
        blocking_activity.package_name.clone(),
        BTreeSet::from([blocking_activity.class_name.clone()]),
    );

    for entry in allowlist.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let parts: Vec<&str> = entry.split('/').collect();
        let (package_name, class_name) = match parts.as_slice() {
            [package_name] => (*package_name, None),
            [package_name, class_name] => (*package_name, Some(*class_name)),
            _ => {
                warn!("Ignoring malformed allowlist entry {:?}", entry);
                continue;
            }
        };
        let is_new_package = !package_to_activities.contains_key(package_name);
        let activities = package_to_activities.entry(package_name.to_string()).or_default();
        match class_name {
            None => activities.clear(),
            // Classes only accumulate while the package is not wholly allowed.
            Some(class_name) => {
                if is_new_package || !activities.is_empty() {
                    activities.insert(class_name.to_string());
                }
            }
        }
    }
    package_to_activities
}

/// Derives the system allowlist from the installed system packages.
pub fn generate_system_allowlist(
    package_db: &dyn PackageDatabase,
    metadata_reader: &dyn AppMetadataReader,
    config_allowlist: &HashMap<String, BTreeSet<String>>,
) -> Result<HashMap<String, MatchedPackageInfo>> {
    let packages = package_db
        .installed_packages()
        .map_err(|e| CarPackageError::NotReady(e.to_string()))?;

    let mut system_allowlist = HashMap::new();
    for package in packages.iter().filter(|p| p.is_system_or_updated_system_app()) {
        let mut flags = FLAG_SYSTEM_APP_TRUSTED;
        let mut activities = match config_allowlist.get(&package.package_name) {
            Some(config_activities) if config_activities.is_empty() => {
                flags |= FLAG_WHOLE_ACTIVITY_ALLOWED;
                BTreeSet::new()
            }
            Some(config_activities) => config_activities.clone(),
            None => BTreeSet::new(),
        };

        if flags & FLAG_WHOLE_ACTIVITY_ALLOWED == 0 {
            match metadata_reader.parse_metadata(&package.package_name) {
                Ok(Some(metadata)) if metadata.use_all_activities => {
                    flags |= FLAG_WHOLE_ACTIVITY_ALLOWED;
                }
                Ok(Some(metadata)) => activities.extend(metadata.activities),
                Ok(None) => {}
                Err(e) => warn!("Failed to read car metadata of {}: {}", package.package_name, e),
            }
        }

        let activities = if flags & FLAG_WHOLE_ACTIVITY_ALLOWED == 0 && !activities.is_empty() {
            Some(activities.into_iter().collect())
        } else {
            None
        };
        let info =
            AppBlockingPackageInfo::new(package.package_name.clone(), 0, 0, flags, None, activities);
        debug!("System allowlist entry: {:?}", info);
        system_allowlist.insert(package.package_name.clone(), MatchedPackageInfo::new(info, true));
    }
    Ok(system_allowlist)
}
