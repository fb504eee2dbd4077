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

//! # Policy Store
//!
//! Client policies and the system allowlist, and the allow/deny decisions made from them.

use crate::client_policy::{ClientPolicy, MatchedPackageInfo};
use crate::package_info::AppBlockingPackageInfo;
use std::collections::HashMap;

/// Every policy source known to the car package manager.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyStore {
    /// Keyed by the package name of the policy service or calling client.
    client_policies: HashMap<String, ClientPolicy>,
    system_allowlist: HashMap<String, MatchedPackageInfo>,
}

impl PolicyStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The policy of `client_id`, created on first use.
    pub fn client_policy_mut(&mut self, client_id: &str) -> &mut ClientPolicy {
        self.client_policies.entry(client_id.to_string()).or_default()
    }

    /// The policy of `client_id`, if it has committed one.
    pub fn client_policy(&self, client_id: &str) -> Option<&ClientPolicy> {
        self.client_policies.get(client_id)
    }

    /// All client policies.
    pub fn client_policies(&self) -> &HashMap<String, ClientPolicy> {
        &self.client_policies
    }

    /// Merges entries into the system allowlist.
    pub fn extend_system_allowlist(&mut self, entries: HashMap<String, MatchedPackageInfo>) {
        self.system_allowlist.extend(entries);
    }

    /// The system allowlist.
    pub fn system_allowlist(&self) -> &HashMap<String, MatchedPackageInfo> {
        &self.system_allowlist
    }

    /// Drops every policy.
    pub fn clear(&mut self) {
        self.client_policies.clear();
        self.system_allowlist.clear();
    }

    /// Whether no policy is held.
    pub fn is_empty(&self) -> bool {
        self.client_policies.is_empty() && self.system_allowlist.is_empty()
    }

    /// The first matching deny entry for `package_name` across all clients.
    pub fn search_from_denylists(&self, package_name: &str) -> Option<&AppBlockingPackageInfo> {
        self.client_policies
            .values()
            .filter_map(|policy| policy.denylist().get(package_name))
            .find(|wrapper| wrapper.is_matching)
            .map(|wrapper| &wrapper.info)
    }

    /// The first matching allow entry for `package_name`, clients first, then the system
    /// allowlist.
    pub fn search_from_allowlists(&self, package_name: &str) -> Option<&AppBlockingPackageInfo> {
        self.client_policies
            .values()
            .filter_map(|policy| policy.allowlist().get(package_name))
            .find(|wrapper| wrapper.is_matching)
            .or_else(|| self.system_allowlist.get(package_name))
            .map(|wrapper| &wrapper.info)
    }

    /// Whether services of `package_name` may run while driving.
    pub fn is_service_allowed(&self, package_name: &str) -> bool {
        if self.search_from_denylists(package_name).is_some() {
            return false;
        }
        self.search_from_allowlists(package_name).is_some()
    }

    /// Whether the activity may be shown while driving. Deny entries apply to every class.
    pub fn is_activity_allowed(&self, package_name: &str, class_name: &str) -> bool {
        if self.search_from_denylists(package_name).is_some() {
            return false;
        }
        self.client_policies
            .values()
            .any(|policy| is_activity_in_map_and_matching(policy.allowlist(), package_name, class_name))
            || is_activity_in_map_and_matching(&self.system_allowlist, package_name, class_name)
    }
}

fn is_activity_in_map_and_matching(
    map: &HashMap<String, MatchedPackageInfo>,
    package_name: &str,
    class_name: &str,
) -> bool {
    match map.get(package_name) {
        Some(wrapper) if wrapper.is_matching => wrapper.info.is_activity_covered(class_name),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_policy::PolicyUpdateMode;
    use crate::package_info::FLAG_SYSTEM_APP_TRUSTED;

    fn entry(name: &str, activities: Option<&[&str]>, is_matching: bool) -> MatchedPackageInfo {
        MatchedPackageInfo::new(
            AppBlockingPackageInfo::new(
                name,
                0,
                0,
                FLAG_SYSTEM_APP_TRUSTED,
                None,
                activities.map(|a| a.iter().map(|s| s.to_string()).collect()),
            ),
            is_matching,
        )
    }

    fn store_with_system(entries: Vec<MatchedPackageInfo>) -> PolicyStore {
        let mut store = PolicyStore::new();
        store.extend_system_allowlist(
            entries.into_iter().map(|e| (e.info.package_name.clone(), e)).collect(),
        );
        store
    }

    #[test]
    fn unknown_package_is_denied() {
        let store = store_with_system(vec![entry("maps", Some(&["MapsMain"]), true)]);
        assert!(!store.is_service_allowed("games"));
        assert!(!store.is_activity_allowed("games", "Snake"));
    }

    #[test]
    fn system_allowlist_respects_activities() {
        let store = store_with_system(vec![entry("maps", Some(&["MapsMain"]), true)]);
        assert!(store.is_service_allowed("maps"));
        assert!(store.is_activity_allowed("maps", "MapsMain"));
        assert!(!store.is_activity_allowed("maps", "Settings"));
    }

    #[test]
    fn deny_overrides_every_allow() {
        let mut store = store_with_system(vec![entry("maps", None, true)]);
        store.client_policy_mut("oem").apply(
            PolicyUpdateMode::Replace,
            &[entry("maps", None, true)],
            &[],
        );
        assert!(store.is_activity_allowed("maps", "MapsMain"));

        store.client_policy_mut("admin").apply(
            PolicyUpdateMode::Replace,
            &[],
            &[entry("maps", None, true)],
        );
        assert!(!store.is_service_allowed("maps"));
        assert!(!store.is_activity_allowed("maps", "MapsMain"));
        assert!(!store.is_activity_allowed("maps", "AnyOtherClass"));
    }

    #[test]
    fn non_matching_entries_are_ignored() {
        let mut store = store_with_system(vec![entry("maps", None, true)]);
        store.client_policy_mut("admin").apply(
            PolicyUpdateMode::Replace,
            &[entry("media", None, false)],
            &[entry("maps", None, false)],
        );
        assert!(store.is_activity_allowed("maps", "MapsMain"));
        assert!(!store.is_service_allowed("media"));
        assert!(!store.is_activity_allowed("media", "Player"));
    }

    #[test]
    fn client_allow_extends_system_activities() {
        let mut store = store_with_system(vec![entry("maps", Some(&["MapsMain"]), true)]);
        store.client_policy_mut("oem").apply(
            PolicyUpdateMode::Add,
            &[entry("maps", Some(&["Navigation"]), true)],
            &[],
        );
        assert!(store.is_activity_allowed("maps", "MapsMain"));
        assert!(store.is_activity_allowed("maps", "Navigation"));
        assert!(!store.is_activity_allowed("maps", "Settings"));
    }

    #[test]
    fn clear_empties_both_sources() {
        let mut store = store_with_system(vec![entry("maps", None, true)]);
        store.client_policy_mut("admin");
        assert!(!store.is_empty());
        store.clear();
        assert!(store.is_empty());
        assert!(store.client_policy("admin").is_none());
    }
}
