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

//! # Client Policies
//!
//! Per-client allow and deny maps keyed by package name.

use crate::error::{invalid_argument, Result};
use crate::package_info::{
    AppBlockingPackageInfo, FLAG_SET_POLICY_ADD, FLAG_SET_POLICY_REMOVE,
};
use std::collections::HashMap;

/// A policy entry and whether it matched the installed package when it was committed.
///
/// Entries that did not match stay in their map but are ignored by every decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedPackageInfo {
    /// The policy entry.
    pub info: AppBlockingPackageInfo,
    /// Whether the installed package satisfied the entry at commit time.
    pub is_matching: bool,
}

impl MatchedPackageInfo {
    /// Pairs an entry with its match result.
    pub fn new(info: AppBlockingPackageInfo, is_matching: bool) -> Self {
        Self { info, is_matching }
    }
}

/// How a commit combines with the client's existing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyUpdateMode {
    /// Replace both lists.
    Replace,
    /// Add to both lists.
    Add,
    /// Remove from both lists.
    Remove,
}

impl PolicyUpdateMode {
    /// Derives the mode from `FLAG_SET_POLICY_*` flags.
    pub fn from_flags(flags: u32) -> Result<Self> {
        match (flags & FLAG_SET_POLICY_ADD != 0, flags & FLAG_SET_POLICY_REMOVE != 0) {
            (true, true) => Err(invalid_argument(
                "Cannot set both FLAG_SET_POLICY_ADD and FLAG_SET_POLICY_REMOVE flag",
            )),
            (true, false) => Ok(Self::Add),
            (false, true) => Ok(Self::Remove),
            (false, false) => Ok(Self::Replace),
        }
    }
}

/// Allow and deny maps of one client.
///
/// A package may appear in both maps; the deny entry wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientPolicy {
    allowlist: HashMap<String, MatchedPackageInfo>,
    denylist: HashMap<String, MatchedPackageInfo>,
}

impl ClientPolicy {
    /// Creates an empty policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow entries keyed by package name.
    pub fn allowlist(&self) -> &HashMap<String, MatchedPackageInfo> {
        &self.allowlist
    }

    /// Deny entries keyed by package name.
    pub fn denylist(&self) -> &HashMap<String, MatchedPackageInfo> {
        &self.denylist
    }

    /// Whether both maps are empty.
    pub fn is_empty(&self) -> bool {
        self.allowlist.is_empty() && self.denylist.is_empty()
    }

    /// Replaces the allowlist with `entries`.
    pub fn replace_allowlist(&mut self, entries: &[MatchedPackageInfo]) {
        replace(&mut self.allowlist, entries);
    }

    /// Adds `entries` to the allowlist, overwriting same-package entries.
    pub fn add_to_allowlist(&mut self, entries: &[MatchedPackageInfo]) {
        add(&mut self.allowlist, entries);
    }

    /// Removes the packages of `entries` from the allowlist.
    pub fn remove_from_allowlist(&mut self, entries: &[MatchedPackageInfo]) {
        remove(&mut self.allowlist, entries);
    }

    /// Replaces the denylist with `entries`.
    pub fn replace_denylist(&mut self, entries: &[MatchedPackageInfo]) {
        replace(&mut self.denylist, entries);
    }

    /// Adds `entries` to the denylist, overwriting same-package entries.
    pub fn add_to_denylist(&mut self, entries: &[MatchedPackageInfo]) {
        add(&mut self.denylist, entries);
    }

    /// Removes the packages of `entries` from the denylist.
    pub fn remove_from_denylist(&mut self, entries: &[MatchedPackageInfo]) {
        remove(&mut self.denylist, entries);
    }

    /// Applies a commit to both maps.
    pub fn apply(
        &mut self,
        mode: PolicyUpdateMode,
        allowlist: &[MatchedPackageInfo],
        denylist: &[MatchedPackageInfo],
    ) {
        match mode {
            PolicyUpdateMode::Add => {
                self.add_to_denylist(denylist);
                self.add_to_allowlist(allowlist);
            }
            PolicyUpdateMode::Remove => {
                self.remove_from_denylist(denylist);
                self.remove_from_allowlist(allowlist);
            }
            PolicyUpdateMode::Replace => {
                self.replace_denylist(denylist);
                self.replace_allowlist(allowlist);
            }
        }
    }
}

fn replace(map: &mut HashMap<String, MatchedPackageInfo>, entries: &[MatchedPackageInfo]) {
    map.clear();
    add(map, entries);
}

fn add(map: &mut HashMap<String, MatchedPackageInfo>, entries: &[MatchedPackageInfo]) {
    for entry in entries {
        map.insert(entry.info.package_name.clone(), entry.clone());
    }
}

fn remove(map: &mut HashMap<String, MatchedPackageInfo>, entries: &[MatchedPackageInfo]) {
    for entry in entries {
        map.remove(&entry.info.package_name);
    }
}
