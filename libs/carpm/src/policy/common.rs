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

//! # Common
//!
//! This module contains shared data structures and the traits of the host services the
//! car package manager consumes.

use crate::error::Result as PolicyResult;
use crate::package_info::CarAppBlockingPolicy;
use anyhow::Result;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Permission needed to set app blocking policies or to provide them as a policy service.
pub const PERMISSION_CONTROL_APP_BLOCKING: &str = "android.car.permission.CONTROL_APP_BLOCKING";

/// Extra of the blocking intent carrying the flattened component of the blocked activity.
pub const INTENT_KEY_BLOCKED_ACTIVITY: &str = "blocked_activity";

/// Identifies an activity or service by package and class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentName {
    /// Package the component belongs to.
    pub package_name: String,
    /// Fully qualified class name.
    pub class_name: String,
}

impl ComponentName {
    /// Creates a component from its package and class.
    pub fn new(package_name: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self { package_name: package_name.into(), class_name: class_name.into() }
    }

    /// Returns `package/class`.
    pub fn flatten_to_string(&self) -> String {
        format!("{}/{}", self.package_name, self.class_name)
    }

    /// Parses `package/class`. A class starting with `.` is relative to the package.
    pub fn unflatten_from_string(flattened: &str) -> Option<Self> {
        let (package_name, class_name) = flattened.split_once('/')?;
        if package_name.is_empty() || class_name.is_empty() {
            return None;
        }
        let class_name = if class_name.starts_with('.') {
            format!("{}{}", package_name, class_name)
        } else {
            class_name.to_string()
        };
        Some(Self { package_name: package_name.to_string(), class_name })
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.package_name, self.class_name)
    }
}

/// An opaque package signing certificate, compared byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(pub Vec<u8>);

impl From<&[u8]> for Signature {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

/// What the package database knows about an installed package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageInfo {
    /// Package name.
    pub package_name: String,
    /// Installed version code.
    pub version_code: i32,
    /// Signing certificates of the installed package.
    pub signatures: Vec<Signature>,
    /// Whether the package is part of the system image.
    pub is_system_app: bool,
    /// Whether the package is an update of a system image package.
    pub is_updated_system_app: bool,
}

impl PackageInfo {
    /// Whether the package ships with the system image, possibly updated since.
    pub fn is_system_or_updated_system_app(&self) -> bool {
        self.is_system_app || self.is_updated_system_app
    }
}

/// A service declaring the app blocking policy service interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyServiceInfo {
    /// The service component.
    pub component: ComponentName,
    /// Whether the service is enabled.
    pub enabled: bool,
}

/// Car-specific metadata declared in a package manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CarAppMetadata {
    /// All activities of the package are distraction optimized.
    pub use_all_activities: bool,
    /// Class names of the distraction optimized activities.
    pub activities: Vec<String>,
}

/// A stack of tasks as seen by the activity monitor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackInfo {
    /// Stack id.
    pub stack_id: i32,
    /// Task ids in the stack.
    pub task_ids: Vec<i32>,
    /// Flattened top components of the tasks, bottom first.
    pub task_names: Vec<String>,
}

/// The top activity of a task together with its stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopTaskInfo {
    /// Activity currently on top of the task.
    pub top_activity: ComponentName,
    /// Task id.
    pub task_id: i32,
    /// Stack holding the task.
    pub stack_info: StackInfo,
}

/// Request to overlay the blocking UI on a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockingIntent {
    /// Component to launch over the task.
    pub component: ComponentName,
    /// String extras delivered to the component.
    pub extras: BTreeMap<String, String>,
}

impl BlockingIntent {
    /// Creates the intent that replaces `blocked` with `blocking_activity`.
    pub fn new(blocking_activity: &ComponentName, blocked: &ComponentName) -> Self {
        let mut extras = BTreeMap::new();
        extras.insert(INTENT_KEY_BLOCKED_ACTIVITY.to_string(), blocked.flatten_to_string());
        Self { component: blocking_activity.clone(), extras }
    }

    /// Flattened component of the activity being blocked.
    pub fn blocked_activity(&self) -> Option<&str> {
        self.extras.get(INTENT_KEY_BLOCKED_ACTIVITY).map(String::as_str)
    }
}

/// The package making an API call, as established by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    /// Package name of the caller.
    pub package_name: String,
}

impl CallerIdentity {
    /// Creates an identity for `package_name`.
    pub fn new(package_name: impl Into<String>) -> Self {
        Self { package_name: package_name.into() }
    }
}

/// The host package database.
pub trait PackageDatabase: Send + Sync {
    /// Looks up an installed package. `Ok(None)` means it is not installed.
    fn get_package_info(&self, package_name: &str) -> Result<Option<PackageInfo>>;

    /// Lists every installed package.
    fn installed_packages(&self) -> Result<Vec<PackageInfo>>;

    /// Lists the services declaring the app blocking policy service interface.
    fn query_policy_services(&self) -> Result<Vec<PolicyServiceInfo>>;

    /// Whether `package_name` holds `permission`.
    fn check_permission(&self, permission: &str, package_name: &str) -> bool;
}

/// Reads car metadata from package manifests.
pub trait AppMetadataReader: Send + Sync {
    /// Returns the metadata of `package_name`, or `None` if it declares none.
    fn parse_metadata(&self, package_name: &str) -> Result<Option<CarAppMetadata>>;
}

/// Receives top task changes from the activity monitor.
pub trait ActivityLaunchListener: Send + Sync {
    /// Called whenever a new activity comes on top of a task.
    fn on_activity_launch(&self, top_task: TopTaskInfo);
}

/// The system activity monitor.
pub trait ActivityMonitor: Send + Sync {
    /// Current top tasks of all visible stacks.
    fn top_tasks(&self) -> Vec<TopTaskInfo>;

    /// The focused stack if `activity` is on top of it, otherwise `None`.
    fn focused_stack_for_top_activity(&self, activity: &ComponentName) -> Option<StackInfo>;

    /// Launches `intent` over the task of `top_task`.
    fn block_activity(&self, top_task: &TopTaskInfo, intent: BlockingIntent);

    /// Installs or, with `None`, removes the launch listener.
    fn register_activity_launch_listener(&self, listener: Option<Arc<dyn ActivityLaunchListener>>);
}

/// The public API for app blocking.
///
/// This trait is implemented by the `CarPackagePolicyEngine` and provides the entry points for
/// clients of the car package manager.
pub trait AppBlockingControl {
    /// Adds, removes or replaces the policy of `client_id`.
    ///
    /// With `FLAG_SET_POLICY_WAIT_FOR_CHANGE` the call returns once the policy has been applied.
    fn set_app_blocking_policy(
        &self,
        caller: &CallerIdentity,
        client_id: &str,
        policy: Option<CarAppBlockingPolicy>,
        flags: u32,
    ) -> PolicyResult<()>;

    /// Whether the activity may be shown while driving.
    fn is_activity_allowed_while_driving(
        &self,
        package_name: &str,
        class_name: &str,
    ) -> PolicyResult<bool>;

    /// Whether services of the package may run while driving.
    fn is_service_allowed_while_driving(&self, package_name: &str) -> PolicyResult<bool>;

    /// Whether the activity sits on top of an activity that is allowed while driving.
    fn is_activity_backed_by_safe_activity(&self, activity: &ComponentName) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_and_unflatten() {
        let component = ComponentName::new("com.example.maps", "com.example.maps.MapsMain");
        assert_eq!(component.flatten_to_string(), "com.example.maps/com.example.maps.MapsMain");
        assert_eq!(
            ComponentName::unflatten_from_string("com.example.maps/com.example.maps.MapsMain"),
            Some(component.clone())
        );
        assert_eq!(ComponentName::unflatten_from_string("com.example.maps/.MapsMain"), Some(component));
    }

    #[test]
    fn unflatten_rejects_partial_names() {
        assert_eq!(ComponentName::unflatten_from_string("maps"), None);
        assert_eq!(ComponentName::unflatten_from_string("/MapsMain"), None);
        assert_eq!(ComponentName::unflatten_from_string("maps/"), None);
    }

    #[test]
    fn blocking_intent_carries_blocked_component() {
        let blocker = ComponentName::new("car", "car.Blocker");
        let intent = BlockingIntent::new(&blocker, &ComponentName::new("games", "Snake"));
        assert_eq!(intent.component, blocker);
        assert_eq!(intent.blocked_activity(), Some("games/Snake"));
    }
}
