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

//! Host service fakes shared by the integration tests.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use carpm_policies::common::{
    ActivityLaunchListener, ActivityMonitor, AppMetadataReader, BlockingIntent, CarAppMetadata,
    ComponentName, PackageDatabase, PackageInfo, PolicyServiceInfo, Signature, StackInfo,
    TopTaskInfo, PERMISSION_CONTROL_APP_BLOCKING,
};
use carpm_policies::package_info::CarAppBlockingPolicy;
use carpm_policies::policy_proxy::AppBlockingPolicyService;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration, Instant};

pub const POLL_DURATION: Duration = Duration::from_millis(10);
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(2);
pub const BLOCKING_ACTIVITY: &str = "com.android.car/com.android.car.pm.ActivityBlockingActivity";

pub fn system_package(name: &str, version_code: i32) -> PackageInfo {
    PackageInfo {
        package_name: name.to_string(),
        version_code,
        signatures: Vec::new(),
        is_system_app: true,
        is_updated_system_app: false,
    }
}

pub fn third_party_package(name: &str, version_code: i32, signature: &[u8]) -> PackageInfo {
    PackageInfo {
        package_name: name.to_string(),
        version_code,
        signatures: vec![Signature::from(signature)],
        is_system_app: false,
        is_updated_system_app: false,
    }
}

/// A task holding a single activity, alone in its stack.
pub fn top_task(package_name: &str, class_name: &str, task_id: i32) -> TopTaskInfo {
    let top_activity = ComponentName::new(package_name, class_name);
    TopTaskInfo {
        stack_info: StackInfo {
            stack_id: 1,
            task_ids: vec![task_id],
            task_names: vec![top_activity.flatten_to_string()],
        },
        top_activity,
        task_id,
    }
}

#[derive(Default)]
pub struct FakePackageDatabase {
    packages: Mutex<HashMap<String, PackageInfo>>,
    services: Mutex<Vec<PolicyServiceInfo>>,
    permitted: Mutex<HashSet<String>>,
    unavailable: AtomicBool,
}

impl FakePackageDatabase {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn install(&self, package: PackageInfo) {
        self.packages.lock().unwrap().insert(package.package_name.clone(), package);
    }

    pub fn grant_permission(&self, package_name: &str) {
        self.permitted.lock().unwrap().insert(package_name.to_string());
    }

    pub fn add_policy_service(&self, component: &ComponentName, enabled: bool) {
        self.services
            .lock()
            .unwrap()
            .push(PolicyServiceInfo { component: component.clone(), enabled });
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl PackageDatabase for FakePackageDatabase {
    fn get_package_info(&self, package_name: &str) -> Result<Option<PackageInfo>> {
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("package manager unavailable");
        }
        Ok(self.packages.lock().unwrap().get(package_name).cloned())
    }

    fn installed_packages(&self) -> Result<Vec<PackageInfo>> {
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("package manager unavailable");
        }
        Ok(self.packages.lock().unwrap().values().cloned().collect())
    }

    fn query_policy_services(&self) -> Result<Vec<PolicyServiceInfo>> {
        Ok(self.services.lock().unwrap().clone())
    }

    fn check_permission(&self, permission: &str, package_name: &str) -> bool {
        permission == PERMISSION_CONTROL_APP_BLOCKING
            && self.permitted.lock().unwrap().contains(package_name)
    }
}

#[derive(Default)]
pub struct FakeMetadataReader {
    metadata: Mutex<HashMap<String, CarAppMetadata>>,
}

impl FakeMetadataReader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, package_name: &str, metadata: CarAppMetadata) {
        self.metadata.lock().unwrap().insert(package_name.to_string(), metadata);
    }
}

impl AppMetadataReader for FakeMetadataReader {
    fn parse_metadata(&self, package_name: &str) -> Result<Option<CarAppMetadata>> {
        Ok(self.metadata.lock().unwrap().get(package_name).cloned())
    }
}

#[derive(Default)]
pub struct FakeActivityMonitor {
    top_tasks: Mutex<Vec<TopTaskInfo>>,
    focused_stacks: Mutex<HashMap<ComponentName, StackInfo>>,
    blocked: Mutex<Vec<(TopTaskInfo, BlockingIntent)>>,
    listener: Mutex<Option<Arc<dyn ActivityLaunchListener>>>,
}

impl FakeActivityMonitor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_top_tasks(&self, top_tasks: Vec<TopTaskInfo>) {
        *self.top_tasks.lock().unwrap() = top_tasks;
    }

    pub fn set_focused_stack(&self, activity: &ComponentName, stack_info: StackInfo) {
        self.focused_stacks.lock().unwrap().insert(activity.clone(), stack_info);
    }

    /// Moves `top_task` to the foreground and notifies the listener, if any.
    pub fn launch(&self, top_task: TopTaskInfo) {
        self.set_top_tasks(vec![top_task.clone()]);
        let listener = self.listener.lock().unwrap().clone();
        if let Some(listener) = listener {
            listener.on_activity_launch(top_task);
        }
    }

    pub fn blocked(&self) -> Vec<(TopTaskInfo, BlockingIntent)> {
        self.blocked.lock().unwrap().clone()
    }

    pub fn block_count(&self) -> usize {
        self.blocked.lock().unwrap().len()
    }

    pub fn has_listener(&self) -> bool {
        self.listener.lock().unwrap().is_some()
    }
}

impl ActivityMonitor for FakeActivityMonitor {
    fn top_tasks(&self) -> Vec<TopTaskInfo> {
        self.top_tasks.lock().unwrap().clone()
    }

    fn focused_stack_for_top_activity(&self, activity: &ComponentName) -> Option<StackInfo> {
        self.focused_stacks.lock().unwrap().get(activity).cloned()
    }

    fn block_activity(&self, top_task: &TopTaskInfo, intent: BlockingIntent) {
        self.blocked.lock().unwrap().push((top_task.clone(), intent));
    }

    fn register_activity_launch_listener(&self, listener: Option<Arc<dyn ActivityLaunchListener>>) {
        *self.listener.lock().unwrap() = listener;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyServiceBehavior {
    Deliver,
    FailConnect,
    Hang,
}

pub struct FakePolicyService {
    policy: Option<CarAppBlockingPolicy>,
    behavior: PolicyServiceBehavior,
    requests: AtomicUsize,
    disconnected: AtomicBool,
}

impl FakePolicyService {
    pub fn new(policy: Option<CarAppBlockingPolicy>, behavior: PolicyServiceBehavior) -> Arc<Self> {
        Arc::new(Self {
            policy,
            behavior,
            requests: AtomicUsize::new(0),
            disconnected: AtomicBool::new(false),
        })
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AppBlockingPolicyService for FakePolicyService {
    async fn connect(&self) -> Result<()> {
        match self.behavior {
            PolicyServiceBehavior::FailConnect => bail!("bind refused"),
            PolicyServiceBehavior::Hang => std::future::pending().await,
            PolicyServiceBehavior::Deliver => Ok(()),
        }
    }

    async fn get_app_blocking_policy(&self) -> Result<Option<CarAppBlockingPolicy>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.policy.clone())
    }

    fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }
}

/// Polls `condition` until it holds or `WAIT_TIMEOUT` elapses.
pub async fn wait_for(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + WAIT_TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(POLL_DURATION).await;
    }
    condition()
}
