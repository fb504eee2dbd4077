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

//! # Car Package Manager
//!
//! The enforcement controller. A single worker task owns all policy mutation and drains one
//! queue fed by API callers, the activity monitor, policy service proxies and the driving
//! status source. Every mutation and every driving-status sample is followed by an
//! enforcement sweep over the current top tasks.

use crate::client_policy::{ClientPolicy, MatchedPackageInfo, PolicyUpdateMode};
use crate::common::{
    ActivityLaunchListener, ActivityMonitor, AppMetadataReader, BlockingIntent, CallerIdentity,
    ComponentName, PackageDatabase, TopTaskInfo, PERMISSION_CONTROL_APP_BLOCKING,
};
use crate::config::CarPackageConfig;
use crate::driving_state::DrivingStateGate;
use crate::error::{invalid_argument, CarPackageError, Result};
use crate::package_info::{
    AppBlockingPackageInfo, CarAppBlockingPolicy, FLAG_SET_POLICY_WAIT_FOR_CHANGE,
};
use crate::policy_proxy::{AppBlockingPolicyProxy, PolicyServiceRegistry, ProxyId};
use crate::policy_store::PolicyStore;
use crate::system_allowlist::{generate_system_allowlist, parse_config_allowlist};
use drivingstatus::sensor::{AsyncDrivingStatusSource, DrivingStatus};
use log::{debug, error, info, warn};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Task posted to the car package manager worker.
#[derive(Debug)]
pub(crate) enum PackageServiceEvent {
    Init,
    UpdatePolicy {
        client_id: String,
        policy: CarAppBlockingPolicy,
        flags: u32,
        waiter: Option<oneshot::Sender<()>>,
    },
    /// The policy barrier: wakes waiters and re-enforces.
    SetPolicy,
    PolicyConnection {
        proxy_id: ProxyId,
        policy: Option<CarAppBlockingPolicy>,
    },
    PolicyServiceTimeout {
        generation: u64,
    },
    ActivityLaunch(TopTaskInfo),
    DumpPolicies(oneshot::Sender<PolicySnapshot>),
    Release(oneshot::Sender<()>),
    Shutdown,
}

/// Host services the car package manager depends on.
pub struct CarPackageDependencies {
    /// Installed packages, permissions and policy service discovery.
    pub package_database: Arc<dyn PackageDatabase>,
    /// Car metadata of package manifests.
    pub metadata_reader: Arc<dyn AppMetadataReader>,
    /// Top tasks and the blocking overlay.
    pub activity_monitor: Arc<dyn ActivityMonitor>,
    /// Driving status samples.
    pub driving_status_source: Arc<dyn AsyncDrivingStatusSource>,
    /// Policy service implementations that may be discovered.
    pub policy_services: PolicyServiceRegistry,
}

/// Read-only copy of the worker's state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySnapshot {
    /// Whether activity blocking is enabled by configuration.
    pub activity_blocking_enabled: bool,
    /// Whether the latest driving status restricts activities.
    pub driving_restricted: bool,
    /// System allowlist entries by package name.
    pub system_allowlist: BTreeMap<String, MatchedPackageInfo>,
    /// Client policies by client id.
    pub client_policies: BTreeMap<String, ClientPolicy>,
    /// Policy services that have not delivered their initial policy yet.
    pub pending_policy_services: Vec<ComponentName>,
    /// Callers waiting for the next policy barrier.
    pub pending_waiters: usize,
    /// The configured allowlist string.
    pub default_activity_allowlist: String,
}

/// State shared between the worker and synchronous readers.
struct PackageManagerShared {
    enable_activity_blocking: bool,
    blocking_activity: ComponentName,
    store: Mutex<PolicyStore>,
    driving_state: DrivingStateGate,
    activity_monitor: Arc<dyn ActivityMonitor>,
}

impl PackageManagerShared {
    fn store(&self) -> MutexGuard<'_, PolicyStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_activity_allowed(&self, package_name: &str, class_name: &str) -> bool {
        self.store().is_activity_allowed(package_name, class_name)
    }

    fn block_top_activity_if_necessary(&self, top_task: &TopTaskInfo) {
        if !self.driving_state.is_restricted() {
            return;
        }
        self.do_block_top_activity_if_not_allowed(top_task);
    }

    fn block_top_activities_if_necessary(&self) {
        if !self.driving_state.is_restricted() {
            return;
        }
        for top_task in self.activity_monitor.top_tasks() {
            self.do_block_top_activity_if_not_allowed(&top_task);
        }
    }

    fn do_block_top_activity_if_not_allowed(&self, top_task: &TopTaskInfo) {
        let top_activity = &top_task.top_activity;
        let allowed = self.is_activity_allowed(&top_activity.package_name, &top_activity.class_name);
        debug!("new activity:{:?} allowed:{}", top_task, allowed);
        if allowed {
            return;
        }
        info!(
            "Current activity {} not allowed, will block, number of tasks in stack:{}",
            top_activity,
            top_task.stack_info.task_ids.len()
        );
        let intent = BlockingIntent::new(&self.blocking_activity, top_activity);
        self.activity_monitor.block_activity(top_task, intent);
    }
}

/// Forwards top task changes to the worker.
///
/// Launches travel on the unbounded notification channel so none is dropped.
struct ActivityLaunchForwarder {
    sender: mpsc::WeakUnboundedSender<PackageServiceEvent>,
}

impl ActivityLaunchListener for ActivityLaunchForwarder {
    fn on_activity_launch(&self, top_task: TopTaskInfo) {
        let Some(sender) = self.sender.upgrade() else {
            debug!("Car package manager gone, ignoring launch of {}", top_task.top_activity);
            return;
        };
        if sender.send(PackageServiceEvent::ActivityLaunch(top_task)).is_err() {
            error!("Notification channel closed. Service might have crashed.");
        }
    }
}

/// Internal service that runs the worker loop.
struct CarPackageManagerTask {
    shared: Arc<PackageManagerShared>,
    event_receiver: mpsc::Receiver<PackageServiceEvent>,
    event_sender: mpsc::WeakSender<PackageServiceEvent>,
    /// Init and launches. Drained ahead of `event_receiver`.
    notification_receiver: mpsc::UnboundedReceiver<PackageServiceEvent>,
    notification_sender: mpsc::WeakUnboundedSender<PackageServiceEvent>,
    package_db: Arc<dyn PackageDatabase>,
    metadata_reader: Arc<dyn AppMetadataReader>,
    driving_status_source: Arc<dyn AsyncDrivingStatusSource>,
    policy_services: PolicyServiceRegistry,
    policy_service_timeout: Option<Duration>,
    default_activity_allowlist: String,
    /// Policy services still owing their initial policy. `None` once the barrier has fired.
    proxies: Option<HashMap<ProxyId, AppBlockingPolicyProxy>>,
    next_proxy_id: ProxyId,
    waiting_policies: VecDeque<oneshot::Sender<()>>,
    driving_status_subscribed: bool,
    /// Cleared when the source fails. The subscription itself stays until torn down.
    driving_status_reading: bool,
    launch_listener_registered: bool,
    /// Bumped on every init and release so stale timeouts are ignored.
    generation: u64,
}

impl CarPackageManagerTask {
    /// Handles a received service event. Returns true if the service should continue running.
    fn handle_service_event(&mut self, service_event: PackageServiceEvent) -> bool {
        match service_event {
            PackageServiceEvent::Init => self.handle_init(),
            PackageServiceEvent::UpdatePolicy { client_id, policy, flags, waiter } => {
                self.handle_update_policy(&client_id, policy, flags, waiter);
            }
            PackageServiceEvent::SetPolicy => self.handle_set_policy(),
            PackageServiceEvent::PolicyConnection { proxy_id, policy } => {
                self.handle_policy_connection(proxy_id, policy);
            }
            PackageServiceEvent::PolicyServiceTimeout { generation } => {
                self.handle_policy_service_timeout(generation);
            }
            PackageServiceEvent::ActivityLaunch(top_task) => {
                self.shared.block_top_activity_if_necessary(&top_task);
            }
            PackageServiceEvent::DumpPolicies(reply) => {
                if reply.send(self.snapshot()).is_err() {
                    debug!("Snapshot requester went away");
                }
            }
            PackageServiceEvent::Release(ack) => self.handle_release(ack),
            PackageServiceEvent::Shutdown => {
                return false; // Signal to stop the loop
            }
        }
        true // Keep running
    }

    /// Handles a driving status sample.
    fn handle_driving_status(&mut self, status: anyhow::Result<DrivingStatus>) {
        match status {
            Ok(status) => {
                self.shared.driving_state.update(status);
                self.shared.block_top_activities_if_necessary();
            }
            Err(e) => {
                error!("Error reading driving status: {}. Driving status listener stopped.", e);
                self.driving_status_reading = false;
            }
        }
    }

    fn handle_init(&mut self) {
        info!("Initializing app blocking policies");
        self.generation += 1;
        self.start_app_blocking_policies();
        self.build_system_allowlist();
        if let Err(e) = self.driving_status_source.subscribe() {
            warn!("Driving status subscription failed: {}", e);
            return;
        }
        self.driving_status_subscribed = true;
        self.driving_status_reading = true;
        self.shared.driving_state.reset(self.driving_status_source.latest());
        let listener: Arc<dyn ActivityLaunchListener> =
            Arc::new(ActivityLaunchForwarder { sender: self.notification_sender.clone() });
        self.shared.activity_monitor.register_activity_launch_listener(Some(listener));
        self.launch_listener_registered = true;
        self.shared.block_top_activities_if_necessary();
    }

    fn start_app_blocking_policies(&mut self) {
        self.disconnect_proxies();
        let services = match self.package_db.query_policy_services() {
            Ok(services) => services,
            Err(e) => {
                warn!("Failed to query policy services: {}", e);
                Vec::new()
            }
        };

        let mut proxies = HashMap::new();
        for info in services {
            if !info.enabled {
                debug!("Skipping disabled policy service {}", info.component);
                continue;
            }
            if !self
                .package_db
                .check_permission(PERMISSION_CONTROL_APP_BLOCKING, &info.component.package_name)
            {
                warn!(
                    "Skipping policy service {} without {}",
                    info.component, PERMISSION_CONTROL_APP_BLOCKING
                );
                continue;
            }
            let service = match self.policy_services.create(&info) {
                Ok(service) => service,
                Err(e) => {
                    warn!("Skipping policy service: {}", e);
                    continue;
                }
            };
            info!("found policy holding service:{}", info.component);
            let id = self.next_proxy_id;
            self.next_proxy_id += 1;
            let mut proxy = AppBlockingPolicyProxy::new(id, info, service);
            proxy.connect(self.event_sender.clone());
            proxies.insert(id, proxy);
        }

        if proxies.is_empty() {
            // Nothing to wait for.
            self.request_policy_setting();
            return;
        }
        self.proxies = Some(proxies);
        if let Some(timeout) = self.policy_service_timeout {
            self.arm_policy_service_timeout(timeout);
        }
    }

    fn arm_policy_service_timeout(&self, timeout: Duration) {
        let sender = self.event_sender.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(sender) = sender.upgrade() {
                let _ = sender.send(PackageServiceEvent::PolicyServiceTimeout { generation }).await;
            }
        });
    }

    fn build_system_allowlist(&mut self) {
        let config_allowlist =
            parse_config_allowlist(&self.shared.blocking_activity, &self.default_activity_allowlist);
        match generate_system_allowlist(
            self.package_db.as_ref(),
            self.metadata_reader.as_ref(),
            &config_allowlist,
        ) {
            Ok(allowlist) => {
                info!("System allowlist holds {} packages", allowlist.len());
                self.shared.store().extend_system_allowlist(allowlist);
            }
            Err(e) => error!("Failed to build system allowlist: {}", e),
        }
    }

    /// Posts the policy barrier behind any queued work, or runs it now if it cannot be queued.
    fn request_policy_setting(&mut self) {
        let Some(sender) = self.event_sender.upgrade() else {
            self.handle_set_policy();
            return;
        };
        match sender.try_send(PackageServiceEvent::SetPolicy) {
            Ok(_) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("Event channel full, applying policy barrier now");
                self.handle_set_policy();
            }
            Err(mpsc::error::TrySendError::Closed(_)) => self.handle_set_policy(),
        }
    }

    fn handle_update_policy(
        &mut self,
        client_id: &str,
        policy: CarAppBlockingPolicy,
        flags: u32,
        waiter: Option<oneshot::Sender<()>>,
    ) {
        debug!("setting policy from:{},policy:{:?},flags:0x{:x}", client_id, policy, flags);
        let mode = match PolicyUpdateMode::from_flags(flags) {
            Ok(mode) => mode,
            Err(e) => {
                error!("Dropping policy from {}: {}", client_id, e);
                if let Some(waiter) = waiter {
                    let _ = waiter.send(());
                }
                return;
            }
        };
        let denylist = self.verify_list(policy.denylist.as_deref());
        let allowlist = self.verify_list(policy.allowlist.as_deref());
        self.shared.store().client_policy_mut(client_id).apply(mode, &allowlist, &denylist);
        if let Some(waiter) = waiter {
            self.waiting_policies.push_back(waiter);
        }
        self.shared.block_top_activities_if_necessary();
    }

    fn verify_list(&self, list: Option<&[AppBlockingPackageInfo]>) -> Vec<MatchedPackageInfo> {
        list.unwrap_or_default()
            .iter()
            .map(|info| {
                let is_matching = info.is_installed_package_matching(self.package_db.as_ref());
                MatchedPackageInfo::new(info.clone(), is_matching)
            })
            .collect()
    }

    fn handle_set_policy(&mut self) {
        self.wake_up_clients_waiting_for_policy_setting();
        self.shared.block_top_activities_if_necessary();
    }

    fn wake_up_clients_waiting_for_policy_setting(&mut self) {
        for waiter in self.waiting_policies.drain(..) {
            // The waiter may have given up already.
            let _ = waiter.send(());
        }
    }

    fn handle_policy_connection(&mut self, proxy_id: ProxyId, policy: Option<CarAppBlockingPolicy>) {
        let Some(proxies) = self.proxies.as_mut() else {
            debug!("Policy service result after the barrier, ignoring");
            return;
        };
        let Some(mut proxy) = proxies.remove(&proxy_id) else {
            debug!("Result from unknown policy service proxy {}", proxy_id);
            return;
        };
        let should_set_policy = proxies.is_empty();
        if should_set_policy {
            self.proxies = None;
        }

        proxy.complete(policy.is_some());
        match policy {
            Some(policy) => {
                debug!("policy setting from policy service:{}", proxy.package_name());
                let client_id = proxy.package_name().to_string();
                self.handle_update_policy(&client_id, policy, 0, None);
            }
            None => warn!(
                "{}",
                CarPackageError::ProviderUnavailable(proxy.component().flatten_to_string())
            ),
        }
        proxy.disconnect();
        if should_set_policy {
            self.request_policy_setting();
        }
    }

    fn handle_policy_service_timeout(&mut self, generation: u64) {
        if generation != self.generation || self.proxies.is_none() {
            return;
        }
        warn!("Timed out waiting for policy services");
        self.disconnect_proxies();
        self.request_policy_setting();
    }

    fn disconnect_proxies(&mut self) {
        if let Some(proxies) = self.proxies.take() {
            for (_, mut proxy) in proxies {
                proxy.fail();
                warn!(
                    "{}",
                    CarPackageError::ProviderUnavailable(proxy.component().flatten_to_string())
                );
                proxy.disconnect();
            }
        }
    }

    fn handle_release(&mut self, ack: oneshot::Sender<()>) {
        info!("Releasing app blocking policies");
        self.generation += 1;
        self.shared.store().clear();
        self.tear_down();
        if ack.send(()).is_err() {
            debug!("Release requester went away");
        }
    }

    /// Drops every subscription and outstanding proxy and wakes all waiters.
    fn tear_down(&mut self) {
        self.disconnect_proxies();
        self.wake_up_clients_waiting_for_policy_setting();
        if self.driving_status_subscribed {
            self.driving_status_source.unsubscribe();
            self.driving_status_subscribed = false;
        }
        self.driving_status_reading = false;
        if self.launch_listener_registered {
            self.shared.activity_monitor.register_activity_launch_listener(None);
            self.launch_listener_registered = false;
        }
    }

    fn snapshot(&self) -> PolicySnapshot {
        let driving_restricted = self.shared.driving_state.is_restricted();
        let store = self.shared.store();
        let mut pending_policy_services: Vec<ComponentName> = self
            .proxies
            .iter()
            .flat_map(HashMap::values)
            .map(|proxy| proxy.component().clone())
            .collect();
        pending_policy_services.sort();
        PolicySnapshot {
            activity_blocking_enabled: self.shared.enable_activity_blocking,
            driving_restricted,
            system_allowlist: store
                .system_allowlist()
                .iter()
                .map(|(name, entry)| (name.clone(), entry.clone()))
                .collect(),
            client_policies: store
                .client_policies()
                .iter()
                .map(|(client, policy)| (client.clone(), policy.clone()))
                .collect(),
            pending_policy_services,
            pending_waiters: self.waiting_policies.len(),
            default_activity_allowlist: self.default_activity_allowlist.clone(),
        }
    }

    /// Runs the event loop.
    async fn run(mut self) {
        info!("CarPackageManagerTask started.");
        loop {
            tokio::select! {
                biased;
                notification = self.notification_receiver.recv() => {
                    let Some(notification) = notification else {
                        info!("Notification channel closed. Shutting down.");
                        break;
                    };
                    if !self.handle_service_event(notification) {
                        break;
                    }
                }
                service_event = self.event_receiver.recv() => {
                    let Some(service_event) = service_event else {
                        info!("Event channel closed. Shutting down.");
                        break;
                    };
                    if !self.handle_service_event(service_event) {
                        info!("Shutdown event received.");
                        break;
                    }
                }
                status = self.driving_status_source.read(), if self.driving_status_reading => {
                    self.handle_driving_status(status);
                }
            }
        }
        self.tear_down();
    }
}

/// Decides whether apps may be shown while driving and blocks those that may not.
///
/// Must be created from within a Tokio runtime; the worker runs as a task on it.
pub struct CarPackageManager {
    shared: Arc<PackageManagerShared>,
    package_db: Arc<dyn PackageDatabase>,
    event_sender: mpsc::Sender<PackageServiceEvent>,
    notification_sender: mpsc::UnboundedSender<PackageServiceEvent>,
    service_task_handle: Option<JoinHandle<()>>,
}

impl CarPackageManager {
    /// Creates the manager and starts its worker.
    pub fn new(config: &CarPackageConfig, dependencies: CarPackageDependencies) -> Result<Self> {
        config.validate()?;
        let blocking_activity = config.blocking_activity()?;
        let (tx, rx) = mpsc::channel(config.worker_queue_size);
        let (notification_tx, notification_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(PackageManagerShared {
            enable_activity_blocking: config.enable_activity_blocking,
            blocking_activity,
            store: Mutex::new(PolicyStore::new()),
            driving_state: DrivingStateGate::new(),
            activity_monitor: dependencies.activity_monitor,
        });
        let service = CarPackageManagerTask {
            shared: shared.clone(),
            event_receiver: rx,
            event_sender: tx.downgrade(),
            notification_receiver: notification_rx,
            notification_sender: notification_tx.downgrade(),
            package_db: dependencies.package_database.clone(),
            metadata_reader: dependencies.metadata_reader,
            driving_status_source: dependencies.driving_status_source,
            policy_services: dependencies.policy_services,
            policy_service_timeout: config.policy_service_timeout(),
            default_activity_allowlist: config.default_activity_allowlist.clone(),
            proxies: None,
            next_proxy_id: 0,
            waiting_policies: VecDeque::new(),
            driving_status_subscribed: false,
            driving_status_reading: false,
            launch_listener_registered: false,
            generation: 0,
        };
        let service_task_handle = tokio::spawn(service.run());

        Ok(Self {
            shared,
            package_db: dependencies.package_database,
            event_sender: tx,
            notification_sender: notification_tx,
            service_task_handle: Some(service_task_handle),
        })
    }

    /// Discovers policy services, builds the system allowlist and starts enforcing.
    ///
    /// Init is queued ahead of any task posted after this call.
    pub fn init(&self) {
        if !self.shared.enable_activity_blocking {
            return;
        }
        if self.notification_sender.send(PackageServiceEvent::Init).is_err() {
            error!("Notification channel closed. Service might have crashed.");
        }
    }

    /// Drops every policy and subscription. Returns once the worker has done so.
    pub async fn release(&self) {
        if !self.shared.enable_activity_blocking {
            return;
        }
        let (ack, done) = oneshot::channel();
        if self.event_sender.send(PackageServiceEvent::Release(ack)).await.is_err() {
            error!("Event channel closed. Service might have crashed.");
            return;
        }
        // Being acknowledged also guarantees init has completed.
        if done.await.is_err() {
            error!("Release was not acknowledged by the worker.");
        }
    }

    /// Adds, removes or replaces the policy of `client_id`.
    ///
    /// The caller must hold the control-app-blocking permission and may only set its own
    /// policy. With `FLAG_SET_POLICY_WAIT_FOR_CHANGE` this returns once the policy barrier
    /// following the commit has fired, or once the manager is released.
    pub async fn set_app_blocking_policy(
        &self,
        caller: &CallerIdentity,
        client_id: &str,
        policy: Option<CarAppBlockingPolicy>,
        flags: u32,
    ) -> Result<()> {
        if !self.package_db.check_permission(PERMISSION_CONTROL_APP_BLOCKING, &caller.package_name)
        {
            return Err(CarPackageError::PermissionDenied(format!(
                "requires permission {}",
                PERMISSION_CONTROL_APP_BLOCKING
            )));
        }
        if caller.package_name != client_id {
            return Err(CarPackageError::PermissionDenied(format!(
                "caller {} cannot set policy of {}",
                caller.package_name, client_id
            )));
        }
        let policy = policy.ok_or_else(|| invalid_argument("policy cannot be null"))?;
        PolicyUpdateMode::from_flags(flags)?;
        policy.verify()?;
        debug!("policy setting from binder call, client:{}", client_id);

        let (waiter, wait) = if flags & FLAG_SET_POLICY_WAIT_FOR_CHANGE != 0 {
            let (waiter, wait) = oneshot::channel();
            (Some(waiter), Some(wait))
        } else {
            (None, None)
        };
        self.post_event(PackageServiceEvent::UpdatePolicy {
            client_id: client_id.to_string(),
            policy,
            flags,
            waiter,
        })
        .await?;
        self.post_event(PackageServiceEvent::SetPolicy).await?;
        if let Some(wait) = wait {
            // A dropped waiter means the worker stopped; either way the wait is over.
            let _ = wait.await;
        }
        Ok(())
    }

    /// Whether the activity may be shown while driving.
    pub fn is_activity_allowed_while_driving(
        &self,
        package_name: &str,
        class_name: &str,
    ) -> Result<bool> {
        if package_name.is_empty() {
            return Err(invalid_argument("Package name null"));
        }
        if class_name.is_empty() {
            return Err(invalid_argument("Class name null"));
        }
        let allowed = self.shared.is_activity_allowed(package_name, class_name);
        debug!("isActivityAllowedWhileDriving {}/{}: {}", package_name, class_name, allowed);
        Ok(allowed)
    }

    /// Whether services of the package may run while driving.
    pub fn is_service_allowed_while_driving(&self, package_name: &str) -> Result<bool> {
        if package_name.is_empty() {
            return Err(invalid_argument("Package name null"));
        }
        let allowed = self.shared.store().is_service_allowed(package_name);
        debug!("isServiceAllowedWhileDriving {}: {}", package_name, allowed);
        Ok(allowed)
    }

    /// Whether `activity` sits on top of an activity that is allowed while driving.
    ///
    /// Activities that are not the top of the focused stack are never in the way.
    pub fn is_activity_backed_by_safe_activity(&self, activity: &ComponentName) -> bool {
        if !self.shared.enable_activity_blocking || !self.shared.driving_state.is_restricted() {
            return true;
        }
        let Some(stack_info) = self.shared.activity_monitor.focused_stack_for_top_activity(activity)
        else {
            return true;
        };
        let task_count = stack_info.task_names.len();
        if task_count <= 1 {
            // Nothing below this.
            return false;
        }
        match ComponentName::unflatten_from_string(&stack_info.task_names[task_count - 2]) {
            Some(behind) => self.shared.is_activity_allowed(&behind.package_name, &behind.class_name),
            None => {
                warn!("Unparsable task name {:?}", stack_info.task_names[task_count - 2]);
                false
            }
        }
    }

    /// Whether the latest driving status restricts activities.
    pub fn is_driving_restricted(&self) -> bool {
        self.shared.driving_state.is_restricted()
    }

    /// Whether activity blocking is enabled by configuration.
    pub fn is_activity_blocking_enabled(&self) -> bool {
        self.shared.enable_activity_blocking
    }

    /// Copies the worker's state once every previously posted task has been handled.
    pub async fn policy_snapshot(&self) -> Result<PolicySnapshot> {
        let (reply, snapshot) = oneshot::channel();
        self.post_event(PackageServiceEvent::DumpPolicies(reply)).await?;
        snapshot.await.map_err(|_| CarPackageError::ServiceStopped)
    }

    async fn post_event(&self, event: PackageServiceEvent) -> Result<()> {
        self.event_sender.send(event).await.map_err(|_| CarPackageError::ServiceStopped)
    }
}

impl Drop for CarPackageManager {
    fn drop(&mut self) {
        info!("CarPackageManager dropping. Shutting down CarPackageManagerTask.");

        if self.event_sender.try_send(PackageServiceEvent::Shutdown).is_err() {
            error!("Failed to send shutdown signal to CarPackageManagerTask or channel already closed. Task might not shut down via signal.");
        }

        if let Some(_handle) = self.service_task_handle.take() {
            info!("CarPackageManagerTask shutdown initiated. The task will be managed by the Tokio runtime.");
        }
    }
}
