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

//! # Policy Services
//!
//! Out-of-process policy providers. Each discovered service gets a proxy that connects to it,
//! fetches its initial policy and reports back to the car package manager worker exactly once.

use crate::common::{ComponentName, PolicyServiceInfo};
use crate::error::{CarPackageError, Result as PolicyResult};
use crate::package_info::CarAppBlockingPolicy;
use crate::package_manager::PackageServiceEvent;
use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Connection to a policy service.
#[async_trait]
pub trait AppBlockingPolicyService: Send + Sync {
    /// Binds to the service.
    async fn connect(&self) -> Result<()>;

    /// Requests the service's initial policy. `Ok(None)` means it has none to offer.
    async fn get_app_blocking_policy(&self) -> Result<Option<CarAppBlockingPolicy>>;

    /// Unbinds from the service.
    fn disconnect(&self);
}

/// Creates the connection for a discovered policy service.
pub type PolicyServiceConstructor =
    Arc<dyn Fn(&PolicyServiceInfo) -> Result<Arc<dyn AppBlockingPolicyService>> + Send + Sync>;

/// Policy service implementations known at build time, keyed by flattened component name.
#[derive(Clone, Default)]
pub struct PolicyServiceRegistry {
    constructors: HashMap<String, PolicyServiceConstructor>,
}

impl PolicyServiceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the constructor used when `component` is discovered.
    pub fn register<F>(&mut self, component: &ComponentName, constructor: F)
    where
        F: Fn(&PolicyServiceInfo) -> Result<Arc<dyn AppBlockingPolicyService>>
            + Send
            + Sync
            + 'static,
    {
        self.constructors.insert(component.flatten_to_string(), Arc::new(constructor));
    }

    /// Registers an already constructed connection for `component`.
    pub fn register_service(
        &mut self,
        component: &ComponentName,
        service: Arc<dyn AppBlockingPolicyService>,
    ) {
        self.register(component, move |_| Ok(service.clone()));
    }

    /// Whether `component` has a constructor.
    pub fn is_registered(&self, component: &ComponentName) -> bool {
        self.constructors.contains_key(&component.flatten_to_string())
    }

    pub(crate) fn create(
        &self,
        info: &PolicyServiceInfo,
    ) -> PolicyResult<Arc<dyn AppBlockingPolicyService>> {
        let name = info.component.flatten_to_string();
        let constructor = self.constructors.get(&name).ok_or_else(|| {
            CarPackageError::ProviderUnavailable(format!("no implementation registered for {name}"))
        })?;
        constructor(info).map_err(|e| CarPackageError::ProviderUnavailable(format!("{name}: {e}")))
    }
}

impl fmt::Debug for PolicyServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.constructors.keys()).finish()
    }
}

/// Progress of a policy service proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyProxyState {
    /// Created, not connected yet.
    Init,
    /// Binding to the service.
    Connecting,
    /// Bound, waiting for the initial policy.
    WaitingForPolicy,
    /// The policy was delivered.
    Done,
    /// Binding failed, the service returned no policy, or it timed out.
    Failed,
}

pub(crate) type ProxyId = u64;

/// Tracks one policy service until it has delivered its initial policy.
pub struct AppBlockingPolicyProxy {
    id: ProxyId,
    info: PolicyServiceInfo,
    service: Arc<dyn AppBlockingPolicyService>,
    state: Arc<Mutex<PolicyProxyState>>,
    connection_task: Option<JoinHandle<()>>,
}

impl AppBlockingPolicyProxy {
    pub(crate) fn new(
        id: ProxyId,
        info: PolicyServiceInfo,
        service: Arc<dyn AppBlockingPolicyService>,
    ) -> Self {
        Self {
            id,
            info,
            service,
            state: Arc::new(Mutex::new(PolicyProxyState::Init)),
            connection_task: None,
        }
    }

    /// Package of the service. Its policy is committed under this client id.
    pub fn package_name(&self) -> &str {
        &self.info.component.package_name
    }

    /// The service component.
    pub fn component(&self) -> &ComponentName {
        &self.info.component
    }

    /// Current progress.
    pub fn state(&self) -> PolicyProxyState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Connects and fetches the policy in the background.
    ///
    /// The outcome is posted to the worker as a single `PolicyConnection` event.
    pub(crate) fn connect(&mut self, completion: mpsc::WeakSender<PackageServiceEvent>) {
        info!("Connecting to policy service {}", self.info.component);
        set_state(&self.state, PolicyProxyState::Connecting);

        let id = self.id;
        let component = self.info.component.clone();
        let service = self.service.clone();
        let state = self.state.clone();
        self.connection_task = Some(tokio::spawn(async move {
            let policy = match service.connect().await {
                Ok(()) => {
                    set_state(&state, PolicyProxyState::WaitingForPolicy);
                    match service.get_app_blocking_policy().await {
                        Ok(Some(policy)) => Some(policy),
                        Ok(None) => {
                            warn!("Policy service {} returned no policy", component);
                            None
                        }
                        Err(e) => {
                            warn!("Failed to get policy from {}: {}", component, e);
                            None
                        }
                    }
                }
                Err(e) => {
                    warn!("Failed to connect to policy service {}: {}", component, e);
                    None
                }
            };
            if policy.is_none() {
                set_state(&state, PolicyProxyState::Failed);
            }
            let Some(sender) = completion.upgrade() else {
                debug!("Car package manager gone, dropping result of {}", component);
                return;
            };
            if sender.send(PackageServiceEvent::PolicyConnection { proxy_id: id, policy }).await.is_err()
            {
                debug!("Event channel closed, dropping result of {}", component);
            }
        }));
    }

    /// Records the outcome delivered to the worker.
    pub(crate) fn complete(&self, policy_received: bool) {
        let state = if policy_received { PolicyProxyState::Done } else { PolicyProxyState::Failed };
        set_state(&self.state, state);
    }

    /// Marks a proxy that never completed as failed.
    pub(crate) fn fail(&self) {
        set_state(&self.state, PolicyProxyState::Failed);
    }

    /// Stops any pending connection work and unbinds from the service.
    pub(crate) fn disconnect(&mut self) {
        if let Some(task) = self.connection_task.take() {
            task.abort();
        }
        self.service.disconnect();
    }
}

impl fmt::Debug for AppBlockingPolicyProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppBlockingPolicyProxy")
            .field("id", &self.id)
            .field("component", &self.info.component)
            .field("state", &self.state())
            .finish()
    }
}

fn set_state(state: &Mutex<PolicyProxyState>, new_state: PolicyProxyState) {
    *state.lock().unwrap_or_else(PoisonError::into_inner) = new_state;
}
