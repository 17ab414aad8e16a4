//! In-memory [`TailnetClient`] for tests and local development.
//!
//! Each resource group holds fixture data, an optional injected failure,
//! and a call counter so tests can assert whether the backend was reached.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use parking_lot::RwLock;
use tailnet_mcp_core::{
    Acl, Device, DeviceRoutes, DevicesResource, Key, KeysResource, PolicyFileResource,
    TailnetClient,
};

/// Fixture-backed tailnet.
#[derive(Debug, Default)]
pub struct MemoryTailnet {
    pub devices: MemoryDevices,
    pub policy_file: MemoryPolicyFile,
    pub keys: MemoryKeys,
}

impl MemoryTailnet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_devices(self, devices: Vec<Device>) -> Self {
        *self.devices.devices.write() = devices;
        self
    }

    #[must_use]
    pub fn with_routes(self, device_id: &str, routes: DeviceRoutes) -> Self {
        self.devices.routes.write().insert(device_id.to_string(), routes);
        self
    }

    #[must_use]
    pub fn with_acl(self, acl: Acl) -> Self {
        *self.policy_file.acl.write() = acl;
        self
    }

    #[must_use]
    pub fn with_keys(self, keys: Vec<Key>) -> Self {
        *self.keys.keys.write() = keys;
        self
    }

    /// Total number of backend calls across all resource groups.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.devices.calls() + self.policy_file.calls() + self.keys.calls()
    }
}

impl TailnetClient for MemoryTailnet {
    fn devices(&self) -> &dyn DevicesResource {
        &self.devices
    }

    fn policy_file(&self) -> &dyn PolicyFileResource {
        &self.policy_file
    }

    fn keys(&self) -> &dyn KeysResource {
        &self.keys
    }
}

/// Behaviour shared by every in-memory resource group.
#[derive(Debug, Default)]
struct Behaviour {
    failure: RwLock<Option<String>>,
    delay: RwLock<Option<Duration>>,
    calls: AtomicUsize,
}

impl Behaviour {
    /// Counts the call, applies any delay, then returns the injected failure.
    async fn enter(&self) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failure = self.failure.read().clone();
        match failure {
            Some(message) => Err(anyhow!(message)),
            None => Ok(()),
        }
    }
}

macro_rules! behaviour_accessors {
    ($ty:ty) => {
        impl $ty {
            /// Makes every subsequent call fail with `message`.
            pub fn fail_with(&self, message: impl Into<String>) {
                *self.behaviour.failure.write() = Some(message.into());
            }

            /// Delays every subsequent call by `delay` before answering.
            pub fn delay_by(&self, delay: Duration) {
                *self.behaviour.delay.write() = Some(delay);
            }

            /// Number of calls received so far.
            #[must_use]
            pub fn calls(&self) -> usize {
                self.behaviour.calls.load(Ordering::SeqCst)
            }
        }
    };
}

#[derive(Debug, Default)]
pub struct MemoryDevices {
    devices: RwLock<Vec<Device>>,
    routes: RwLock<HashMap<String, DeviceRoutes>>,
    behaviour: Behaviour,
}

#[derive(Debug, Default)]
pub struct MemoryPolicyFile {
    acl: RwLock<Acl>,
    behaviour: Behaviour,
}

#[derive(Debug, Default)]
pub struct MemoryKeys {
    keys: RwLock<Vec<Key>>,
    last_all: RwLock<Option<bool>>,
    behaviour: Behaviour,
}

behaviour_accessors!(MemoryDevices);
behaviour_accessors!(MemoryPolicyFile);
behaviour_accessors!(MemoryKeys);

impl MemoryDevices {
    fn find(&self, device_id: &str) -> Option<Device> {
        self.devices
            .read()
            .iter()
            .find(|d| d.id == device_id || d.node_id == device_id)
            .cloned()
    }
}

impl MemoryKeys {
    /// The `all` flag of the most recent `list` call.
    #[must_use]
    pub fn last_all(&self) -> Option<bool> {
        *self.last_all.read()
    }
}

#[async_trait]
impl DevicesResource for MemoryDevices {
    async fn list_with_all_fields(&self) -> anyhow::Result<Vec<Device>> {
        self.behaviour.enter().await?;
        Ok(self.devices.read().clone())
    }

    async fn get_with_all_fields(&self, device_id: &str) -> anyhow::Result<Device> {
        self.behaviour.enter().await?;
        self.find(device_id)
            .ok_or_else(|| anyhow!("device not found: {device_id}"))
    }

    async fn subnet_routes(&self, device_id: &str) -> anyhow::Result<DeviceRoutes> {
        self.behaviour.enter().await?;
        if let Some(routes) = self.routes.read().get(device_id) {
            return Ok(routes.clone());
        }
        self.find(device_id)
            .map(|d| DeviceRoutes {
                advertised: d.advertised_routes,
                enabled: d.enabled_routes,
            })
            .ok_or_else(|| anyhow!("device not found: {device_id}"))
    }
}

#[async_trait]
impl PolicyFileResource for MemoryPolicyFile {
    async fn get(&self) -> anyhow::Result<Acl> {
        self.behaviour.enter().await?;
        Ok(self.acl.read().clone())
    }
}

#[async_trait]
impl KeysResource for MemoryKeys {
    async fn list(&self, all: bool) -> anyhow::Result<Vec<Key>> {
        *self.last_all.write() = Some(all);
        self.behaviour.enter().await?;
        Ok(self.keys.read().clone())
    }
}
