use async_trait::async_trait;

use crate::types::{Acl, Device, DeviceRoutes, Key};

/// Read access to the devices of a tailnet.
#[async_trait]
pub trait DevicesResource: Send + Sync {
    /// List every device with all optional fields populated.
    async fn list_with_all_fields(&self) -> anyhow::Result<Vec<Device>>;

    /// Fetch a single device with all optional fields populated.
    async fn get_with_all_fields(&self, device_id: &str) -> anyhow::Result<Device>;

    /// Fetch the advertised and enabled subnet routes of a device.
    async fn subnet_routes(&self, device_id: &str) -> anyhow::Result<DeviceRoutes>;
}

/// Read access to the tailnet policy file.
#[async_trait]
pub trait PolicyFileResource: Send + Sync {
    /// Fetch the policy file as parsed JSON.
    async fn get(&self) -> anyhow::Result<Acl>;
}

/// Read access to the keys registered on the tailnet.
#[async_trait]
pub trait KeysResource: Send + Sync {
    /// List keys. With `all` set, keys created by other users are included.
    async fn list(&self, all: bool) -> anyhow::Result<Vec<Key>>;
}

/// Authenticated management API client, grouped by resource.
///
/// Implementations: the HTTP client in `tailnet-mcp-server`, and an
/// in-memory double for tests. Tool handlers depend only on this trait.
pub trait TailnetClient: Send + Sync {
    fn devices(&self) -> &dyn DevicesResource;

    fn policy_file(&self) -> &dyn PolicyFileResource;

    fn keys(&self) -> &dyn KeysResource;
}
