//! Tailnet records returned by the management API.
//!
//! Field names follow the API's camelCase wire format. Every record keeps
//! unrecognised fields in an `extra` map so that `fields=all` responses
//! round-trip into the tool payload without losing data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A machine joined to the tailnet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Legacy numeric-string device identifier.
    #[serde(default)]
    pub id: String,
    /// Preferred stable node identifier.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub node_id: String,
    /// MagicDNS name of the device.
    #[serde(default)]
    pub name: String,
    /// OS-reported hostname.
    #[serde(default)]
    pub hostname: String,
    /// Owning user (login name).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,
    /// Tailscale IP addresses assigned to the device.
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub os: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub client_version: String,
    #[serde(default)]
    pub update_available: bool,
    #[serde(default)]
    pub authorized: bool,
    #[serde(default)]
    pub is_external: bool,
    #[serde(default)]
    pub key_expiry_disabled: bool,
    #[serde(default)]
    pub blocks_incoming_connections: bool,
    /// ACL tags applied to the device.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// RFC 3339 timestamps, kept verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    /// Subnet routes the device advertises (present with `fields=all`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advertised_routes: Vec<String>,
    /// Subnet routes approved for the device (present with `fields=all`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enabled_routes: Vec<String>,
    /// Any field not modelled above (client connectivity, posture identity, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Subnet routes of a single device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRoutes {
    /// Routes the device offers to the tailnet.
    #[serde(rename = "advertisedRoutes", default)]
    pub advertised: Vec<String>,
    /// Subset of advertised routes that an admin approved.
    #[serde(rename = "enabledRoutes", default)]
    pub enabled: Vec<String>,
}

/// The tailnet policy file in its JSON form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Acl {
    #[serde(default)]
    pub acls: Vec<AclEntry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub groups: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hosts: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tag_owners: BTreeMap<String, Vec<String>>,
    /// Remaining policy sections (`ssh`, `tests`, `autoApprovers`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One access rule of the policy file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AclEntry {
    /// Rule action, `"accept"` in practice.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub action: String,
    #[serde(rename = "src", default, skip_serializing_if = "Vec::is_empty")]
    pub source: Vec<String>,
    #[serde(rename = "dst", default, skip_serializing_if = "Vec::is_empty")]
    pub destination: Vec<String>,
    #[serde(rename = "proto", default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    /// Legacy `users` selector.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,
    /// Legacy `ports` selector.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    /// Rule fields not modelled above (`srcPosture`, `via`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An API access token, auth key, or OAuth client registered on the tailnet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Key {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked: Option<String>,
    #[serde(default)]
    pub invalid: bool,
    /// Capability grants, kept opaque.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
