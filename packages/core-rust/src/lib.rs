//! `tailnet-mcp` core: tailnet records, backend capability traits, argument
//! validation, and the tool result envelope.

pub mod context;
pub mod envelope;
pub mod traits;
pub mod types;
pub mod validation;

pub use context::RequestContext;
pub use envelope::ToolResult;
pub use traits::{DevicesResource, KeysResource, PolicyFileResource, TailnetClient};
pub use types::{Acl, AclEntry, Device, DeviceRoutes, Key};
pub use validation::{
    reject_unknown_arguments, require_string, validate_identifier, Arguments, ValidationError,
};

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
