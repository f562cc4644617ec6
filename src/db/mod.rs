//! Storage layer (embedded redb database).

pub mod store;

pub use store::{RegistrationStore, ToolKeyRecord};

/// Table names as constants.
pub mod tables {
    pub const REGISTRATIONS: &str = "registrations";
    pub const TOOL_KEYS: &str = "tool_keys";
}
