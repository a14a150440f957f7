mod aliases;
pub use aliases::{ENVIRONMENT_NAME_ALIASES, lookup_alias};

pub mod macros;
pub mod fw_config;

pub mod groups;

// Re-exported for use inside the config_group macro expansion.
pub use utils::configuration_utils::ParsableConfigValue;
pub use fw_config::FwConfig;

/// Prefix of every environment variable read by the configuration groups.
pub const ENV_PREFIX: &str = "FW_SDK";
