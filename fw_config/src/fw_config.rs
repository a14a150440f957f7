use crate::groups;

/// All configuration groups of the SDK.
///
/// `FwConfig::default()` holds the compiled-in defaults only; `FwConfig::new()` additionally
/// applies `FW_SDK_*` environment overrides.
#[derive(Debug, Clone, Default)]
pub struct FwConfig {
    pub client: groups::client::ConfigValueGroup,
    pub transfer: groups::transfer::ConfigValueGroup,
    pub log: groups::log::ConfigValueGroup,
}

impl FwConfig {
    pub fn new() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    pub fn apply_env_overrides(&mut self) {
        self.client.apply_env_overrides();
        self.transfer.apply_env_overrides();
        self.log.apply_env_overrides();
    }
}
