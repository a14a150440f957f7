/// Macro to create a configuration value group struct.
///
/// Usage:
/// ```rust
/// use fw_config::config_group;
///
/// config_group!({
///     ref TEST_INT: usize = 42;
///     ref TEST_STRING: String = "default".to_string();
/// });
/// ```
///
/// This creates a `ConfigValueGroup` struct with the specified fields, a `Default` impl holding the
/// declared defaults, and `apply_env_overrides()` which reads `FW_SDK_<GROUP>_<FIELD>` for each
/// field.  The group name is the last segment of the module path the macro is invoked in, so the
/// `transfer` module's `progress_interval` is `FW_SDK_TRANSFER_PROGRESS_INTERVAL`.  Legacy names
/// listed in [crate::ENVIRONMENT_NAME_ALIASES] are consulted when the primary variable is unset.
#[macro_export]
macro_rules! config_group {
    ({
        $(
            $(#[$meta:meta])*
            ref $name:ident : $type:ty = $value:expr;
        )+
    }) => {
        #[allow(unused_imports)]
        use $crate::ParsableConfigValue;

        /// ConfigValueGroup struct containing all configurable values
        #[derive(Debug, Clone)]
        pub struct ConfigValueGroup {
            $(
                $(#[$meta])*
                #[allow(non_snake_case)]
                pub $name: $type,
            )+
        }

        impl Default for ConfigValueGroup {
            /// Create a new instance with default values only (no environment variable overrides).
            fn default() -> Self {
                Self {
                    $(
                        $name: {
                            let v: $type = $value;
                            v
                        },
                    )+
                }
            }
        }

        impl ConfigValueGroup {
            /// Create a new instance with default values only (no environment variable overrides).
            pub fn new() -> Self {
                Self::default()
            }

            /// Apply environment variable overrides to this configuration group.
            pub fn apply_env_overrides(&mut self) {
                let module_path = module_path!();
                let group_name = module_path
                    .split("::")
                    .last()
                    .unwrap_or("unknown");

                $(
                    let env_var_name = format!(
                        "{}_{}_{}",
                        $crate::ENV_PREFIX,
                        group_name.to_uppercase(),
                        stringify!($name).to_uppercase()
                    );
                    let maybe_env_value = std::env::var(&env_var_name)
                        .ok()
                        .or_else(|| $crate::lookup_alias(&env_var_name));
                    let default_value: $type = $value;
                    self.$name = <$type>::parse(&env_var_name, maybe_env_value, default_value);
                )+
            }
        }
    };
}
