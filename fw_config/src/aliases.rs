/// Older environment variable names that are still honored.  Each entry maps the primary variable
/// to the legacy name; the primary wins when both are set.
pub const ENVIRONMENT_NAME_ALIASES: &[(&str, &str)] = &[
    // Request dumping was historically switched on by `SdkDebug`.
    ("FW_SDK_CLIENT_DEBUG_REQUESTS", "SdkDebug"),
    ("FW_SDK_LOG_DEST", "FW_SDK_LOG_FILE"),
];

/// Returns the value of the first set legacy variable for `primary`, if any.
pub fn lookup_alias(primary: &str) -> Option<String> {
    ENVIRONMENT_NAME_ALIASES
        .iter()
        .filter(|(p, _)| *p == primary)
        .find_map(|(_, alias)| std::env::var(alias).ok())
}
