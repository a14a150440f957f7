crate::config_group!({

    /// The log destination.
    ///
    /// If this path exists as a directory or ends with a /, a timestamped log file is created inside it.
    /// Any other non-empty value is used as the log file path.  Empty or unset logs to the console.
    ///
    /// The default value is None.
    ///
    /// Use the environment variable `FW_SDK_LOG_DEST` to set this value.
    ref dest : Option<String> = None;

    /// The format the logs are printed in. If "json", then logs are dumped as json blobs; otherwise they
    /// are treated as text.  By default logging to files is done in json and console logging is done with text.
    ///
    /// The default value is None.
    ///
    /// Use the environment variable `FW_SDK_LOG_FORMAT` to set this value.
    ref format : Option<String> = None;

    /// The base name for a log file when logging to a directory.  The timestamp and pid are appended to this name.
    ///
    /// The default value is "fw_sdk".
    ///
    /// Use the environment variable `FW_SDK_LOG_PREFIX` to set this value.
    ref prefix : String = "fw_sdk".to_string();

});
