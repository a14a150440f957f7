use std::path::PathBuf;

use fw_config::FwConfig;

#[derive(Clone, Debug, PartialEq)]
pub enum LoggingMode {
    Directory(PathBuf),
    File(PathBuf),
    Console,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoggingConfig {
    pub logging_mode: LoggingMode,
    pub use_json: bool,
    pub file_prefix: String,
    pub version: String,
}

impl LoggingConfig {
    /// Logging configuration driven by the `FW_SDK_LOG_*` environment variables.
    pub fn new(version: String) -> LoggingConfig {
        Self::from_config(&FwConfig::new(), version)
    }

    pub fn from_config(config: &FwConfig, version: String) -> LoggingConfig {
        let logging_mode = match config.log.dest.as_deref() {
            None | Some("") => LoggingMode::Console,
            Some(log_dest) => {
                let path = PathBuf::from(log_dest);

                if log_dest.ends_with('/') || (cfg!(windows) && log_dest.ends_with('\\')) || path.is_dir() {
                    LoggingMode::Directory(path)
                } else {
                    LoggingMode::File(path)
                }
            },
        };

        let use_json = match &config.log.format {
            Some(format) => format.to_ascii_lowercase().trim() == "json",
            None => logging_mode != LoggingMode::Console,
        };

        Self {
            logging_mode,
            use_json,
            file_prefix: config.log.prefix.clone(),
            version,
        }
    }
}
