use std::fmt;
use std::str::FromStr;

use crate::errors::{FwClientError, Result};

pub const DEFAULT_PORT: u16 = 443;

/// An API key of the form `host:key` or `host:port:key`.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey {
    pub host: String,
    pub port: u16,
    pub key: String,
}

impl FromStr for ApiKey {
    type Err = FwClientError;

    fn from_str(s: &str) -> Result<Self> {
        let segments: Vec<&str> = s.split(':').collect();

        let (host, port, key) = match segments.as_slice() {
            [host, key] => (*host, DEFAULT_PORT, *key),
            [host, port, .., key] => (*host, port.parse::<u16>()?, *key),
            _ => return Err(FwClientError::InvalidApiKey),
        };

        if host.is_empty() || key.is_empty() {
            return Err(FwClientError::InvalidApiKey);
        }

        Ok(Self {
            host: host.to_owned(),
            port,
            key: key.to_owned(),
        })
    }
}

impl ApiKey {
    /// `<scheme>://<host>:<port>/api/`
    pub fn base_url(&self, plaintext: bool) -> Result<url::Url> {
        let scheme = if plaintext { "http" } else { "https" };
        Ok(url::Url::parse(&format!("{scheme}://{}:{}/api/", self.host, self.port))?)
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKey")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("key", &"****")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_and_key() {
        let key: ApiKey = "flywheel.example.com:abc123".parse().unwrap();
        assert_eq!(key.host, "flywheel.example.com");
        assert_eq!(key.port, 443);
        assert_eq!(key.key, "abc123");
        assert_eq!(key.base_url(false).unwrap().as_str(), "https://flywheel.example.com/api/");
    }

    #[test]
    fn test_host_port_and_key() {
        let key: ApiKey = "localhost:8443:abc123".parse().unwrap();
        assert_eq!(key.port, 8443);
        assert_eq!(key.key, "abc123");
        assert_eq!(key.base_url(true).unwrap().as_str(), "http://localhost:8443/api/");
    }

    #[test]
    fn test_extra_segments_use_last_as_key() {
        let key: ApiKey = "localhost:8080:ignored:real".parse().unwrap();
        assert_eq!(key.port, 8080);
        assert_eq!(key.key, "real");
    }

    #[test]
    fn test_rejects_bad_keys() {
        assert!(matches!("nocolon".parse::<ApiKey>(), Err(FwClientError::InvalidApiKey)));
        assert!(matches!(":key".parse::<ApiKey>(), Err(FwClientError::InvalidApiKey)));
        assert!(matches!("host:".parse::<ApiKey>(), Err(FwClientError::InvalidApiKey)));
        assert!(matches!("host:https:key".parse::<ApiKey>(), Err(FwClientError::InvalidPort(_))));
    }

    #[test]
    fn test_debug_hides_key() {
        let key: ApiKey = "host:secret".parse().unwrap();
        assert!(!format!("{key:?}").contains("secret"));
    }
}
