//! Client configuration

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

/// Region assumed when none is configured, cached, or reported by the server.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Part size used as the starting point when none is configured.
pub const DEFAULT_PART_SIZE: u64 = 64 * 1024 * 1024;

/// Increment applied to the part size until the part count fits the protocol
/// ceiling.
pub const PART_SIZE_STEP: u64 = 16 * 1024 * 1024;

/// Smallest part the protocol accepts (except the final part of an upload).
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Largest part the protocol accepts.
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Maximum number of parts in one multipart upload.
pub const MAX_PARTS: u64 = 10_000;

/// Largest object the protocol accepts (5 TiB).
pub const MAX_OBJECT_SIZE: u64 = 5 * 1024 * 1024 * 1024 * 1024;

/// URL scheme of the endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scheme {
    /// Plain HTTP.
    Http,
    /// TLS.
    Https,
}

impl Scheme {
    /// The scheme as it appears in a URL.
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    /// The port implied when the endpoint does not name one.
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

/// Immutable client configuration.
///
/// Built once, read by every operation. Mutable per-client state (the
/// credentials snapshot and the region cache) lives on the client itself.
#[derive(Clone, Debug)]
pub struct Config {
    /// Endpoint host, without scheme or port.
    pub host: String,
    /// Endpoint port.
    pub port: u16,
    /// Endpoint scheme.
    pub scheme: Scheme,
    /// Explicit region; when set, region resolution is skipped entirely.
    pub region: Option<String>,
    /// Force path-style addressing (bucket as the first path segment).
    pub path_style: bool,
    /// Use the provider's transfer-acceleration endpoint when possible.
    pub accelerate: bool,
    /// Explicit part size override; `None` means derive from object size.
    pub part_size: Option<u64>,
    /// Largest object the client will accept for upload.
    pub max_object_size: u64,
    /// User agent string.
    pub user_agent: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl Config {
    /// Parse an endpoint URL such as `https://s3.example.com:9000` into a
    /// configuration with defaults for everything else.
    pub fn new(endpoint: &str) -> Result<Self> {
        let url = Url::parse(endpoint)
            .map_err(|e| Error::InvalidEndpoint(format!("{endpoint}: {e}")))?;

        let scheme = match url.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => {
                return Err(Error::InvalidEndpoint(format!(
                    "unsupported scheme '{other}'"
                )))
            }
        };

        let host = url
            .host_str()
            .ok_or_else(|| Error::InvalidEndpoint(format!("{endpoint}: missing host")))?
            .to_string();

        if !url.path().is_empty() && url.path() != "/" {
            return Err(Error::InvalidEndpoint(format!(
                "{endpoint}: endpoint must not carry a path"
            )));
        }

        Ok(Self {
            port: url.port().unwrap_or_else(|| scheme.default_port()),
            host,
            scheme,
            region: None,
            path_style: false,
            accelerate: false,
            part_size: None,
            max_object_size: MAX_OBJECT_SIZE,
            user_agent: format!("skiff-client/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(300),
        })
    }

    /// Pin the region, disabling per-bucket resolution.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Always address buckets as path segments instead of subdomains.
    pub fn with_path_style(mut self) -> Self {
        self.path_style = true;
        self
    }

    /// Route through the provider's transfer-acceleration endpoint.
    pub fn with_accelerate(mut self) -> Self {
        self.accelerate = true;
        self
    }

    /// Override the derived part size. Validated against the protocol's part
    /// limits when an upload is sized, not here.
    pub fn with_part_size(mut self, part_size: u64) -> Self {
        self.part_size = Some(part_size);
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether the endpoint host carries a non-default port.
    pub fn has_custom_port(&self) -> bool {
        self.port != self.scheme.default_port()
    }

    /// The `Host` header value, with the port when non-default.
    pub fn host_header(&self, host: &str) -> String {
        if self.has_custom_port() {
            format!("{host}:{}", self.port)
        } else {
            host.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scheme_host_port() {
        let config = Config::new("https://s3.example.com:9000").unwrap();
        assert_eq!(config.scheme, Scheme::Https);
        assert_eq!(config.host, "s3.example.com");
        assert_eq!(config.port, 9000);
        assert!(config.has_custom_port());
    }

    #[test]
    fn default_ports_follow_scheme() {
        let config = Config::new("http://localhost").unwrap();
        assert_eq!(config.port, 80);
        assert!(!config.has_custom_port());

        let config = Config::new("https://s3.amazonaws.com").unwrap();
        assert_eq!(config.port, 443);
        assert_eq!(config.host_header("bucket.s3.amazonaws.com"), "bucket.s3.amazonaws.com");
    }

    #[test]
    fn host_header_includes_custom_port() {
        let config = Config::new("http://localhost:9000").unwrap();
        assert_eq!(config.host_header("localhost"), "localhost:9000");
    }

    #[test]
    fn rejects_bad_endpoints() {
        assert!(matches!(
            Config::new("ftp://example.com"),
            Err(Error::InvalidEndpoint(_))
        ));
        assert!(matches!(
            Config::new("not a url"),
            Err(Error::InvalidEndpoint(_))
        ));
        assert!(matches!(
            Config::new("https://example.com/prefix"),
            Err(Error::InvalidEndpoint(_))
        ));
    }
}
