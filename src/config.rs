//! Server configuration from environment variables.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_MAX_UPLOAD_MB: usize = 256;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    /// Served as the fallback for non-API paths
    pub static_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            static_dir: PathBuf::from("static"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unparseable values keep the default
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let max_upload_mb = parse_or("CHATSPLIT_MAX_UPLOAD_MB", lookup("CHATSPLIT_MAX_UPLOAD_MB"), DEFAULT_MAX_UPLOAD_MB);
        Self {
            bind: parse_or("CHATSPLIT_BIND", lookup("CHATSPLIT_BIND"), defaults.bind),
            port: parse_or("PORT", lookup("PORT"), defaults.port),
            static_dir: lookup("CHATSPLIT_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {}={:?}", key, value);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> ServerConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]);
        assert_eq!(cfg.addr(), "0.0.0.0:8000".parse().unwrap());
        assert_eq!(cfg.static_dir, PathBuf::from("static"));
        assert_eq!(cfg.max_upload_bytes, 256 * 1024 * 1024);
    }

    #[test]
    fn test_overrides_and_invalid_values() {
        let cfg = config(&[
            ("PORT", "9100"),
            ("CHATSPLIT_BIND", "127.0.0.1"),
            ("CHATSPLIT_STATIC_DIR", "/srv/ui"),
            ("CHATSPLIT_MAX_UPLOAD_MB", "lots"),
        ]);
        assert_eq!(cfg.addr(), "127.0.0.1:9100".parse().unwrap());
        assert_eq!(cfg.static_dir, PathBuf::from("/srv/ui"));
        assert_eq!(cfg.max_upload_bytes, 256 * 1024 * 1024);
    }
}
