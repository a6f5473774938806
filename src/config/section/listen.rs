//! `[server]` section configuration.
//!
//! ```toml
//! [server]
//! interface = "127.0.0.1"   # Network interface (127.0.0.1 = localhost only)
//! port = 5323               # Listening port
//! ```
//!
//! Use `interface = "0.0.0.0"` to accept clients from the LAN.

use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

/// Network listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// Network interface to bind.
    /// - `127.0.0.1` (default): localhost only
    /// - `0.0.0.0`: all interfaces (LAN accessible)
    pub interface: IpAddr,

    /// Listening port.
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 5323,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use crate::config::test_parse_config;

    #[test]
    fn test_listen_config() {
        let config = test_parse_config("[server]\ninterface = \"0.0.0.0\"\nport = 8080");

        assert_eq!(
            config.server.interface,
            IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0))
        );
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_listen_config_defaults() {
        let config = test_parse_config("");

        assert_eq!(
            config.server.interface,
            IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
        );
        assert_eq!(config.server.port, 5323);
    }

    #[test]
    fn test_listen_config_partial_override() {
        let config = test_parse_config("[server]\nport = 3000");

        assert_eq!(config.server.port, 3000);
        assert_eq!(
            config.server.interface,
            IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
        );
    }
}
