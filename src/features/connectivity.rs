//! Answers "is the API reachable right now?" at the start of a mutation.

use std::net::TcpStream;
use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::config::{ConnectivityConfig, ConnectivityMode};
use crate::error::CatalogError;

/// Single synchronous connectivity read. Never fails.
#[cfg_attr(test, mockall::automock)]
pub trait Connectivity {
    fn is_online(&self) -> bool;
}

/// Fixed answer, for forced modes and tests.
#[derive(Debug, Clone, Copy)]
pub struct StaticConnectivity(pub bool);

impl Connectivity for StaticConnectivity {
    fn is_online(&self) -> bool {
        self.0
    }
}

/// Online when a TCP connection to the API host succeeds within the timeout.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    url: Url,
    timeout: Duration,
}

impl TcpProbe {
    #[must_use]
    pub const fn new(url: Url, timeout: Duration) -> Self {
        Self { url, timeout }
    }
}

impl Connectivity for TcpProbe {
    fn is_online(&self) -> bool {
        let Ok(addrs) = self.url.socket_addrs(|| None) else {
            debug!(url = %self.url, "could not resolve API host");
            return false;
        };

        let online = addrs
            .iter()
            .any(|addr| TcpStream::connect_timeout(addr, self.timeout).is_ok());
        debug!(url = %self.url, online, "connectivity probed");
        online
    }
}

/// Build the oracle for a configured mode.
///
/// `override_online` comes from `--online` / `--offline` and wins over the file.
///
/// # Errors
///
/// Returns `CatalogError::Url` if auto mode needs to probe an invalid base URL.
pub fn from_config(
    config: &ConnectivityConfig,
    base_url: &str,
    override_online: Option<bool>,
) -> Result<Box<dyn Connectivity>, CatalogError> {
    let mode = match override_online {
        Some(true) => ConnectivityMode::Online,
        Some(false) => ConnectivityMode::Offline,
        None => config.mode,
    };

    Ok(match mode {
        ConnectivityMode::Online => Box::new(StaticConnectivity(true)),
        ConnectivityMode::Offline => Box::new(StaticConnectivity(false)),
        ConnectivityMode::Auto => Box::new(TcpProbe::new(
            Url::parse(base_url)?,
            Duration::from_millis(config.probe_timeout_ms),
        )),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_static() {
        assert!(StaticConnectivity(true).is_online());
        assert!(!StaticConnectivity(false).is_online());
    }

    #[test]
    fn test_probe_reaches_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = Url::parse(&format!("http://127.0.0.1:{port}/api/")).unwrap();

        assert!(TcpProbe::new(url, Duration::from_millis(500)).is_online());
    }

    #[test]
    fn test_probe_closed_port_is_offline() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let url = Url::parse(&format!("http://127.0.0.1:{port}/api/")).unwrap();

        assert!(!TcpProbe::new(url, Duration::from_millis(200)).is_online());
    }

    #[test]
    fn test_override_wins() {
        let config = ConnectivityConfig {
            mode: ConnectivityMode::Online,
            probe_timeout_ms: 100,
        };
        let oracle = from_config(&config, "http://localhost:1/", Some(false)).unwrap();
        assert!(!oracle.is_online());

        let oracle = from_config(&config, "not a url", None).unwrap();
        assert!(oracle.is_online());
    }
}
