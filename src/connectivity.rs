//! Network reachability checks consulted before every fetch.
//!
//! One probe instance is shared by all feeds.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Reports reachability by opening a TCP connection to the API host.
pub struct TcpProbe {
    address: String,
    timeout: Duration,
}

impl TcpProbe {
    /// `address` is a `host:port` pair, e.g. `api.themoviedb.org:443`.
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ConnectivityProbe for TcpProbe {
    async fn is_online(&self) -> bool {
        match tokio::time::timeout(self.timeout, tokio::net::TcpStream::connect(&self.address))
            .await
        {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                tracing::debug!(address = %self.address, error = %e, "Connectivity probe failed");
                false
            }
            Err(_) => {
                tracing::debug!(address = %self.address, "Connectivity probe timed out");
                false
            }
        }
    }
}

/// A probe with a fixed, settable answer. Backs `--offline` and tests.
#[derive(Debug)]
pub struct StaticProbe {
    online: AtomicBool,
}

impl StaticProbe {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }
}

#[async_trait]
impl ConnectivityProbe for StaticProbe {
    async fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_probe_toggles() {
        let probe = StaticProbe::new(false);
        assert!(!probe.is_online().await);
        probe.set_online(true);
        assert!(probe.is_online().await);
    }

    #[tokio::test]
    async fn test_tcp_probe_reaches_local_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let probe = TcpProbe::new(address, Duration::from_secs(1));
        assert!(probe.is_online().await);
    }

    #[tokio::test]
    async fn test_tcp_probe_refused_is_offline() {
        // Bind then drop to get a port nothing listens on
        let address = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().to_string()
        };

        let probe = TcpProbe::new(address, Duration::from_secs(1));
        assert!(!probe.is_online().await);
    }
}
