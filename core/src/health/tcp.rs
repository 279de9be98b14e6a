//! TCP reachability probe, used for the backing DBMS

use super::{HealthError, Probe};
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Succeeds when a TCP connection to `host:port` can be opened
#[derive(Debug, Clone)]
pub struct TcpProbe {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    /// Probe `host:port`, giving up after `timeout`
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    /// `host:port`
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[async_trait]
impl Probe for TcpProbe {
    async fn check(&self) -> Result<(), HealthError> {
        let address = self.address();
        debug!("Connecting to {}", address);

        match timeout(self.timeout, TcpStream::connect(&address)).await {
            Ok(Ok(_stream)) => {
                debug!("{} is reachable", address);
                Ok(())
            }
            Ok(Err(e)) => {
                debug!("Connection to {} failed: {}", address, e);
                Err(HealthError::Tcp(e))
            }
            Err(_) => Err(HealthError::Timeout(self.timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn reachable_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move { while listener.accept().await.is_ok() {} });

        let probe = TcpProbe::new("127.0.0.1", port, Duration::from_secs(1));
        assert!(probe.check().await.is_ok());
    }

    #[tokio::test]
    async fn refused_connection_is_a_tcp_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let probe = TcpProbe::new("127.0.0.1", port, Duration::from_secs(1));
        match probe.check().await.unwrap_err() {
            HealthError::Tcp(_) => {}
            other => panic!("expected Tcp error, got {other:?}"),
        }
    }

    #[test]
    fn address_format() {
        let probe = TcpProbe::new("db.example.com", 5432, Duration::from_secs(5));
        assert_eq!(probe.address(), "db.example.com:5432");
    }
}
