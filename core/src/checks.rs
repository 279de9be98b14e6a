//! Pre-launch checks run by the supervisor
//!
//! Each check is a seam: [`StartupChecks`] carries the default behavior and
//! can be replaced wholesale (tests, embedders with their own DBMS tooling).

use crate::health::{Probe, TcpProbe};
use crate::host::{reverse_lookup_matches, HostResolver, SystemResolver};
use crate::{CoreError, Result};
use async_trait::async_trait;
use schema::LauncherConfig;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error};

const DBMS_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Checks that gate the launch
#[async_trait]
pub trait StartupChecks: Send + Sync + fmt::Debug {
    /// Whether reverse DNS agrees with the local host name; advisory only
    fn reverse_lookup_ok(&self) -> bool;

    /// Required configuration keys are present
    fn check_required_properties(&self, config: &LauncherConfig) -> Result<()> {
        crate::config::check_required_properties(config)
    }

    /// The configured JDBC driver is installed
    fn ensure_driver(&self, config: &LauncherConfig) -> Result<()>;

    /// The backing DBMS accepts connections
    async fn ensure_dbms_reachable(&self, config: &LauncherConfig) -> Result<()>;

    /// Refresh the cached stack-definition hash
    fn refresh_stack_hash(&self, _config: &LauncherConfig) -> Result<()> {
        Ok(())
    }
}

/// Checks against the real host
#[derive(Debug)]
pub struct DefaultStartupChecks {
    resolver: Box<dyn HostResolver>,
    dbms_timeout: Duration,
}

impl Default for DefaultStartupChecks {
    fn default() -> Self {
        Self {
            resolver: Box::new(SystemResolver),
            dbms_timeout: DBMS_CONNECT_TIMEOUT,
        }
    }
}

impl DefaultStartupChecks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolver(mut self, resolver: Box<dyn HostResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_dbms_timeout(mut self, timeout: Duration) -> Self {
        self.dbms_timeout = timeout;
        self
    }
}

#[async_trait]
impl StartupChecks for DefaultStartupChecks {
    fn reverse_lookup_ok(&self) -> bool {
        reverse_lookup_matches(self.resolver.as_ref())
    }

    fn ensure_driver(&self, config: &LauncherConfig) -> Result<()> {
        let Some(driver) = config.database.driver_path.as_deref() else {
            debug!("No JDBC driver configured");
            return Ok(());
        };
        if Path::new(driver).is_file() {
            Ok(())
        } else {
            Err(CoreError::ConfigurationError(format!(
                "JDBC driver {} is not installed. Install it and rerun setup.",
                driver
            )))
        }
    }

    async fn ensure_dbms_reachable(&self, config: &LauncherConfig) -> Result<()> {
        let (Some(host), Some(port)) = (config.database.host.as_deref(), config.database.port)
        else {
            debug!("No remote database configured; skipping reachability check");
            return Ok(());
        };
        let probe = TcpProbe::new(host, port, self.dbms_timeout);
        probe.check().await.map_err(|e| {
            error!("Database at {} is not reachable: {}", probe.address(), e);
            CoreError::Probe(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn config() -> LauncherConfig {
        LauncherConfig {
            conf_dir: "/etc/ignition/conf".to_string(),
            main_class: "org.example.server.Main".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn driver_must_exist_when_configured() {
        let checks = DefaultStartupChecks::new();
        let mut cfg = config();
        assert!(checks.ensure_driver(&cfg).is_ok());

        cfg.database.driver_path = Some("/nonexistent/driver.jar".to_string());
        assert!(matches!(
            checks.ensure_driver(&cfg),
            Err(CoreError::ConfigurationError(_))
        ));

        let file = tempfile::NamedTempFile::new().unwrap();
        cfg.database.driver_path = Some(file.path().display().to_string());
        assert!(checks.ensure_driver(&cfg).is_ok());
    }

    #[tokio::test]
    async fn dbms_reachability() {
        let checks = DefaultStartupChecks::new().with_dbms_timeout(Duration::from_secs(1));
        let mut cfg = config();
        assert!(checks.ensure_dbms_reachable(&cfg).await.is_ok());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move { while listener.accept().await.is_ok() {} });
        cfg.database.host = Some("127.0.0.1".to_string());
        cfg.database.port = Some(port);
        assert!(checks.ensure_dbms_reachable(&cfg).await.is_ok());

        let closed = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        cfg.database.port = Some(closed);
        assert!(matches!(
            checks.ensure_dbms_reachable(&cfg).await,
            Err(CoreError::Probe(_))
        ));
    }

    #[test]
    fn stack_hash_refresh_defaults_to_noop() {
        assert!(DefaultStartupChecks::new().refresh_stack_hash(&config()).is_ok());
    }
}
