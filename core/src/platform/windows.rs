//! Windows family: direct launch, network readiness

use super::{jvm_argv, LaunchCommand, Platform, PlatformFamily};
use crate::env::EnvOverrides;
use crate::identity::Identity;
use crate::keys::{KeyFileGuard, NoopKeyFileGuard};
use crate::readiness::{PingReadiness, Readiness};
use crate::{CoreError, Result};
use schema::{LaunchSpec, LauncherConfig};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Windows server hosts
///
/// The child inherits identity and resource limits from the service that
/// runs the supervisor, so there is no shell wrapper, no descriptor limit and
/// no user switch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WindowsPlatform;

impl WindowsPlatform {
    pub fn new() -> Self {
        Self
    }
}

impl Platform for WindowsPlatform {
    fn family(&self) -> PlatformFamily {
        PlatformFamily::Windows
    }

    fn ensure_can_start(&self, _run_as: Option<&str>, current: &Identity) -> Result<()> {
        debug!("Starting as {}; identity is managed by the service host", current.name);
        Ok(())
    }

    fn check_local_security(&self, _current: &Identity) {}

    fn java_executable(&self, jdk_home: &Path) -> PathBuf {
        jdk_home.join("bin").join("java.exe")
    }

    fn classpath_separator(&self) -> char {
        ';'
    }

    fn key_file_guard(&self) -> &dyn KeyFileGuard {
        &NoopKeyFileGuard
    }

    fn build_command(
        &self,
        spec: &LaunchSpec,
        _current: &Identity,
        env: EnvOverrides,
    ) -> Result<LaunchCommand> {
        let mut argv = jvm_argv(spec).into_iter();
        let program = argv
            .next()
            .ok_or_else(|| CoreError::Other("empty JVM argument vector".to_string()))?;
        Ok(LaunchCommand {
            program: PathBuf::from(program),
            args: argv.collect(),
            env,
            working_dir: None,
            output_log: Some(PathBuf::from(&spec.output_log_path)),
            exit_code_file: PathBuf::from(&spec.exit_code_file_path),
        })
    }

    fn readiness(&self, config: &LauncherConfig) -> Box<dyn Readiness> {
        Box::new(PingReadiness::from_config(config))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::spec;
    use super::*;

    #[test]
    fn direct_argv_without_shell_wrapper() {
        let cmd = WindowsPlatform
            .build_command(&spec(true, false), &Identity::new("svc", false), EnvOverrides::new())
            .unwrap();

        assert_eq!(cmd.program, PathBuf::from("/usr/jdk64/jdk1.8/bin/java"));
        assert!(!cmd.args.iter().any(|a| a.contains("ulimit") || a.contains("su ")));
        assert!(cmd.args.iter().any(|a| a.ends_with("suspend=n")));
        assert_eq!(
            cmd.output_log,
            Some(PathBuf::from("/var/log/ignition/ignition-server.out"))
        );
        assert_eq!(cmd.working_dir, None);
    }

    #[test]
    fn any_identity_may_start() {
        assert!(WindowsPlatform
            .ensure_can_start(None, &Identity::new("svc", false))
            .is_ok());
    }

    #[test]
    fn windows_paths() {
        assert_eq!(WindowsPlatform.classpath_separator(), ';');
        assert_eq!(
            WindowsPlatform.java_executable(Path::new("C:/jdk")),
            PathBuf::from("C:/jdk").join("bin").join("java.exe")
        );
    }
}
