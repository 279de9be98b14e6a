//! POSIX family: shell-wrapped, detached launch

use super::{jvm_argv, sh_quote, LaunchCommand, Platform, PlatformFamily};
use crate::env::EnvOverrides;
use crate::identity::{ensure_can_start_as, Identity};
use crate::keys::KeyFileGuard;
use crate::readiness::{ProcessTableReadiness, Readiness, SystemProcessTable};
use crate::Result;
use schema::{LaunchSpec, LauncherConfig};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const FALLBACK_BIN_DIR: &str = "/bin";

/// Linux, BSD and macOS hosts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PosixPlatform {
    sh: PathBuf,
    su: PathBuf,
}

impl Default for PosixPlatform {
    fn default() -> Self {
        Self {
            sh: Path::new(FALLBACK_BIN_DIR).join("sh"),
            su: Path::new(FALLBACK_BIN_DIR).join("su"),
        }
    }
}

impl PosixPlatform {
    /// Locate `sh` and `su` on a `PATH`-style search list, falling back to `/bin`
    pub fn with_search_path(path_var: Option<&str>) -> Self {
        Self {
            sh: locate("sh", path_var),
            su: locate("su", path_var),
        }
    }

    /// Shell used to run the launch command
    pub fn shell(&self) -> &Path {
        &self.sh
    }

    /// The inline script for a spec, as handed to `sh -c`
    pub fn launch_script(&self, spec: &LaunchSpec, current: &Identity) -> String {
        let java = jvm_argv(spec)
            .iter()
            .map(|a| sh_quote(a).into_owned())
            .collect::<Vec<_>>()
            .join(" ");
        let java_part = format!(
            "{} > {} 2>&1 || echo $? > {} &",
            java,
            sh_quote(&spec.output_log_path),
            sh_quote(&spec.exit_code_file_path)
        );
        let ulimit = format!("ulimit -n {}", spec.open_files_limit);

        if current.privileged && current.name != spec.run_as_user {
            // plain `su` keeps the inherited environment, `su -` would drop it
            format!(
                "{} ; {} {} -s {} -c {}",
                ulimit,
                sh_quote(&self.su.to_string_lossy()),
                sh_quote(&spec.run_as_user),
                sh_quote(&self.sh.to_string_lossy()),
                sh_quote(&java_part)
            )
        } else {
            format!("{} ; {}", ulimit, java_part)
        }
    }
}

fn locate(program: &str, path_var: Option<&str>) -> PathBuf {
    path_var
        .into_iter()
        .flat_map(|p| p.split(':'))
        .filter(|dir| !dir.is_empty())
        .map(|dir| Path::new(dir).join(program))
        .find(|candidate| candidate.is_file())
        .unwrap_or_else(|| Path::new(FALLBACK_BIN_DIR).join(program))
}

impl Platform for PosixPlatform {
    fn family(&self) -> PlatformFamily {
        PlatformFamily::Posix
    }

    fn ensure_can_start(&self, run_as: Option<&str>, current: &Identity) -> Result<()> {
        ensure_can_start_as(run_as, current)
    }

    fn check_local_security(&self, current: &Identity) {
        if !current.privileged {
            warn!("Unable to check firewall status when starting without root privileges.");
        } else {
            debug!("Firewall status is left to the host's own tooling");
        }
    }

    fn java_executable(&self, jdk_home: &Path) -> PathBuf {
        jdk_home.join("bin").join("java")
    }

    fn classpath_separator(&self) -> char {
        ':'
    }

    fn key_file_guard(&self) -> &dyn KeyFileGuard {
        #[cfg(unix)]
        {
            &crate::keys::UnixKeyFileGuard
        }
        #[cfg(not(unix))]
        {
            &crate::keys::NoopKeyFileGuard
        }
    }

    fn build_command(
        &self,
        spec: &LaunchSpec,
        current: &Identity,
        env: EnvOverrides,
    ) -> Result<LaunchCommand> {
        let script = self.launch_script(spec, current);
        Ok(LaunchCommand {
            program: self.sh.clone(),
            args: vec!["-c".to_string(), script],
            env,
            working_dir: Some(PathBuf::from("/")),
            output_log: None,
            exit_code_file: PathBuf::from(&spec.exit_code_file_path),
        })
    }

    fn readiness(&self, config: &LauncherConfig) -> Box<dyn Readiness> {
        Box::new(ProcessTableReadiness::from_config(
            config,
            Box::new(SystemProcessTable),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::spec;
    use super::*;

    #[test]
    fn unprivileged_script_has_ulimit_redirect_and_exit_capture() {
        let platform = PosixPlatform::default();
        let script = platform.launch_script(&spec(false, false), &Identity::new("ignition", false));

        assert!(script.starts_with("ulimit -n 10000 ; /usr/jdk64/jdk1.8/bin/java -server"));
        assert!(script.contains("> /var/log/ignition/ignition-server.out 2>&1"));
        assert!(script.ends_with("|| echo $? > /var/run/ignition/ignition-server.exitcode &"));
        assert!(script.contains("'/etc/ignition/conf:/usr/lib/ignition/*'"));
        assert!(!script.contains(" su "));
    }

    #[test]
    fn root_starting_for_other_user_switches_without_login_shell() {
        let platform = PosixPlatform::default();
        let script = platform.launch_script(&spec(false, false), &Identity::new("root", true));

        assert!(script.starts_with("ulimit -n 10000 ; /bin/su ignition -s /bin/sh -c '"));
        assert!(!script.contains("su -"));
        assert!(!script.contains("su -l"));
        // the nested classpath quotes survive the outer quoting
        assert!(script.contains("'\\''/etc/ignition/conf:/usr/lib/ignition/*'\\''"));
    }

    #[test]
    fn root_running_as_root_needs_no_switch() {
        let platform = PosixPlatform::default();
        let mut s = spec(true, true);
        s.run_as_user = "root".to_string();
        let script = platform.launch_script(&s, &Identity::new("root", true));
        assert!(!script.contains("/bin/su"));
        assert!(script.contains("suspend=y"));
    }

    #[test]
    fn build_command_runs_from_root_dir_through_shell() {
        let platform = PosixPlatform::default();
        let mut env = EnvOverrides::new();
        env.insert("IGNITION_MASTER_KEY_LOCATION".into(), "/tmp/masterkey".into());
        let cmd = platform
            .build_command(&spec(false, false), &Identity::new("ignition", false), env.clone())
            .unwrap();

        assert_eq!(cmd.program, PathBuf::from("/bin/sh"));
        assert_eq!(cmd.args[0], "-c");
        assert_eq!(cmd.working_dir, Some(PathBuf::from("/")));
        assert_eq!(cmd.output_log, None);
        assert_eq!(cmd.env, env);
        assert_eq!(
            cmd.exit_code_file,
            PathBuf::from("/var/run/ignition/ignition-server.exitcode")
        );
    }

    #[test]
    fn open_files_limit_is_embedded() {
        let platform = PosixPlatform::default();
        let mut s = spec(false, false);
        s.open_files_limit = 512;
        let script = platform.launch_script(&s, &Identity::new("ignition", false));
        assert!(script.starts_with("ulimit -n 512 ; "));
    }

    #[test]
    fn locate_falls_back_to_bin() {
        let dir = tempfile::tempdir().unwrap();
        let found = locate("definitely-not-here", Some(&dir.path().to_string_lossy()));
        assert_eq!(found, PathBuf::from("/bin/definitely-not-here"));

        std::fs::write(dir.path().join("sh"), "").unwrap();
        let found = locate("sh", Some(&format!("/nonexistent:{}", dir.path().display())));
        assert_eq!(found, dir.path().join("sh"));
    }

    #[test]
    fn posix_paths() {
        let platform = PosixPlatform::default();
        assert_eq!(platform.family(), PlatformFamily::Posix);
        assert_eq!(platform.classpath_separator(), ':');
        assert_eq!(
            platform.java_executable(Path::new("/usr/jdk64/jdk1.8")),
            PathBuf::from("/usr/jdk64/jdk1.8/bin/java")
        );
    }
}
