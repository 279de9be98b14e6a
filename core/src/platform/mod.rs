//! Platform capability: the one place that knows about OS families
//!
//! Everything that differs between POSIX and Windows hosts sits behind the
//! [`Platform`] trait, with exactly two implementations:
//!
//! - [`PosixPlatform`]: shell-wrapped launch with a file-descriptor ceiling,
//!   optional user switch, and process-table readiness
//! - [`WindowsPlatform`]: direct launch inheriting the caller's identity and
//!   network-probe readiness
//!
//! The rest of the crate talks to `dyn Platform` and never inspects the OS.

use crate::env::EnvOverrides;
use crate::identity::Identity;
use crate::keys::KeyFileGuard;
use crate::readiness::Readiness;
use crate::Result;
use schema::{LaunchSpec, LauncherConfig};
use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};

pub mod posix;
pub mod windows;

pub use posix::PosixPlatform;
pub use windows::WindowsPlatform;

/// JVM flags for a normal start
pub const GC_PRESET_NORMAL: &[&str] = &[
    "-server",
    "-XX:NewRatio=3",
    "-XX:+UseConcMarkSweepGC",
    "-XX:-UseGCOverheadLimit",
    "-XX:CMSInitiatingOccupancyFraction=60",
];

/// JVM flags for a debug start
pub const GC_PRESET_DEBUG: &[&str] = &["-server", "-XX:NewRatio=2", "-XX:+UseConcMarkSweepGC"];

/// Operating system family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformFamily {
    /// Linux, BSDs, macOS
    Posix,
    /// Windows server family
    Windows,
}

/// A fully assembled command, ready for the launcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    /// Program to execute
    pub program: PathBuf,
    /// Arguments after the program
    pub args: Vec<String>,
    /// Variables merged on top of the inherited environment
    pub env: EnvOverrides,
    /// Working directory of the child
    pub working_dir: Option<PathBuf>,
    /// File the launcher redirects stdout/stderr to; `None` when the command
    /// redirects its own output
    pub output_log: Option<PathBuf>,
    /// File that receives the exit code when the launch fails
    pub exit_code_file: PathBuf,
}

impl fmt::Display for LaunchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        // values may be secrets
        if !self.env.is_empty() {
            let keys: Vec<&str> = self.env.keys().map(String::as_str).collect();
            write!(f, " (env overrides: {})", keys.join(", "))?;
        }
        Ok(())
    }
}

/// OS-family specific behavior of the start sequence
pub trait Platform: Send + Sync + fmt::Debug {
    /// Which family this is
    fn family(&self) -> PlatformFamily;

    /// Check the invoking identity against the configured run-as identity
    fn ensure_can_start(&self, run_as: Option<&str>, current: &Identity) -> Result<()>;

    /// Advisory local security check; only ever logs
    fn check_local_security(&self, current: &Identity);

    /// Path of the runtime executable inside a JDK
    fn java_executable(&self, jdk_home: &Path) -> PathBuf;

    /// Separator between classpath entries
    fn classpath_separator(&self) -> char;

    /// How the temporary master key file is protected
    fn key_file_guard(&self) -> &dyn KeyFileGuard;

    /// Turn a launch spec into a concrete, detached command
    fn build_command(
        &self,
        spec: &LaunchSpec,
        current: &Identity,
        env: EnvOverrides,
    ) -> Result<LaunchCommand>;

    /// Readiness strategy for the launched server
    fn readiness(&self, config: &LauncherConfig) -> Box<dyn Readiness>;
}

/// Platform of the host this binary was built for
pub fn current_platform(path_var: Option<&str>) -> Box<dyn Platform> {
    if cfg!(windows) {
        Box::new(WindowsPlatform::new())
    } else {
        Box::new(PosixPlatform::with_search_path(path_var))
    }
}

/// JVM argument vector shared by both families, program first
pub fn jvm_argv(spec: &LaunchSpec) -> Vec<String> {
    let preset = if spec.debug_flags.enabled {
        GC_PRESET_DEBUG
    } else {
        GC_PRESET_NORMAL
    };

    let mut argv = vec![spec.executable_path.clone()];
    argv.extend(preset.iter().map(|s| s.to_string()));
    if let Some(module) = &spec.provider_module {
        argv.push(format!("-Dprovider.module.class={}", module));
    }
    argv.extend(spec.jvm_args.split_whitespace().map(str::to_string));
    if spec.debug_flags.enabled {
        argv.push("-Xdebug".to_string());
        argv.push(format!(
            "-Xrunjdwp:transport=dt_socket,address={},server=y,suspend={}",
            spec.debug_port,
            spec.debug_flags.suspend_indicator()
        ));
    }
    argv.push("-cp".to_string());
    argv.push(spec.classpath.clone());
    argv.push(spec.main_class.clone());
    argv
}

/// Quote a word for `sh` when it contains anything beyond a safe set
pub fn sh_quote(word: &str) -> Cow<'_, str> {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if safe {
        Cow::Borrowed(word)
    } else {
        Cow::Owned(format!("'{}'", word.replace('\'', "'\\''")))
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::spec;
    use super::*;

    #[test]
    fn normal_start_uses_normal_preset_without_debug_flags() {
        let argv = jvm_argv(&spec(false, false));
        assert!(argv.contains(&"-XX:NewRatio=3".to_string()));
        assert!(!argv.contains(&"-XX:NewRatio=2".to_string()));
        assert!(!argv.iter().any(|a| a == "-Xdebug" || a.starts_with("-Xrunjdwp")));
    }

    #[test]
    fn suspend_without_debug_adds_no_debug_flags() {
        let argv = jvm_argv(&spec(false, true));
        assert!(argv.contains(&"-XX:NewRatio=3".to_string()));
        assert!(!argv.iter().any(|a| a.starts_with("-Xrunjdwp")));
    }

    #[test]
    fn debug_start_uses_debug_preset_and_suspend_indicator() {
        for (suspend, indicator) in [(false, 'n'), (true, 'y')] {
            let argv = jvm_argv(&spec(true, suspend));
            assert!(argv.contains(&"-XX:NewRatio=2".to_string()));
            assert!(!argv.contains(&"-XX:NewRatio=3".to_string()));
            assert!(argv.contains(&"-Xdebug".to_string()));
            let jdwp = argv.iter().find(|a| a.starts_with("-Xrunjdwp")).unwrap();
            assert!(jdwp.ends_with(&format!("suspend={}", indicator)));
            assert!(jdwp.contains("address=5005"));
        }
    }

    #[test]
    fn argv_ends_with_classpath_and_main_class() {
        let mut s = spec(false, false);
        s.provider_module = Some("org.example.Provider".to_string());
        let argv = jvm_argv(&s);
        assert_eq!(argv[0], "/usr/jdk64/jdk1.8/bin/java");
        let n = argv.len();
        assert_eq!(argv[n - 3], "-cp");
        assert_eq!(argv[n - 2], "/etc/ignition/conf:/usr/lib/ignition/*");
        assert_eq!(argv[n - 1], "org.example.server.Main");
        assert!(argv.contains(&"-Dprovider.module.class=org.example.Provider".to_string()));
        assert!(argv.contains(&"-Xmx2048m".to_string()));
    }

    #[test]
    fn sh_quote_leaves_safe_words_alone() {
        assert_eq!(sh_quote("-XX:NewRatio=3"), "-XX:NewRatio=3");
        assert_eq!(sh_quote("/usr/bin/java"), "/usr/bin/java");
        assert_eq!(sh_quote("a b"), "'a b'");
        assert_eq!(sh_quote("lib/*"), "'lib/*'");
        assert_eq!(sh_quote("it's"), "'it'\\''s'");
        assert_eq!(sh_quote(""), "''");
    }

    #[test]
    fn display_hides_env_values() {
        let mut env = EnvOverrides::new();
        env.insert("IGNITION_MASTER_KEY_LOCATION".into(), "/tmp/masterkey".into());
        let cmd = LaunchCommand {
            program: PathBuf::from("/bin/sh"),
            args: vec!["-c".into(), "true".into()],
            env,
            working_dir: None,
            output_log: None,
            exit_code_file: PathBuf::from("/tmp/x.exitcode"),
        };
        let shown = cmd.to_string();
        assert!(shown.starts_with("/bin/sh -c true"));
        assert!(shown.contains("IGNITION_MASTER_KEY_LOCATION"));
        assert!(!shown.contains("/tmp/masterkey"));
    }
}
