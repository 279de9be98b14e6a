//! JDK discovery and classpath assembly

use crate::env::{EnvSnapshot, JAVA_HOME_VAR};
use crate::platform::Platform;
use crate::{CoreError, Result};
use schema::LauncherConfig;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Locate a JDK whose runtime executable exists.
///
/// Tried in order: `javaHome` from the configuration, `JAVA_HOME`, then the
/// subdirectories of `jdkInstallDir` in name order.
pub fn find_jdk(
    config: &LauncherConfig,
    env: &EnvSnapshot,
    platform: &dyn Platform,
) -> Result<PathBuf> {
    let explicit = config
        .java_home
        .as_deref()
        .filter(|s| !s.is_empty())
        .into_iter()
        .chain(env.get_non_empty(JAVA_HOME_VAR))
        .map(PathBuf::from);

    let mut installed: Vec<PathBuf> = fs::read_dir(&config.jdk_install_dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect()
        })
        .unwrap_or_default();
    installed.sort();

    for candidate in explicit.chain(installed) {
        let java = platform.java_executable(&candidate);
        if java.is_file() {
            debug!("Using JDK at {}", candidate.display());
            return Ok(candidate);
        }
        debug!("No runtime at {}", java.display());
    }

    Err(CoreError::ConfigurationError(format!(
        "No JDK found, please run the \"ignition setup\" command to install a JDK \
         automatically or install any JDK manually to {}",
        config.jdk_install_dir
    )))
}

/// Classpath: absolute conf dir, `<libDir>/*`, extra entries, JDBC driver
pub fn build_classpath(config: &LauncherConfig, platform: &dyn Platform) -> Result<String> {
    let conf_dir = absolute(Path::new(&config.conf_dir))?;
    let mut entries = vec![
        conf_dir.display().to_string(),
        Path::new(&config.lib_dir).join("*").display().to_string(),
    ];
    entries.extend(config.extra_classpath.iter().cloned());
    if let Some(driver) = config.database.driver_path.as_deref() {
        entries.push(driver.to_string());
    }
    let separator = platform.classpath_separator().to_string();
    Ok(entries.join(&separator))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{PosixPlatform, WindowsPlatform};

    fn config(install_dir: &Path) -> LauncherConfig {
        LauncherConfig {
            conf_dir: "/etc/ignition/conf".to_string(),
            main_class: "org.example.server.Main".to_string(),
            jdk_install_dir: install_dir.display().to_string(),
            ..Default::default()
        }
    }

    fn fake_jdk(root: &Path, name: &str) -> PathBuf {
        let home = root.join(name);
        fs::create_dir_all(home.join("bin")).unwrap();
        fs::write(home.join("bin").join("java"), "").unwrap();
        home
    }

    #[test]
    fn configured_java_home_wins() {
        let dir = tempfile::tempdir().unwrap();
        let configured = fake_jdk(dir.path(), "configured");
        let from_env = fake_jdk(dir.path(), "env");
        let mut cfg = config(dir.path());
        cfg.java_home = Some(configured.display().to_string());
        let env = EnvSnapshot::empty().with(JAVA_HOME_VAR, from_env.display().to_string());

        assert_eq!(find_jdk(&cfg, &env, &PosixPlatform::default()).unwrap(), configured);
    }

    #[test]
    fn falls_back_to_java_home_then_install_dir() {
        let dir = tempfile::tempdir().unwrap();
        let install = dir.path().join("jdk64");
        fs::create_dir_all(install.join("broken")).unwrap();
        let installed = fake_jdk(&install, "jdk1.8.0");
        let cfg = config(&install);

        let from_env = fake_jdk(dir.path(), "env");
        let env = EnvSnapshot::empty().with(JAVA_HOME_VAR, from_env.display().to_string());
        assert_eq!(find_jdk(&cfg, &env, &PosixPlatform::default()).unwrap(), from_env);

        assert_eq!(
            find_jdk(&cfg, &EnvSnapshot::empty(), &PosixPlatform::default()).unwrap(),
            installed
        );
    }

    #[test]
    fn missing_jdk_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&dir.path().join("nothing-here"));
        let err = find_jdk(&cfg, &EnvSnapshot::empty(), &PosixPlatform::default()).unwrap_err();
        assert!(matches!(err, CoreError::ConfigurationError(_)));
        assert!(err.to_string().contains("No JDK found"));
    }

    #[test]
    fn classpath_order_and_separator() {
        let mut cfg = config(Path::new("/usr/jdk64"));
        cfg.extra_classpath = vec!["/opt/extra.jar".to_string()];
        cfg.database.driver_path = Some("/usr/share/java/postgresql.jar".to_string());

        assert_eq!(
            build_classpath(&cfg, &PosixPlatform::default()).unwrap(),
            "/etc/ignition/conf:/usr/lib/ignition/*:/opt/extra.jar:/usr/share/java/postgresql.jar"
        );
        assert!(build_classpath(&cfg, &WindowsPlatform)
            .unwrap()
            .contains(";/opt/extra.jar;"));
    }

    #[test]
    fn relative_conf_dir_is_made_absolute() {
        let mut cfg = config(Path::new("/usr/jdk64"));
        cfg.conf_dir = "conf".to_string();
        let cp = build_classpath(&cfg, &PosixPlatform::default()).unwrap();
        let first = cp.split(':').next().unwrap();
        assert!(Path::new(first).is_absolute());
        assert!(first.ends_with("conf"));
    }
}
