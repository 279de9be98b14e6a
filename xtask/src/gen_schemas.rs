//! JSON schema generation for the launcher configuration and records

use anyhow::{Context, Result};
use schema::{LaunchSpec, LauncherConfig, PidRecord, StartupPhase};
use schemars::schema_for;
use std::fs;
use std::path::{Path, PathBuf};

/// Write every schema into `out_dir`, or `schemas/` at the workspace root
pub fn run(out_dir: Option<PathBuf>) -> Result<()> {
    let out_dir = out_dir.unwrap_or_else(|| workspace_root().join("schemas"));
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    write(&out_dir, "launcher-config", &schema_for!(LauncherConfig))?;
    write(&out_dir, "launch-spec", &schema_for!(LaunchSpec))?;
    write(&out_dir, "pid-record", &schema_for!(PidRecord))?;
    write(&out_dir, "startup-phase", &schema_for!(StartupPhase))?;

    println!("Schemas written to {}", out_dir.display());
    Ok(())
}

fn write(dir: &Path, name: &str, schema: &schemars::schema::RootSchema) -> Result<()> {
    let path = dir.join(format!("{}.schema.json", name));
    let json = serde_json::to_string_pretty(schema)?;
    fs::write(&path, json + "\n").with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn workspace_root() -> PathBuf {
    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or(manifest)
}
