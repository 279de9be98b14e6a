//! Schema definitions for ignition
//!
//! This crate contains the plain data structures shared by the start
//! supervisor core, the CLI and the schema generator. Everything here is
//! serializable and implements JSON Schema generation so the configuration
//! format can be published for operators.

pub mod config;
pub mod launch;
pub mod records;

pub use config::*;
pub use launch::*;
pub use records::*;

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::schema_for;

    #[test]
    fn test_schema_generation() {
        let _config = schema_for!(LauncherConfig);
        let _launch = schema_for!(LaunchSpec);
        let _pid = schema_for!(PidRecord);
        let _phase = schema_for!(StartupPhase);
    }

    #[test]
    fn test_startup_phase_serialization() {
        let json = serde_json::to_string(&StartupPhase::StartPending).unwrap();
        assert_eq!(json, "\"startPending\"");
    }
}
