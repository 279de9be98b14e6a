//! Probe trait and response expectations

use super::HealthError;
use async_trait::async_trait;

/// Which HTTP responses count as "up"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Any status in 200..=299
    Any2xx,
    /// Exactly this status
    Status(u16),
}

impl Expect {
    /// Whether `status` satisfies the expectation
    pub fn matches_status(&self, status: u16) -> bool {
        match self {
            Expect::Any2xx => (200..=299).contains(&status),
            Expect::Status(expected) => status == *expected,
        }
    }
}

/// One bounded round trip against a network endpoint
#[async_trait]
pub trait Probe: Send + Sync + std::fmt::Debug {
    /// Run a single attempt; implementations enforce their own timeout
    async fn check(&self) -> Result<(), HealthError>;
}
