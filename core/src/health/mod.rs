//! Network probes
//!
//! Two bounded, single-attempt checks sit behind [`Probe`]:
//!
//! - [`HttpProbe`]: GET against the server's ping endpoint (Windows readiness)
//! - [`TcpProbe`]: connection to the backing DBMS (startup checks)
//!
//! Retrying is the caller's business.

pub mod error;
pub mod http;
pub mod tcp;
pub mod types;

pub use error::HealthError;
pub use http::HttpProbe;
pub use tcp::TcpProbe;
pub use types::{Expect, Probe};
