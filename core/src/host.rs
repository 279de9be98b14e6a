//! Local host name resolution, used for the reverse-lookup advisory
//!
//! The check passes when the addresses the short host name resolves to share
//! at least one address with what the canonical (fully qualified) name
//! resolves to.

// getaddrinfo(AI_CANONNAME) has no safe std equivalent
#![allow(unsafe_code)]

use crate::{CoreError, Result};
use std::collections::BTreeSet;
use std::net::{IpAddr, ToSocketAddrs};
use tracing::debug;

/// Name service lookups needed by the reverse-lookup check
pub trait HostResolver: Send + Sync + std::fmt::Debug {
    /// Name of this host as configured locally
    fn hostname(&self) -> Result<String>;
    /// Canonical name for `host`
    fn canonical_name(&self, host: &str) -> Result<String>;
    /// Addresses `name` resolves to
    fn addresses(&self, name: &str) -> Result<BTreeSet<IpAddr>>;
}

/// Resolver backed by the system's name service
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

impl HostResolver for SystemResolver {
    #[cfg(unix)]
    fn hostname(&self) -> Result<String> {
        let name = nix::unistd::gethostname()
            .map_err(|e| CoreError::Other(format!("gethostname failed: {}", e)))?;
        name.into_string()
            .map_err(|_| CoreError::Other("host name is not valid UTF-8".to_string()))
    }

    #[cfg(not(unix))]
    fn hostname(&self) -> Result<String> {
        std::env::var("COMPUTERNAME")
            .map_err(|_| CoreError::Other("COMPUTERNAME is not set".to_string()))
    }

    #[cfg(unix)]
    fn canonical_name(&self, host: &str) -> Result<String> {
        canonical_name_of(host)
    }

    #[cfg(not(unix))]
    fn canonical_name(&self, host: &str) -> Result<String> {
        Ok(host.to_string())
    }

    fn addresses(&self, name: &str) -> Result<BTreeSet<IpAddr>> {
        let addrs = (name, 0u16).to_socket_addrs().map_err(|e| {
            CoreError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to resolve {}: {}", name, e),
            ))
        })?;
        Ok(addrs.map(|a| a.ip()).collect())
    }
}

#[cfg(unix)]
fn canonical_name_of(host: &str) -> Result<String> {
    use std::ffi::{CStr, CString};

    let c_host = CString::new(host)
        .map_err(|_| CoreError::Other(format!("host name '{}' contains NUL", host)))?;
    // Safety: hints is fully initialized (zeroed then set), res is only read
    // when getaddrinfo reports success, and it is freed exactly once.
    unsafe {
        let mut hints: libc::addrinfo = std::mem::zeroed();
        hints.ai_family = libc::AF_UNSPEC;
        hints.ai_flags = libc::AI_CANONNAME;
        let mut res: *mut libc::addrinfo = std::ptr::null_mut();
        let rc = libc::getaddrinfo(c_host.as_ptr(), std::ptr::null(), &hints, &mut res);
        if rc != 0 || res.is_null() {
            return Err(CoreError::Other(format!(
                "getaddrinfo({}) failed with code {}",
                host, rc
            )));
        }
        let name = if (*res).ai_canonname.is_null() {
            host.to_string()
        } else {
            CStr::from_ptr((*res).ai_canonname).to_string_lossy().into_owned()
        };
        libc::freeaddrinfo(res);
        Ok(name)
    }
}

/// Whether the host name and its canonical name resolve to a common address.
///
/// Any resolution error counts as a mismatch.
pub fn reverse_lookup_matches(resolver: &dyn HostResolver) -> bool {
    let check = || -> Result<bool> {
        let hostname = resolver.hostname()?;
        let fqdn = resolver.canonical_name(&hostname)?;
        let host_addrs = resolver.addresses(&hostname)?;
        let fqdn_addrs = resolver.addresses(&fqdn)?;
        debug!(
            "Host {} -> {:?}, canonical {} -> {:?}",
            hostname, host_addrs, fqdn, fqdn_addrs
        );
        Ok(!host_addrs.is_disjoint(&fqdn_addrs))
    };
    match check() {
        Ok(matches) => matches,
        Err(e) => {
            debug!("Reverse lookup failed: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Debug)]
    struct FakeResolver {
        hostname: &'static str,
        fqdn: &'static str,
        table: BTreeMap<&'static str, Vec<IpAddr>>,
    }

    impl HostResolver for FakeResolver {
        fn hostname(&self) -> Result<String> {
            Ok(self.hostname.to_string())
        }

        fn canonical_name(&self, _host: &str) -> Result<String> {
            Ok(self.fqdn.to_string())
        }

        fn addresses(&self, name: &str) -> Result<BTreeSet<IpAddr>> {
            self.table
                .get(name)
                .map(|v| v.iter().copied().collect())
                .ok_or_else(|| CoreError::Other(format!("unknown host {}", name)))
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn shared_address_matches() {
        let r = FakeResolver {
            hostname: "node1",
            fqdn: "node1.example.com",
            table: BTreeMap::from([
                ("node1", vec![ip("10.0.0.5"), ip("127.0.1.1")]),
                ("node1.example.com", vec![ip("10.0.0.5")]),
            ]),
        };
        assert!(reverse_lookup_matches(&r));
    }

    #[test]
    fn disjoint_addresses_mismatch() {
        let r = FakeResolver {
            hostname: "node1",
            fqdn: "node1.example.com",
            table: BTreeMap::from([
                ("node1", vec![ip("127.0.1.1")]),
                ("node1.example.com", vec![ip("10.0.0.5")]),
            ]),
        };
        assert!(!reverse_lookup_matches(&r));
    }

    #[test]
    fn resolution_error_is_a_mismatch() {
        let r = FakeResolver {
            hostname: "node1",
            fqdn: "node1.example.com",
            table: BTreeMap::from([("node1", vec![ip("10.0.0.5")])]),
        };
        assert!(!reverse_lookup_matches(&r));
    }

    #[test]
    fn system_resolver_resolves_localhost() {
        let addrs = SystemResolver.addresses("localhost").unwrap();
        assert!(addrs.iter().any(|a| a.is_loopback()));
    }
}
