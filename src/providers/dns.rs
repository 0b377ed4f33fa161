use std::net::IpAddr;

use hickory_resolver::{Resolver, TokioResolver};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("failed to build resolver: {0}")]
  Resolver(#[source] hickory_resolver::ResolveError),
  #[error("lookup of '{host}' failed: {source}")]
  Lookup {
    host: String,
    #[source]
    source: hickory_resolver::ResolveError,
  },
  #[error("'{0}' has no address records")]
  NoAddress(String),
}

/// Picks the address to report for a host: the first IPv4 answer if there
/// is one, otherwise whatever came first.
fn preferred(addrs: impl IntoIterator<Item = IpAddr>) -> Option<IpAddr> {
  let mut fallback = None;
  for ip in addrs {
    if ip.is_ipv4() {
      return Some(ip);
    }
    fallback.get_or_insert(ip);
  }
  fallback
}

/// Resolves `host` to a single address using the system resolver
/// configuration.
///
/// # Errors
///
/// Returns an error if the resolver cannot be built, the lookup fails, or the
/// answer carries no addresses.
pub async fn resolve(host: &str) -> Result<IpAddr, Error> {
  let resolver: TokioResolver = Resolver::builder_tokio()
    .map_err(Error::Resolver)?
    .build();

  let answer = resolver
    .lookup_ip(host)
    .await
    .map_err(|source| Error::Lookup {
      host: host.to_string(),
      source,
    })?;

  let ip = preferred(answer.iter())
    .ok_or_else(|| Error::NoAddress(host.to_string()))?;
  tracing::debug!(host, %ip, "resolved hostname");
  Ok(ip)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::net::{Ipv4Addr, Ipv6Addr};

  #[test]
  fn test_prefers_ipv4() {
    let v6 = IpAddr::V6(Ipv6Addr::LOCALHOST);
    let v4 = IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34));
    assert_eq!(preferred([v6, v4]), Some(v4));
  }

  #[test]
  fn test_falls_back_to_first_ipv6() {
    let a = IpAddr::V6(Ipv6Addr::LOCALHOST);
    let b = IpAddr::V6(Ipv6Addr::UNSPECIFIED);
    assert_eq!(preferred([a, b]), Some(a));
    assert_eq!(preferred(Vec::new()), None);
  }

  #[tokio::test]
  async fn test_unresolvable_host_fails() {
    // .invalid is reserved and never resolves
    assert!(resolve("no-such-host.invalid").await.is_err());
  }
}
