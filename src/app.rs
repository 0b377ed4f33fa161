use std::net::IpAddr;

use anyhow::Result;

use crate::cli::Cli;
use crate::diagnostics::{Diagnostics, Mode};
use crate::providers::{dns, geo, rdap};
use crate::results::{RawResponses, Record};
use crate::steps;
use crate::user_config::UserConfig;

/// Printed when the target is neither an address nor a resolvable name.
pub const UNRESOLVABLE: &str =
  "Not an ip address, and could not resolve as a hostname.";

/// Where a target ended up after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
  pub ip: IpAddr,
  /// The original input, when it had to be resolved through DNS.
  pub hostname: Option<String>,
}

/// Classifies `target` as an address, or resolves it as a hostname.
///
/// # Errors
///
/// Returns the DNS error if `target` is not an address and does not resolve.
pub async fn resolve_target(target: &str) -> Result<Resolved, dns::Error> {
  if let Ok(ip) = target.parse::<IpAddr>() {
    return Ok(Resolved { ip, hostname: None });
  }
  let ip = dns::resolve(target).await?;
  Ok(Resolved {
    ip,
    hostname: Some(target.to_string()),
  })
}

pub struct App {
  cli: Cli,
  config: UserConfig,
  geo_only: bool,
  diag: Diagnostics,
  raw: RawResponses,
}

impl App {
  #[must_use]
  pub fn new(cli: Cli, config: UserConfig, geo_only_name: bool) -> Self {
    let mode = Mode::from_flags(cli.debug, cli.stacktraces);
    Self {
      geo_only: cli.geo || geo_only_name,
      diag: Diagnostics::new(mode),
      raw: RawResponses::default(),
      cli,
      config,
    }
  }

  /// Runs the whole lookup and prints the outcome. Returns the exit code.
  ///
  /// # Errors
  ///
  /// Returns an error if the geolocation database cannot be opened or the
  /// registry client cannot be built.
  pub async fn run(&mut self) -> Result<i32> {
    if let Some(warning) = self.cli.unprocessed_warning() {
      println!("{warning}\n");
    }

    let db = geo::Database::open(&self.config.database_path(self.cli.db.clone()))?;

    let resolved = match resolve_target(&self.cli.target).await {
      Ok(r) => r,
      Err(e) => {
        self.diag.suppressed(&self.cli.target, e, None);
        println!("{UNRESOLVABLE}");
        return Ok(-1);
      }
    };
    tracing::debug!(ip = %resolved.ip, hostname = ?resolved.hostname, "target resolved");

    let mut record = steps::geo_step(&db, resolved.ip, &mut self.raw, &mut self.diag);

    if !self.geo_only {
      record.extend(self.run_registry_lookups(&resolved).await?);
    }

    record.drop_empty();
    self.print_results(&record);
    Ok(0)
  }

  async fn run_registry_lookups(&mut self, resolved: &Resolved) -> Result<Record> {
    let registry = rdap::Registry::new(self.config.fallback_url())?;
    let mut record =
      steps::ip_registry_step(&registry, resolved.ip, &mut self.raw, &mut self.diag)
        .await;
    if let Some(host) = &resolved.hostname {
      record.extend(
        steps::domain_registry_step(&registry, host, &mut self.raw, &mut self.diag)
          .await,
      );
    }
    Ok(record)
  }

  fn print_results(&self, record: &Record) {
    let dumps = self.raw.render(self.diag.erroring(), self.cli.rawdata);
    print!("{dumps}");
    if (self.diag.enabled() && self.diag.count() > 0) || self.cli.rawdata {
      println!();
    }
    print!("{}", record.render());
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use clap::Parser;
  use std::net::Ipv4Addr;

  #[tokio::test]
  async fn test_literal_addresses_skip_dns() {
    let r = resolve_target("8.8.8.8").await.unwrap();
    assert_eq!(r.ip, IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)));
    assert!(r.hostname.is_none());

    let r = resolve_target("2001:4860:4860::8888").await.unwrap();
    assert!(r.ip.is_ipv6());
    assert!(r.hostname.is_none());
  }

  #[tokio::test]
  async fn test_unresolvable_hostname_is_an_error() {
    assert!(resolve_target("no-such-host.invalid").await.is_err());
  }

  #[test]
  fn test_geo_only_from_flag_or_name() {
    let cli = Cli::try_parse_from(["iplocate", "1.1.1.1", "--geo"]).unwrap();
    assert!(App::new(cli, UserConfig::default(), false).geo_only);
    let cli = Cli::try_parse_from(["geoinfo", "1.1.1.1"]).unwrap();
    assert!(App::new(cli.clone(), UserConfig::default(), true).geo_only);
    assert!(!App::new(cli, UserConfig::default(), false).geo_only);
  }

  #[tokio::test]
  async fn test_missing_database_is_fatal() {
    let cli = Cli::try_parse_from([
      "iplocate",
      "1.1.1.1",
      "--db",
      "/nonexistent/GeoLite2-City.mmdb",
    ])
    .unwrap();
    let mut app = App::new(cli, UserConfig::default(), false);
    assert!(app.run().await.is_err());
  }
}
