use std::net::IpAddr;

use crate::diagnostics::{Diagnostics, Source};
use crate::providers::{geo, rdap};
use crate::results::{RawResponses, Record};

fn label_count(name: &str) -> usize {
  name.split('.').count()
}

fn strip_label(name: &str) -> Option<&str> {
  name.split_once('.').map(|(_, rest)| rest)
}

/// Domain names to try for `host`, in order.
///
/// The host is first cut down to its last three labels. Each failed attempt
/// drops one more leftmost label, and the two-label name is the last one
/// tried: `a.b.c.foo.co.uk` gives `foo.co.uk` then `co.uk`.
#[must_use]
pub fn domain_candidates(host: &str) -> Vec<String> {
  let mut name = host.trim_end_matches('.');
  while label_count(name) > 3 {
    match strip_label(name) {
      Some(rest) => name = rest,
      None => break,
    }
  }

  let mut out = vec![name.to_string()];
  while label_count(name) > 2 {
    match strip_label(name) {
      Some(rest) => {
        name = rest;
        out.push(name.to_string());
      }
      None => break,
    }
  }
  out
}

/// Looks up `ip` in the offline database and extracts its fields.
pub fn geo_step(
  db: &geo::Database,
  ip: IpAddr,
  raw: &mut RawResponses,
  diag: &mut Diagnostics,
) -> Record {
  match db.lookup(ip) {
    Ok(Some(v)) => {
      let rec = geo::extract(&v, diag);
      raw.insert(Source::Geo, v);
      rec
    }
    Ok(None) => {
      diag.suppressed("geo", anyhow::anyhow!("{ip} not in database"), None);
      Record::new()
    }
    Err(e) => {
      diag.suppressed("geo", e, None);
      Record::new()
    }
  }
}

/// RDAP lookup of the network holding `ip`.
pub async fn ip_registry_step(
  registry: &rdap::Registry,
  ip: IpAddr,
  raw: &mut RawResponses,
  diag: &mut Diagnostics,
) -> Record {
  match registry.ip(ip).await {
    Ok(v) => {
      let rec = rdap::extract_ip(&v, diag);
      raw.insert(Source::IpRdap, v);
      rec
    }
    Err(e) => {
      diag.suppressed("ip_rdap", e, None);
      Record::new()
    }
  }
}

/// RDAP lookup of the registered domain behind `host`, walking up the
/// candidate names until one answers.
pub async fn domain_registry_step<S: rdap::DomainSource>(
  source: &S,
  host: &str,
  raw: &mut RawResponses,
  diag: &mut Diagnostics,
) -> Record {
  let mut failures = 0;
  for name in domain_candidates(host) {
    match rdap::lookup_domain(source, &name, diag).await {
      Ok((domain, v)) => {
        // raw mode already announced the name it settled on
        if failures > 0 && !domain.is_raw() {
          diag.note(format!("But succeeded with {name}"));
        }
        let rec = rdap::extract_domain(&domain, diag);
        raw.insert(Source::DomainRdap, v);
        return rec;
      }
      Err(e) => {
        diag.suppressed(&name, e, None);
        failures += 1;
      }
    }
  }
  Record::new()
}
