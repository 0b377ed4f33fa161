//! RDAP lookups for IP networks and domains.
//!
//! Responses are handled as JSON trees. A domain answer is read through one
//! of two shapes: the normalized [`Summary`] when the object parses cleanly,
//! or the raw vCard arrays when it does not (or when the RDAP client itself
//! failed and the object had to be fetched directly).

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::str::FromStr;

use icann_rdap_client::prelude::*;
use icann_rdap_common::response::RdapResponse;
use ipnet::{Ipv4Subnets, Ipv6Subnets};
use reqwest::header;
use serde_json::Value;
use thiserror::Error;

use crate::diagnostics::{Diagnostics, Source};
use crate::fields;
use crate::results::Record;

/// Redirect service used when the RDAP client cannot deliver a domain.
pub const DEFAULT_FALLBACK_URL: &str = "https://rdap.org";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("no RDAP object exists for '{0}'")]
  NotFound(String),
  #[error("RDAP answer for '{target}' is a '{found}', expected '{expected}'")]
  Unexpected {
    target: String,
    expected: &'static str,
    found: String,
  },
  #[error("RDAP query for '{target}' failed: {source}")]
  Client {
    target: String,
    #[source]
    source: BoxError,
  },
  #[error("raw RDAP fetch from {url} failed: {source}")]
  Http {
    url: String,
    #[source]
    source: reqwest::Error,
  },
  #[error("could not convert RDAP answer: {0}")]
  Json(#[from] serde_json::Error),
}

// --- vCard helpers ---

/// Property arrays of an entity's `vcardArray`, e.g. `["fn", {}, "text", "Jane"]`.
fn vcard_props(entity: &Value) -> impl Iterator<Item = &Vec<Value>> {
  entity
    .get("vcardArray")
    .and_then(|v| v.get(1))
    .and_then(Value::as_array)
    .into_iter()
    .flatten()
    .filter_map(Value::as_array)
}

/// Value of the first `key` property. The value is the last element of the
/// property array.
fn vcard_value<'a>(entity: &'a Value, key: &str) -> Option<&'a str> {
  vcard_props(entity)
    .find(|p| p.first().and_then(Value::as_str) == Some(key))
    .and_then(|p| p.last()?.as_str())
}

fn has_role(entity: &Value, role: &str) -> bool {
  entity
    .get("roles")
    .and_then(Value::as_array)
    .is_some_and(|roles| {
      roles
        .iter()
        .filter_map(Value::as_str)
        .any(|r| r.eq_ignore_ascii_case(role))
    })
}

// --- structured shape ---

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Contact {
  pub handle: Option<String>,
  pub name: Option<String>,
  pub email: Option<String>,
  pub url: Option<String>,
}

impl Contact {
  fn from_entity(entity: &Value) -> Self {
    let owned = |s: Option<&str>| s.map(str::to_owned);
    Self {
      handle: owned(entity.get("handle").and_then(Value::as_str)),
      name: owned(vcard_value(entity, "fn")),
      email: owned(vcard_value(entity, "email")),
      url: owned(vcard_value(entity, "url")),
    }
  }
}

/// Normalized view of an RDAP object: contacts grouped by role (nested
/// entities included) and nameservers flattened to their names.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
  pub handle: Option<String>,
  pub name: Option<String>,
  pub network: Option<String>,
  pub entities: BTreeMap<String, Vec<Contact>>,
  pub nameservers: Vec<String>,
}

impl Summary {
  /// Builds the normalized view.
  ///
  /// # Errors
  ///
  /// Fails when the object is not shaped as RDAP describes it: entities
  /// without a `roles` array, nameservers without an `ldhName`, or
  /// collections that are not arrays.
  pub fn parse(v: &Value) -> Result<Self, fields::Error> {
    if !v.is_object() {
      return Err(fields::Error::WrongType {
        key: "<root>".to_string(),
        expected: "an object",
      });
    }

    let mut summary = Self {
      handle: fields::text(v, &["handle"]).ok().map(str::to_owned),
      name: fields::text(v, &["name"]).ok().map(str::to_owned),
      network: network(v).ok(),
      ..Self::default()
    };

    if v.get("entities").is_some() {
      summary.add_entities(fields::array(v, &["entities"])?)?;
    }

    if v.get("nameservers").is_some() {
      summary.nameservers = fields::array(v, &["nameservers"])?
        .iter()
        .map(|ns| fields::text(ns, &["ldhName"]).map(str::to_lowercase))
        .collect::<Result<Vec<_>, fields::Error>>()?;
    }

    Ok(summary)
  }

  fn add_entities(&mut self, entities: &[Value]) -> Result<(), fields::Error> {
    for entity in entities {
      let contact = Contact::from_entity(entity);
      for role in fields::array(entity, &["roles"])? {
        let role = role.as_str().ok_or_else(|| fields::Error::WrongType {
          key: "roles".to_string(),
          expected: "a list of strings",
        })?;
        self
          .entities
          .entry(role.to_ascii_lowercase())
          .or_default()
          .push(contact.clone());
      }
      if entity.get("entities").is_some() {
        self.add_entities(fields::array(entity, &["entities"])?)?;
      }
    }
    Ok(())
  }

  /// First contact holding `role`.
  ///
  /// # Errors
  ///
  /// Fails if no entity has the role.
  pub fn role(&self, role: &str) -> Result<&Contact, fields::Error> {
    let contacts = self
      .entities
      .get(role)
      .ok_or_else(|| fields::Error::Missing(format!("entities.{role}")))?;
    fields::first(contacts, &format!("entities.{role}"))
  }
}

fn contact_field(
  value: Option<&String>,
  path: impl FnOnce() -> String,
) -> Result<String, fields::Error> {
  value.cloned().ok_or_else(|| fields::Error::Missing(path()))
}

/// Display form of an IP network object's address range.
fn network(v: &Value) -> Result<String, fields::Error> {
  if let Some(cidr) = fields::array(v, &["cidr0_cidrs"])
    .ok()
    .and_then(|c| c.first())
  {
    let prefix = fields::text(cidr, &["v4prefix"])
      .or_else(|_| fields::text(cidr, &["v6prefix"]))?;
    let len = fields::unsigned(cidr, &["length"])?;
    return Ok(format!("{prefix}/{len}"));
  }
  let start = fields::text(v, &["startAddress"])?;
  let end = fields::text(v, &["endAddress"])?;
  Ok(span(start, end))
}

/// The single CIDR covering `start..=end`, or the plain range if it takes
/// more than one.
fn span(start: &str, end: &str) -> String {
  let nets: Vec<String> = match (start.parse::<IpAddr>(), end.parse::<IpAddr>()) {
    (Ok(IpAddr::V4(s)), Ok(IpAddr::V4(e))) => {
      Ipv4Subnets::new(s, e, 0).map(|n| n.to_string()).collect()
    }
    (Ok(IpAddr::V6(s)), Ok(IpAddr::V6(e))) => {
      Ipv6Subnets::new(s, e, 0).map(|n| n.to_string()).collect()
    }
    _ => Vec::new(),
  };
  match nets.as_slice() {
    [one] => one.clone(),
    _ => format!("{start} - {end}"),
  }
}

// --- domain shapes ---

/// A domain answer in whichever shape could be read.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainRecord {
  Structured(Summary),
  Raw(Value),
}

impl DomainRecord {
  #[must_use]
  pub const fn is_raw(&self) -> bool {
    matches!(self, Self::Raw(_))
  }

  /// Name of the sponsoring registrar.
  ///
  /// # Errors
  ///
  /// Fails if no registrar entity with a name is present.
  pub fn registrar(&self) -> Result<String, fields::Error> {
    match self {
      Self::Structured(s) => {
        contact_field(s.role("registrar")?.name.as_ref(), || {
          "entities.registrar[0].name".to_string()
        })
      }
      Self::Raw(v) => fields::array(v, &["entities"])?
        .iter()
        .filter(|e| has_role(e, "registrar"))
        .find_map(|e| vcard_value(e, "fn"))
        .map(str::to_owned)
        .ok_or_else(|| fields::Error::Empty("registrar fn".to_string())),
    }
  }

  /// Abuse contact email of the domain's registrar.
  ///
  /// # Errors
  ///
  /// Fails if no abuse email is present.
  pub fn abuse_email(&self) -> Result<String, fields::Error> {
    match self {
      Self::Structured(s) => {
        contact_field(s.role("abuse")?.email.as_ref(), || {
          "entities.abuse[0].email".to_string()
        })
      }
      Self::Raw(v) => {
        let parent = fields::array(v, &["entities"])?
          .iter()
          .find(|e| e.get("entities").is_some())
          .ok_or_else(|| fields::Error::Empty("nested entities".to_string()))?;
        fields::array(parent, &["entities"])?
          .iter()
          .find_map(|e| vcard_value(e, "email"))
          .map(str::to_owned)
          .ok_or_else(|| fields::Error::Empty("abuse email".to_string()))
      }
    }
  }

  /// Nameserver names joined with `", "`.
  ///
  /// # Errors
  ///
  /// Fails if the nameserver list is absent or malformed.
  pub fn nameservers(&self) -> Result<String, fields::Error> {
    match self {
      Self::Structured(s) => Ok(s.nameservers.join(", ")),
      Self::Raw(v) => {
        let names = fields::array(v, &["nameservers"])?
          .iter()
          .map(|ns| fields::text(ns, &["ldhName"]))
          .collect::<Result<Vec<_>, fields::Error>>()?;
        Ok(names.join(", "))
      }
    }
  }
}

// --- field extraction ---

fn ip_abuse(s: &Summary) -> Result<String, fields::Error> {
  let abuse = s.role("abuse")?;
  abuse
    .url
    .clone()
    .or_else(|| abuse.email.clone())
    .ok_or_else(|| fields::Error::Missing("entities.abuse[0].url".to_string()))
}

/// Displayable fields of an IP network answer.
pub fn extract_ip(raw: &Value, diag: &mut Diagnostics) -> Record {
  let mut rec = Record::new();
  let src = Some(Source::IpRdap);

  let summary = match Summary::parse(raw) {
    Ok(s) => s,
    Err(e) => {
      diag.suppressed("ip_rdap", e, src);
      return rec;
    }
  };

  match summary.role("registrant").and_then(|c| {
    contact_field(c.name.as_ref(), || "entities.registrant[0].name".into())
  }) {
    Ok(v) => {
      rec.set("ip_registrant", v);
    }
    Err(e) => diag.suppressed("ip_registrant", e, src),
  }

  match ip_abuse(&summary) {
    Ok(v) => {
      rec.set("ip_abuse", v);
    }
    Err(e) => diag.suppressed("ip_abuse", e, src),
  }

  let simple = [
    ("net_handle", summary.handle.as_ref(), "handle"),
    ("net_name", summary.name.as_ref(), "name"),
    ("network", summary.network.as_ref(), "network"),
  ];
  for (key, value, path) in simple {
    match contact_field(value, || path.to_string()) {
      Ok(v) => {
        rec.set(key, v);
      }
      Err(e) => diag.suppressed(key, e, src),
    }
  }

  rec
}

/// Displayable fields of a domain answer.
pub fn extract_domain(domain: &DomainRecord, diag: &mut Diagnostics) -> Record {
  let mut rec = Record::new();
  let src = Some(Source::DomainRdap);
  let raw = domain.is_raw();

  match domain.registrar() {
    Ok(v) => {
      rec.set("registrar", v);
    }
    Err(e) => diag.suppressed(&format!("registrar, raw={raw}"), e, src),
  }

  match domain.abuse_email() {
    Ok(v) => {
      rec.set("domain_abuse", v);
    }
    Err(e) => diag.suppressed(&format!("domain_abuse, raw={raw}"), e, src),
  }

  match domain.nameservers() {
    Ok(v) => {
      rec.set("nameservers", v);
    }
    Err(e) => diag.suppressed(&format!("nameservers, raw={raw}"), e, src),
  }

  rec
}

// --- network access ---

fn object_class(v: &Value) -> &str {
  v.get("objectClassName")
    .and_then(Value::as_str)
    .unwrap_or("unknown")
}

/// Turns a raw answer into `v` if it is the expected object class.
fn expect_class(
  target: &str,
  v: Value,
  expected: &'static str,
) -> Result<Value, Error> {
  if v.get("errorCode").is_some() {
    return Err(Error::NotFound(target.to_string()));
  }
  let found = object_class(&v);
  if !found.eq_ignore_ascii_case(expected) {
    return Err(Error::Unexpected {
      target: target.to_string(),
      expected,
      found: found.to_string(),
    });
  }
  Ok(v)
}

/// Object kinds this crate asks the RDAP client for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
  Domain,
  Network,
}

impl Kind {
  const fn class_name(self) -> &'static str {
    match self {
      Self::Domain => "domain",
      Self::Network => "ip network",
    }
  }
}

/// Checks a typed client answer and converts it to a JSON tree.
fn typed_answer(
  target: &str,
  rdap: &RdapResponse,
  kind: Kind,
) -> Result<Value, Error> {
  let matches = match rdap {
    RdapResponse::ErrorResponse(_) => {
      return Err(Error::NotFound(target.to_string()))
    }
    RdapResponse::Domain(_) => kind == Kind::Domain,
    RdapResponse::Network(_) => kind == Kind::Network,
    _ => false,
  };
  let v = serde_json::to_value(rdap)?;
  if !matches {
    return Err(Error::Unexpected {
      target: target.to_string(),
      expected: kind.class_name(),
      found: object_class(&v).to_string(),
    });
  }
  Ok(v)
}

/// Whether a client failure means the server has no such object.
fn is_not_found(err: &(dyn std::error::Error + 'static)) -> bool {
  let mut cur = Some(err);
  while let Some(e) = cur {
    if let Some(re) = e.downcast_ref::<reqwest::Error>() {
      if re.status() == Some(reqwest::StatusCode::NOT_FOUND) {
        return true;
      }
    }
    if e.to_string().contains("404 Not Found") {
      return true;
    }
    cur = e.source();
  }
  false
}

/// Whether a failed structured lookup should be retried in raw mode.
///
/// Only client failures qualify; a missing object moves on to the next
/// candidate name instead.
#[must_use]
pub const fn wants_raw(err: &Error) -> bool {
  matches!(err, Error::Client { .. })
}

/// Source of domain answers, in both shapes.
#[allow(async_fn_in_trait)]
pub trait DomainSource {
  /// Structured query through the RDAP client.
  async fn structured(&self, name: &str) -> Result<Value, Error>;
  /// Direct fetch of the domain's JSON for raw mode.
  async fn raw(&self, name: &str) -> Result<Value, Error>;
}

/// Looks up a domain, falling back to raw mode when the structured path
/// cannot deliver. A "does not exist" answer is returned as is.
///
/// # Errors
///
/// Fails if neither path produced a domain object.
pub async fn lookup_domain<S: DomainSource>(
  source: &S,
  name: &str,
  diag: &mut Diagnostics,
) -> Result<(DomainRecord, Value), Error> {
  let raw = match source.structured(name).await {
    Ok(v) => match Summary::parse(&v) {
      Ok(summary) => return Ok((DomainRecord::Structured(summary), v)),
      Err(e) => {
        diag.suppressed(name, e, Some(Source::DomainRdap));
        v
      }
    },
    Err(e) if wants_raw(&e) => {
      diag.suppressed(name, e, None);
      source.raw(name).await?
    }
    Err(e) => return Err(e),
  };
  diag.note(format!("But switched to raw mode with {name}"));
  Ok((DomainRecord::Raw(raw.clone()), raw))
}

pub struct Registry {
  store: MemoryBootstrapStore,
  http: reqwest::Client,
  fallback_url: String,
}

impl Registry {
  /// # Errors
  ///
  /// Returns an error if the HTTP client for raw fetches cannot be built.
  pub fn new(fallback_url: impl Into<String>) -> anyhow::Result<Self> {
    let http = reqwest::Client::builder()
      .user_agent(format!("iplocate/{}", env!("CARGO_PKG_VERSION")))
      .build()?;
    Ok(Self {
      store: MemoryBootstrapStore::new(),
      http,
      fallback_url: fallback_url.into().trim_end_matches('/').to_string(),
    })
  }

  /// Bootstrapped RDAP query for an object of `kind`.
  async fn query(&self, target: &str, kind: Kind) -> Result<Value, Error> {
    let client_err = |source: BoxError| {
      if is_not_found(source.as_ref()) {
        Error::NotFound(target.to_string())
      } else {
        Error::Client {
          target: target.to_string(),
          source,
        }
      }
    };
    let query =
      QueryType::from_str(target).map_err(|e| client_err(e.into()))?;
    let client = create_client(&ClientConfig::default())
      .map_err(|e| client_err(e.into()))?;
    tracing::debug!(target, "RDAP query");
    let resp = rdap_bootstrapped_request(&query, &client, &self.store, |_| {})
      .await
      .map_err(|e| client_err(e.into()))?;
    typed_answer(target, &resp.rdap, kind)
  }

  /// Looks up the network block holding `ip`.
  ///
  /// # Errors
  ///
  /// Fails if the query fails or the answer is not an IP network.
  pub async fn ip(&self, ip: IpAddr) -> Result<Value, Error> {
    self.query(&ip.to_string(), Kind::Network).await
  }
}

impl DomainSource for Registry {
  async fn structured(&self, name: &str) -> Result<Value, Error> {
    self.query(name, Kind::Domain).await
  }

  /// Fetches a domain object straight from the fallback redirect service.
  async fn raw(&self, name: &str) -> Result<Value, Error> {
    let url = format!("{}/domain/{name}", self.fallback_url);
    let http_err = |source| Error::Http {
      url: url.clone(),
      source,
    };
    tracing::debug!(%url, "raw RDAP fetch");
    let resp = self
      .http
      .get(&url)
      .header(header::ACCEPT, "application/rdap+json, application/json")
      .send()
      .await
      .map_err(http_err)?;
    if resp.status() == reqwest::StatusCode::NOT_FOUND {
      return Err(Error::NotFound(name.to_string()));
    }
    let v = resp
      .error_for_status()
      .map_err(http_err)?
      .json::<Value>()
      .await
      .map_err(http_err)?;
    expect_class(name, v, "domain")
  }
}


#[cfg(test)]
mod tests {
  use super::testing::{sample_domain, Answer, CannedSource};
  use super::*;
  use crate::diagnostics::Mode;
  use serde_json::json;

  fn vcard(props: &[(&str, &str)]) -> Value {
    let mut arr = vec![json!(["version", {}, "text", "4.0"])];
    for (k, v) in props {
      arr.push(json!([k, {}, "text", v]));
    }
    json!(["vcard", arr])
  }

  fn ip_network() -> Value {
    json!({
      "objectClassName": "ip network",
      "handle": "NET-8-8-8-0-2",
      "name": "GOGL",
      "startAddress": "8.8.8.0",
      "endAddress": "8.8.8.255",
      "entities": [
        {
          "objectClassName": "entity",
          "handle": "GOGL",
          "roles": ["registrant"],
          "vcardArray": vcard(&[("fn", "Google LLC")]),
          "entities": [
            {
              "objectClassName": "entity",
              "handle": "ABUSE5250-ARIN",
              "roles": ["abuse"],
              "vcardArray": vcard(&[
                ("fn", "Abuse"),
                ("email", "network-abuse@google.com")
              ])
            }
          ]
        }
      ]
    })
  }

  fn domain_json() -> Value {
    json!({
      "objectClassName": "domain",
      "ldhName": "EXAMPLE.COM",
      "entities": [
        {
          "objectClassName": "entity",
          "roles": ["registrar"],
          "vcardArray": vcard(&[("fn", "RESERVED-Internet Assigned Numbers Authority")]),
          "entities": [
            {
              "objectClassName": "entity",
              "roles": ["abuse"],
              "vcardArray": vcard(&[("email", "abuse@iana.org")])
            }
          ]
        }
      ],
      "nameservers": [
        { "objectClassName": "nameserver", "ldhName": "A.IANA-SERVERS.NET" },
        { "objectClassName": "nameserver", "ldhName": "B.IANA-SERVERS.NET" }
      ]
    })
  }

  #[test]
  fn test_vcard_value_takes_last_element() {
    let e = json!({"vcardArray": vcard(&[("fn", "Jane"), ("email", "j@x.org")])});
    assert_eq!(vcard_value(&e, "fn"), Some("Jane"));
    assert_eq!(vcard_value(&e, "email"), Some("j@x.org"));
    assert_eq!(vcard_value(&e, "tel"), None);
    assert_eq!(vcard_value(&json!({}), "fn"), None);
  }

  #[test]
  fn test_summary_groups_nested_entities_by_role() {
    let s = Summary::parse(&ip_network()).unwrap();
    assert_eq!(s.role("registrant").unwrap().name.as_deref(), Some("Google LLC"));
    assert_eq!(
      s.role("abuse").unwrap().email.as_deref(),
      Some("network-abuse@google.com")
    );
    assert!(s.role("technical").is_err());
  }

  #[test]
  fn test_summary_rejects_entity_without_roles() {
    let v = json!({"entities": [{"handle": "X"}]});
    assert_eq!(
      Summary::parse(&v),
      Err(fields::Error::Missing("roles".to_string()))
    );
  }

  #[test]
  fn test_network_from_range_and_cidr() {
    assert_eq!(span("8.8.8.0", "8.8.8.255"), "8.8.8.0/24");
    assert_eq!(span("10.0.0.0", "10.0.0.5"), "10.0.0.0 - 10.0.0.5");
    assert_eq!(span("2001:db8::", "2001:db8::ffff"), "2001:db8::/112");
    let v = json!({
      "startAddress": "1.0.0.0",
      "endAddress": "1.0.0.255",
      "cidr0_cidrs": [ { "v4prefix": "1.0.0.0", "length": 24 } ]
    });
    assert_eq!(network(&v), Ok("1.0.0.0/24".to_string()));
    assert!(network(&json!({})).is_err());
  }

  #[test]
  fn test_extract_ip_fields() {
    let mut diag = Diagnostics::new(Mode::Off);
    let rec = extract_ip(&ip_network(), &mut diag);
    assert_eq!(
      rec.keys(),
      vec!["ip_registrant", "ip_abuse", "net_handle", "net_name", "network"]
    );
    assert_eq!(rec.get("ip_registrant"), Some("Google LLC"));
    // no url in the abuse vCard, so the email is used
    assert_eq!(rec.get("ip_abuse"), Some("network-abuse@google.com"));
    assert_eq!(rec.get("net_handle"), Some("NET-8-8-8-0-2"));
    assert_eq!(rec.get("net_name"), Some("GOGL"));
    assert_eq!(rec.get("network"), Some("8.8.8.0/24"));
    assert_eq!(diag.count(), 0);
  }

  #[test]
  fn test_ip_abuse_prefers_url() {
    let v = json!({
      "entities": [{
        "roles": ["abuse"],
        "vcardArray": ["vcard", [
          ["email", {}, "text", "abuse@ripe.net"],
          ["url", {}, "uri", "https://abuse.example/report"]
        ]]
      }]
    });
    let mut diag = Diagnostics::new(Mode::Off);
    let rec = extract_ip(&v, &mut diag);
    assert_eq!(rec.get("ip_abuse"), Some("https://abuse.example/report"));
    assert_eq!(rec.keys(), vec!["ip_abuse"]);
    assert_eq!(diag.count(), 4);
  }

  #[test]
  fn test_structured_and_raw_shapes_agree() {
    let v = domain_json();
    let structured = DomainRecord::Structured(Summary::parse(&v).unwrap());
    let raw = DomainRecord::Raw(v);
    let mut diag = Diagnostics::new(Mode::Off);
    let a = extract_domain(&structured, &mut diag);
    let b = extract_domain(&raw, &mut diag);
    assert_eq!(
      a.get("registrar"),
      Some("RESERVED-Internet Assigned Numbers Authority")
    );
    assert_eq!(a.get("domain_abuse"), Some("abuse@iana.org"));
    assert_eq!(a.keys(), b.keys());
    assert_eq!(a.get("registrar"), b.get("registrar"));
    assert_eq!(a.get("domain_abuse"), b.get("domain_abuse"));
    assert_eq!(diag.count(), 0);
  }

  #[test]
  fn test_nameserver_case_by_shape() {
    let v = domain_json();
    let structured = DomainRecord::Structured(Summary::parse(&v).unwrap());
    assert_eq!(
      structured.nameservers().unwrap(),
      "a.iana-servers.net, b.iana-servers.net"
    );
    assert_eq!(
      DomainRecord::Raw(v).nameservers().unwrap(),
      "A.IANA-SERVERS.NET, B.IANA-SERVERS.NET"
    );
  }

  #[test]
  fn test_raw_shape_tolerates_missing_roles() {
    // an entity lacking "roles" breaks the structured parse but the raw
    // walk still finds the registrar
    let v = json!({
      "objectClassName": "domain",
      "entities": [
        { "handle": "odd" },
        {
          "roles": ["registrar"],
          "vcardArray": vcard(&[("fn", "Example Registrar, Inc.")])
        }
      ]
    });
    assert!(Summary::parse(&v).is_err());
    let raw = DomainRecord::Raw(v);
    assert_eq!(raw.registrar().unwrap(), "Example Registrar, Inc.");
    assert!(raw.abuse_email().is_err());
    assert!(raw.nameservers().is_err());
  }

  #[test]
  fn test_domain_failure_labels_include_shape() {
    let mut diag = Diagnostics::new(Mode::Debug);
    let rec = extract_domain(&DomainRecord::Raw(json!({})), &mut diag);
    assert!(rec.is_empty());
    assert_eq!(diag.count(), 3);
    assert!(diag.messages()[0].contains("registrar, raw=true"));
  }

  #[test]
  fn test_expect_class() {
    let err = expect_class("x.test", json!({"errorCode": 404}), "domain");
    assert!(matches!(err, Err(Error::NotFound(_))));
    let err = expect_class("x.test", json!({"objectClassName": "entity"}), "domain");
    assert!(matches!(err, Err(Error::Unexpected { ref found, .. }) if found == "entity"));
    assert!(expect_class("x.test", domain_json(), "domain").is_ok());
  }

  #[test]
  fn test_typed_answer_checks_object_kind() {
    let net = RdapResponse::try_from(ip_network()).expect("network object");
    let v = typed_answer("192.0.2.1", &net, Kind::Network).unwrap();
    assert_eq!(object_class(&v), "ip network");
    assert!(matches!(
      typed_answer("192.0.2.1", &net, Kind::Domain),
      Err(Error::Unexpected { expected: "domain", .. })
    ));

    let missing = RdapResponse::try_from(json!({
      "errorCode": 404,
      "title": "Not Found"
    }))
    .expect("error object");
    assert!(matches!(
      typed_answer("nope.test", &missing, Kind::Domain),
      Err(Error::NotFound(_))
    ));
  }

  #[test]
  fn test_only_client_failures_go_raw() {
    assert!(!wants_raw(&Error::NotFound("co.uk".into())));
    assert!(!wants_raw(&Error::Unexpected {
      target: "x.test".into(),
      expected: "domain",
      found: "entity".into(),
    }));
    assert!(wants_raw(&Error::Client {
      target: "x.test".into(),
      source: "timed out".into(),
    }));
  }

  #[test]
  fn test_not_found_detected_in_error_chain() {
    #[derive(Debug, thiserror::Error)]
    #[error("request failed")]
    struct Outer(#[source] BoxError);

    let plain: BoxError =
      "HTTP status client error (404 Not Found) for url (https://rdap.test)".into();
    assert!(is_not_found(plain.as_ref()));
    let nested = Outer("HTTP status client error (404 Not Found)".into());
    assert!(is_not_found(&nested));
    let other: BoxError = "HTTP status server error (503 Service Unavailable)".into();
    assert!(!is_not_found(other.as_ref()));
  }

  #[tokio::test]
  async fn test_structured_answer_stays_structured() {
    let src = CannedSource::default()
      .with_structured("example.com", Answer::Found(sample_domain()));
    let mut diag = Diagnostics::new(Mode::Debug);
    let (rec, _) = lookup_domain(&src, "example.com", &mut diag).await.unwrap();
    assert!(!rec.is_raw());
    assert_eq!(rec.registrar().unwrap(), "Example Registrar");
    assert_eq!(src.calls(), vec!["structured example.com"]);
    assert!(diag.messages().is_empty());
  }

  #[tokio::test]
  async fn test_missing_domain_never_goes_raw() {
    let src = CannedSource::default()
      .with_raw("co.uk", Answer::Found(sample_domain()));
    let mut diag = Diagnostics::new(Mode::Debug);
    let res = lookup_domain(&src, "co.uk", &mut diag).await;
    assert!(matches!(res, Err(Error::NotFound(_))));
    assert_eq!(src.calls(), vec!["structured co.uk"]);
    assert!(diag.messages().is_empty());
  }

  #[tokio::test]
  async fn test_client_failure_switches_to_raw_fetch() {
    let src = CannedSource::default()
      .with_structured("example.com", Answer::Broken)
      .with_raw("example.com", Answer::Found(sample_domain()));
    let mut diag = Diagnostics::new(Mode::Debug);
    let (rec, _) = lookup_domain(&src, "example.com", &mut diag).await.unwrap();
    assert!(rec.is_raw());
    assert_eq!(rec.abuse_email().unwrap(), "abuse@registrar.test");
    assert_eq!(src.calls(), vec!["structured example.com", "raw example.com"]);
    assert!(diag
      .messages()
      .last()
      .unwrap()
      .ends_with("But switched to raw mode with example.com"));
  }

  #[tokio::test]
  async fn test_unparseable_answer_reused_as_raw() {
    let odd = json!({
      "objectClassName": "domain",
      "entities": [
        { "handle": "no-roles" },
        {
          "roles": ["registrar"],
          "vcardArray": ["vcard", [["fn", {}, "text", "Odd Registrar"]]]
        }
      ]
    });
    let src = CannedSource::default()
      .with_structured("odd.test", Answer::Found(odd));
    let mut diag = Diagnostics::new(Mode::Off);
    let (rec, _) = lookup_domain(&src, "odd.test", &mut diag).await.unwrap();
    assert!(rec.is_raw());
    assert_eq!(rec.registrar().unwrap(), "Odd Registrar");
    // the same answer is read again; no second request
    assert_eq!(src.calls(), vec!["structured odd.test"]);
    assert_eq!(diag.count(), 1);
  }

  #[tokio::test]
  async fn test_failed_raw_fetch_propagates() {
    let src = CannedSource::default().with_structured("x.test", Answer::Broken);
    let mut diag = Diagnostics::new(Mode::Off);
    let res = lookup_domain(&src, "x.test", &mut diag).await;
    assert!(matches!(res, Err(Error::NotFound(_))));
    assert_eq!(src.calls(), vec!["structured x.test", "raw x.test"]);
  }
}
