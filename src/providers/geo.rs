//! Offline geolocation using a MaxMind GeoLite2-City database.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use maxminddb::{MaxMindDBError, Reader};
use serde_json::Value;

use crate::diagnostics::{Diagnostics, Source};
use crate::fields;
use crate::results::Record;

/// File name looked for next to the executable when no path is configured.
pub const DEFAULT_DB_FILE: &str = "GeoLite2-City.mmdb";

pub struct Database {
  reader: Reader<Vec<u8>>,
}

impl Database {
  /// Opens the database at `path`.
  ///
  /// # Errors
  ///
  /// Returns an error if the file cannot be read or is not a valid MaxMind DB.
  pub fn open(path: &Path) -> Result<Self> {
    let reader = Reader::open_readfile(path).with_context(|| {
      format!("Failed to open geolocation database at {}", path.display())
    })?;
    tracing::debug!(
      path = %path.display(),
      kind = %reader.metadata.database_type,
      "opened geolocation database"
    );
    Ok(Self { reader })
  }

  /// Decodes the record for `ip` as a generic tree.
  ///
  /// `Ok(None)` means the address is simply not in the database.
  ///
  /// # Errors
  ///
  /// Returns an error if the record exists but cannot be decoded.
  pub fn lookup(&self, ip: IpAddr) -> Result<Option<Value>> {
    match self.reader.lookup::<Value>(ip) {
      Ok(v) => Ok(Some(v)),
      Err(MaxMindDBError::AddressNotFoundError(_)) => Ok(None),
      Err(e) => Err(e).with_context(|| format!("Failed to decode record for {ip}")),
    }
  }
}

/// `GeoLite2-City.mmdb` in the directory holding the running executable.
#[must_use]
pub fn default_path() -> PathBuf {
  std::env::current_exe()
    .ok()
    .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_DB_FILE)))
    .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE))
}

fn english_name<'a>(v: &'a Value, key: &str) -> Result<&'a str, fields::Error> {
  fields::text(v, &[key, "names", "en"])
}

fn subdivisions(geo: &Value) -> Result<String, fields::Error> {
  let names = fields::array(geo, &["subdivisions"])?
    .iter()
    .map(|s| fields::text(s, &["names", "en"]))
    .collect::<Result<Vec<_>, fields::Error>>()?;
  Ok(names.join(", "))
}

fn location(geo: &Value) -> Result<String, fields::Error> {
  let lat = fields::float(geo, &["location", "latitude"])?;
  let lon = fields::float(geo, &["location", "longitude"])?;
  Ok(format!(
    "{}, {}",
    fields::coordinate(lat),
    fields::coordinate(lon)
  ))
}

/// Pulls the displayable fields out of a decoded city record.
///
/// Each field is independent: a missing or malformed one is reported to
/// `diag` and left out.
pub fn extract(geo: &Value, diag: &mut Diagnostics) -> Record {
  let mut rec = Record::new();
  let src = Some(Source::Geo);

  match english_name(geo, "continent") {
    Ok(v) => {
      rec.set("continent", v);
    }
    Err(e) => diag.suppressed("continent", e, src),
  }

  match english_name(geo, "country") {
    Ok(v) => {
      rec.set("country", v);
    }
    Err(e) => {
      diag.suppressed("country", e, src);
      match english_name(geo, "registered_country") {
        Ok(v) => {
          rec.set("registered_country", v);
        }
        Err(e) => diag.suppressed("registered_country", e, src),
      }
    }
  }

  match subdivisions(geo) {
    Ok(v) => {
      rec.set("subdivision", v);
    }
    Err(e) => diag.suppressed("subdivision", e, src),
  }

  match english_name(geo, "city") {
    Ok(v) => {
      rec.set("city", v);
    }
    Err(e) => diag.suppressed("city", e, src),
  }

  match fields::unsigned(geo, &["city", "geoname_id"]) {
    Ok(id) => {
      rec.set("geo_id", id.to_string());
    }
    Err(e) => diag.suppressed("geo_id", e, None),
  }

  match location(geo) {
    Ok(v) => {
      rec.set("location", v);
    }
    Err(e) => diag.suppressed("location", e, src),
  }

  match fields::text(geo, &["location", "time_zone"]) {
    Ok(v) => {
      rec.set("timezone", v);
    }
    Err(e) => diag.suppressed("timezone", e, src),
  }

  rec
}
