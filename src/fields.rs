//! Best-effort navigation of decoded JSON-like records.
//!
//! Both the geolocation database and RDAP responses are handled as
//! `serde_json::Value` trees. Every accessor here returns a typed error naming
//! the path that failed, so callers can fold a failure into "field omitted"
//! while still reporting what went wrong.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
  #[error("missing key '{0}'")]
  Missing(String),
  #[error("'{key}' is not {expected}")]
  WrongType { key: String, expected: &'static str },
  #[error("'{0}' is empty")]
  Empty(String),
}

fn describe(path: &[&str]) -> String {
  if path.is_empty() {
    "<root>".to_string()
  } else {
    path.join(".")
  }
}

/// Walks `path` from `root`, failing on the first absent key.
pub fn get<'a>(root: &'a Value, path: &[&str]) -> Result<&'a Value, Error> {
  let mut cur = root;
  for (depth, key) in path.iter().enumerate() {
    let obj = cur.as_object().ok_or_else(|| Error::WrongType {
      key: describe(&path[..depth]),
      expected: "an object",
    })?;
    cur = obj
      .get(*key)
      .ok_or_else(|| Error::Missing(describe(&path[..=depth])))?;
  }
  Ok(cur)
}

pub fn text<'a>(root: &'a Value, path: &[&str]) -> Result<&'a str, Error> {
  get(root, path)?.as_str().ok_or_else(|| Error::WrongType {
    key: describe(path),
    expected: "a string",
  })
}

pub fn array<'a>(
  root: &'a Value,
  path: &[&str],
) -> Result<&'a Vec<Value>, Error> {
  get(root, path)?.as_array().ok_or_else(|| Error::WrongType {
    key: describe(path),
    expected: "an array",
  })
}

pub fn unsigned(root: &Value, path: &[&str]) -> Result<u64, Error> {
  get(root, path)?.as_u64().ok_or_else(|| Error::WrongType {
    key: describe(path),
    expected: "an unsigned integer",
  })
}

pub fn float(root: &Value, path: &[&str]) -> Result<f64, Error> {
  get(root, path)?.as_f64().ok_or_else(|| Error::WrongType {
    key: describe(path),
    expected: "a number",
  })
}

/// First element of a non-empty slice, or `Error::Empty` naming `what`.
pub fn first<'a, T>(items: &'a [T], what: &str) -> Result<&'a T, Error> {
  items.first().ok_or_else(|| Error::Empty(what.to_string()))
}

/// Formats a coordinate the way a reader expects to see it: integral
/// values keep one decimal so `38` reads as `38.0`.
#[must_use]
pub fn coordinate(v: f64) -> String {
  if v.fract() == 0.0 && v.is_finite() {
    format!("{v:.1}")
  } else {
    v.to_string()
  }
}
