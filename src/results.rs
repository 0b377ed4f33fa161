use std::fmt::Write as _;

use serde_json::Value;

use crate::diagnostics::Source;

/// Ordered field/value pairs gathered over one invocation.
///
/// Insertion order is display order. The first value set for a key wins.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Record {
  fields: Vec<(&'static str, String)>,
}

impl Record {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Sets `key` unless it already has a value. Returns whether it was set.
  pub fn set(&mut self, key: &'static str, value: impl Into<String>) -> bool {
    if self.contains(key) {
      return false;
    }
    self.fields.push((key, value.into()));
    true
  }

  #[must_use]
  pub fn contains(&self, key: &str) -> bool {
    self.fields.iter().any(|(k, _)| *k == key)
  }

  #[must_use]
  pub fn get(&self, key: &str) -> Option<&str> {
    self
      .fields
      .iter()
      .find(|(k, _)| *k == key)
      .map(|(_, v)| v.as_str())
  }

  #[must_use]
  pub fn keys(&self) -> Vec<&'static str> {
    self.fields.iter().map(|(k, _)| *k).collect()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.fields.is_empty()
  }

  /// Appends every field of `other` that is not already present.
  pub fn extend(&mut self, other: Self) {
    for (k, v) in other.fields {
      self.set(k, v);
    }
  }

  /// Drops fields whose value is the empty string.
  pub fn drop_empty(&mut self) {
    self.fields.retain(|(_, v)| !v.is_empty());
  }

  /// Renders the aligned `key:   value` block, or `Address not found.`.
  #[must_use]
  pub fn render(&self) -> String {
    if self.fields.is_empty() {
      return "Address not found.\n".to_string();
    }
    let width = self.fields.iter().map(|(k, _)| k.len()).max().unwrap_or(0) + 3;
    let mut out = String::new();
    for (k, v) in &self.fields {
      let _ = writeln!(out, "{:<width$}{v}", format!("{k}:"));
    }
    out
  }
}

/// Raw responses kept around for `--rawdata` and `--stacktraces`.
#[derive(Debug, Default)]
pub struct RawResponses {
  entries: Vec<(Source, Value)>,
}

impl RawResponses {
  pub fn insert(&mut self, source: Source, value: Value) {
    self.entries.retain(|(s, _)| *s != source);
    self.entries.push((source, value));
  }

  #[must_use]
  pub fn get(&self, source: Source) -> Option<&Value> {
    self
      .entries
      .iter()
      .find(|(s, _)| *s == source)
      .map(|(_, v)| v)
  }

  /// Builds the dump section: erroring responses first (in the order given),
  /// then, if `all` is set, every remaining response.
  #[must_use]
  pub fn render(&self, erroring: &[Source], all: bool) -> String {
    let mut out = String::new();
    for src in erroring {
      if let Some(v) = self.get(*src) {
        dump(&mut out, &format!("erroring {}", src.label()), v);
      }
    }
    if all {
      for (src, v) in &self.entries {
        if !erroring.contains(src) {
          dump(&mut out, src.label(), v);
        }
      }
    }
    out
  }
}

fn dump(out: &mut String, label: &str, value: &Value) {
  let body = serde_json::to_string_pretty(value)
    .unwrap_or_else(|_| value.to_string());
  let _ = write!(out, "\n--- {label} start ---\n{body}\n--- {label} end ---\n");
}
