use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::providers::{geo, rdap};

const APP_NAME: &str = "iplocate";
const FILE_NAME: Option<&str> = None;

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct UserConfig {
  /// Path of the GeoLite2-City database.
  pub database: Option<PathBuf>,
  /// RDAP redirect service used for raw domain fetches.
  pub rdap_fallback_url: Option<String>,
}

impl UserConfig {
  /// Database path: `flag`, else the config file, else next to the executable.
  #[must_use]
  pub fn database_path(&self, flag: Option<PathBuf>) -> PathBuf {
    flag
      .or_else(|| self.database.clone())
      .unwrap_or_else(geo::default_path)
  }

  #[must_use]
  pub fn fallback_url(&self) -> &str {
    self
      .rdap_fallback_url
      .as_deref()
      .filter(|u| !u.is_empty())
      .unwrap_or(rdap::DEFAULT_FALLBACK_URL)
  }
}

/// Read ~/.config/iplocate/default-config.toml (or OS equivalent).
pub fn load() -> UserConfig {
  confy::load(APP_NAME, FILE_NAME).unwrap_or_default()
}
