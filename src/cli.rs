use std::path::{Path, PathBuf};

use clap::{CommandFactory, FromArgMatches, Parser};

/// Executable name that implies `--geo`.
pub const GEO_ONLY_NAME: &str = "geoinfo";

#[derive(Parser, Debug, Clone)]
#[command(name = "iplocate", version)]
#[command(
  about = "Show geolocation and registry details for an IP address or hostname.",
  long_about = "Looks the address up in a local GeoLite2-City database and, unless --geo is given, queries RDAP for the owning network and, for hostnames, the registered domain."
)]
pub struct Cli {
  /// The IP address or hostname to look up.
  pub target: String,

  /// Further arguments; reported and otherwise ignored.
  #[arg(hide = true)]
  pub extra: Vec<String>,

  /// Skip remote registry lookups.
  #[arg(long)]
  pub geo: bool,

  /// Print errors that lookups recovered from.
  #[arg(long)]
  pub debug: bool,

  /// Like --debug, plus full error detail and the responses that caused it.
  #[arg(long)]
  pub stacktraces: bool,

  /// Dump the raw lookup responses.
  #[arg(long)]
  pub rawdata: bool,

  /// GeoLite2-City database to use instead of the configured one.
  #[arg(long, value_name = "PATH")]
  pub db: Option<PathBuf>,
}

const GEO_ONLY_HINT: &str = "Geographic data via local database query only:
  geoinfo <ip_address|hostname>
  or use option: --geo";

/// Command definition for the name the program was started under.
///
/// Under the geo-only name remote lookups are always off, so `--geo` is
/// hidden and the hint pointing at the geo-only mode is left out.
#[must_use]
pub fn command(geo_only: bool) -> clap::Command {
  let cmd = Cli::command();
  if geo_only {
    cmd
      .name(GEO_ONLY_NAME)
      .bin_name(GEO_ONLY_NAME)
      .mut_arg("geo", |a| a.hide(true))
  } else {
    cmd.after_help(GEO_ONLY_HINT)
  }
}

/// Parses `args` against [`command`].
///
/// # Errors
///
/// Returns the clap error for invalid arguments, `--help` and `--version`.
pub fn parse_from<I, T>(args: I, geo_only: bool) -> Result<Cli, clap::Error>
where
  I: IntoIterator<Item = T>,
  T: Into<std::ffi::OsString> + Clone,
{
  let matches = command(geo_only).try_get_matches_from(args)?;
  Cli::from_arg_matches(&matches)
}

/// Whether the program was started under the geo-only name.
#[must_use]
pub fn invoked_as_geo_only(argv0: &Path) -> bool {
  argv0
    .file_stem()
    .is_some_and(|stem| stem == GEO_ONLY_NAME)
}

impl Cli {
  /// The warning printed for positional arguments beyond the target.
  #[must_use]
  pub fn unprocessed_warning(&self) -> Option<String> {
    if self.extra.is_empty() {
      return None;
    }
    let plural = if self.extra.len() > 1 { "s" } else { "" };
    Some(format!(
      "Unprocessed command-line argument{plural}:  {}",
      self.extra.join(" ")
    ))
  }
}
