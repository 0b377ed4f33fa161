#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use std::path::Path;

use anyhow::Result;
use clap::error::ErrorKind;

mod app;
mod cli;
pub mod diagnostics;
pub mod fields;
pub mod logging;
pub mod providers;
pub mod results;
mod steps;
mod user_config;

/// Runs the command line program and returns its exit code.
///
/// Parses the arguments, loads the user config, resolves the target and
/// prints the merged geolocation and registry fields.
///
/// # Errors
///
/// Returns an error if the geolocation database cannot be opened or the HTTP
/// client cannot be built. Failed lookups are not errors.
pub async fn run() -> Result<i32> {
  let args: Vec<String> = std::env::args().collect();
  let geo_only_name = args
    .first()
    .is_some_and(|argv0| cli::invoked_as_geo_only(Path::new(argv0)));

  let cli = match cli::parse_from(&args, geo_only_name) {
    Ok(cli) => cli,
    Err(e) => {
      let code = match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => -1,
      };
      e.print()?;
      return Ok(code);
    }
  };

  let config = user_config::load();
  let mut app = app::App::new(cli, config, geo_only_name);
  app.run().await
}
