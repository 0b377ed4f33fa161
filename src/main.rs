#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use anyhow::Result;
use iplocate::{logging, run};

#[tokio::main]
async fn main() -> Result<()> {
  // Install the default crypto provider for rustls
  let _ = rustls::crypto::ring::default_provider().install_default();
  logging::init();

  let code = run().await?;
  if code != 0 {
    std::process::exit(code);
  }
  Ok(())
}
