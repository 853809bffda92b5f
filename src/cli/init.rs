//! Init mode: write a starter configuration file

use crate::config::ConfigLoader;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Arguments for init mode
#[derive(Debug, Default)]
pub struct InitArgs {
    /// Target file; defaults to the platform config location
    pub path: Option<String>,
}

/// Write the template and print where it went
pub fn run_init_mode(args: InitArgs) -> Result<()> {
    let path = match args.path {
        Some(path) => PathBuf::from(path),
        None => ConfigLoader::default_config_path()
            .context("could not determine the configuration directory; pass a path")?,
    };

    let written = ConfigLoader::new().write_template(&path)?;
    println!("Wrote configuration template to {}", written.display());
    println!("Fill in [account] or set XKFW_USERNAME and XKFW_PASSWORD before running.");
    Ok(())
}
