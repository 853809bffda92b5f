//! Version information

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name, version and platform, for the startup log line
pub fn build_info() -> String {
    format!(
        "{} {} ({}/{})",
        env!("CARGO_PKG_NAME"),
        VERSION,
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}
