//! Configuration management for the grabber
//!
//! This module handles loading and managing configuration settings:
//! account, course list, portal constants and loop cadence.

pub mod loader;
pub mod settings;

pub use loader::ConfigLoader;
pub use settings::Settings;
