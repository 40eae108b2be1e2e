//! # SitePulse Core
//!
//! Shared configuration and error types for the SitePulse workspace.

pub mod config;
pub mod error;

pub use config::{SchedulerConfig, SitePulseConfig, SitemapConfig};
pub use error::{Result, SitePulseError};
