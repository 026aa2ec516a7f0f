//! Configuration types for world builds.
//!
//! All types implement [`serde::Deserialize`] so the CLI can load them from
//! TOML. Every section is optional and falls back to its defaults.
//!
//! # Example
//!
//! ```
//! # use cartograph::config::{AppConfig, ReportConfig};
//! let config = AppConfig::default();
//! assert!(!config.report().bill_of_materials());
//!
//! let config = AppConfig::new(ReportConfig::new(true));
//! assert!(config.report().bill_of_materials());
//! ```

use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Report configuration section.
    #[serde(default)]
    report: ReportConfig,
}

impl AppConfig {
    pub fn new(report: ReportConfig) -> Self {
        Self { report }
    }

    /// Returns the report configuration.
    pub fn report(&self) -> &ReportConfig {
        &self.report
    }

    /// Returns a copy with the bill-of-materials dump switched on or off.
    pub fn with_bill_of_materials(mut self, enabled: bool) -> Self {
        self.report.bill_of_materials = enabled;
        self
    }
}

/// What a successful build reports besides its result.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportConfig {
    /// Log the bill of materials after a successful build.
    #[serde(default)]
    bill_of_materials: bool,
}

impl ReportConfig {
    pub fn new(bill_of_materials: bool) -> Self {
        Self { bill_of_materials }
    }

    pub fn bill_of_materials(&self) -> bool {
        self.bill_of_materials
    }
}
