// ABOUTME: Engine configuration loaded from an optional TOML file
// ABOUTME: Holds checkpoint/rotation intervals and extra table declarations

use crate::catalog::{Catalog, TableDecl};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_COMPARE_CHECKPOINT_EVERY: u64 = 10_000_000;
pub const DEFAULT_COMMIT_EVERY_SECS: u64 = 30;
pub const DEFAULT_PROGRESS_EVERY_SECS: u64 = 5;

/// Tunables for every engine entry point.
///
/// Example file:
///
/// ```toml
/// compare_checkpoint_every = 1000000
/// commit_every_secs = 10
///
/// [[tables]]
/// name = "Receipts"
/// dupsort = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Records compared between cancellation checks and progress lines
    pub compare_checkpoint_every: u64,
    /// Seconds between destination transaction rotations during a copy
    pub commit_every_secs: u64,
    /// Seconds between progress notices during a flat-file load
    pub progress_every_secs: u64,
    /// Declarations merged over the built-in catalog
    pub tables: Vec<TableDecl>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            compare_checkpoint_every: DEFAULT_COMPARE_CHECKPOINT_EVERY,
            commit_every_secs: DEFAULT_COMMIT_EVERY_SECS,
            progress_every_secs: DEFAULT_PROGRESS_EVERY_SECS,
            tables: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn commit_every(&self) -> Duration {
        Duration::from_secs(self.commit_every_secs)
    }

    pub fn progress_every(&self) -> Duration {
        Duration::from_secs(self.progress_every_secs)
    }

    /// Built-in catalog with this config's declarations applied on top.
    pub fn catalog(&self) -> Catalog {
        let mut catalog = Catalog::default();
        catalog.extend(self.tables.iter().cloned());
        catalog
    }

    fn validate(&self) -> Result<()> {
        if self.compare_checkpoint_every == 0 {
            anyhow::bail!("compare_checkpoint_every must be greater than zero");
        }
        if let Some(decl) = self.tables.iter().find(|decl| decl.name.trim().is_empty()) {
            anyhow::bail!("table declaration has an empty name: {:?}", decl);
        }
        Ok(())
    }
}

pub fn parse_config(contents: &str) -> Result<EngineConfig> {
    let config: EngineConfig = toml::from_str(contents).context("Failed to parse config TOML")?;
    config.validate()?;
    Ok(config)
}

pub fn load_config_from_file(path: impl AsRef<Path>) -> Result<EngineConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("Invalid config file {}", path.display()))
}

/// Load `path` when given, otherwise fall back to the defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            tracing::info!("Loading configuration from {}", path.display());
            load_config_from_file(path)
        }
        None => Ok(EngineConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TableKind;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.compare_checkpoint_every, 10_000_000);
        assert_eq!(config.commit_every(), Duration::from_secs(30));
        assert_eq!(config.progress_every(), Duration::from_secs(5));
        assert!(config.tables.is_empty());
    }

    #[test]
    fn test_parse_partial_config_keeps_defaults() {
        let config = parse_config(
            r#"
            commit_every_secs = 2

            [[tables]]
            name = "Receipts"
            dupsort = true
            "#,
        )
        .unwrap();

        assert_eq!(config.commit_every_secs, 2);
        assert_eq!(config.compare_checkpoint_every, DEFAULT_COMPARE_CHECKPOINT_EVERY);
        assert_eq!(config.catalog().kind_of("Receipts"), Some(TableKind::MultiValue));
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        assert!(parse_config("compare_checkpoint_every = 0").is_err());
        assert!(parse_config("unknown_key = 1").is_err());
        assert!(parse_config("[[tables]]\nname = \"  \"").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "progress_every_secs = 1").unwrap();

        let config = load_config_from_file(file.path()).unwrap();
        assert_eq!(config.progress_every(), Duration::from_secs(1));

        assert!(load_config_from_file("/nonexistent/config.toml").is_err());
    }
}
