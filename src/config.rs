//! Pipeline configuration: connection string resolution and the optional TOML file.
//!
//! Precedence is defaults < config file < command-line flags. The binaries
//! build a [`PipelineConfig`] from the file (or defaults) and then apply flag
//! overrides before any store access.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::dataset::export::LabelSource;
use crate::dataset::labels::{DEFAULT_BINARY_THRESHOLD, LabelError, LabelPolicy};
use crate::dataset::split::SplitConfig;

/// Environment variable consulted when no `--database-url` flag is given.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
pub const DEFAULT_MIN_RATING_COUNT: u32 = 2;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing database connection string: pass --database-url or set DATABASE_URL")]
    MissingDatabaseUrl,
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Label(#[from] LabelError),
}

/// Resolve the connection string from the flag or the environment.
pub fn resolve_database_url(flag: Option<&str>) -> Result<String, ConfigError> {
    let env_value = std::env::var(DATABASE_URL_ENV).ok();
    resolve_database_url_from(flag, env_value.as_deref())
}

fn resolve_database_url_from(
    flag: Option<&str>,
    env_value: Option<&str>,
) -> Result<String, ConfigError> {
    [flag, env_value]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or(ConfigError::MissingDatabaseUrl)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub split: SplitConfig,
    pub labels: LabelsConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LabelsConfig {
    pub target_type: String,
    pub binary_threshold: f64,
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            target_type: "binary".to_string(),
            binary_threshold: DEFAULT_BINARY_THRESHOLD,
        }
    }
}

impl LabelsConfig {
    pub fn policy(&self) -> Result<LabelPolicy, ConfigError> {
        Ok(LabelPolicy::new(&self.target_type, self.binary_threshold)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub label_source: LabelSource,
    pub min_rating_count: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            label_source: LabelSource::ManualOnly,
            min_rating_count: DEFAULT_MIN_RATING_COUNT,
        }
    }
}

/// Parse a pipeline config from TOML text.
pub fn parse_pipeline_config(text: &str) -> Result<PipelineConfig, ConfigError> {
    Ok(toml::from_str::<PipelineConfig>(text)?)
}

/// Load a pipeline config file, or defaults when no path is given.
pub fn load_pipeline_config(path: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_pipeline_config(&text)?;
    tracing::info!("Loaded pipeline config from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::labels::TaskType;

    #[test]
    fn flag_wins_over_environment() {
        let url = resolve_database_url_from(Some("flag.db"), Some("env.db")).unwrap();
        assert_eq!(url, "flag.db");
    }

    #[test]
    fn environment_used_when_flag_absent_or_blank() {
        assert_eq!(resolve_database_url_from(None, Some("env.db")).unwrap(), "env.db");
        assert_eq!(
            resolve_database_url_from(Some("  "), Some("env.db")).unwrap(),
            "env.db"
        );
    }

    #[test]
    fn missing_everywhere_is_fatal() {
        assert!(matches!(
            resolve_database_url_from(None, None),
            Err(ConfigError::MissingDatabaseUrl)
        ));
        assert!(matches!(
            resolve_database_url_from(Some(""), Some("")),
            Err(ConfigError::MissingDatabaseUrl)
        ));
    }

    #[test]
    fn empty_file_yields_defaults() {
        let config = parse_pipeline_config("").unwrap();
        assert_eq!(config.split, SplitConfig::default());
        assert_eq!(config.export.label_source, LabelSource::ManualOnly);
        assert_eq!(config.export.min_rating_count, 2);
        assert_eq!(config.labels.policy().unwrap(), LabelPolicy::default());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = parse_pipeline_config(
            r#"
            [split]
            seed = 7
            train_pct = 80
            val_pct = 10
            test_pct = 10

            [labels]
            target_type = "regression"

            [export]
            label_source = "public_aggregate"
            "#,
        )
        .unwrap();
        assert_eq!(config.split.seed, 7);
        assert_eq!(config.split.train_pct, 80);
        assert_eq!(config.labels.policy().unwrap().target_type, TaskType::Regression);
        assert_eq!(config.labels.binary_threshold, 4.0);
        assert_eq!(config.export.label_source, LabelSource::PublicAggregate);
        assert_eq!(config.export.min_rating_count, 2);
    }

    #[test]
    fn unsupported_target_type_surfaces_from_policy() {
        let config = parse_pipeline_config("[labels]\ntarget_type = \"ranking\"\n").unwrap();
        assert!(matches!(
            config.labels.policy(),
            Err(ConfigError::Label(LabelError::UnsupportedTaskType(_)))
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_pipeline_config(Some(Path::new("/nonexistent/pipeline.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
