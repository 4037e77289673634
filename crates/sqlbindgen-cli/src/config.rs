//! Configuration file handling

use miette::{IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use sqlbindgen_core::{GenerateSettings, Override};

/// Configuration for sqlbindgen, loaded from sqlbindgen.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Generated package name
    #[serde(default)]
    pub package: Option<String>,

    /// Schema file paths or patterns
    #[serde(default)]
    pub schema: Vec<String>,

    /// Directory containing schema files
    pub schema_dir: Option<String>,

    /// Query file paths or patterns
    #[serde(default)]
    pub queries: Vec<String>,

    /// SQL dialect ("mysql" or "postgresql")
    #[serde(default)]
    pub dialect: Option<String>,

    /// Where to write the bundle JSON
    #[serde(default)]
    pub out: Option<String>,

    #[serde(default)]
    pub emit_json_tags: bool,

    #[serde(default)]
    pub emit_prepared_queries: bool,

    /// Type override rules, applied by the emitter
    #[serde(default)]
    pub overrides: Vec<Override>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).into_diagnostic()?;
        let config: Config = toml::from_str(&contents).into_diagnostic()?;
        Ok(config)
    }

    /// Try to find and load sqlbindgen.toml in the current directory or any
    /// parent directory
    pub fn find_and_load() -> Result<Option<Self>> {
        let mut current_dir = std::env::current_dir().into_diagnostic()?;

        loop {
            let config_path = current_dir.join("sqlbindgen.toml");
            if config_path.exists() {
                return Ok(Some(Self::from_file(&config_path)?));
            }
            if !current_dir.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Merge CLI arguments into configuration; CLI takes precedence
    pub fn merge_with_args(
        mut self,
        schema: &[PathBuf],
        schema_dir: &Option<PathBuf>,
        queries: &[PathBuf],
        dialect: &Option<String>,
        package: &Option<String>,
    ) -> Self {
        if !schema.is_empty() {
            self.schema = schema.iter().map(|p| p.display().to_string()).collect();
        }
        if schema_dir.is_some() {
            self.schema_dir = schema_dir.as_ref().map(|p| p.display().to_string());
        }
        if !queries.is_empty() {
            self.queries = queries.iter().map(|p| p.display().to_string()).collect();
        }
        if dialect.is_some() {
            self.dialect = dialect.clone();
        }
        if package.is_some() {
            self.package = package.clone();
        }
        self
    }

    /// The settings handed to the core and embedded in the bundle
    pub fn generate_settings(&self) -> GenerateSettings {
        GenerateSettings {
            package: self.package.clone().unwrap_or_else(|| "db".to_string()),
            emit_json_tags: self.emit_json_tags,
            emit_prepared_queries: self.emit_prepared_queries,
            overrides: self.overrides.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let config: Config = toml::from_str(
            r#"
            package = "db"
            schema = ["schema.sql"]
            queries = ["queries/*.sql"]
            dialect = "mysql"
            emit_json_tags = true

            [[overrides]]
            db_type = "decimal(13,4)"
            host_type = "Money"
        "#,
        )
        .unwrap();
        assert_eq!(config.package.as_deref(), Some("db"));
        assert_eq!(config.overrides.len(), 1);
        assert_eq!(config.overrides[0].host_type, "Money");
        assert!(config.emit_json_tags);
        assert!(!config.emit_prepared_queries);
    }

    #[test]
    fn settings_default_package_name() {
        let config = Config::default();
        assert_eq!(config.generate_settings().package, "db");
    }
}
