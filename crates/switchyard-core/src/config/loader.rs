//! Configuration loading

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, Result};

use super::types::PipelineConfig;

/// File names probed by [`find_config`], in order of preference
const CONFIG_FILE_NAMES: &[&str] = &["switchyard.toml", "switchyard.json"];

/// Load pipeline configuration from a file
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    let format = if path.extension().is_some_and(|e| e == "json") {
        "JSON"
    } else {
        "TOML"
    };
    info!(path = %path.display(), format, "loading pipeline config");

    let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

    let config: PipelineConfig = if format == "JSON" {
        serde_json::from_str(&content).map_err(ConfigError::JsonError)?
    } else {
        toml::from_str(&content).map_err(ConfigError::TomlError)?
    };

    config.validate()?;
    debug!(path = %path.display(), tasks = config.pipeline.len(), "pipeline config loaded");
    Ok(config)
}

/// Find a configuration file in a directory or its parents.
///
/// At each level the candidate names are probed in order; the first match
/// wins. Parents are walked until the filesystem root.
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    debug!(start_dir = %start_dir.display(), "searching for pipeline config");
    let mut current = start_dir.to_path_buf();

    loop {
        for name in CONFIG_FILE_NAMES {
            let config_path = current.join(name);
            if config_path.exists() {
                info!(path = %config_path.display(), "found pipeline config");
                return Some(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    debug!("no pipeline config found");
    None
}

/// Load configuration from a directory (searching parent directories)
pub fn load_config_from_dir(dir: &Path) -> Result<(PipelineConfig, PathBuf)> {
    let config_path = find_config(dir).ok_or_else(|| ConfigError::NotFound(dir.to_path_buf()))?;

    let config = load_config(&config_path)?;
    Ok((config, config_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_toml() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("switchyard.toml");
        std::fs::write(
            &config_path,
            "concurrency = 8\n\n[pipeline.build]\ndepends_on = [\"^build\"]\n\n[pipeline.dev]\npersistent = true\n",
        )
        .unwrap();

        let config = load_config(&config_path).unwrap();
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.pipeline["build"].depends_on, vec!["^build"]);
        assert!(config.pipeline["dev"].persistent);
    }

    #[test]
    fn test_load_config_json() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("switchyard.json");
        std::fs::write(
            &config_path,
            r#"{"pipeline": {"test": {"depends_on": ["build"]}, "//#lint": {}}}"#,
        )
        .unwrap();

        let config = load_config(&config_path).unwrap();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.pipeline["test"].depends_on, vec!["build"]);
        assert!(config.pipeline.contains_key("//#lint"));
    }

    #[test]
    fn test_load_config_rejects_invalid_pipeline() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("switchyard.toml");
        std::fs::write(&config_path, "[pipeline.test]\ndepends_on = [\"^\"]\n").unwrap();

        assert!(load_config(&config_path).is_err());
    }

    #[test]
    fn test_find_config_prefers_toml_over_json() {
        let temp = TempDir::new().unwrap();
        let toml_path = temp.path().join("switchyard.toml");
        let json_path = temp.path().join("switchyard.json");
        std::fs::write(&toml_path, "[pipeline.build]\n").unwrap();
        std::fs::write(&json_path, "{}").unwrap();

        let found = find_config(temp.path()).unwrap();
        assert_eq!(found, toml_path);
    }

    #[test]
    fn test_find_config_walks_parents() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("packages").join("app");
        std::fs::create_dir_all(&nested).unwrap();
        let config_path = temp.path().join("switchyard.toml");
        std::fs::write(&config_path, "[pipeline.build]\n").unwrap();

        let found = find_config(&nested).unwrap();
        assert_eq!(found, config_path);
    }

    #[test]
    fn test_load_config_from_missing_dir() {
        let temp = TempDir::new().unwrap();
        let result = load_config_from_dir(temp.path());
        assert!(result.is_err());
    }
}
