//! Settings loading
//!
//! Precedence (lowest first): built-in defaults, TOML file, `READFLOW_*`
//! environment variables.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use readflow_core::application::PipelineConfig;
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "READFLOW";

/// Load the pipeline configuration from defaults, `file` and the process environment
pub fn load(file: Option<&Path>) -> Result<PipelineConfig> {
    load_with_env(file, env_source(None))
}

fn env_source(vars: Option<config::Map<String, String>>) -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("env_allowlist")
        .source(vars)
}

fn load_with_env(file: Option<&Path>, env: Environment) -> Result<PipelineConfig> {
    let defaults = Config::try_from(&PipelineConfig::default())
        .context("Failed to build default configuration")?;

    let mut builder = Config::builder().add_source(defaults);
    if let Some(path) = file {
        let expanded = expand(path);
        builder = builder.add_source(File::from(expanded).format(FileFormat::Toml).required(true));
    }

    let mut config: PipelineConfig = builder
        .add_source(env)
        .build()
        .context("Failed to read configuration")?
        .try_deserialize()
        .context("Invalid configuration")?;

    config.work_dir = expand(&config.work_dir);
    config.store_root = expand(&config.store_root);
    config.log_dir = config.log_dir.as_deref().map(expand);

    config.validate()?;
    Ok(config)
}

/// Expand a leading `~` to the home directory
fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use readflow_core::application::SortOutputMode;

    fn vars(pairs: &[(&str, &str)]) -> Environment {
        env_source(Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ))
    }

    #[test]
    fn test_defaults() {
        let config = load_with_env(None, vars(&[])).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_file_then_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readflow.toml");
        std::fs::write(
            &path,
            r#"
aligner = "/opt/bowtie2/bowtie2"
sort_output_mode = "per_sample"
concurrency = 2
"#,
        )
        .unwrap();

        let config = load_with_env(
            Some(&path),
            vars(&[
                ("READFLOW_CONCURRENCY", "8"),
                ("READFLOW_ENV_ALLOWLIST", "PATH,LANG"),
            ]),
        )
        .unwrap();

        assert_eq!(config.aligner, "/opt/bowtie2/bowtie2");
        assert_eq!(config.sort_output_mode, SortOutputMode::PerSample);
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.env_allowlist, vec!["PATH", "LANG"]);
        assert_eq!(config.samtools, "samtools");
    }

    #[test]
    fn test_tilde_expansion() {
        let config =
            load_with_env(None, vars(&[("READFLOW_WORK_DIR", "~/readflow-work")])).unwrap();
        assert!(!config.work_dir.to_string_lossy().starts_with('~'));
        assert!(config.work_dir.ends_with("readflow-work"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(load_with_env(None, vars(&[("READFLOW_CONCURRENCY", "0")])).is_err());
        assert!(load_with_env(Some(Path::new("/no/such/readflow.toml")), vars(&[])).is_err());
    }
}
