use anyhow::{Context, anyhow};
use cob_core::domain::cob::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tracing::debug;

const PATH_VAR: &str = "COB_CONFIG_PATH";
const JSON_VAR: &str = "COB_CONFIG_JSON";

const CANDIDATES: &[&str] = &[
    "cob.toml",
    "cob.json",
    "config/cob.toml",
    "config/cob.json",
];

fn default_log_filter() -> String {
    "info".to_string()
}

/// Where the configuration came from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CobConfigSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

/// Settings for a close-of-business deployment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CobConfig {
    /// Sizing of the cycle: page size, worker counts and step timeout.
    pub pipeline: PipelineConfig,
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for CobConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            log_filter: default_log_filter(),
        }
    }
}

impl CobConfig {
    /// Load configuration using environment variables.
    /// Evaluation order:
    /// 1) `$COB_CONFIG_PATH` (TOML or JSON file),
    /// 2) `$COB_CONFIG_JSON` (inline JSON),
    /// 3) the first of `cob.toml`, `cob.json`, `config/cob.toml`,
    ///    `config/cob.json` in the working directory,
    /// 4) defaults.
    ///
    /// The result is validated before it is returned.
    pub fn load_from_env() -> anyhow::Result<(Self, CobConfigSource)> {
        Self::load_with(|name| env::var(name).ok(), Path::new("."))
    }

    /// [`load_from_env`](Self::load_from_env) with the variable lookup and
    /// the directory searched for default files supplied by the caller.
    pub fn load_with(
        lookup: impl Fn(&str) -> Option<String>,
        root: &Path,
    ) -> anyhow::Result<(Self, CobConfigSource)> {
        let (config, source) = Self::resolve(lookup, root)?;
        config.validate()?;
        debug!(?source, "close of business configuration loaded");
        Ok((config, source))
    }

    fn resolve(
        lookup: impl Fn(&str) -> Option<String>,
        root: &Path,
    ) -> anyhow::Result<(Self, CobConfigSource)> {
        if let Some(path_str) = lookup(PATH_VAR)
            && !path_str.trim().is_empty()
        {
            let path = PathBuf::from(path_str);
            let config = Self::load_from_file(&path)?;
            return Ok((config, CobConfigSource::EnvPath(path)));
        }

        if let Some(raw) = lookup(JSON_VAR)
            && !raw.trim().is_empty()
        {
            let parsed = Self::parse_json(&raw)
                .context("failed to parse COB_CONFIG_JSON")?;
            return Ok((parsed, CobConfigSource::EnvInline));
        }

        if let Some(path) = Self::find_default_file(root) {
            let config = Self::load_from_file(&path)?;
            return Ok((config, CobConfigSource::File(path)));
        }

        Ok((Self::default(), CobConfigSource::Default))
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path).with_context(|| {
            format!("failed to read cob config from {}", path.display())
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::parse_json(&contents).with_context(|| {
                format!("invalid cob config {}", path.display())
            }),
            Some("toml") => toml::from_str(&contents).map_err(|err| {
                anyhow!("invalid cob config {}: {}", path.display(), err)
            }),
            _ => Self::parse_from_str(&contents, &path.display().to_string()),
        }
    }

    /// Parse TOML, falling back to JSON.
    pub fn parse_from_str(
        contents: &str,
        origin: &str,
    ) -> anyhow::Result<Self> {
        toml::from_str(contents).or_else(|toml_err| {
            serde_json::from_str(contents).map_err(|json_err| {
                anyhow!(
                    "failed to parse cob config {}: toml error: {}; json error: {}",
                    origin,
                    toml_err,
                    json_err
                )
            })
        })
    }

    pub fn parse_json(raw: &str) -> anyhow::Result<Self> {
        serde_json::from_str(raw)
            .map_err(|err| anyhow!("invalid cob config json: {err}"))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.pipeline
            .validate()
            .map_err(|err| anyhow!("invalid pipeline settings: {err}"))?;
        if self.log_filter.trim().is_empty() {
            return Err(anyhow!("log_filter must not be empty"));
        }
        Ok(())
    }

    fn find_default_file(root: &Path) -> Option<PathBuf> {
        CANDIDATES
            .iter()
            .map(|candidate| root.join(candidate))
            .find(|path| path.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let config = CobConfig::parse_from_str(
            "[pipeline]\npage_size = 250\n",
            "inline",
        )
        .unwrap();

        assert_eq!(config.pipeline.page_size, 250);
        assert_eq!(config.pipeline.max_parallel_accounts, 4);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn json_is_accepted_when_toml_fails() {
        let config = CobConfig::parse_from_str(
            r#"{"pipeline": {"step_timeout_ms": 1500}, "log_filter": "debug"}"#,
            "inline",
        )
        .unwrap();

        assert_eq!(config.pipeline.step_timeout_ms, 1500);
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn garbage_reports_both_parsers() {
        let err = CobConfig::parse_from_str("{{ nope", "inline").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("toml error"));
        assert!(message.contains("json error"));
    }

    #[test]
    fn zero_limits_fail_validation() {
        let mut config = CobConfig::default();
        config.pipeline.page_size = 0;
        assert!(config.validate().is_err());
    }
}
