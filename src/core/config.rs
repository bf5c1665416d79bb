//! Typed configuration.
//!
//! Loaded from `.akr/config.toml` (or `.json`) under the repository, or an
//! explicit path. A missing file means defaults; a present file must carry
//! the `[enforcement]` table with `enabled` and `validationStrictness`.

use crate::core::error::AkrError;
use crate::core::validate::{Tier, ValidationOptions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_REL_PATH: &str = ".akr/config.toml";
pub const CONFIG_JSON_REL_PATH: &str = ".akr/config.json";

/// Persist-or-preview mode requested for a write.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum WriteMode {
    #[default]
    DryRun,
    FeatureBranch,
    DirectCommit,
}

impl WriteMode {
    pub fn persists(&self) -> bool {
        !matches!(self, WriteMode::DryRun)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMode::DryRun => "dry-run",
            WriteMode::FeatureBranch => "feature-branch",
            WriteMode::DirectCommit => "direct-commit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnforcementConfig {
    pub enabled: bool,
    pub validation_strictness: Tier,
    #[serde(default = "default_true")]
    pub require_yaml_frontmatter: bool,
    #[serde(default = "default_true")]
    pub enforce_section_order: bool,
    #[serde(default = "default_true")]
    pub auto_fix_enabled: bool,
    #[serde(default)]
    pub auto_fix_heading_levels: bool,
}

impl Default for EnforcementConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            validation_strictness: Tier::Tier2,
            require_yaml_frontmatter: true,
            enforce_section_order: true,
            auto_fix_enabled: true,
            auto_fix_heading_levels: false,
        }
    }
}

impl EnforcementConfig {
    pub fn validation_options(&self, tier: Option<Tier>) -> ValidationOptions {
        ValidationOptions {
            tier: tier.unwrap_or(self.validation_strictness),
            require_yaml_frontmatter: self.require_yaml_frontmatter,
            enforce_section_order: self.enforce_section_order,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WriteConfig {
    /// Process-wide write enablement. Read once at startup.
    pub allow_writes: bool,
    pub default_mode: WriteMode,
    pub feature_branch_prefix: String,
    pub provenance_header: bool,
    pub commit_message_prefix: String,
    pub commit_author_name: Option<String>,
    pub commit_author_email: Option<String>,
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            allow_writes: false,
            default_mode: WriteMode::DryRun,
            feature_branch_prefix: "docs/".to_string(),
            provenance_header: true,
            commit_message_prefix: "docs".to_string(),
            commit_author_name: None,
            commit_author_email: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_seconds: u64,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 1800,
            max_entries: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTemplateConfig {
    pub base_url: String,
    pub version: String,
    #[serde(default = "default_remote_ttl")]
    pub ttl_seconds: u64,
    #[serde(default = "default_remote_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default)]
    pub checksums: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemplateSourceConfig {
    pub override_dir: Option<PathBuf>,
    pub bundled: bool,
    pub remote: Option<RemoteTemplateConfig>,
}

impl Default for TemplateSourceConfig {
    fn default() -> Self {
        Self {
            override_dir: Some(PathBuf::from(".akr/templates")),
            bundled: true,
            remote: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AkrConfig {
    pub enforcement: EnforcementConfig,
    #[serde(default)]
    pub writes: WriteConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub templates: TemplateSourceConfig,
}

fn default_true() -> bool {
    true
}

fn default_remote_ttl() -> u64 {
    86_400
}

fn default_remote_cache_dir() -> PathBuf {
    PathBuf::from(".akr/cache/templates")
}

impl AkrConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, AkrError> {
        let parsed: AkrConfig = toml::from_str(raw)
            .map_err(|e| AkrError::Config(format!("CONFIG_INVALID: {}", e)))?;
        parsed.check()?;
        Ok(parsed)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, AkrError> {
        let parsed: AkrConfig = serde_json::from_str(raw)
            .map_err(|e| AkrError::Config(format!("CONFIG_INVALID: {}", e)))?;
        parsed.check()?;
        Ok(parsed)
    }

    /// Load an explicit config file, dispatching on its extension.
    pub fn load_file(path: &Path) -> Result<Self, AkrError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AkrError::Config(format!("CONFIG_UNREADABLE: {}: {}", path.display(), e))
        })?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&raw),
            _ => Self::from_toml_str(&raw),
        }?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    fn candidates(repo_root: &Path) -> Vec<PathBuf> {
        vec![
            repo_root.join(CONFIG_REL_PATH),
            repo_root.join(CONFIG_JSON_REL_PATH),
        ]
    }

    /// Explicit path if given, else the first project config found, else defaults.
    pub fn resolve(explicit: Option<&Path>, repo_root: &Path) -> Result<Self, AkrError> {
        if let Some(path) = explicit {
            return Self::load_file(path);
        }
        match Self::candidates(repo_root).into_iter().find(|p| p.exists()) {
            Some(path) => Self::load_file(&path),
            None => Ok(Self::default()),
        }
    }

    fn check(&self) -> Result<(), AkrError> {
        if self.cache.max_entries == 0 {
            return Err(AkrError::Config(
                "CONFIG_INVALID: cache.maxEntries must be at least 1".to_string(),
            ));
        }
        if self.writes.feature_branch_prefix.contains(char::is_whitespace) {
            return Err(AkrError::Config(format!(
                "CONFIG_INVALID: writes.featureBranchPrefix contains whitespace: {:?}",
                self.writes.feature_branch_prefix
            )));
        }
        if let Some(remote) = &self.templates.remote
            && (remote.base_url.is_empty() || remote.version.is_empty())
        {
            return Err(AkrError::Config(
                "CONFIG_INVALID: templates.remote requires baseUrl and version".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_fills_defaults() {
        let cfg = AkrConfig::from_toml_str(
            "[enforcement]\nenabled = true\nvalidationStrictness = \"TIER_1\"\n",
        )
        .unwrap();
        assert_eq!(cfg.enforcement.validation_strictness, Tier::Tier1);
        assert!(cfg.enforcement.auto_fix_enabled);
        assert_eq!(cfg.cache.ttl_seconds, 1800);
        assert_eq!(cfg.writes.default_mode, WriteMode::DryRun);
    }

    #[test]
    fn missing_required_key_fails_fast() {
        let err = AkrConfig::from_toml_str("[enforcement]\nenabled = true\n").unwrap_err();
        assert!(err.to_string().contains("validationStrictness"), "{}", err);
        assert!(AkrConfig::from_toml_str("[cache]\nenabled = false\n").is_err());
    }

    #[test]
    fn json_config_is_accepted() {
        let cfg = AkrConfig::from_json_str(
            r#"{"enforcement":{"enabled":false,"validationStrictness":"TIER_3","autoFixEnabled":false},"writes":{"defaultMode":"direct-commit"}}"#,
        )
        .unwrap();
        assert!(!cfg.enforcement.enabled);
        assert!(!cfg.enforcement.auto_fix_enabled);
        assert_eq!(cfg.writes.default_mode, WriteMode::DirectCommit);
    }
}
