//! Template content sources.
//!
//! A template identifier resolves to markdown text through a fallback chain:
//! project override directory, then the templates bundled into the binary,
//! then an optional pinned remote source with a TTL disk cache.

use crate::core::config::{RemoteTemplateConfig, TemplateSourceConfig};
use crate::core::error::AkrError;
use crate::core::schema::content_checksum;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Anything that can turn a template identifier into template text.
pub trait TemplateSource: Send + Sync {
    fn get_template(&self, identifier: &str) -> Result<String, AkrError>;

    /// Short label used in logs.
    fn name(&self) -> &'static str;
}

/// Macro to bundle template files at compile time.
///
/// Generates one constant per template and `get_bundled_template(id)`.
macro_rules! bundled_templates {
    ($($id:expr => $const_name:ident),* $(,)?) => {
        $(
            pub const $const_name: &str =
                include_str!(concat!("../../templates/", $id, ".md"));
        )*

        pub fn get_bundled_template(identifier: &str) -> Option<&'static str> {
            match identifier {
                $( $id => Some($const_name), )*
                _ => None,
            }
        }
    };
}

bundled_templates! {
    "lean_baseline_service_template" => BUNDLED_LEAN_BASELINE_SERVICE,
    "comprehensive_service_template" => BUNDLED_COMPREHENSIVE_SERVICE,
    "minimal_service_template" => BUNDLED_MINIMAL_SERVICE,
    "ui_component_template" => BUNDLED_UI_COMPONENT,
    "table_template" => BUNDLED_TABLE,
}

/// Strip an optional `.md` suffix and reject identifiers that could walk
/// out of a template directory.
pub fn normalize_identifier(identifier: &str) -> Result<&str, AkrError> {
    let id = identifier.trim();
    let id = id.strip_suffix(".md").unwrap_or(id);
    if id.is_empty() || id.contains('/') || id.contains('\\') || id.contains("..") {
        return Err(AkrError::TemplateNotFound(format!(
            "invalid template identifier: {:?}",
            identifier
        )));
    }
    Ok(id)
}

/// Templates compiled into the binary.
pub struct BundledTemplates;

impl TemplateSource for BundledTemplates {
    fn get_template(&self, identifier: &str) -> Result<String, AkrError> {
        let id = normalize_identifier(identifier)?;
        get_bundled_template(id)
            .map(str::to_string)
            .ok_or_else(|| AkrError::TemplateNotFound(id.to_string()))
    }

    fn name(&self) -> &'static str {
        "bundled"
    }
}

/// `<dir>/<identifier>.md` on the local filesystem.
pub struct OverrideDir {
    dir: PathBuf,
}

impl OverrideDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl TemplateSource for OverrideDir {
    fn get_template(&self, identifier: &str) -> Result<String, AkrError> {
        let id = normalize_identifier(identifier)?;
        let path = self.dir.join(format!("{}.md", id));
        match fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AkrError::TemplateNotFound(path.display().to_string()))
            }
            Err(e) => Err(AkrError::IoError(e)),
        }
    }

    fn name(&self) -> &'static str {
        "override"
    }
}

/// Pinned-version HTTP source with checksum verification and a TTL cache.
pub struct RemoteTemplates {
    base_url: String,
    version: String,
    ttl: Duration,
    cache_dir: PathBuf,
    checksums: std::collections::BTreeMap<String, String>,
}

impl RemoteTemplates {
    pub fn new(config: &RemoteTemplateConfig, root: &Path) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            version: config.version.clone(),
            ttl: Duration::from_secs(config.ttl_seconds),
            cache_dir: root.join(&config.cache_dir).join(&config.version),
            checksums: config.checksums.clone(),
        }
    }

    fn cache_path(&self, id: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.md", id))
    }

    fn read_fresh_cache(&self, path: &Path) -> Option<String> {
        let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
        let age = SystemTime::now().duration_since(modified).unwrap_or_default();
        if age > self.ttl {
            return None;
        }
        fs::read_to_string(path).ok()
    }

    fn verify(&self, id: &str, text: &str) -> Result<(), AkrError> {
        if let Some(expected) = self.checksums.get(id) {
            let actual = content_checksum(text);
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(AkrError::TemplateFetch(format!(
                    "TEMPLATE_CHECKSUM_MISMATCH: {} expected={} actual={}",
                    id, expected, actual
                )));
            }
        }
        Ok(())
    }

    fn fetch(&self, id: &str) -> Result<String, AkrError> {
        let url = format!("{}/{}/{}.md", self.base_url, self.version, id);
        tracing::debug!(%url, "fetching remote template");
        let mut response = ureq::get(&url).call().map_err(|e| match e {
            ureq::Error::StatusCode(404) => AkrError::TemplateNotFound(url.clone()),
            other => AkrError::TemplateFetch(format!("{}: {}", url, other)),
        })?;
        response
            .body_mut()
            .read_to_string()
            .map_err(|e| AkrError::TemplateFetch(format!("{}: {}", url, e)))
    }
}

impl TemplateSource for RemoteTemplates {
    fn get_template(&self, identifier: &str) -> Result<String, AkrError> {
        let id = normalize_identifier(identifier)?;
        let path = self.cache_path(id);

        if let Some(cached) = self.read_fresh_cache(&path)
            && self.verify(id, &cached).is_ok()
        {
            return Ok(cached);
        }

        match self.fetch(id) {
            Ok(text) => {
                self.verify(id, &text)?;
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&path, &text)?;
                Ok(text)
            }
            Err(AkrError::TemplateFetch(msg)) => {
                // Fetch failed: fall back to a stale copy that still verifies.
                let stale = fs::read_to_string(&path).ok();
                match stale {
                    Some(text) if self.verify(id, &text).is_ok() => {
                        tracing::warn!(template = id, error = %msg, "using stale cached template");
                        Ok(text)
                    }
                    _ => Err(AkrError::TemplateFetch(msg)),
                }
            }
            Err(e) => Err(e),
        }
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

/// Ordered chain of sources; the first that knows the identifier wins.
pub struct TemplateResolver {
    sources: Vec<Box<dyn TemplateSource>>,
}

impl TemplateResolver {
    pub fn new(sources: Vec<Box<dyn TemplateSource>>) -> Self {
        Self { sources }
    }

    /// Build the standard chain for a project rooted at `root`.
    pub fn from_config(config: &TemplateSourceConfig, root: &Path) -> Self {
        let mut sources: Vec<Box<dyn TemplateSource>> = Vec::new();
        if let Some(dir) = &config.override_dir {
            let dir = if dir.is_absolute() {
                dir.clone()
            } else {
                root.join(dir)
            };
            sources.push(Box::new(OverrideDir::new(dir)));
        }
        if config.bundled {
            sources.push(Box::new(BundledTemplates));
        }
        if let Some(remote) = &config.remote {
            sources.push(Box::new(RemoteTemplates::new(remote, root)));
        }
        Self::new(sources)
    }
}

impl TemplateSource for TemplateResolver {
    fn get_template(&self, identifier: &str) -> Result<String, AkrError> {
        let mut last_error: Option<AkrError> = None;
        for source in &self.sources {
            match source.get_template(identifier) {
                Ok(text) => {
                    tracing::debug!(template = identifier, source = source.name(), "template resolved");
                    return Ok(text);
                }
                Err(AkrError::TemplateNotFound(_)) => continue,
                Err(e) => {
                    tracing::warn!(template = identifier, source = source.name(), error = %e, "template source failed");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| AkrError::TemplateNotFound(identifier.to_string())))
    }

    fn name(&self) -> &'static str {
        "resolver"
    }
}
