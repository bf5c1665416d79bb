//! Write gate: the enforcement orchestrator.
//!
//! Every write and update passes the same sequence: permission, path,
//! enforcement switch, header normalisation, schema resolution, validation,
//! auto-fix and re-validation, provenance, then either a preview (dry-run)
//! or a serialised write-and-commit. Failures come back as a `WriteResult`
//! with `success: false`; nothing here panics or raises past the caller.

use crate::core::autofix::{self, AutoFixOptions, FileMetadata};
use crate::core::cache::{CacheStats, SessionCache};
use crate::core::config::{AkrConfig, WriteMode};
use crate::core::document::{parse, replace_section};
use crate::core::error::{AkrError, ErrorKind};
use crate::core::paths::{self, TargetPath};
use crate::core::provenance;
use crate::core::schema::{SchemaRegistry, TemplateSchema};
use crate::core::templates::{TemplateResolver, TemplateSource};
use crate::core::time::{self, Clock};
use crate::core::validate::{Severity, Tier, ValidationResult, Violation, validate_phase1};
use crate::core::vcs::{GitCli, VersionControl};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteRequest {
    pub doc_path: String,
    pub content: String,
    pub template: String,
    #[serde(default)]
    pub mode: Option<WriteMode>,
    #[serde(default)]
    pub allow_writes: bool,
    #[serde(default)]
    pub source_file: Option<String>,
    #[serde(default)]
    pub metadata: Option<FileMetadata>,
    #[serde(default)]
    pub tier: Option<Tier>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionUpdate {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub doc_path: String,
    pub template: String,
    pub sections: Vec<SectionUpdate>,
    #[serde(default)]
    pub mode: Option<WriteMode>,
    #[serde(default)]
    pub allow_writes: bool,
    #[serde(default)]
    pub source_file: Option<String>,
    #[serde(default)]
    pub tier: Option<Tier>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    pub content: String,
    pub template: String,
    #[serde(default)]
    pub tier: Option<Tier>,
    #[serde(default)]
    pub auto_fix: bool,
    #[serde(default)]
    pub metadata: Option<FileMetadata>,
}

/// Validation verdict plus what auto-fix did to reach it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnforcementReport {
    pub template: String,
    pub tier: Tier,
    pub valid: bool,
    pub confidence: f64,
    pub violations: Vec<Violation>,
    pub severity_summary: BTreeMap<Severity, usize>,
    pub auto_fixed: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrected_markdown: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub diff: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_prompt: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResult {
    pub success: bool,
    pub file_path: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub mode: WriteMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorKind>,
    pub message: String,
    pub violations: Vec<Violation>,
    pub auto_fixed: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    pub committed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_prompt: Option<String>,
}

impl WriteResult {
    fn new(file_path: &str, mode: WriteMode) -> Self {
        Self {
            success: false,
            file_path: file_path.to_string(),
            errors: Vec::new(),
            warnings: Vec::new(),
            mode,
            error_type: None,
            message: String::new(),
            violations: Vec::new(),
            auto_fixed: Vec::new(),
            preview: None,
            diff: None,
            committed: false,
            commit_id: None,
            branch: None,
            confidence: None,
            retry_prompt: None,
        }
    }

    fn fail(mut self, kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::warn!(error_type = %kind, path = %self.file_path, "{}", message);
        self.success = false;
        self.error_type = Some(kind);
        self.errors.push(format!("{}: {}", kind, message));
        self.message = message;
        self
    }

    fn fail_with(self, err: &AkrError) -> Self {
        self.fail(err.kind(), err.to_string())
    }

    fn succeed(mut self, message: impl Into<String>) -> Self {
        self.success = true;
        self.message = message.into();
        self
    }
}

/// Outcome of validation plus optional auto-fix over one document.
struct Enforcement {
    content: String,
    result: ValidationResult,
    auto_fixed: Vec<String>,
    diff: String,
    warnings: Vec<String>,
}

/// Per-request inputs shared by writes and updates once the content is known.
struct GateInput<'a> {
    target: TargetPath,
    content: String,
    template: &'a str,
    tier: Option<Tier>,
    metadata: FileMetadata,
    source: Option<&'a str>,
    previous: Option<Vec<u8>>,
}

pub struct DocumentationService {
    repo_root: PathBuf,
    config: AkrConfig,
    writes_enabled: bool,
    registry: SchemaRegistry,
    cache: SessionCache,
    templates: Box<dyn TemplateSource>,
    vcs: Box<dyn VersionControl>,
    path_locks: Mutex<FxHashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl DocumentationService {
    pub fn new(repo_root: impl Into<PathBuf>, config: AkrConfig) -> Self {
        let repo_root = repo_root.into();
        let templates = TemplateResolver::from_config(&config.templates, &repo_root);
        let vcs = GitCli::with_identity(
            config.writes.commit_author_name.clone(),
            config.writes.commit_author_email.clone(),
        );
        Self {
            writes_enabled: config.writes.allow_writes,
            registry: SchemaRegistry::new(),
            cache: SessionCache::new(&config.cache),
            templates: Box::new(templates),
            vcs: Box::new(vcs),
            path_locks: Mutex::new(FxHashMap::default()),
            repo_root,
            config,
        }
    }

    /// Override the process-wide write switch. Only meaningful at construction.
    pub fn with_writes_enabled(mut self, enabled: bool) -> Self {
        self.writes_enabled = enabled;
        self
    }

    pub fn with_template_source(mut self, source: Box<dyn TemplateSource>) -> Self {
        self.templates = source;
        self
    }

    pub fn with_vcs(mut self, vcs: Box<dyn VersionControl>) -> Self {
        self.vcs = vcs;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.cache = SessionCache::with_clock(&self.config.cache, clock);
        self
    }

    pub fn config(&self) -> &AkrConfig {
        &self.config
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn writes_enabled(&self) -> bool {
        self.writes_enabled
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.get_stats()
    }

    /// Tear down session state and report final cache statistics.
    pub fn shutdown(self) -> CacheStats {
        let stats = self.cache.get_stats();
        self.cache.clear();
        tracing::debug!(hits = stats.hits, misses = stats.misses, "documentation service shut down");
        stats
    }

    /// Run `f` holding the lock for `path`. The entry is dropped from the
    /// map once no other caller holds or waits on it.
    fn with_path_lock<T>(&self, path: &Path, f: impl FnOnce() -> T) -> T {
        let lock = {
            let mut locks = self.path_locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(path.to_path_buf()).or_default().clone()
        };
        let out = {
            let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
            f()
        };
        let mut locks = self.path_locks.lock().unwrap_or_else(|e| e.into_inner());
        drop(lock);
        if locks.get(path).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(path);
        }
        out
    }

    /// Schema for `template`: session cache, then template source, then
    /// registry. A template no source knows is validated leniently.
    pub fn resolve_schema(&self, template: &str) -> Result<(TemplateSchema, Vec<String>), AkrError> {
        let caching = self.config.cache.enabled;
        if caching && let Some(schema) = self.cache.get_schema(template) {
            return Ok((schema, Vec::new()));
        }

        let mut warnings = Vec::new();
        let schema = match self.templates.get_template(template) {
            Ok(text) => self.registry.build_schema(template, &text),
            Err(AkrError::TemplateNotFound(detail)) => {
                warnings.push(format!(
                    "TEMPLATE_NOT_FOUND: {} ({}); required sections come from the baseline registry only",
                    template, detail
                ));
                self.registry.build_schema(template, "")
            }
            Err(e) => return Err(e),
        };
        if schema.required_sections.is_empty() {
            tracing::warn!(template, "template has no baseline sections; section checks skipped");
        }
        if caching {
            self.cache.cache_schema(&schema, None);
        }
        Ok((schema, warnings))
    }

    fn validate_cached(
        &self,
        content: &str,
        schema: &TemplateSchema,
        tier: Option<Tier>,
    ) -> ValidationResult {
        let options = self.config.enforcement.validation_options(tier);
        let caching = self.config.cache.enabled;
        if caching
            && let Some(hit) =
                self.cache
                    .get_enforcement_result(content, &schema.template_name, options.tier)
        {
            return hit;
        }
        let result = validate_phase1(&parse(content), schema, &options);
        tracing::debug!(
            template = %schema.template_name,
            valid = result.valid,
            confidence = result.confidence,
            violations = result.violations.len(),
            "validation verdict"
        );
        if caching {
            self.cache.cache_enforcement_result(
                content,
                &schema.template_name,
                options.tier,
                &result,
                None,
            );
        }
        result
    }

    fn enforce(
        &self,
        content: &str,
        template: &str,
        tier: Option<Tier>,
        metadata: &FileMetadata,
        auto_fix: bool,
    ) -> Result<Enforcement, AkrError> {
        let (schema, warnings) = self.resolve_schema(template)?;
        let result = self.validate_cached(content, &schema, tier);

        if !(auto_fix && result.has_fixable()) {
            return Ok(Enforcement {
                content: content.to_string(),
                result,
                auto_fixed: Vec::new(),
                diff: String::new(),
                warnings,
            });
        }

        let options = AutoFixOptions {
            fix_heading_levels: self.config.enforcement.auto_fix_heading_levels,
        };
        let outcome = autofix::auto_fix(content, &result.violations, metadata, &schema, &options);
        if !outcome.changed() {
            return Ok(Enforcement {
                content: content.to_string(),
                result,
                auto_fixed: Vec::new(),
                diff: String::new(),
                warnings,
            });
        }

        let mut result = self.validate_cached(&outcome.corrected_content, &schema, tier);
        result.corrected_markdown = Some(outcome.corrected_content.clone());
        Ok(Enforcement {
            content: outcome.corrected_content,
            result,
            auto_fixed: outcome.applied,
            diff: outcome.diff,
            warnings,
        })
    }

    /// Validate content without touching the filesystem.
    pub fn validate_document(&self, request: &ValidateRequest) -> Result<EnforcementReport, AkrError> {
        let tier = request
            .tier
            .unwrap_or(self.config.enforcement.validation_strictness);
        let metadata = request.metadata.clone().unwrap_or_default();
        let enforcement = self.enforce(
            &request.content,
            &request.template,
            Some(tier),
            &metadata,
            request.auto_fix,
        )?;
        let result = enforcement.result;
        Ok(EnforcementReport {
            template: request.template.clone(),
            tier,
            valid: result.valid,
            confidence: result.confidence,
            violations: result.violations,
            severity_summary: result.severity_summary,
            auto_fixed: enforcement.auto_fixed,
            corrected_markdown: result.corrected_markdown,
            diff: enforcement.diff,
            retry_prompt: result.retry_prompt,
            warnings: enforcement.warnings,
        })
    }

    fn check_permission(&self, allow_writes: bool) -> Result<(), AkrError> {
        match (allow_writes, self.writes_enabled) {
            (true, true) => Ok(()),
            (false, _) => Err(AkrError::PermissionDenied(
                "request does not set allowWrites".to_string(),
            )),
            (true, false) => Err(AkrError::PermissionDenied(
                "writes are disabled for this process (writes.allowWrites / AKR_ALLOW_WRITES)"
                    .to_string(),
            )),
        }
    }

    pub fn write_documentation(&self, request: &WriteRequest) -> WriteResult {
        let mode = request.mode.unwrap_or(self.config.writes.default_mode);
        let result = WriteResult::new(&request.doc_path, mode);

        if let Err(e) = self.check_permission(request.allow_writes) {
            return result.fail_with(&e);
        }
        let target = match paths::resolve_target(&self.repo_root, &request.doc_path) {
            Ok(t) => t,
            Err(e) => return result.fail_with(&e),
        };

        let key = target.absolute.clone();
        self.with_path_lock(&key, || {
            let previous = match fs::read(&target.absolute) {
                Ok(bytes) => Some(bytes),
                Err(e) if e.kind() == io::ErrorKind::NotFound => None,
                Err(e) => return result.fail_with(&AkrError::IoError(e)),
            };
            let metadata = request.metadata.clone().unwrap_or_else(|| {
                FileMetadata::from_paths(&request.doc_path, request.source_file.as_deref())
            });

            self.run_gate(
                result,
                GateInput {
                    target,
                    content: request.content.clone(),
                    template: &request.template,
                    tier: request.tier,
                    metadata,
                    source: request.source_file.as_deref(),
                    previous,
                },
            )
        })
    }

    pub fn update_documentation(&self, request: &UpdateRequest) -> WriteResult {
        let mode = request.mode.unwrap_or(self.config.writes.default_mode);
        let result = WriteResult::new(&request.doc_path, mode);

        if let Err(e) = self.check_permission(request.allow_writes) {
            return result.fail_with(&e);
        }
        let target = match paths::resolve_target(&self.repo_root, &request.doc_path) {
            Ok(t) => t,
            Err(e) => return result.fail_with(&e),
        };
        if request.sections.is_empty() {
            return result.fail_with(&AkrError::WorkflowViolation(
                "update names no sections".to_string(),
            ));
        }

        let key = target.absolute.clone();
        self.with_path_lock(&key, || {
            let previous = match fs::read(&target.absolute) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return result.fail_with(&AkrError::WorkflowViolation(format!(
                        "{} does not exist; write the document before updating it",
                        request.doc_path
                    )));
                }
                Err(e) => return result.fail_with(&AkrError::IoError(e)),
            };

            let mut content = String::from_utf8_lossy(&previous).into_owned();
            for section in &request.sections {
                content = replace_section(&content, &section.name, &section.content);
            }
            let content = provenance::refresh_last_updated(&content, &time::today());
            let metadata =
                FileMetadata::from_paths(&request.doc_path, request.source_file.as_deref());

            self.run_gate(
                result,
                GateInput {
                    target,
                    content,
                    template: &request.template,
                    tier: request.tier,
                    metadata,
                    source: request.source_file.as_deref(),
                    previous: Some(previous),
                },
            )
        })
    }

    /// Steps shared by write and update once permission and path are settled.
    /// The caller holds the per-path lock.
    fn run_gate(&self, mut result: WriteResult, input: GateInput<'_>) -> WriteResult {
        let content = provenance::normalize_header_order(&input.content);

        if !self.config.enforcement.enabled {
            result.warnings.push(format!(
                "{}: enforcement is disabled; content passed through unvalidated",
                ErrorKind::ConfigDisabled
            ));
            return self.finish(result, &input, content);
        }

        let enforcement = match self.enforce(
            &content,
            input.template,
            input.tier,
            &input.metadata,
            self.config.enforcement.auto_fix_enabled,
        ) {
            Ok(e) => e,
            Err(e) => return result.fail_with(&e),
        };

        result.warnings.extend(enforcement.warnings);
        result.auto_fixed = enforcement.auto_fixed;
        result.confidence = Some(enforcement.result.confidence);
        result.violations = enforcement.result.violations.clone();
        if !enforcement.diff.is_empty() {
            result.diff = Some(enforcement.diff.clone());
        }

        if !enforcement.result.valid {
            let tier = input
                .tier
                .unwrap_or(self.config.enforcement.validation_strictness);
            result.retry_prompt = enforcement.result.retry_prompt.clone();
            let message = format!(
                "document failed {} enforcement: {} blocker(s), confidence {:.2} (required {:.2})",
                tier,
                enforcement.result.count(Severity::Blocker),
                enforcement.result.confidence,
                tier.threshold()
            );
            return result.fail(ErrorKind::EnforcementFailed, message);
        }

        let final_content = if self.config.writes.provenance_header {
            let header = provenance::provenance_header(
                input.source.unwrap_or(input.metadata.file_path.as_str()),
                input.template,
                &time::now_rfc3339(),
            );
            provenance::inject(&enforcement.content, &header)
        } else {
            enforcement.content
        };
        self.finish(result, &input, final_content)
    }

    fn finish(&self, mut result: WriteResult, input: &GateInput<'_>, final_content: String) -> WriteResult {
        let baseline = match &input.previous {
            Some(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            None => input.content.clone(),
        };
        let diff = autofix::unified_diff(&baseline, &final_content);
        if !diff.is_empty() {
            result.diff = Some(diff);
        }

        if !result.mode.persists() {
            result.preview = Some(final_content);
            return result.succeed("dry run: no files were modified");
        }
        self.persist(result, input, &final_content)
    }

    fn persist(&self, mut result: WriteResult, input: &GateInput<'_>, content: &str) -> WriteResult {
        let target = &input.target;

        if result.mode == WriteMode::FeatureBranch {
            let component = parse(content)
                .yaml_str("component")
                .unwrap_or_else(|| input.metadata.component_name.clone());
            let branch = format!(
                "{}{}",
                self.config.writes.feature_branch_prefix,
                branch_slug(&component)
            );
            if let Err(e) = self.vcs.ensure_branch(&self.repo_root, &branch) {
                return result.fail(ErrorKind::CommitFailed, e.to_string());
            }
            result.branch = Some(branch);
        }

        if let Err(e) = write_file(&target.absolute, content) {
            return result.fail(ErrorKind::WriteFailed, e.to_string());
        }
        tracing::info!(path = %target.relative.display(), mode = result.mode.as_str(), "document written");

        let message = commit_message(
            &self.config.writes.commit_message_prefix,
            &target.relative,
            input.previous.is_some(),
            &result.auto_fixed,
        );
        match self
            .vcs
            .stage_and_commit(&self.repo_root, std::slice::from_ref(&target.relative), &message)
        {
            Ok(sha) => {
                result.committed = true;
                result.commit_id = Some(sha);
                result.succeed(format!("{} committed", target.relative.display()))
            }
            Err(e) => {
                let restored = rollback(&target.absolute, input.previous.as_deref());
                match restored {
                    Ok(()) => tracing::warn!(path = %target.relative.display(), "commit failed; write rolled back"),
                    Err(re) => result
                        .errors
                        .push(format!("{}: rollback failed: {}", ErrorKind::WriteFailed, re)),
                }
                result.fail(
                    ErrorKind::CommitFailed,
                    format!("{}; the file was restored to its previous state", e),
                )
            }
        }
    }
}

fn write_file(path: &Path, content: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)
}

fn rollback(path: &Path, previous: Option<&[u8]>) -> io::Result<()> {
    match previous {
        Some(bytes) => fs::write(path, bytes),
        None => match fs::remove_file(path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        },
    }
}

/// Branch-safe form of a component name: lowercase ASCII alphanumerics
/// separated by single dashes.
pub fn branch_slug(component: &str) -> String {
    let mut slug = String::with_capacity(component.len());
    for c in component.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "document".to_string()
    } else {
        slug
    }
}

pub fn commit_message(prefix: &str, path: &Path, existed: bool, auto_fixed: &[String]) -> String {
    let verb = if existed { "update" } else { "add" };
    let mut message = format!("{}: {} {}", prefix, verb, path.display());
    if !auto_fixed.is_empty() {
        message.push_str(&format!(" [auto-fixed: {}]", auto_fixed.join(", ")));
    }
    message
}
