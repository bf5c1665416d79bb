//! Documentation validation engine.
//!
//! Checks a parsed document against a template schema and produces a
//! structured verdict. Every check is independently callable; the composed
//! `validate_phase1` is a pure function of (document, schema, options), which
//! is what lets the session cache reuse results.
//!
//! # Verdict
//!
//! - **BLOCKER** violations always fail validation, whatever the tier
//! - **FIXABLE** violations can be corrected mechanically by the auto-fix engine
//! - **WARN** violations are advisory and only lower confidence
//! - The tier sets the confidence bar; it never relaxes the blocker bar

use crate::core::document::{ParsedDocument, heading_matches, split_sections};
use crate::core::schema::{REQUIRED_FRONTMATTER_KEYS, TemplateSchema};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

pub const BLOCKER_PENALTY: f64 = 0.20;
pub const MINOR_PENALTY: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Blocker,
    Fixable,
    Warn,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocker => "BLOCKER",
            Self::Fixable => "FIXABLE",
            Self::Warn => "WARN",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named completeness threshold.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum Tier {
    #[serde(rename = "TIER_1")]
    #[value(name = "TIER_1")]
    Tier1,
    #[default]
    #[serde(rename = "TIER_2")]
    #[value(name = "TIER_2")]
    Tier2,
    #[serde(rename = "TIER_3")]
    #[value(name = "TIER_3")]
    Tier3,
}

impl Tier {
    pub fn threshold(&self) -> f64 {
        match self {
            Self::Tier1 => 0.80,
            Self::Tier2 => 0.60,
            Self::Tier3 => 0.30,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tier1 => "TIER_1",
            Self::Tier2 => "TIER_2",
            Self::Tier3 => "TIER_3",
        }
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "TIER_1" | "TIER1" | "1" => Ok(Self::Tier1),
            "TIER_2" | "TIER2" | "2" => Ok(Self::Tier2),
            "TIER_3" | "TIER3" | "3" => Ok(Self::Tier3),
            other => Err(format!("unknown tier '{}': expected TIER_1|TIER_2|TIER_3", other)),
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Individual violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validator: Option<String>,
}

impl Violation {
    fn new(kind: &str, severity: Severity, validator: &str, message: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            severity,
            line: None,
            message: message.into(),
            section_name: None,
            suggestion: None,
            validator: Some(validator.to_string()),
        }
    }

    fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    fn in_section(mut self, name: &str) -> Self {
        self.section_name = Some(name.to_string());
        self
    }

    fn suggest(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn is_blocker(&self) -> bool {
        self.severity == Severity::Blocker
    }

    pub fn is_fixable(&self) -> bool {
        self.severity == Severity::Fixable
    }
}

/// Violation type tags.
pub mod kinds {
    pub const MISSING_FRONTMATTER: &str = "missing_frontmatter";
    pub const FRONTMATTER_PARSE_ERROR: &str = "frontmatter_parse_error";
    pub const MISSING_FRONTMATTER_FIELD: &str = "missing_frontmatter_field";
    pub const MISSING_SECTION: &str = "missing_section";
    pub const SECTION_ORDER: &str = "section_order";
    pub const HEADING_HIERARCHY: &str = "heading_hierarchy";
    pub const EMPTY_SECTION: &str = "empty_section";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub violations: Vec<Violation>,
    pub confidence: f64,
    pub severity_summary: BTreeMap<Severity, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrected_markdown: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_prompt: Option<String>,
}

impl ValidationResult {
    pub fn count(&self, severity: Severity) -> usize {
        self.severity_summary.get(&severity).copied().unwrap_or(0)
    }

    pub fn blockers(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.is_blocker())
    }

    pub fn has_fixable(&self) -> bool {
        self.violations.iter().any(Violation::is_fixable)
    }
}

/// Which checks run and which tier decides the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidationOptions {
    pub tier: Tier,
    pub require_yaml_frontmatter: bool,
    pub enforce_section_order: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            tier: Tier::default(),
            require_yaml_frontmatter: true,
            enforce_section_order: true,
        }
    }
}

impl ValidationOptions {
    pub fn with_tier(tier: Tier) -> Self {
        Self {
            tier,
            ..Self::default()
        }
    }
}

pub fn check_yaml_frontmatter(parsed: &ParsedDocument) -> Vec<Violation> {
    const V: &str = "yaml_frontmatter";

    if let Some(block) = &parsed.front_matter
        && let Some(err) = &block.error
    {
        return vec![
            Violation::new(
                kinds::FRONTMATTER_PARSE_ERROR,
                Severity::Blocker,
                V,
                format!("Front matter could not be parsed: {}", err),
            )
            .at_line(1)
            .suggest("Rewrite the front matter as `key: value` lines between `---` delimiters"),
        ];
    }

    if parsed.yaml_data.is_empty() {
        return vec![
            Violation::new(
                kinds::MISSING_FRONTMATTER,
                Severity::Fixable,
                V,
                "Document has no YAML front matter",
            )
            .at_line(1)
            .suggest("Add a front matter block; auto-fix can synthesise one from file metadata"),
        ];
    }

    REQUIRED_FRONTMATTER_KEYS
        .iter()
        .filter(|key| !parsed.yaml_data.contains_key(**key))
        .map(|key| {
            Violation::new(
                kinds::MISSING_FRONTMATTER_FIELD,
                Severity::Blocker,
                V,
                format!("Front matter is missing required field '{}'", key),
            )
            .at_line(1)
            .suggest(format!("Add `{}: <value>` to the front matter", key))
        })
        .collect()
}

pub fn check_required_sections(parsed: &ParsedDocument, schema: &TemplateSchema) -> Vec<Violation> {
    schema
        .required_sections
        .iter()
        .filter(|s| s.required)
        .filter(|s| !parsed.sections().any(|h| heading_matches(&h.text, &s.name)))
        .map(|s| {
            Violation::new(
                kinds::MISSING_SECTION,
                Severity::Blocker,
                "required_sections",
                format!("Required section '{}' is missing", s.name),
            )
            .in_section(&s.name)
            .suggest(format!("Add a `## {}` section", s.name))
        })
        .collect()
}

/// Canonical index of a heading text in the schema, if it is a required section.
pub fn canonical_index(schema: &TemplateSchema, heading_text: &str) -> Option<usize> {
    schema
        .required_sections
        .iter()
        .find(|s| heading_matches(heading_text, &s.name))
        .map(|s| s.order_index)
}

pub fn check_section_order(parsed: &ParsedDocument, schema: &TemplateSchema) -> Vec<Violation> {
    let mut highest: Option<(usize, &str)> = None;
    for heading in parsed.sections() {
        let Some(idx) = canonical_index(schema, &heading.text) else {
            continue;
        };
        match highest {
            Some((prev_idx, prev_name)) if idx < prev_idx => {
                return vec![
                    Violation::new(
                        kinds::SECTION_ORDER,
                        Severity::Fixable,
                        "section_order",
                        format!(
                            "Section '{}' appears after '{}' but belongs before it",
                            heading.text, prev_name
                        ),
                    )
                    .at_line(heading.line_number)
                    .in_section(&heading.text)
                    .suggest("Reorder sections to match the template; auto-fix can do this"),
                ];
            }
            Some((prev_idx, _)) if idx == prev_idx => {}
            _ => highest = Some((idx, heading.text.as_str())),
        }
    }
    Vec::new()
}

pub fn check_heading_hierarchy(parsed: &ParsedDocument) -> Vec<Violation> {
    let mut violations = Vec::new();
    let mut prev_level: Option<u8> = None;
    for heading in &parsed.headings {
        if let Some(prev) = prev_level
            && heading.level > prev + 1
        {
            violations.push(
                Violation::new(
                    kinds::HEADING_HIERARCHY,
                    Severity::Fixable,
                    "heading_hierarchy",
                    format!(
                        "Heading '{}' jumps from H{} to H{}",
                        heading.text, prev, heading.level
                    ),
                )
                .at_line(heading.line_number)
                .in_section(&heading.text)
                .suggest(format!("Use `{}` for this heading", "#".repeat(prev as usize + 1))),
            );
        }
        prev_level = Some(heading.level);
    }
    violations
}

pub fn check_section_content(parsed: &ParsedDocument, schema: &TemplateSchema) -> Vec<Violation> {
    if schema.required_sections.is_empty() {
        return Vec::new();
    }
    let split = split_sections(&parsed.raw_content);
    let mut line = parsed.front_matter_lines() + split.preamble.lines().count() + 1;
    let mut violations = Vec::new();
    for block in &split.blocks {
        let body_is_empty = block.text.lines().skip(1).all(|l| l.trim().is_empty());
        if body_is_empty && canonical_index(schema, &block.title).is_some() {
            violations.push(
                Violation::new(
                    kinds::EMPTY_SECTION,
                    Severity::Warn,
                    "section_content",
                    format!("Section '{}' has no content", block.title),
                )
                .at_line(line)
                .in_section(&block.title)
                .suggest("Fill in the section or mark unknowns explicitly"),
            );
        }
        line += block.text.lines().count();
    }
    violations
}

/// Start from 1.0, subtract per-violation penalties, clamp and round.
pub fn calculate_confidence(violations: &[Violation]) -> f64 {
    let penalty: f64 = violations
        .iter()
        .map(|v| match v.severity {
            Severity::Blocker => BLOCKER_PENALTY,
            Severity::Fixable | Severity::Warn => MINOR_PENALTY,
        })
        .sum();
    let raw = (1.0 - penalty).clamp(0.0, 1.0);
    (raw * 100.0).round() / 100.0
}

pub fn severity_summary(violations: &[Violation]) -> BTreeMap<Severity, usize> {
    let mut summary = BTreeMap::from([
        (Severity::Blocker, 0),
        (Severity::Fixable, 0),
        (Severity::Warn, 0),
    ]);
    for v in violations {
        *summary.entry(v.severity).or_insert(0) += 1;
    }
    summary
}

/// Machine-usable hint for a caller that wants to regenerate the document.
pub fn build_retry_prompt(
    violations: &[Violation],
    confidence: f64,
    tier: Tier,
    template_name: &str,
) -> String {
    let mut prompt = format!(
        "The document does not pass {} enforcement for template '{}' (confidence {:.2}, required {:.2}).\nResolve the following before retrying:\n",
        tier,
        template_name,
        confidence,
        tier.threshold()
    );
    let mut ordered: Vec<&Violation> = violations.iter().collect();
    ordered.sort_by_key(|v| v.severity);
    for v in ordered {
        prompt.push_str(&format!("- [{}] {}", v.severity, v.message));
        if let Some(s) = &v.suggestion {
            prompt.push_str(&format!(" -> {}", s));
        }
        prompt.push('\n');
    }
    prompt
}

pub fn validate_phase1(
    parsed: &ParsedDocument,
    schema: &TemplateSchema,
    options: &ValidationOptions,
) -> ValidationResult {
    let mut violations = Vec::new();
    if options.require_yaml_frontmatter {
        violations.extend(check_yaml_frontmatter(parsed));
    }
    violations.extend(check_required_sections(parsed, schema));
    if options.enforce_section_order {
        violations.extend(check_section_order(parsed, schema));
    }
    violations.extend(check_heading_hierarchy(parsed));
    violations.extend(check_section_content(parsed, schema));

    let confidence = calculate_confidence(&violations);
    let has_blocker = violations.iter().any(Violation::is_blocker);
    let valid = !has_blocker && confidence >= options.tier.threshold();
    let retry_prompt = (!valid).then(|| {
        build_retry_prompt(&violations, confidence, options.tier, &schema.template_name)
    });

    ValidationResult {
        valid,
        severity_summary: severity_summary(&violations),
        violations,
        confidence,
        corrected_markdown: None,
        retry_prompt,
    }
}
