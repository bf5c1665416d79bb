//! Auto-fix engine.
//!
//! Applies mechanical corrections for FIXABLE violations and reports every
//! applied fix plus a unified diff. Fixes only add or move text; every
//! non-whitespace token of the input survives into the output.

use crate::core::document::{FRONTMATTER_DELIM, parse, split_sections};
use crate::core::schema::{BaselineTemplate, REQUIRED_FRONTMATTER_KEYS, TemplateSchema};
use crate::core::time;
use crate::core::validate::{Violation, canonical_index, kinds};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use similar::TextDiff;
use std::path::Path;

pub const FIX_YAML_FRONTMATTER: &str = "yaml_frontmatter";
pub const FIX_SECTION_ORDER: &str = "section_order";
pub const FIX_HEADING_HIERARCHY: &str = "heading_hierarchy";

const UNKNOWN: &str = "TBD";

/// Facts about the documented component, supplied by an upstream analyzer
/// or defaulted from paths. Used only as auto-fix input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileMetadata {
    pub file_path: String,
    pub component_name: String,
    pub feature_tag: Option<String>,
    pub domain: Option<String>,
    pub module_name: Option<String>,
    pub complexity: Option<serde_json::Value>,
}

impl FileMetadata {
    /// Metadata derived from the source file (preferred) or the document
    /// path: the component name is the file stem.
    pub fn from_paths(doc_path: &str, source_file: Option<&str>) -> Self {
        let origin = source_file.unwrap_or(doc_path);
        let component_name = Path::new(origin)
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.split('.').next().unwrap_or(s).to_string())
            .unwrap_or_default();
        Self {
            file_path: origin.to_string(),
            component_name,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutoFixOptions {
    /// Rewrite skipped heading levels instead of only reporting them.
    pub fix_heading_levels: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AutoFixOutcome {
    pub corrected_content: String,
    pub applied: Vec<String>,
    pub diff: String,
}

impl AutoFixOutcome {
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }
}

fn text_or_unknown(value: Option<&str>) -> Value {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => Value::String(v.to_string()),
        None => Value::String(UNKNOWN.to_string()),
    }
}

/// Front-matter mapping for a document with none, in canonical key order.
pub fn synthesize_front_matter(metadata: &FileMetadata, schema: &TemplateSchema) -> Mapping {
    let baseline = BaselineTemplate::lookup(&schema.template_name);
    let mut m = Mapping::new();
    for key in REQUIRED_FRONTMATTER_KEYS {
        let value = match *key {
            "feature" => text_or_unknown(metadata.feature_tag.as_deref()),
            "domain" => text_or_unknown(metadata.domain.as_deref()),
            "layer" => text_or_unknown(baseline.map(|b| b.default_layer())),
            "component" => text_or_unknown(Some(metadata.component_name.as_str())),
            "status" => Value::String("draft".to_string()),
            "version" => Value::String("1.0".to_string()),
            "componentType" => text_or_unknown(baseline.map(|b| b.default_component_type())),
            "priority" => text_or_unknown(None),
            "lastUpdated" => Value::String(time::today()),
            _ => text_or_unknown(None),
        };
        m.insert(Value::String((*key).to_string()), value);
    }
    if let Some(module) = metadata.module_name.as_deref().filter(|m| !m.is_empty()) {
        m.insert(
            Value::String("module".to_string()),
            Value::String(module.to_string()),
        );
    }
    m
}

fn render_mapping(mapping: &Mapping) -> String {
    serde_yaml::to_string(&Value::Mapping(mapping.clone())).unwrap_or_default()
}

pub fn render_front_matter(mapping: &Mapping) -> String {
    format!("{d}\n{body}{d}\n", d = FRONTMATTER_DELIM, body = render_mapping(mapping))
}

fn fix_front_matter(content: &str, metadata: &FileMetadata, schema: &TemplateSchema) -> String {
    let mapping = synthesize_front_matter(metadata, schema);
    let parsed = parse(content);
    let Some(fm) = parsed.front_matter.as_ref().filter(|fm| fm.error.is_none()) else {
        return format!("{}{}", render_front_matter(&mapping), content);
    };

    // A block with no keys is completed where it stands. Its existing lines
    // stay, commented out when they are not comments already.
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let mut out = format!("{}\n", FRONTMATTER_DELIM);
    for line in &lines[1..fm.closing_line - 1] {
        let trimmed = line.trim();
        if !trimmed.is_empty() && !trimmed.starts_with('#') {
            out.push_str("# ");
        }
        out.push_str(line);
        if !out.ends_with('\n') {
            out.push('\n');
        }
    }
    out.push_str(&render_mapping(&mapping));
    out.push_str(FRONTMATTER_DELIM);
    out.push('\n');
    out.push_str(&lines[fm.closing_line..].concat());
    out
}

/// Reorder required level-2 sections into canonical order. Sections the
/// schema does not name keep their slot; block bytes are not altered.
pub fn reorder_sections(content: &str, schema: &TemplateSchema) -> String {
    let mut split = split_sections(content);
    let slots: Vec<usize> = split
        .blocks
        .iter()
        .enumerate()
        .filter(|(_, b)| canonical_index(schema, &b.title).is_some())
        .map(|(i, _)| i)
        .collect();

    let mut required: Vec<_> = slots.iter().map(|&i| split.blocks[i].clone()).collect();
    required.sort_by_key(|b| canonical_index(schema, &b.title));

    let had_final_newline = content.ends_with('\n');
    for (slot, mut block) in slots.into_iter().zip(required) {
        if !block.text.ends_with('\n') {
            block.text.push('\n');
        }
        split.blocks[slot] = block;
    }

    let mut out = split.join();
    if !had_final_newline && out.ends_with('\n') {
        out.pop();
    }
    out
}

/// Lower every heading that skips a level to one below its predecessor.
pub fn fix_heading_levels(content: &str) -> String {
    let parsed = parse(content);
    let mut new_levels = std::collections::BTreeMap::new();
    let mut prev: Option<u8> = None;
    for h in &parsed.headings {
        let level = match prev {
            Some(p) if h.level > p + 1 => p + 1,
            _ => h.level,
        };
        if level != h.level {
            new_levels.insert(h.line_number, level);
        }
        prev = Some(level);
    }

    content
        .split_inclusive('\n')
        .enumerate()
        .map(|(idx, line)| match new_levels.get(&(idx + 1)) {
            Some(&level) => {
                let rest = line.trim_start_matches('#');
                format!("{}{}", "#".repeat(level as usize), rest)
            }
            None => line.to_string(),
        })
        .collect()
}

pub fn unified_diff(original: &str, corrected: &str) -> String {
    if original == corrected {
        return String::new();
    }
    TextDiff::from_lines(original, corrected)
        .unified_diff()
        .context_radius(3)
        .header("original", "corrected")
        .to_string()
}

/// Apply fixes for the FIXABLE violations in `violations`.
pub fn auto_fix(
    document: &str,
    violations: &[Violation],
    metadata: &FileMetadata,
    schema: &TemplateSchema,
    options: &AutoFixOptions,
) -> AutoFixOutcome {
    let wants = |kind: &str| violations.iter().any(|v| v.is_fixable() && v.kind == kind);
    let mut content = document.to_string();
    let mut applied = Vec::new();

    if wants(kinds::MISSING_FRONTMATTER) {
        content = fix_front_matter(&content, metadata, schema);
        applied.push(FIX_YAML_FRONTMATTER.to_string());
    }

    if wants(kinds::SECTION_ORDER) {
        let reordered = reorder_sections(&content, schema);
        if reordered != content {
            content = reordered;
            applied.push(FIX_SECTION_ORDER.to_string());
        }
    }

    if options.fix_heading_levels && wants(kinds::HEADING_HIERARCHY) {
        let leveled = fix_heading_levels(&content);
        if leveled != content {
            content = leveled;
            applied.push(FIX_HEADING_HIERARCHY.to_string());
        }
    }

    if !applied.is_empty() {
        tracing::info!(fixes = ?applied, template = %schema.template_name, "auto-fix applied");
    }

    AutoFixOutcome {
        diff: unified_diff(document, &content),
        corrected_content: content,
        applied,
    }
}
