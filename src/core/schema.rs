//! Template schema registry.
//!
//! Required sections come from a hand-curated baseline per known template,
//! not from the template's own headings. Compiled schemas are cached by
//! template name and content checksum.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Mutex;

/// Schema-side descriptor of one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub heading_level: u8,
    pub required: bool,
    pub order_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSchema {
    pub template_name: String,
    pub checksum: String,
    pub required_sections: Vec<Section>,
    pub heading_rules: BTreeMap<String, serde_json::Value>,
    pub format_rules: BTreeMap<String, serde_json::Value>,
}

/// Front-matter keys every document must carry.
pub const REQUIRED_FRONTMATTER_KEYS: &[&str] = &[
    "feature",
    "domain",
    "layer",
    "component",
    "status",
    "version",
    "componentType",
    "priority",
    "lastUpdated",
];

/// Templates with a curated baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineTemplate {
    LeanBaselineService,
    ComprehensiveService,
    MinimalService,
    UiComponent,
    Table,
}

const LEAN_SERVICE_SECTIONS: &[&str] = &[
    "Quick Reference",
    "What & Why",
    "How It Works",
    "Business Rules",
    "Architecture",
    "Data Operations",
    "Dependencies",
    "API Contract",
    "Questions & Gaps",
];

const COMPREHENSIVE_SERVICE_SECTIONS: &[&str] = &[
    "Quick Reference",
    "What & Why",
    "How It Works",
    "Business Rules",
    "Architecture",
    "Data Operations",
    "Dependencies",
    "API Contract",
    "Failure Modes",
    "Security",
    "Performance",
    "Testing",
    "Questions & Gaps",
    "Change History",
];

const MINIMAL_SERVICE_SECTIONS: &[&str] = &[
    "Quick Reference",
    "What & Why",
    "How It Works",
    "Questions & Gaps",
];

const UI_COMPONENT_SECTIONS: &[&str] = &[
    "Quick Reference",
    "What & Why",
    "Props",
    "State Management",
    "Events",
    "Styling",
    "Accessibility",
    "Dependencies",
    "Questions & Gaps",
];

const TABLE_SECTIONS: &[&str] = &[
    "Quick Reference",
    "Purpose",
    "Columns",
    "Relationships",
    "Indexes",
    "Constraints",
    "Data Lifecycle",
    "Questions & Gaps",
];

impl BaselineTemplate {
    pub const ALL: [BaselineTemplate; 5] = [
        BaselineTemplate::LeanBaselineService,
        BaselineTemplate::ComprehensiveService,
        BaselineTemplate::MinimalService,
        BaselineTemplate::UiComponent,
        BaselineTemplate::Table,
    ];

    pub fn identifier(&self) -> &'static str {
        match self {
            Self::LeanBaselineService => "lean_baseline_service_template",
            Self::ComprehensiveService => "comprehensive_service_template",
            Self::MinimalService => "minimal_service_template",
            Self::UiComponent => "ui_component_template",
            Self::Table => "table_template",
        }
    }

    pub fn section_names(&self) -> &'static [&'static str] {
        match self {
            Self::LeanBaselineService => LEAN_SERVICE_SECTIONS,
            Self::ComprehensiveService => COMPREHENSIVE_SERVICE_SECTIONS,
            Self::MinimalService => MINIMAL_SERVICE_SECTIONS,
            Self::UiComponent => UI_COMPONENT_SECTIONS,
            Self::Table => TABLE_SECTIONS,
        }
    }

    /// Default `layer` front-matter value for documents of this template.
    pub fn default_layer(&self) -> &'static str {
        match self {
            Self::LeanBaselineService | Self::ComprehensiveService | Self::MinimalService => {
                "Service"
            }
            Self::UiComponent => "UI",
            Self::Table => "Database",
        }
    }

    /// Default `componentType` front-matter value.
    pub fn default_component_type(&self) -> &'static str {
        match self {
            Self::LeanBaselineService | Self::ComprehensiveService | Self::MinimalService => {
                "Service"
            }
            Self::UiComponent => "UIComponent",
            Self::Table => "Table",
        }
    }

    pub fn sections(&self) -> Vec<Section> {
        self.section_names()
            .iter()
            .enumerate()
            .map(|(i, name)| Section {
                name: (*name).to_string(),
                heading_level: 2,
                required: true,
                order_index: i,
            })
            .collect()
    }

    /// Resolve an identifier, accepting an optional `.md` suffix and a
    /// few historical aliases.
    pub fn lookup(identifier: &str) -> Option<Self> {
        let id = identifier.trim();
        let id = id.strip_suffix(".md").unwrap_or(id);
        match id {
            "lean_baseline_service_template" | "lean_service_template" => {
                Some(Self::LeanBaselineService)
            }
            "comprehensive_service_template" | "service_template" => {
                Some(Self::ComprehensiveService)
            }
            "minimal_service_template" => Some(Self::MinimalService),
            "ui_component_template" | "component_template" => Some(Self::UiComponent),
            "table_template" | "standard_table_template" => Some(Self::Table),
            _ => None,
        }
    }
}

impl FromStr for BaselineTemplate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s).ok_or_else(|| format!("unknown template identifier: {}", s))
    }
}

/// Required sections for a template identifier. Unknown identifiers yield
/// an empty list rather than an error.
pub fn get_required_sections(template_identifier: &str) -> Vec<Section> {
    BaselineTemplate::lookup(template_identifier)
        .map(|t| t.sections())
        .unwrap_or_default()
}

pub fn content_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn default_heading_rules() -> BTreeMap<String, serde_json::Value> {
    let mut rules = BTreeMap::new();
    rules.insert("section_level".to_string(), serde_json::json!(2));
    rules.insert("max_level_step".to_string(), serde_json::json!(1));
    rules.insert("max_level".to_string(), serde_json::json!(6));
    rules
}

fn default_format_rules() -> BTreeMap<String, serde_json::Value> {
    let mut rules = BTreeMap::new();
    rules.insert(
        "frontmatter_delimiter".to_string(),
        serde_json::json!(crate::core::document::FRONTMATTER_DELIM),
    );
    rules.insert(
        "required_frontmatter_keys".to_string(),
        serde_json::json!(REQUIRED_FRONTMATTER_KEYS),
    );
    rules
}

/// Compiled-schema registry. One instance per service; keyed by template name.
#[derive(Default)]
pub struct SchemaRegistry {
    schemas: Mutex<FxHashMap<String, TemplateSchema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build (or reuse) the schema for `template_name` compiled from `content`.
    pub fn build_schema(&self, template_name: &str, content: &str) -> TemplateSchema {
        let checksum = content_checksum(content);
        let mut schemas = self.schemas.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(existing) = schemas.get(template_name)
            && existing.checksum == checksum
        {
            tracing::debug!(template = template_name, "schema registry hit");
            return existing.clone();
        }

        let schema = TemplateSchema {
            template_name: template_name.to_string(),
            checksum,
            required_sections: get_required_sections(template_name),
            heading_rules: default_heading_rules(),
            format_rules: default_format_rules(),
        };
        if schemas.insert(template_name.to_string(), schema.clone()).is_some() {
            tracing::info!(template = template_name, "template content changed; schema rebuilt");
        } else {
            tracing::debug!(
                template = template_name,
                sections = schema.required_sections.len(),
                "schema compiled"
            );
        }
        schema
    }

    pub fn get_cached_schema(&self, template_name: &str) -> Option<TemplateSchema> {
        self.schemas
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(template_name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.schemas.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lean_baseline_has_nine_ordered_sections() {
        let sections = get_required_sections("lean_baseline_service_template");
        assert_eq!(sections.len(), 9);
        assert!(sections.iter().enumerate().all(|(i, s)| s.order_index == i));
        assert_eq!(sections[6].name, "Dependencies");
    }

    #[test]
    fn md_suffix_is_accepted() {
        assert_eq!(
            BaselineTemplate::lookup("table_template.md"),
            Some(BaselineTemplate::Table)
        );
        assert!("nope".parse::<BaselineTemplate>().is_err());
    }

    #[test]
    fn every_baseline_starts_with_quick_reference() {
        for t in BaselineTemplate::ALL {
            assert_eq!(t.section_names()[0], "Quick Reference", "{:?}", t);
        }
    }
}
