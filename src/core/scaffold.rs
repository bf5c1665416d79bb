//! Skeleton document generation.
//!
//! Produces a document that already satisfies a baseline template's
//! structure: synthesised front matter, a title, and every required section
//! in canonical order with a `TBD` placeholder.
//!
//! - **Dry-run mode available**: nothing is written, the action is reported
//! - **Never scaffold over existing files**: requires explicit `force`

use crate::core::autofix::{FileMetadata, render_front_matter, synthesize_front_matter};
use crate::core::error::AkrError;
use crate::core::schema::{BaselineTemplate, SchemaRegistry};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Scaffolding operation configuration.
pub struct ScaffoldOptions {
    /// Destination file
    pub target: PathBuf,
    /// Force overwrite of an existing file
    pub force: bool,
    /// Preview mode: report the action without writing
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScaffoldAction {
    Wrote,
    WouldWrite,
    WouldSkip,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScaffoldOutcome {
    pub path: PathBuf,
    pub action: ScaffoldAction,
    pub content: String,
}

/// Skeleton markdown for `template` describing `metadata.component_name`.
pub fn render_skeleton(template: BaselineTemplate, metadata: &FileMetadata) -> String {
    let schema = SchemaRegistry::new().build_schema(template.identifier(), "");
    let mut out = render_front_matter(&synthesize_front_matter(metadata, &schema));
    out.push_str(&format!("# {}\n", metadata.component_name));
    for section in template.section_names() {
        out.push_str(&format!("\n## {}\n\nTBD\n", section));
    }
    out
}

fn ensure_parent(path: &Path) -> Result<(), AkrError> {
    if let Some(p) = path.parent() {
        fs::create_dir_all(p)?;
    }
    Ok(())
}

pub fn scaffold_document(
    template: BaselineTemplate,
    metadata: &FileMetadata,
    opts: &ScaffoldOptions,
) -> Result<ScaffoldOutcome, AkrError> {
    let content = render_skeleton(template, metadata);
    let dest = opts.target.clone();

    if dest.exists() && !opts.force {
        if opts.dry_run {
            return Ok(ScaffoldOutcome {
                path: dest,
                action: ScaffoldAction::WouldSkip,
                content,
            });
        }
        return Err(AkrError::ValidationError(format!(
            "Refusing to overwrite existing path without --force: {}",
            dest.display()
        )));
    }

    if opts.dry_run {
        return Ok(ScaffoldOutcome {
            path: dest,
            action: ScaffoldAction::WouldWrite,
            content,
        });
    }

    ensure_parent(&dest)?;
    fs::write(&dest, &content)?;
    tracing::info!(path = %dest.display(), template = template.identifier(), "skeleton written");
    Ok(ScaffoldOutcome {
        path: dest,
        action: ScaffoldAction::Wrote,
        content,
    })
}
