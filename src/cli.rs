//! CLI struct definitions for the `akr` command-line interface.
//!
//! All clap-derived types live here. Dispatch logic lives in `lib.rs`.

use crate::core::config::WriteMode;
use crate::core::validate::Tier;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "akr",
    version = env!("CARGO_PKG_VERSION"),
    about = "Validate, auto-fix and gate writes of template-conformant component documentation."
)]
pub(crate) struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub(crate) enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(clap::Args, Debug)]
pub(crate) struct ValidateCli {
    /// Documents to validate.
    #[clap(required = true)]
    pub docs: Vec<PathBuf>,
    /// Template identifier (e.g. `lean_baseline_service_template`).
    #[clap(long)]
    pub template: String,
    /// Completeness tier; defaults to the configured strictness.
    #[clap(long, value_enum)]
    pub tier: Option<Tier>,
    /// Apply mechanical fixes and report the corrected verdict.
    #[clap(long)]
    pub auto_fix: bool,
    /// Output format: 'text' or 'json'.
    #[clap(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Repository root used to find `.akr/config.toml` and template overrides.
    #[clap(long, default_value = ".")]
    pub repo: PathBuf,
    /// Explicit configuration file.
    #[clap(long)]
    pub config: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub(crate) struct WriteCli {
    /// Repository root the document path is resolved under.
    #[clap(long, default_value = ".")]
    pub repo: PathBuf,
    /// Repository-relative target path.
    #[clap(long)]
    pub doc: String,
    /// Document content.
    #[clap(long, allow_hyphen_values = true, conflicts_with = "content_file", required_unless_present = "content_file")]
    pub content: Option<String>,
    /// Read document content from a file.
    #[clap(long)]
    pub content_file: Option<PathBuf>,
    /// Source file the document describes; names the component.
    #[clap(long)]
    pub source_file: Option<String>,
    #[clap(long, value_enum)]
    pub mode: Option<WriteMode>,
    #[clap(long)]
    pub template: String,
    #[clap(long, value_enum)]
    pub tier: Option<Tier>,
    /// Request-level write permission. The process must also allow writes.
    #[clap(long)]
    pub allow_writes: bool,
    #[clap(long)]
    pub config: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub(crate) struct UpdateCli {
    #[clap(long, default_value = ".")]
    pub repo: PathBuf,
    #[clap(long)]
    pub doc: String,
    /// Section replacement as `NAME=TEXT`; repeatable.
    #[clap(long = "section", value_parser = parse_section_arg, required = true)]
    pub sections: Vec<(String, String)>,
    #[clap(long)]
    pub source_file: Option<String>,
    #[clap(long, value_enum)]
    pub mode: Option<WriteMode>,
    #[clap(long)]
    pub template: String,
    #[clap(long, value_enum)]
    pub tier: Option<Tier>,
    #[clap(long)]
    pub allow_writes: bool,
    #[clap(long)]
    pub config: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub(crate) struct SectionsCli {
    pub template: String,
    #[clap(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug)]
pub(crate) struct ScaffoldCli {
    #[clap(long)]
    pub template: String,
    /// Component name written into the title and front matter.
    #[clap(long)]
    pub component: String,
    #[clap(long)]
    pub feature: Option<String>,
    #[clap(long)]
    pub domain: Option<String>,
    /// Output path (defaults to `<component>.md`).
    #[clap(long)]
    pub out: Option<PathBuf>,
    /// Show what would change without writing files.
    #[clap(long)]
    pub dry_run: bool,
    /// Overwrite an existing file.
    #[clap(long)]
    pub force: bool,
}

#[derive(clap::Args, Debug)]
pub(crate) struct RpcCli {
    /// Tool to invoke
    #[clap(long)]
    pub op: Option<String>,
    /// JSON parameters
    #[clap(long)]
    pub params: Option<String>,
    /// Read request from stdin instead of command line
    #[clap(long)]
    pub stdin: bool,
    #[clap(long, default_value = ".")]
    pub repo: PathBuf,
    #[clap(long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Validate documents against a template
    Validate(ValidateCli),
    /// Write a full document through the enforcement gate
    Write(WriteCli),
    /// Replace sections of an existing document through the gate
    Update(UpdateCli),
    /// List the baseline sections of a template
    Sections(SectionsCli),
    /// Generate a skeleton document for a template
    Scaffold(ScaffoldCli),
    /// Invoke a tool with a JSON request
    Rpc(RpcCli),
}

fn parse_section_arg(raw: &str) -> Result<(String, String), String> {
    let (name, text) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=TEXT, got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("section name is empty".to_string());
    }
    Ok((name.to_string(), text.replace("\\n", "\n")))
}
