//! AKR: documentation enforcement for template-conformant component docs.
//!
//! Generated or hand-written component documentation is validated against
//! a baseline template (front matter, required sections, canonical order,
//! heading hierarchy), mechanically repaired where possible, and only then
//! written and committed.
//!
//! # Pipeline
//!
//! ```text
//! content ─► parse ─► schema ─► validate ─► auto-fix ─► re-validate ─► provenance ─► write + commit
//!                        ▲          ▲
//!                        └─ session cache
//! ```
//!
//! - **BLOCKER** violations always fail, whatever the tier
//! - **Dry-run** never touches the filesystem
//! - **Writes** need both the request flag and the process-wide switch
//!
//! # Examples
//!
//! ```bash
//! # Validate two documents in CI
//! akr validate docs/CourseService.md docs/EnrollmentService.md --template lean_baseline_service_template
//!
//! # Preview what a write would commit
//! akr write --doc docs/CourseService.md --content-file draft.md --template lean_baseline_service_template --allow-writes
//! ```
//!
//! # Crate Structure
//!
//! - [`core`]: parser, schema registry, validation, auto-fix, cache, write gate
//! - `cli`: clap command definitions

mod cli;
pub mod core;

use cli::{Cli, Command, OutputFormat};
use crate::core::autofix::FileMetadata;
use crate::core::config::AkrConfig;
use crate::core::error::AkrError;
use crate::core::gate::{
    DocumentationService, EnforcementReport, SectionUpdate, UpdateRequest, ValidateRequest,
    WriteRequest, WriteResult,
};
use crate::core::schema::{BaselineTemplate, get_required_sections};
use crate::core::{output, rpc, scaffold, time};

use clap::Parser;
use rayon::prelude::*;
use std::ffi::OsString;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

pub const EXIT_OK: i32 = 0;
pub const EXIT_INVALID: i32 = 1;
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_IO: i32 = 3;
pub const EXIT_ENGINE: i32 = 4;

pub const ALLOW_WRITES_ENV: &str = "AKR_ALLOW_WRITES";

/// Exit code for an error that ended a command.
pub fn exit_code_for(err: &AkrError) -> i32 {
    match err {
        AkrError::IoError(_) => EXIT_IO,
        _ => EXIT_ENGINE,
    }
}

fn writes_enabled_from_env() -> bool {
    std::env::var(ALLOW_WRITES_ENV)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Construct the service for a repository. The process-wide write switch is
/// fixed here: configuration or `AKR_ALLOW_WRITES`.
pub fn build_service(repo: &Path, config_path: Option<&Path>) -> Result<DocumentationService, AkrError> {
    let config = AkrConfig::resolve(config_path, repo)?;
    let writes = config.writes.allow_writes || writes_enabled_from_env();
    Ok(DocumentationService::new(repo, config).with_writes_enabled(writes))
}

pub fn run() -> Result<i32, AkrError> {
    run_from(std::env::args_os())
}

pub fn run_from<I, T>(args: I) -> Result<i32, AkrError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return Ok(if e.use_stderr() { EXIT_USAGE } else { EXIT_OK });
        }
    };

    match cli.command {
        Command::Validate(args) => run_validate(args),
        Command::Write(args) => run_write(args),
        Command::Update(args) => run_update(args),
        Command::Sections(args) => run_sections(args),
        Command::Scaffold(args) => run_scaffold(args),
        Command::Rpc(args) => run_rpc(args),
    }
}

struct DocOutcome {
    path: PathBuf,
    report: Result<EnforcementReport, AkrError>,
}

impl DocOutcome {
    fn exit_code(&self) -> i32 {
        match &self.report {
            Ok(r) if r.valid => EXIT_OK,
            Ok(_) => EXIT_INVALID,
            Err(e) => exit_code_for(e),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match &self.report {
            Ok(report) => {
                let mut value = serde_json::to_value(report).unwrap_or(serde_json::Value::Null);
                if let Some(obj) = value.as_object_mut() {
                    obj.insert(
                        "document".to_string(),
                        serde_json::json!(self.path.display().to_string()),
                    );
                }
                value
            }
            Err(e) => serde_json::json!({
                "document": self.path.display().to_string(),
                "error": { "type": e.kind(), "message": e.to_string() }
            }),
        }
    }
}

fn validate_one(service: &DocumentationService, path: &Path, args: &cli::ValidateCli) -> DocOutcome {
    let report = fs::read_to_string(path)
        .map_err(AkrError::IoError)
        .and_then(|content| {
            service.validate_document(&ValidateRequest {
                content,
                template: args.template.clone(),
                tier: args.tier,
                auto_fix: args.auto_fix,
                metadata: Some(FileMetadata::from_paths(&path.display().to_string(), None)),
            })
        });
    DocOutcome {
        path: path.to_path_buf(),
        report,
    }
}

fn run_validate(args: cli::ValidateCli) -> Result<i32, AkrError> {
    let service = build_service(&args.repo, args.config.as_deref())?;
    let outcomes: Vec<DocOutcome> = args
        .docs
        .par_iter()
        .map(|doc| validate_one(&service, doc, &args))
        .collect();

    match args.format {
        OutputFormat::Json => {
            let value = match outcomes.as_slice() {
                [single] => single.to_json(),
                many => serde_json::Value::Array(many.iter().map(DocOutcome::to_json).collect()),
            };
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            for outcome in &outcomes {
                match &outcome.report {
                    Ok(report) => print!(
                        "{}",
                        output::render_report(&outcome.path.display().to_string(), report)
                    ),
                    Err(e) => eprintln!("error: {}: {}", outcome.path.display(), e),
                }
            }
        }
    }

    let stats = service.shutdown();
    tracing::debug!(hits = stats.hits, misses = stats.misses, "validate finished");
    Ok(outcomes.iter().map(DocOutcome::exit_code).max().unwrap_or(EXIT_OK))
}

fn print_write_result(result: &WriteResult) -> Result<i32, AkrError> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(if result.success { EXIT_OK } else { EXIT_INVALID })
}

fn run_write(args: cli::WriteCli) -> Result<i32, AkrError> {
    let content = match (&args.content, &args.content_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => fs::read_to_string(path)?,
        (None, None) => {
            return Err(AkrError::ValidationError(
                "either --content or --content-file is required".to_string(),
            ));
        }
    };
    let service = build_service(&args.repo, args.config.as_deref())?;
    let result = service.write_documentation(&WriteRequest {
        doc_path: args.doc,
        content,
        template: args.template,
        mode: args.mode,
        allow_writes: args.allow_writes,
        source_file: args.source_file,
        metadata: None,
        tier: args.tier,
    });
    print_write_result(&result)
}

fn run_update(args: cli::UpdateCli) -> Result<i32, AkrError> {
    let service = build_service(&args.repo, args.config.as_deref())?;
    let result = service.update_documentation(&UpdateRequest {
        doc_path: args.doc,
        template: args.template,
        sections: args
            .sections
            .into_iter()
            .map(|(name, content)| SectionUpdate { name, content })
            .collect(),
        mode: args.mode,
        allow_writes: args.allow_writes,
        source_file: args.source_file,
        tier: args.tier,
    });
    print_write_result(&result)
}

fn run_sections(args: cli::SectionsCli) -> Result<i32, AkrError> {
    let sections = get_required_sections(&args.template);
    match args.format {
        OutputFormat::Json => {
            let envelope = time::command_envelope(
                "sections",
                "ok",
                serde_json::json!({ "template": args.template, "sections": sections }),
            );
            println!("{}", serde_json::to_string_pretty(&envelope)?);
        }
        OutputFormat::Text => {
            if sections.is_empty() {
                eprintln!("no baseline sections for '{}'", args.template);
            }
            for s in &sections {
                println!("{:>2}. {}", s.order_index + 1, s.name);
            }
        }
    }
    Ok(EXIT_OK)
}

fn run_scaffold(args: cli::ScaffoldCli) -> Result<i32, AkrError> {
    let template: BaselineTemplate = args.template.parse().map_err(AkrError::TemplateNotFound)?;
    let metadata = FileMetadata {
        file_path: String::new(),
        component_name: args.component.clone(),
        feature_tag: args.feature,
        domain: args.domain,
        ..FileMetadata::default()
    };
    let target = args
        .out
        .unwrap_or_else(|| PathBuf::from(format!("{}.md", args.component)));
    let outcome = scaffold::scaffold_document(
        template,
        &metadata,
        &scaffold::ScaffoldOptions {
            target,
            force: args.force,
            dry_run: args.dry_run,
        },
    )?;
    match outcome.action {
        scaffold::ScaffoldAction::Wrote => println!("  wrote: {}", outcome.path.display()),
        scaffold::ScaffoldAction::WouldWrite => {
            println!("  would-write: {}", outcome.path.display());
            print!("{}", outcome.content);
        }
        scaffold::ScaffoldAction::WouldSkip => println!(
            "  would-skip: {} (exists; pass --force to overwrite)",
            outcome.path.display()
        ),
    }
    Ok(EXIT_OK)
}

fn run_rpc(args: cli::RpcCli) -> Result<i32, AkrError> {
    let request: rpc::RpcRequest = if args.stdin {
        let mut raw = String::new();
        std::io::stdin().read_to_string(&mut raw)?;
        serde_json::from_str(&raw)?
    } else {
        let op = args.op.clone().ok_or_else(|| {
            AkrError::ValidationError("rpc requires --op or --stdin".to_string())
        })?;
        let params = match &args.params {
            Some(raw) => serde_json::from_str(raw)?,
            None => serde_json::json!({}),
        };
        rpc::RpcRequest {
            op,
            params,
            id: rpc::default_request_id(),
        }
    };

    let service = build_service(&args.repo, args.config.as_deref())?;
    let response = rpc::dispatch(&service, &request);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(if response.success { EXIT_OK } else { EXIT_INVALID })
}
