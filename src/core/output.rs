//! Human-readable rendering for CLI surfaces.
//!
//! Violations are grouped BLOCKER, then FIXABLE, then WARN, each with its
//! suggestion. Colour is applied with `colored` and honours `NO_COLOR`.

use crate::core::gate::EnforcementReport;
use crate::core::validate::{Severity, Violation};
use colored::Colorize;

const SEVERITY_ORDER: [Severity; 3] = [Severity::Blocker, Severity::Fixable, Severity::Warn];

/// `text` on a single line, cut after `limit` chars.
fn one_line(text: &str, limit: usize) -> String {
    let mut out = String::with_capacity(text.len());
    for word in text.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    if let Some((cut, _)) = out.char_indices().nth(limit) {
        out.truncate(cut);
        out.push_str("...");
    }
    out
}

fn severity_label(severity: Severity) -> colored::ColoredString {
    match severity {
        Severity::Blocker => severity.as_str().red().bold(),
        Severity::Fixable => severity.as_str().yellow().bold(),
        Severity::Warn => severity.as_str().cyan(),
    }
}

fn render_violation(v: &Violation) -> String {
    let location = match (v.line, &v.section_name) {
        (Some(line), Some(section)) => format!(" (line {}, {})", line, section),
        (Some(line), None) => format!(" (line {})", line),
        (None, Some(section)) => format!(" ({})", section),
        (None, None) => String::new(),
    };
    let mut out = format!("    - {}{}", one_line(&v.message, 160), location.dimmed());
    if let Some(s) = &v.suggestion {
        out.push_str(&format!("\n      {} {}", "fix:".dimmed(), one_line(s, 160)));
    }
    out
}

/// Text report for one validated document.
pub fn render_report(label: &str, report: &EnforcementReport) -> String {
    let verdict = if report.valid {
        "VALID".green().bold()
    } else {
        "INVALID".red().bold()
    };
    let mut out = format!(
        "{} {} [{} / {}] confidence {:.2} (required {:.2})\n",
        verdict,
        label,
        report.template,
        report.tier,
        report.confidence,
        report.tier.threshold()
    );

    for severity in SEVERITY_ORDER {
        let group: Vec<&Violation> = report
            .violations
            .iter()
            .filter(|v| v.severity == severity)
            .collect();
        if group.is_empty() {
            continue;
        }
        out.push_str(&format!("  {} ({})\n", severity_label(severity), group.len()));
        for v in group {
            out.push_str(&render_violation(v));
            out.push('\n');
        }
    }

    if !report.auto_fixed.is_empty() {
        out.push_str(&format!("  auto-fixed: {}\n", report.auto_fixed.join(", ")));
    }
    for warning in &report.warnings {
        out.push_str(&format!("  {} {}\n", "note:".dimmed(), one_line(warning, 200)));
    }
    out
}
