//! Provenance header handling.
//!
//! Persisted documents begin with the front-matter block, followed directly
//! by a one-line HTML comment recording where the document came from.

use crate::core::document::parse;

pub const PROVENANCE_MARKER: &str = "<!-- akr:provenance";

pub fn is_provenance_line(line: &str) -> bool {
    line.trim_start().starts_with(PROVENANCE_MARKER)
}

pub fn provenance_header(source: &str, template: &str, generated_at: &str) -> String {
    format!(
        "{} source={} template={} generated={} -->",
        PROVENANCE_MARKER,
        if source.is_empty() { "unknown" } else { source },
        template,
        generated_at
    )
}

/// Move provenance lines that precede the front matter to just after it.
/// Content without a leading header is returned unchanged.
pub fn normalize_header_order(content: &str) -> String {
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let lead = lines
        .iter()
        .take_while(|l| is_provenance_line(l) || l.trim().is_empty())
        .count();
    if lead == 0 || !lines[..lead].iter().any(|l| is_provenance_line(l)) {
        return content.to_string();
    }

    let rest: String = lines[lead..].concat();
    let parsed = parse(&rest);
    let Some(fm) = parsed.front_matter.as_ref() else {
        return content.to_string();
    };

    let rest_lines: Vec<&str> = rest.split_inclusive('\n').collect();
    let mut out = rest_lines[..fm.closing_line].concat();
    if !out.ends_with('\n') {
        out.push('\n');
    }
    for header in lines[..lead].iter().filter(|l| is_provenance_line(l)) {
        out.push_str(header.trim_end());
        out.push('\n');
    }
    out.push_str(&rest_lines[fm.closing_line..].concat());
    out
}

/// Replace any provenance lines with `header`, placed right after the front
/// matter (or first, for a document without one).
pub fn inject(content: &str, header: &str) -> String {
    let parsed = parse(content);
    let fm_lines = parsed.front_matter_lines();
    let lines: Vec<&str> = content.split_inclusive('\n').collect();

    let mut out = lines[..fm_lines.min(lines.len())].concat();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(header);
    out.push('\n');
    for line in lines.iter().skip(fm_lines) {
        if !is_provenance_line(line) {
            out.push_str(line);
        }
    }
    out
}

/// Rewrite the `lastUpdated:` line inside the front matter, leaving every
/// other byte of the block as it was.
pub fn refresh_last_updated(content: &str, date: &str) -> String {
    let parsed = parse(content);
    let fm_lines = parsed.front_matter_lines();
    if fm_lines == 0 {
        return content.to_string();
    }
    content
        .split_inclusive('\n')
        .enumerate()
        .map(|(idx, line)| {
            let in_block = idx > 0 && idx + 1 < fm_lines;
            if in_block && line.starts_with("lastUpdated:") {
                let eol = if line.ends_with("\r\n") {
                    "\r\n"
                } else if line.ends_with('\n') {
                    "\n"
                } else {
                    ""
                };
                format!("lastUpdated: {}{}", date, eol)
            } else {
                line.to_string()
            }
        })
        .collect()
}
