//! Markdown document parser.
//!
//! Splits raw markdown into its YAML front matter and the ordered list of
//! ATX headings. Parsing is total: malformed front matter is recorded on the
//! result instead of being raised, so the validation engine can report it.

use regex::Regex;
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::sync::OnceLock;

pub const FRONTMATTER_DELIM: &str = "---";

/// A single ATX heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
    /// 1-indexed line in the raw content.
    pub line_number: usize,
}

/// Location and parse state of a delimited front-matter block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrontMatterBlock {
    /// 1-indexed line of the closing delimiter.
    pub closing_line: usize,
    /// Set when the block body is not a YAML mapping.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedDocument {
    pub raw_content: String,
    pub yaml_data: Mapping,
    pub headings: Vec<Heading>,
    pub section_order: Vec<String>,
    pub front_matter: Option<FrontMatterBlock>,
}

impl ParsedDocument {
    /// Level-2 headings, the units subject to section rules.
    pub fn sections(&self) -> impl Iterator<Item = &Heading> {
        self.headings.iter().filter(|h| h.level == 2)
    }

    pub fn has_front_matter(&self) -> bool {
        self.front_matter.is_some()
    }

    /// Number of lines occupied by the front-matter block (0 if absent).
    pub fn front_matter_lines(&self) -> usize {
        self.front_matter.as_ref().map_or(0, |f| f.closing_line)
    }

    pub fn yaml_str(&self, key: &str) -> Option<String> {
        match self.yaml_data.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(#{1,6}) (.+)$").expect("static heading regex"))
}

fn is_delim(line: &str) -> bool {
    line.trim_end() == FRONTMATTER_DELIM
}

fn is_fence(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("```") || t.starts_with("~~~")
}

/// Parse a heading line into `(level, text)`.
pub fn parse_heading_line(line: &str) -> Option<(u8, String)> {
    let caps = heading_re().captures(line.trim_end())?;
    let level = caps.get(1)?.as_str().len() as u8;
    let text = caps
        .get(2)?
        .as_str()
        .trim()
        .trim_end_matches('#')
        .trim_end()
        .to_string();
    if text.is_empty() {
        return None;
    }
    Some((level, text))
}

fn parse_front_matter(lines: &[&str]) -> (Mapping, Option<FrontMatterBlock>) {
    if lines.first().is_none_or(|l| !is_delim(l)) {
        return (Mapping::new(), None);
    }
    let Some(close_idx) = lines.iter().skip(1).position(|l| is_delim(l)).map(|p| p + 1) else {
        return (Mapping::new(), None);
    };

    let body = lines[1..close_idx].join("\n");
    let (mapping, error) = if body.trim().is_empty() {
        (Mapping::new(), None)
    } else {
        match serde_yaml::from_str::<Value>(&body) {
            Ok(Value::Mapping(m)) => (m, None),
            Ok(Value::Null) => (Mapping::new(), None),
            Ok(other) => (
                Mapping::new(),
                Some(format!(
                    "front matter is not a key-value mapping (found {})",
                    value_kind(&other)
                )),
            ),
            Err(e) => (Mapping::new(), Some(e.to_string())),
        }
    };

    (
        mapping,
        Some(FrontMatterBlock {
            closing_line: close_idx + 1,
            error,
        }),
    )
}

fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

/// Parse raw markdown into a [`ParsedDocument`].
pub fn parse(content: &str) -> ParsedDocument {
    let lines: Vec<&str> = content.lines().collect();
    let (yaml_data, front_matter) = parse_front_matter(&lines);
    let body_start = front_matter.as_ref().map_or(0, |f| f.closing_line);

    let mut headings = Vec::new();
    let mut in_fence = false;
    for (idx, line) in lines.iter().enumerate().skip(body_start) {
        if is_fence(line) {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if let Some((level, text)) = parse_heading_line(line) {
            headings.push(Heading {
                level,
                text,
                line_number: idx + 1,
            });
        }
    }

    let section_order = headings.iter().map(|h| h.text.clone()).collect();

    ParsedDocument {
        raw_content: content.to_string(),
        yaml_data,
        headings,
        section_order,
        front_matter,
    }
}

/// Normalised comparison form of a section title: leading decoration
/// (emoji, numbering punctuation) dropped, whitespace collapsed, lowercased.
pub fn normalize_section_name(name: &str) -> String {
    let trimmed = name.trim_start_matches(|c: char| !c.is_alphanumeric());
    trimmed
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// True if a document heading satisfies a required section name.
///
/// Beyond an exact match, the name may be followed by a qualifier that opens
/// with `&`, `and`, `(` or `:`. "Dependencies & Integrations" and
/// "Architecture (current)" qualify; "Dependencies Overview" does not.
pub fn heading_matches(heading_text: &str, section_name: &str) -> bool {
    let heading = normalize_section_name(heading_text);
    let wanted = normalize_section_name(section_name);
    if wanted.is_empty() {
        return false;
    }
    if heading == wanted {
        return true;
    }
    let Some(rest) = heading.strip_prefix(&wanted) else {
        return false;
    };
    if rest.starts_with(|c: char| c.is_alphanumeric()) {
        return false;
    }
    let qualifier = rest.trim_start();
    qualifier.starts_with(['&', '(', ':']) || qualifier.starts_with("and ")
}

/// A level-2 section block as an exact slice of the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionBlock {
    pub title: String,
    /// Heading line plus body, byte-for-byte.
    pub text: String,
}

/// Body of a document split at level-2 headings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSplit {
    /// Front-matter block including both delimiter lines.
    pub front_matter: String,
    /// Everything between the front matter and the first level-2 heading.
    pub preamble: String,
    pub blocks: Vec<SectionBlock>,
}

impl SectionSplit {
    pub fn join(&self) -> String {
        let mut out = String::with_capacity(
            self.front_matter.len()
                + self.preamble.len()
                + self.blocks.iter().map(|b| b.text.len()).sum::<usize>(),
        );
        out.push_str(&self.front_matter);
        out.push_str(&self.preamble);
        for b in &self.blocks {
            out.push_str(&b.text);
        }
        out
    }
}

/// Split content into front matter, preamble and level-2 blocks, reusing the
/// parser's heading detection so fenced code is never split.
pub fn split_sections(content: &str) -> SectionSplit {
    let parsed = parse(content);
    let raw_lines: Vec<&str> = content.split_inclusive('\n').collect();
    let fm_lines = parsed.front_matter_lines();

    let h2_lines: Vec<(usize, String)> = parsed
        .sections()
        .map(|h| (h.line_number - 1, h.text.clone()))
        .collect();

    let front_matter = raw_lines[..fm_lines.min(raw_lines.len())].concat();
    let first_h2 = h2_lines.first().map_or(raw_lines.len(), |(i, _)| *i);
    let preamble = raw_lines[fm_lines.min(first_h2)..first_h2].concat();

    let mut blocks = Vec::with_capacity(h2_lines.len());
    for (pos, (start, title)) in h2_lines.iter().enumerate() {
        let end = h2_lines.get(pos + 1).map_or(raw_lines.len(), |(i, _)| *i);
        blocks.push(SectionBlock {
            title: title.clone(),
            text: raw_lines[*start..end].concat(),
        });
    }

    SectionSplit {
        front_matter,
        preamble,
        blocks,
    }
}

/// Replace the body of the level-2 section `name`, keeping its heading line.
/// Appends a new `## name` section when the document has none.
pub fn replace_section(content: &str, name: &str, body: &str) -> String {
    let mut split = split_sections(content);
    let mut new_body = body.trim_matches('\n').to_string();
    new_body.push('\n');

    if let Some(block) = split.blocks.iter_mut().find(|b| heading_matches(&b.title, name)) {
        let heading_line = block.text.lines().next().unwrap_or_default().to_string();
        let had_gap = block.text.ends_with("\n\n");
        block.text = format!("{}\n\n{}", heading_line, new_body);
        if had_gap {
            block.text.push('\n');
        }
        return split.join();
    }

    let mut out = split.join();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    if !out.is_empty() && !out.ends_with("\n\n") {
        out.push('\n');
    }
    out.push_str(&format!("## {}\n\n{}", name, new_body));
    out
}

/// Body text (after the heading line) of the named level-2 section.
pub fn section_body(content: &str, name: &str) -> Option<String> {
    let split = split_sections(content);
    split
        .blocks
        .into_iter()
        .find(|b| heading_matches(&b.title, name))
        .map(|b| b.text.split_once('\n').map(|(_, rest)| rest.to_string()).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "---\ncomponent: CourseService\nfeature: FN-1\n---\n# CourseService\n\n## Quick Reference\n\nSummary.\n\n```bash\n# not a heading\n```\n\n### Detail\n\n## Dependencies\n\n- db\n";

    #[test]
    fn parses_front_matter_and_headings() {
        let doc = parse(DOC);
        assert_eq!(doc.yaml_str("component").as_deref(), Some("CourseService"));
        assert_eq!(doc.front_matter_lines(), 4);
        assert_eq!(
            doc.section_order,
            vec!["CourseService", "Quick Reference", "Detail", "Dependencies"]
        );
        assert_eq!(doc.headings[0].line_number, 5);
        assert_eq!(doc.sections().count(), 2);
    }

    #[test]
    fn missing_closing_delimiter_means_no_front_matter() {
        let doc = parse("---\ncomponent: X\n# Title\n");
        assert!(doc.yaml_data.is_empty());
        assert!(doc.front_matter.is_none());
        assert_eq!(doc.headings.len(), 1);
    }

    #[test]
    fn delimiter_must_be_first_line() {
        let doc = parse("\n---\ncomponent: X\n---\n");
        assert!(doc.front_matter.is_none());
    }

    #[test]
    fn malformed_front_matter_is_recorded() {
        let doc = parse("---\n- a\n- b\n---\n## A\n");
        let fm = doc.front_matter.expect("block present");
        assert!(fm.error.is_some());
        assert!(doc.yaml_data.is_empty());
    }

    #[test]
    fn heading_requires_space_and_text() {
        assert!(parse_heading_line("#NoSpace").is_none());
        assert!(parse_heading_line("####### seven").is_none());
        assert_eq!(parse_heading_line("## Title ##"), Some((2, "Title".to_string())));
    }

    #[test]
    fn heading_matching_is_lenient() {
        assert!(heading_matches("🎯 Quick Reference", "Quick Reference"));
        assert!(heading_matches("dependencies & integrations", "Dependencies"));
        assert!(!heading_matches("Dependencyless", "Dependencies"));
        assert!(heading_matches("Dependencies (external)", "Dependencies"));
        assert!(heading_matches("Dependencies: upstream", "Dependencies"));
        assert!(heading_matches("Dependencies and Integrations", "Dependencies"));
    }

    #[test]
    fn free_form_suffix_is_a_different_section() {
        assert!(!heading_matches("Architecture Decisions", "Architecture"));
        assert!(!heading_matches("Dependencies Overview", "Dependencies"));
        assert!(!heading_matches("Dependencies andmore", "Dependencies"));
    }

    #[test]
    fn split_round_trips_exact_bytes() {
        let split = split_sections(DOC);
        assert_eq!(split.join(), DOC);
        assert_eq!(split.blocks.len(), 2);
        assert!(split.preamble.starts_with("# CourseService"));
    }

    #[test]
    fn replace_section_keeps_other_content() {
        let updated = replace_section(DOC, "Dependencies", "- cache");
        assert!(updated.contains("## Dependencies\n\n- cache\n"));
        assert!(!updated.contains("- db"));
        assert!(updated.starts_with("---\ncomponent: CourseService"));

        let appended = replace_section(DOC, "Notes", "Some note.");
        assert!(appended.ends_with("## Notes\n\nSome note.\n"));
        assert_eq!(section_body(&appended, "Notes").as_deref(), Some("\nSome note.\n"));
    }
}
