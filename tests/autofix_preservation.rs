use akr::core::autofix::{AutoFixOptions, FIX_SECTION_ORDER, FIX_YAML_FRONTMATTER, FileMetadata, auto_fix};
use akr::core::document::{parse, section_body};
use akr::core::schema::{SchemaRegistry, TemplateSchema};
use akr::core::validate::{ValidationOptions, kinds, validate_phase1};
use std::collections::BTreeMap;

fn schema() -> TemplateSchema {
    SchemaRegistry::new().build_schema("lean_baseline_service_template", "")
}

/// Multiset of whitespace-separated tokens.
fn tokens(text: &str) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for t in text.split_whitespace() {
        *counts.entry(t).or_insert(0) += 1;
    }
    counts
}

fn assert_tokens_preserved(original: &str, corrected: &str) {
    let after = tokens(corrected);
    for (token, count) in tokens(original) {
        let kept = after.get(token).copied().unwrap_or(0);
        assert!(kept >= count, "token {:?} lost ({} -> {})", token, count, kept);
    }
}

const SCRAMBLED: &str = "# EnrollmentService

Intro paragraph with `inline code` and a [link](https://example.invalid/a).

## Dependencies

- PaymentGateway (HTTP)
- EnrollmentRepository

## Quick Reference

| Key | Value |
| --- | ----- |
| owner | team-courses |

## Architecture

```mermaid
graph TD
  A --> B
## not a heading inside a fence
```

## What & Why

Handles enrollment; see FN-2041.

## Extra Notes

Kept where it was.

## How It Works

1. validate
2. persist

## Business Rules

BR-1: seats > 0

## Data Operations

Writes `enrollments` table.

## API Contract

POST /enrollments

## Questions & Gaps

- none yet
";

#[test]
fn fixes_keep_every_token_and_reach_validity() {
    let s = schema();
    let opts = ValidationOptions::default();
    let first = validate_phase1(&parse(SCRAMBLED), &s, &opts);
    assert!(first.violations.iter().any(|v| v.kind == kinds::MISSING_FRONTMATTER));
    assert!(first.violations.iter().any(|v| v.kind == kinds::SECTION_ORDER));

    let meta = FileMetadata::from_paths("docs/EnrollmentService.md", None);
    let outcome = auto_fix(SCRAMBLED, &first.violations, &meta, &s, &AutoFixOptions::default());
    assert_eq!(outcome.applied, vec![FIX_YAML_FRONTMATTER, FIX_SECTION_ORDER]);
    assert_tokens_preserved(SCRAMBLED, &outcome.corrected_content);

    let second = validate_phase1(&parse(&outcome.corrected_content), &s, &opts);
    assert!(second.valid, "{:?}", second.violations);
    assert!(second.violations.iter().all(|v| v.kind != kinds::SECTION_ORDER));
}

#[test]
fn section_bodies_move_byte_for_byte() {
    let s = schema();
    let first = validate_phase1(&parse(SCRAMBLED), &s, &ValidationOptions::default());
    let outcome = auto_fix(
        SCRAMBLED,
        &first.violations,
        &FileMetadata::default(),
        &s,
        &AutoFixOptions::default(),
    );

    for name in ["Architecture", "Quick Reference", "Dependencies", "Extra Notes", "Questions & Gaps"] {
        assert_eq!(
            section_body(SCRAMBLED, name),
            section_body(&outcome.corrected_content, name),
            "{}",
            name
        );
    }
    let order = parse(&outcome.corrected_content).section_order;
    assert_eq!(order.first().map(String::as_str), Some("Quick Reference"));
    assert_eq!(order.last().map(String::as_str), Some("Questions & Gaps"));
    assert!(!order.iter().any(|h| h == "not a heading inside a fence"));
}

#[test]
fn diff_describes_the_change() {
    let s = schema();
    let first = validate_phase1(&parse(SCRAMBLED), &s, &ValidationOptions::default());
    let outcome = auto_fix(
        SCRAMBLED,
        &first.violations,
        &FileMetadata::from_paths("EnrollmentService.md", None),
        &s,
        &AutoFixOptions::default(),
    );

    assert!(outcome.diff.starts_with("--- original\n+++ corrected\n"));
    assert!(outcome.diff.contains("+component: EnrollmentService"));
    assert!(outcome.diff.contains("@@"));
}

#[test]
fn nothing_fixable_means_nothing_changes() {
    let s = schema();
    let doc = "---\ncomponent: X\n---\n# X\n";
    let first = validate_phase1(&parse(doc), &s, &ValidationOptions::default());
    assert!(first.violations.iter().all(|v| !v.is_fixable()));

    let outcome = auto_fix(doc, &first.violations, &FileMetadata::default(), &s, &AutoFixOptions::default());
    assert!(!outcome.changed());
    assert_eq!(outcome.corrected_content, doc);
    assert!(outcome.diff.is_empty());
}

#[test]
fn key_less_front_matter_keeps_its_comments() {
    let s = schema();
    let body: String = SCRAMBLED.lines().skip(1).map(|l| format!("{}\n", l)).collect();
    let doc = format!("---\n# owner: team-courses\n---\n# EnrollmentService\n{}", body);
    let first = validate_phase1(&parse(&doc), &s, &ValidationOptions::default());
    assert!(first.violations.iter().any(|v| v.kind == kinds::MISSING_FRONTMATTER));

    let meta = FileMetadata::from_paths("docs/EnrollmentService.md", None);
    let outcome = auto_fix(&doc, &first.violations, &meta, &s, &AutoFixOptions::default());
    assert!(outcome.applied.iter().any(|f| f == FIX_YAML_FRONTMATTER));
    assert_tokens_preserved(&doc, &outcome.corrected_content);
    assert!(outcome.corrected_content.starts_with("---\n# owner: team-courses\n"));

    let parsed = parse(&outcome.corrected_content);
    assert_eq!(parsed.yaml_str("component").as_deref(), Some("EnrollmentService"));
    assert!(validate_phase1(&parsed, &s, &ValidationOptions::default()).valid);
}
