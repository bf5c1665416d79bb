use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

const TEMPLATE: &str = "lean_baseline_service_template";
const LEAN: &[&str] = &[
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

fn run_akr(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_akr"))
        .args(args)
        .current_dir(dir)
        .env_remove("AKR_ALLOW_WRITES")
        .env("NO_COLOR", "1")
        .output()
        .expect("run akr")
}

fn code(out: &Output) -> i32 {
    out.status.code().expect("exit code")
}

fn stdout_json(out: &Output) -> Value {
    serde_json::from_slice(&out.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({}): {}",
            e,
            String::from_utf8_lossy(&out.stdout)
        )
    })
}

fn document(sections: &[&str]) -> String {
    let mut out = String::from(
        "---\nfeature: FN-1\ndomain: Courses\nlayer: Service\ncomponent: CourseService\nstatus: draft\nversion: '1.0'\ncomponentType: Service\npriority: High\nlastUpdated: 2026-01-01\n---\n# CourseService\n",
    );
    for s in sections {
        out.push_str(&format!("\n## {}\n\nAbout {}.\n", s, s));
    }
    out
}

#[test]
fn validate_exit_codes_follow_the_verdict() {
    let tmp = tempdir().expect("tempdir");
    let good = tmp.path().join("Good.md");
    let bad = tmp.path().join("Bad.md");
    fs::write(&good, document(LEAN)).unwrap();
    fs::write(&bad, document(&LEAN[..5])).unwrap();

    let ok = run_akr(tmp.path(), &["validate", "Good.md", "--template", TEMPLATE]);
    assert_eq!(code(&ok), 0, "{}", String::from_utf8_lossy(&ok.stderr));
    assert!(String::from_utf8_lossy(&ok.stdout).contains("VALID"));

    let invalid = run_akr(tmp.path(), &["validate", "Good.md", "Bad.md", "--template", TEMPLATE]);
    assert_eq!(code(&invalid), 1);
    let text = String::from_utf8_lossy(&invalid.stdout);
    assert!(text.contains("INVALID"));
    assert!(text.contains("BLOCKER"));
}

#[test]
fn validate_json_carries_the_report() {
    let tmp = tempdir().expect("tempdir");
    fs::write(tmp.path().join("Bad.md"), document(&LEAN[1..])).unwrap();

    let out = run_akr(
        tmp.path(),
        &["validate", "Bad.md", "--template", TEMPLATE, "--format", "json"],
    );
    assert_eq!(code(&out), 1);
    let report = stdout_json(&out);
    assert_eq!(report["document"], "Bad.md");
    assert_eq!(report["valid"], false);
    assert_eq!(report["tier"], "TIER_2");
    let violations = report["violations"].as_array().expect("violations array");
    assert!(violations.iter().any(|v| v["type"] == "missing_section"
        && v["severity"] == "BLOCKER"), "{:?}", violations);
    assert!(report["retryPrompt"].as_str().unwrap_or_default().contains("Quick Reference"));

    fs::write(tmp.path().join("Good.md"), document(LEAN)).unwrap();
    let out = run_akr(
        tmp.path(),
        &["validate", "Good.md", "Bad.md", "--template", TEMPLATE, "--format", "json"],
    );
    let many = stdout_json(&out);
    assert_eq!(many.as_array().map(Vec::len), Some(2));
    assert_eq!(many[0]["valid"], true);
}

#[test]
fn auto_fix_flag_reports_corrected_markdown() {
    let tmp = tempdir().expect("tempdir");
    let body: String = LEAN.iter().map(|s| format!("## {}\n\ntext\n\n", s)).collect();
    fs::write(tmp.path().join("CourseService.md"), format!("# CourseService\n\n{}", body)).unwrap();

    let out = run_akr(
        tmp.path(),
        &["validate", "CourseService.md", "--template", TEMPLATE, "--auto-fix", "--format", "json"],
    );
    assert_eq!(code(&out), 0, "{}", String::from_utf8_lossy(&out.stderr));
    let report = stdout_json(&out);
    assert_eq!(report["autoFixed"][0], "yaml_frontmatter");
    assert!(report["correctedMarkdown"].as_str().unwrap().contains("component: CourseService"));
    // validate never writes.
    assert!(!fs::read_to_string(tmp.path().join("CourseService.md")).unwrap().starts_with("---"));
}

#[test]
fn usage_io_and_config_errors_have_distinct_codes() {
    let tmp = tempdir().expect("tempdir");

    let usage = run_akr(tmp.path(), &["validate", "--template", TEMPLATE]);
    assert_eq!(code(&usage), 2);
    let unknown = run_akr(tmp.path(), &["frobnicate"]);
    assert_eq!(code(&unknown), 2);

    let missing = run_akr(tmp.path(), &["validate", "Nope.md", "--template", TEMPLATE]);
    assert_eq!(code(&missing), 3);

    fs::create_dir_all(tmp.path().join(".akr")).unwrap();
    fs::write(tmp.path().join(".akr/config.toml"), "[enforcement]\nenabled = true\n").unwrap();
    fs::write(tmp.path().join("Good.md"), document(LEAN)).unwrap();
    let bad_config = run_akr(tmp.path(), &["validate", "Good.md", "--template", TEMPLATE]);
    assert_eq!(code(&bad_config), 4);
    assert!(String::from_utf8_lossy(&bad_config.stderr).contains("validationStrictness"));

    let help = run_akr(tmp.path(), &["--help"]);
    assert_eq!(code(&help), 0);
}

#[test]
fn sections_lists_the_baseline() {
    let tmp = tempdir().expect("tempdir");
    let out = run_akr(tmp.path(), &["sections", TEMPLATE, "--format", "json"]);
    assert_eq!(code(&out), 0);
    let json = stdout_json(&out);
    assert_eq!(json["cmd"], "sections");
    assert_eq!(json["status"], "ok");
    let names: Vec<&str> = json["sections"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, LEAN);

    let text = run_akr(tmp.path(), &["sections", "table_template"]);
    assert!(String::from_utf8_lossy(&text.stdout).starts_with(" 1. "));
}

#[test]
fn write_without_process_permission_is_denied() {
    let tmp = tempdir().expect("tempdir");
    let repo = tmp.path().to_str().unwrap();
    let content = document(LEAN);

    let out = run_akr(
        tmp.path(),
        &[
            "write", "--repo", repo, "--doc", "docs/CourseService.md", "--content", &content,
            "--template", TEMPLATE, "--allow-writes", "--mode", "direct-commit",
        ],
    );
    assert_eq!(code(&out), 1);
    let result = stdout_json(&out);
    assert_eq!(result["success"], false);
    assert_eq!(result["errorType"], "PERMISSION_DENIED");
    assert!(!tmp.path().join("docs/CourseService.md").exists());
}

#[test]
fn dry_run_write_previews_when_writes_are_enabled() {
    let tmp = tempdir().expect("tempdir");
    let repo = tmp.path().to_str().unwrap();
    let content = document(LEAN);

    let out = Command::new(env!("CARGO_BIN_EXE_akr"))
        .args([
            "write", "--repo", repo, "--doc", "docs/CourseService.md", "--content", &content,
            "--template", TEMPLATE, "--allow-writes",
        ])
        .env("AKR_ALLOW_WRITES", "1")
        .output()
        .expect("run akr");
    assert_eq!(code(&out), 0, "{}", String::from_utf8_lossy(&out.stderr));
    let result = stdout_json(&out);
    assert_eq!(result["mode"], "dry-run");
    assert!(result["preview"].as_str().unwrap().contains("akr:provenance"));
    assert!(!tmp.path().join("docs").exists());
}

#[test]
fn scaffold_dry_run_prints_a_valid_skeleton() {
    let tmp = tempdir().expect("tempdir");
    let out = run_akr(
        tmp.path(),
        &["scaffold", "--template", TEMPLATE, "--component", "CourseService", "--dry-run"],
    );
    assert_eq!(code(&out), 0);
    let text = String::from_utf8_lossy(&out.stdout);
    assert!(text.contains("would-write: CourseService.md"));
    assert!(text.contains("## Questions & Gaps"));
    assert!(!tmp.path().join("CourseService.md").exists());

    let unknown = run_akr(tmp.path(), &["scaffold", "--template", "nope", "--component", "X"]);
    assert_eq!(code(&unknown), 4);
}

#[test]
fn rpc_reports_unknown_tools() {
    let tmp = tempdir().expect("tempdir");
    let out = run_akr(tmp.path(), &["rpc", "--op", "get_template_sections", "--params", r#"{"template":"table_template"}"#]);
    assert_eq!(code(&out), 0);
    let resp = stdout_json(&out);
    assert_eq!(resp["success"], true);
    assert_eq!(resp["result"]["sections"].as_array().map(Vec::len), Some(8));

    let out = run_akr(tmp.path(), &["rpc", "--op", "nope"]);
    assert_eq!(code(&out), 1);
    assert_eq!(stdout_json(&out)["error"]["code"], "UNKNOWN_OP");
}
