//! End-to-end runs driven by YAML configuration

use assert_matches::assert_matches;
use spotcheck_core::output::OutputWriter;
use spotcheck_core::{run, run_sync, Error, FileOutcome, Mode, RunReport, SpotConfig};
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn set_file(root: &Path, rel: &str, content: impl AsRef<[u8]>) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn outcome<'r>(report: &'r RunReport, path: &str) -> Option<&'r FileOutcome> {
    report.files().find(|f| f.path == path).map(|f| &f.outcome)
}

const TEXT_CONFIG: &str = r#"
line_endings: unix
concurrency: 2
formats:
  - name: text
    includes: ["**/*.txt"]
    excludes: ["vendor/**"]
    lint_suppressions:
      - path: legacy.txt
    steps:
      - type: trim_trailing_whitespace
      - type: end_with_newline
      - type: indent
        style: space
        spaces_per_tab: 2
        only: ["src/**"]
      - type: lint_regex
        name: noTodo
        regex: "TODO"
        detail: leftover marker
"#;

fn text_tree() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    set_file(root, "clean.txt", "ok\n");
    set_file(root, "messy.txt", "a  \nb\t\n\n\n");
    set_file(root, "src/tabs.txt", "\tx\n");
    set_file(root, "tabs.txt", "\tx\n");
    set_file(root, "todo.txt", "TODO here\n");
    set_file(root, "legacy.txt", "TODO\n");
    set_file(root, "vendor/x.txt", "trailing   \n");
    set_file(root, "notes.md", "trailing   \n");
    temp
}

#[tokio::test]
async fn test_check_reports_every_kind_of_file() {
    let temp = text_tree();
    let config = SpotConfig::from_yaml(TEXT_CONFIG).unwrap();
    let report = run(&config, temp.path(), Mode::Check).await.unwrap();

    assert!(!report.is_success());
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].files_matched, 6);
    assert_eq!(outcome(&report, "clean.txt"), Some(&FileOutcome::Clean));
    assert_eq!(outcome(&report, "tabs.txt"), Some(&FileOutcome::Clean));
    assert_eq!(outcome(&report, "legacy.txt"), Some(&FileOutcome::Clean));
    assert_matches!(
        outcome(&report, "messy.txt"),
        Some(FileOutcome::Dirty { written: false, misbehaved: None, diff: Some(diff) })
            if diff.starts_with("@@ -1,4 +1,2 @@\n-a  \n")
    );
    assert_eq!(
        outcome(&report, "src/tabs.txt"),
        Some(&FileOutcome::Dirty {
            written: false,
            misbehaved: None,
            diff: Some("@@ -1 +1 @@\n-\tx\n+  x\n".to_string()),
        })
    );
    assert_eq!(
        outcome(&report, "todo.txt"),
        Some(&FileOutcome::Lints {
            detail: "todo.txt:1 TODO(noTodo) leftover marker".to_string()
        })
    );
    assert_eq!(outcome(&report, "vendor/x.txt"), None);
    assert_eq!(outcome(&report, "notes.md"), None);

    // check never writes
    assert_eq!(
        fs::read_to_string(temp.path().join("messy.txt")).unwrap(),
        "a  \nb\t\n\n\n"
    );
}

#[test]
fn test_apply_then_check_is_stable() {
    let temp = text_tree();
    fs::remove_file(temp.path().join("todo.txt")).unwrap();
    let config = SpotConfig::from_yaml(TEXT_CONFIG).unwrap();

    let applied = run_sync(&config, temp.path(), Mode::Apply).unwrap();
    assert!(applied.is_success());
    assert_eq!(
        outcome(&applied, "messy.txt"),
        Some(&FileOutcome::dirty(true))
    );
    assert_eq!(fs::read_to_string(temp.path().join("messy.txt")).unwrap(), "a\nb\n");
    assert_eq!(fs::read_to_string(temp.path().join("src/tabs.txt")).unwrap(), "  x\n");
    assert_eq!(fs::read_to_string(temp.path().join("tabs.txt")).unwrap(), "\tx\n");
    assert_eq!(
        fs::read_to_string(temp.path().join("vendor/x.txt")).unwrap(),
        "trailing   \n"
    );

    let checked = run_sync(&config, temp.path(), Mode::Check).unwrap();
    assert!(checked.is_success());
}

#[test]
fn test_windows_endings_and_latin1() {
    let temp = TempDir::new().unwrap();
    set_file(temp.path(), "menu.txt", b"caf\xe9\n");
    let config = SpotConfig::from_yaml(
        r#"
line_endings: windows
encoding: ISO-8859-1
formats:
  - name: latin
    includes: ["*.txt"]
    steps:
      - type: replace
        target: "café"
        replacement: "CAFÉ"
"#,
    )
    .unwrap();

    let report = run_sync(&config, temp.path(), Mode::Apply).unwrap();
    assert!(report.is_success());
    assert_eq!(fs::read(temp.path().join("menu.txt")).unwrap(), b"CAF\xc9\r\n");
}

#[test]
fn test_malformed_bytes_fail_only_their_file() {
    let temp = TempDir::new().unwrap();
    set_file(temp.path(), "good.txt", "fine\n");
    set_file(temp.path(), "bad.txt", b"ok\n\xff\n");
    let config = SpotConfig::from_yaml(
        r#"
line_endings: unix
formats:
  - name: utf8
    includes: ["*.txt"]
    steps:
      - type: end_with_newline
"#,
    )
    .unwrap();

    let report = run_sync(&config, temp.path(), Mode::Check).unwrap();
    assert_eq!(outcome(&report, "good.txt"), Some(&FileOutcome::Clean));
    assert_matches!(
        outcome(&report, "bad.txt"),
        Some(FileOutcome::Failed { error }) if error.contains("line 2")
    );
}

#[test]
fn test_git_attributes_line_endings() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let status = Command::new("git")
        .args(["init", "-q"])
        .current_dir(root)
        .status()
        .unwrap();
    assert!(status.success());
    set_file(root, ".gitattributes", "*.bat eol=crlf\n*.sh eol=lf\n");
    set_file(root, "run.bat", "echo hi\n");
    set_file(root, "run.sh", "echo hi\n");

    let config = SpotConfig::from_yaml(
        r#"
formats:
  - name: scripts
    includes: ["*.bat", "*.sh"]
    steps:
      - type: trim_trailing_whitespace
"#,
    )
    .unwrap();

    let report = run_sync(&config, root, Mode::Check).unwrap();
    assert_eq!(
        outcome(&report, "run.bat"),
        Some(&FileOutcome::Dirty {
            written: false,
            misbehaved: None,
            diff: Some("@@ -1 +1 @@\n-echo hi\n+echo hi␍\n".to_string()),
        })
    );
    assert_eq!(outcome(&report, "run.sh"), Some(&FileOutcome::Clean));

    run_sync(&config, root, Mode::Apply).unwrap();
    assert_eq!(fs::read(root.join("run.bat")).unwrap(), b"echo hi\r\n");
}

const FENCE_CONFIG: &str = r#"
line_endings: unix
formats:
  - name: fenced
    includes: ["*.txt"]
    steps:
      - type: fence
        open: "spotcheck:off"
        close: "spotcheck:on"
        mode: preserve
        steps:
          - type: replace
            target: BAD
            replacement: good
"#;

#[test]
fn test_fence_preserves_marked_regions() {
    let temp = TempDir::new().unwrap();
    set_file(temp.path(), "a.txt", "BAD\nspotcheck:off BAD spotcheck:on\n");
    let config = SpotConfig::from_yaml(FENCE_CONFIG).unwrap();

    run_sync(&config, temp.path(), Mode::Apply).unwrap();
    assert_eq!(
        fs::read_to_string(temp.path().join("a.txt")).unwrap(),
        "good\nspotcheck:off BAD spotcheck:on\n"
    );
}

#[test]
fn test_fence_failure_is_a_lint_unless_excluded() {
    let temp = TempDir::new().unwrap();
    set_file(temp.path(), "a.txt", "spotcheck:off x spotcheck:on\n");
    let yaml = FENCE_CONFIG
        .replace("target: BAD", "target: \"spotcheck:on\"")
        .replace("replacement: good", "replacement: \"\"");
    let config = SpotConfig::from_yaml(&yaml).unwrap();

    let report = run_sync(&config, temp.path(), Mode::Check).unwrap();
    assert_matches!(
        outcome(&report, "a.txt"),
        Some(FileOutcome::Lints { detail })
            if detail.contains("An intermediate step removed a match of spotcheck:off spotcheck:on")
    );

    let excluded = yaml.replace(
        "    includes: [\"*.txt\"]\n",
        "    includes: [\"*.txt\"]\n    exception_policy:\n      exclude_steps: [fence]\n",
    );
    let config = SpotConfig::from_yaml(&excluded).unwrap();
    let report = run_sync(&config, temp.path(), Mode::Check).unwrap();
    assert_eq!(outcome(&report, "a.txt"), Some(&FileOutcome::Clean));
}

const PING_PONG_CONFIG: &str = r#"
line_endings: unix
formats:
  - name: swap
    includes: ["**/*.txt"]
    steps:
      - type: replace
        name: aToC
        target: A
        replacement: C
      - type: replace
        name: bToA
        target: B
        replacement: A
      - type: replace
        name: cToB
        target: C
        replacement: B
"#;

#[test]
fn test_cycling_steps_are_reported() {
    let temp = TempDir::new().unwrap();
    set_file(temp.path(), "a.txt", "B");
    set_file(temp.path(), "canonical.txt", "A");
    let config = SpotConfig::from_yaml(PING_PONG_CONFIG).unwrap();

    let report = run_sync(&config, temp.path(), Mode::Check).unwrap();
    assert_eq!(
        outcome(&report, "a.txt"),
        Some(&FileOutcome::Dirty {
            written: false,
            misbehaved: Some("cycles between 2 steps".to_string()),
            diff: Some(
                "@@ -1 +1 @@\n-B\n\\ No newline at end of file\n+A\n\\ No newline at end of file\n"
                    .to_string()
            ),
        })
    );
    // "A" is the canonical element of the cycle
    assert_eq!(outcome(&report, "canonical.txt"), Some(&FileOutcome::Clean));

    let mut text = Vec::new();
    OutputWriter::write_text_summary(&mut text, &report).unwrap();
    let text = String::from_utf8(text).unwrap();
    assert!(text.contains("  dirty      a.txt (cycles between 2 steps)\n"));
    assert!(text.ends_with("check: 1 file needs attention\n"));

    let applied = run_sync(&config, temp.path(), Mode::Apply).unwrap();
    assert_matches!(
        outcome(&applied, "a.txt"),
        Some(FileOutcome::Dirty { written: true, misbehaved: Some(_), diff: None })
    );
    assert_eq!(fs::read_to_string(temp.path().join("a.txt")).unwrap(), "A");
}

#[test]
fn test_diagnose_dir_from_config() {
    let temp = TempDir::new().unwrap();
    set_file(temp.path(), "src/a.txt", "B");
    set_file(temp.path(), "b.txt", "plain");
    let yaml = format!("diagnose_dir: build/diagnose\n{}", PING_PONG_CONFIG);
    let config = SpotConfig::from_yaml(&yaml).unwrap();

    run_sync(&config, temp.path(), Mode::Check).unwrap();
    let dir = temp.path().join("build/diagnose/swap");
    assert_eq!(fs::read_to_string(dir.join("src/a.txt.cycle0")).unwrap(), "A");
    assert_eq!(fs::read_to_string(dir.join("src/a.txt.cycle1")).unwrap(), "B");
    // well-behaved files leave nothing behind
    assert!(!dir.join("b.txt.converge0").exists());
}

#[test]
fn test_duplicate_step_names_are_a_config_error() {
    let temp = TempDir::new().unwrap();
    let config = SpotConfig::from_yaml(
        r#"
formats:
  - name: dup
    steps:
      - type: replace
        target: a
        replacement: b
      - type: replace
        target: c
        replacement: d
"#,
    )
    .unwrap();
    let err = run_sync(&config, temp.path(), Mode::Check).unwrap_err();
    assert_matches!(err, Error::Config(msg) if msg.contains("format 'dup'") && msg.contains("'replace'"));
}

#[test]
fn test_unknown_fields_are_rejected() {
    assert_matches!(
        SpotConfig::from_yaml("formats:\n  - name: x\n    inclde: [\"*.rs\"]\n"),
        Err(Error::Yaml(_))
    );
}
