use std::io::Write;
use std::process::Output;

use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;

fn file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn quay(args: &[&str]) -> Output {
    test_bin::get_test_bin("quay").env("RUST_LOG", "warn").args(args).output().unwrap()
}

const CONFIG: &str = r#"
[settings]
default_layout = "split_horizontal"

[keys]
"super+l" = "focus right"
"#;

#[test]
fn check_accepts_a_valid_config() {
    let config = file(CONFIG);
    let out = quay(&["check", "--config", config.path().to_str().unwrap()]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!("Config validation passed\n", String::from_utf8_lossy(&out.stdout));
}

#[test]
fn check_reports_issues() {
    let config = file(
        r#"
        [keys]
        "super+q" = "close"
        "Super + Q" = "quit"
        "super+x" = "frobnicate"
        "#,
    );
    let out = quay(&["check", "--config", config.path().to_str().unwrap()]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("binds `super+q` more than once"), "{stderr}");
    assert!(stderr.contains("super+x"), "{stderr}");
}

#[test]
fn run_prints_the_snapshot() {
    let config = file(CONFIG);
    let script = file(
        "# two terminals side by side\n\
         add foot\n\
         add foot\n\
         key super+l\n\
         commit 2\n\
         focus workspace \"web\"\n\
         focus workspace back-and-forth\n",
    );
    let out = quay(&[
        "run",
        script.path().to_str().unwrap(),
        "--config",
        config.path().to_str().unwrap(),
        "--format",
        "json",
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let snapshot: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!("0", snapshot["focused_workspace"]);
    let workspaces = snapshot["workspaces"].as_array().unwrap();
    assert_eq!(1, workspaces.len(), "the empty workspace was reclaimed");
    let children = workspaces[0]["children"].as_array().unwrap();
    assert_eq!(2, children.len());
    assert_eq!(snapshot["focus"], children[1]["surface"]["state"]["id"]);
    assert_eq!(960, children[1]["surface"]["state"]["geometry"]["x"]);
}

#[test]
fn run_stops_at_a_bad_line() {
    let script = file("add foot\nfocus sideways\n");
    let out = quay(&["run", script.path().to_str().unwrap()]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains(":2"), "{stderr}");
}
