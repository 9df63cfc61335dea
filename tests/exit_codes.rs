use std::fs;
use std::process::Command;

fn lockbalance_bin() -> std::path::PathBuf {
    std::env::var("CARGO_BIN_EXE_lockbalance")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| {
            let mut path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
            path.push("target");
            path.push("debug");
            path.push("lockbalance");
            if cfg!(windows) {
                path.set_extension("exe");
            }
            path
        })
}

#[test]
fn missing_input_file_exits_with_operational_failure() {
    let output = Command::new(lockbalance_bin())
        .arg("--input")
        .arg("missing.c")
        .arg("--quiet")
        .output()
        .expect("run lockbalance");

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn clean_source_file_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("clean.c");
    fs::write(
        &file,
        r#"
            void f(void) {
                mtx_enter(&m);
                mtx_leave(&m);
            }
        "#,
    )
    .unwrap();

    let output = Command::new(lockbalance_bin())
        .arg("--input")
        .arg(&file)
        .arg("--quiet")
        .output()
        .expect("run lockbalance");

    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn unbalanced_source_file_exits_with_diagnostics_found() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("unbalanced.c");
    fs::write(
        &file,
        r#"
            void f(void) {
                mtx_enter(&m);
            }
        "#,
    )
    .unwrap();

    let output = Command::new(lockbalance_bin())
        .arg("--input")
        .arg(&file)
        .arg("--quiet")
        .output()
        .expect("run lockbalance");

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn diagnostic_output_names_the_file_and_function() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("unbalanced.c");
    fs::write(
        &file,
        r#"
            void leaky(void) {
                mtx_enter(&m);
            }
        "#,
    )
    .unwrap();

    let output = Command::new(lockbalance_bin())
        .arg("--input")
        .arg(&file)
        .output()
        .expect("run lockbalance");

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("leaky"));
    assert!(stdout.contains("EndOfFunction"));
}

#[test]
fn families_filter_rejects_an_unknown_family_name() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("clean.c");
    fs::write(&file, "void f(void) {}").unwrap();

    let output = Command::new(lockbalance_bin())
        .arg("--input")
        .arg(&file)
        .arg("--families")
        .arg("nonexistent")
        .output()
        .expect("run lockbalance");

    assert_eq!(output.status.code(), Some(2));
}
