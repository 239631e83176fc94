use std::{
    io::Write,
    path::Path,
    process::{Command, Output, Stdio},
};

fn geocoin(arguments: &[&str], input: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_geocoin"))
        .args(arguments)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to launch the geocoin binary");
    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(input.as_bytes())
        .expect("input written");
    let output = child.wait_with_output().expect("binary finishes");
    assert!(
        output.status.success(),
        "geocoin {arguments:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).expect("utf-8 output")
}

fn state_argument(path: &Path) -> String {
    path.to_str().expect("utf-8 path").to_owned()
}

#[test]
fn look_draws_window_centred_on_player() {
    let text = stdout(&geocoin(&["--ephemeral", "--seed", "24301", "look"], ""));
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines.len(), 18);
    assert!(lines[..17].iter().all(|row| row.split(' ').count() == 17));
    assert_eq!(lines[8].split(' ').nth(8), Some("@"));
    assert_eq!(text.matches('@').count(), 1);
    assert!(lines[17].starts_with("cell 0,0 "));
}

#[test]
fn played_moves_survive_a_restart() {
    let directory = tempfile::tempdir().expect("temporary directory");
    let state = state_argument(&directory.path().join("save.json"));

    let played = stdout(&geocoin(&["--state", &state, "play"], "e\nquit\n"));
    assert!(played.starts_with("Welcome to Geocoin."));

    let looked = stdout(&geocoin(&["--state", &state, "look"], ""));
    let status = looked.lines().last().expect("status line");
    assert!(status.starts_with("cell 0,1 "), "unexpected status `{status}`");
}

#[test]
fn export_imports_into_another_save() {
    let directory = tempfile::tempdir().expect("temporary directory");
    let source = state_argument(&directory.path().join("source.json"));
    let target = state_argument(&directory.path().join("target.json"));

    let _ = geocoin(&["--state", &source, "play"], "n\nn\nquit\n");
    let exported = stdout(&geocoin(&["--state", &source, "export"], ""));
    let payload = exported.trim();
    assert!(payload.starts_with("geocoin:v1:"));

    let _ = geocoin(&["--state", &target, "import", payload], "");
    let looked = stdout(&geocoin(&["--state", &target, "look"], ""));
    let status = looked.lines().last().expect("status line");
    assert!(status.starts_with("cell 2,0 "), "unexpected status `{status}`");
}

#[test]
fn rejected_import_is_reported() {
    let text = stdout(&geocoin(&["--ephemeral", "import", "geocoin:v1:***"], ""));
    assert!(text.contains("import failed"));
}
