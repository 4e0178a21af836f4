//! Run the demo binaries end to end

use std::process::Command;

#[test]
fn test_pipe_passes_every_value() {
    let output = Command::new(env!("CARGO_BIN_EXE_pipe"))
        .args(["--count", "5000"])
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("passed 5000 values (sum 12497500)"), "{}", stdout);
}

#[test]
fn test_sleep_reports_success() {
    let output = Command::new(env!("CARGO_BIN_EXE_sleep"))
        .args(["--millis", "20", "--tasks", "3"])
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("3 x 20ms took"));
}

#[test]
fn test_errors_exit_nonzero() {
    let output = Command::new(env!("CARGO_BIN_EXE_sleep"))
        .args(["--tasks", "not-a-number"])
        .output()
        .unwrap();

    assert!(!output.status.success());
}
