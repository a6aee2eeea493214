//! End-to-end tests of the `relaunch` binary.

use std::io::{Read, Write};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::Duration;

fn run_relaunch(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_relaunch"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute relaunch")
}

#[test]
fn help_lists_trigger_flags() {
    let output = run_relaunch(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    for flag in ["--max-attempts", "--codes", "--strings", "--patterns", "--verbose"] {
        assert!(stdout.contains(flag), "Expected {flag} in help");
    }
}

#[test]
fn help_documents_exit_status() {
    let output = run_relaunch(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("Exit status"));
    assert!(stdout.contains("130 when interrupted"));
}

#[test]
fn command_is_required() {
    let output = run_relaunch(&[]);
    assert!(!output.status.success());
}

#[test]
fn exit_code_and_stdout_pass_through() {
    let output = run_relaunch(&["sh", "-c", "echo hello; echo oops >&2; exit 3"]);

    assert_eq!(output.status.code(), Some(3));
    assert_eq!(output.stdout, b"hello\n");
    assert_eq!(output.stderr, b"oops\n");
}

#[test]
fn stdin_is_forwarded_to_child() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_relaunch"))
        .args(["cat"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("Failed to spawn relaunch");

    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"line one\nline two\n")
        .unwrap();

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    assert_eq!(output.stdout, b"line one\nline two\n");
}

#[test]
fn missing_binary_is_fatal() {
    let output = run_relaunch(&["definitely-not-a-real-binary-xyz"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr.contains("Unable to find binary: definitely-not-a-real-binary-xyz"));
}

#[test]
fn invalid_pattern_is_fatal() {
    let output = run_relaunch(&["-p", "(", "true"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr.contains("Invalid trigger pattern"));
}

#[cfg(unix)]
#[test]
fn exhausted_attempts_return_sentinel() {
    let output = run_relaunch(&["-a", "2", "-c", "9", "sh", "-c", "exit 9"]);
    let expected = relaunch::supervisor::EXHAUSTED_EXIT_CODE & 0xff;

    assert_eq!(output.status.code(), Some(expected));
}

#[test]
fn verbose_prints_attempt_banners() {
    let output = run_relaunch(&["-v", "-a", "2", "-s", "FAIL", "sh", "-c", "echo FAIL"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(stderr.contains("attempt"));
    assert!(stderr.contains("2/2"));
    assert!(stderr.contains("Out of restart attempts; tried 2 times"));
    // Child output is still forwarded on every attempt.
    assert_eq!(output.stdout, b"FAIL\nFAIL\n");
}

/// Start relaunch with piped stdout and read it only after `delay`.
fn read_slowly(args: &[&str], delay: Duration) -> (Vec<u8>, Option<i32>) {
    let mut child: Child = Command::new(env!("CARGO_BIN_EXE_relaunch"))
        .args(args)
        .env_remove("RUST_LOG")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn relaunch");

    thread::sleep(delay);
    let mut stdout = Vec::new();
    child
        .stdout
        .take()
        .unwrap()
        .read_to_end(&mut stdout)
        .unwrap();
    let status = child.wait().unwrap();
    (stdout, status.code())
}

#[cfg(unix)]
#[test]
fn slow_reader_receives_all_output_after_exit() {
    let (stdout, code) = read_slowly(
        &[
            "--drain-timeout-ms",
            "200",
            "sh",
            "-c",
            "yes abcdefghi | head -c 100000; exit 0",
        ],
        Duration::from_secs(1),
    );

    assert_eq!(stdout.len(), 100_000);
    assert_eq!(code, Some(0));
}

#[cfg(unix)]
#[test]
fn trigger_after_large_output_is_seen_by_slow_reader() {
    let (stdout, code) = read_slowly(
        &[
            "--drain-timeout-ms",
            "200",
            "-a",
            "1",
            "-s",
            "FAIL",
            "sh",
            "-c",
            "yes abcdefghi | head -c 100000; echo; echo FAIL; exit 0",
        ],
        Duration::from_secs(1),
    );

    assert!(stdout.ends_with(b"FAIL\n"));
    assert_eq!(
        code,
        Some(relaunch::supervisor::EXHAUSTED_EXIT_CODE & 0xff)
    );
}

#[cfg(unix)]
#[test]
fn interrupt_exits_with_sigint_status() {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let mut child = Command::new(env!("CARGO_BIN_EXE_relaunch"))
        .args(["sleep", "30"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn relaunch");

    // Give the Ctrl-C handler time to install.
    thread::sleep(Duration::from_millis(500));
    let pid = Pid::from_raw(i32::try_from(child.id()).unwrap());
    kill(pid, Signal::SIGINT).unwrap();

    assert_eq!(child.wait().unwrap().code(), Some(130));
}
