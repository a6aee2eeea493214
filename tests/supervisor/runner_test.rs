//! Integration tests for the restart loop, driving real `sh` children.

use std::path::Path;
use std::time::{Duration, Instant};

use relaunch::config::RunConfig;
use relaunch::process::SpawnError;
use relaunch::supervisor::{
    RunOutcome, Supervisor, SupervisorError, SupervisorState, EXHAUSTED_EXIT_CODE,
};
use relaunch::trigger::TriggerSet;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const NO_STRINGS: &[&str] = &[];

fn sh(script: &str) -> RunConfig {
    RunConfig::new(["sh", "-c", script]).unwrap()
}

/// Script that runs `first` on its first invocation and exits 0 afterwards.
fn first_run_only(marker: &Path, first: &str) -> String {
    let marker = marker.display();
    format!("if [ -f '{marker}' ]; then exit 0; fi; touch '{marker}'; {first}")
}

fn strings(items: &[&str]) -> TriggerSet {
    TriggerSet::compile(&[], items, NO_STRINGS).unwrap()
}

fn patterns(items: &[&str]) -> TriggerSet {
    TriggerSet::compile(&[], NO_STRINGS, items).unwrap()
}

async fn run(config: RunConfig) -> RunOutcome {
    Supervisor::new(config).run().await.unwrap()
}

#[tokio::test]
async fn no_triggers_returns_child_code_after_one_attempt() {
    for limit in [-1, 1, 5] {
        let outcome = run(sh("exit 4").max_attempts(limit)).await;
        assert_eq!(outcome, RunOutcome::Exited { code: 4, attempts: 1 });
        assert_eq!(outcome.exit_code(), 4);
    }
}

#[tokio::test]
async fn clean_exit_with_single_attempt() {
    for verbose in [false, true] {
        let outcome = run(sh("exit 0").max_attempts(1).verbose(verbose)).await;
        assert_eq!(outcome, RunOutcome::Exited { code: 0, attempts: 1 });
    }
}

#[tokio::test]
async fn code_trigger_exhausts_attempts() {
    for k in [1_i32, 3] {
        let config = sh("exit 7")
            .max_attempts(k)
            .triggers(TriggerSet::compile(&[7], NO_STRINGS, NO_STRINGS).unwrap());

        let outcome = run(config).await;
        assert_eq!(outcome, RunOutcome::Exhausted { attempts: k.unsigned_abs() });
        assert_eq!(outcome.exit_code(), EXHAUSTED_EXIT_CODE);
    }
}

#[tokio::test]
async fn line_trigger_exhausts_attempts() {
    let config = sh("echo FAIL; exit 0")
        .max_attempts(2)
        .triggers(strings(&["FAIL"]));

    assert_eq!(run(config).await, RunOutcome::Exhausted { attempts: 2 });
}

#[tokio::test]
async fn code_trigger_retry_succeeds() {
    let dir = TempDir::new().unwrap();
    let script = first_run_only(&dir.path().join("marker"), "exit 1");
    let config = sh(&script)
        .max_attempts(2)
        .triggers(TriggerSet::compile(&[1], NO_STRINGS, NO_STRINGS).unwrap());

    assert_eq!(run(config).await, RunOutcome::Exited { code: 0, attempts: 2 });
}

#[tokio::test]
async fn string_trigger_retry_succeeds() {
    let dir = TempDir::new().unwrap();
    let script = first_run_only(&dir.path().join("marker"), "echo FAIL; exit 1");
    let config = sh(&script).max_attempts(2).triggers(strings(&["FAIL"]));

    assert_eq!(run(config).await, RunOutcome::Exited { code: 0, attempts: 2 });
}

#[tokio::test]
async fn pattern_trigger_retry_succeeds() {
    let dir = TempDir::new().unwrap();
    let script = first_run_only(&dir.path().join("marker"), "echo FAIL; exit 1");
    let config = sh(&script).max_attempts(2).triggers(patterns(&["F.I."]));

    assert_eq!(run(config).await, RunOutcome::Exited { code: 0, attempts: 2 });
}

#[tokio::test]
async fn unmatched_pattern_returns_real_code() {
    let config = sh("exit 1").max_attempts(2).triggers(patterns(&["F.I."]));
    assert_eq!(run(config).await, RunOutcome::Exited { code: 1, attempts: 1 });
}

#[tokio::test]
async fn bracketed_substring_is_literal() {
    let dir = TempDir::new().unwrap();
    let script = first_run_only(&dir.path().join("marker"), "echo T; exit 3");

    let literal = sh(&script).max_attempts(2).triggers(strings(&["[Test]"]));
    assert_eq!(run(literal).await, RunOutcome::Exited { code: 3, attempts: 1 });
}

#[tokio::test]
async fn bracketed_pattern_is_character_class() {
    let dir = TempDir::new().unwrap();
    let script = first_run_only(&dir.path().join("marker"), "echo T; exit 3");

    let class = sh(&script).max_attempts(2).triggers(patterns(&["[Test]"]));
    assert_eq!(run(class).await, RunOutcome::Exited { code: 0, attempts: 2 });
}

#[tokio::test]
async fn stderr_lines_are_monitored() {
    let dir = TempDir::new().unwrap();
    let script = first_run_only(&dir.path().join("marker"), "echo FAIL >&2; exit 0");
    let config = sh(&script).max_attempts(3).triggers(strings(&["FAIL"]));

    assert_eq!(run(config).await, RunOutcome::Exited { code: 0, attempts: 2 });
}

#[tokio::test]
async fn last_line_before_clean_exit_still_triggers() {
    let dir = TempDir::new().unwrap();
    let script = first_run_only(&dir.path().join("marker"), "printf FAIL; exit 0");
    let config = sh(&script).max_attempts(2).triggers(strings(&["FAIL"]));

    assert_eq!(run(config).await, RunOutcome::Exited { code: 0, attempts: 2 });
}

#[tokio::test]
async fn running_child_is_killed_on_match() {
    let dir = TempDir::new().unwrap();
    let script = first_run_only(&dir.path().join("marker"), "echo FAIL; exec sleep 30");
    let config = sh(&script).max_attempts(2).triggers(strings(&["FAIL"]));

    let started = Instant::now();
    let outcome = tokio::time::timeout(Duration::from_secs(10), run(config))
        .await
        .expect("restart should not wait for the child to finish");

    assert_eq!(outcome, RunOutcome::Exited { code: 0, attempts: 2 });
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn drain_does_not_wait_for_inherited_pipes() {
    // The background sleep keeps the output pipes open after sh exits.
    let config = sh("(sleep 5 &); exit 5")
        .max_attempts(1)
        .triggers(strings(&["FAIL"]))
        .drain_timeout(Duration::from_millis(100));

    let outcome = tokio::time::timeout(Duration::from_secs(4), run(config))
        .await
        .expect("drain should time out");
    assert_eq!(outcome, RunOutcome::Exited { code: 5, attempts: 1 });
}

#[tokio::test]
async fn unresolvable_executable_is_fatal_before_any_attempt() {
    let config = RunConfig::new(["definitely-not-a-real-binary-xyz", "--flag"]).unwrap();
    let mut supervisor = Supervisor::new(config);

    let err = supervisor.run().await.unwrap_err();
    assert!(matches!(
        err,
        SupervisorError::Spawn(SpawnError::NotFound { .. })
    ));
    assert_eq!(supervisor.stats().attempts, 0);
    assert_eq!(supervisor.state(), SupervisorState::Idle);
}

#[tokio::test]
async fn cancellation_stops_live_child() {
    let cancel = CancellationToken::new();
    let mut supervisor = Supervisor::new(sh("exec sleep 30")).with_cancellation(cancel.clone());

    let trigger = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
    });

    let outcome = tokio::time::timeout(Duration::from_secs(10), supervisor.run())
        .await
        .expect("cancellation should end the run")
        .unwrap();
    trigger.await.unwrap();

    assert_eq!(outcome, RunOutcome::Interrupted { attempts: 1 });
    assert_eq!(supervisor.state(), SupervisorState::Concluding);
}

#[tokio::test]
async fn repeated_runs_are_identical() {
    let config = sh("echo hello; exit 2")
        .max_attempts(3)
        .triggers(strings(&["FAIL"]));
    let mut supervisor = Supervisor::new(config);

    let first = supervisor.run().await.unwrap();
    let second = supervisor.run().await.unwrap();

    assert_eq!(first, RunOutcome::Exited { code: 2, attempts: 1 });
    assert_eq!(first, second);
    assert_eq!(supervisor.stats().attempts, 1);
}

#[tokio::test]
async fn restarts_are_counted() {
    let config = sh("exit 9")
        .max_attempts(3)
        .triggers(TriggerSet::compile(&[9], NO_STRINGS, NO_STRINGS).unwrap());
    let mut supervisor = Supervisor::new(config);

    supervisor.run().await.unwrap();
    let stats = supervisor.stats();
    assert_eq!(stats.attempts, 3);
    assert_eq!(stats.restarts, 3);
}
