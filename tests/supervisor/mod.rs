//! Supervisor module tests.

mod runner_test;

/// Verify all public supervisor types are exported from the library.
#[test]
fn test_all_supervisor_types_exported() {
    use relaunch::config::{AttemptLimit, RunConfig};
    use relaunch::supervisor::{
        AttemptOutcome, AttemptTracker, RestartReason, RunOutcome, Supervisor, SupervisorError,
        SupervisorState, EXHAUSTED_EXIT_CODE, RESTARTING_EXIT_CODE,
    };

    let config = RunConfig::new(["true"]).unwrap().max_attempts(AttemptLimit::AtMost(1));
    let _ = Supervisor::new(config);
    let _ = AttemptTracker::new();

    let _: fn(std::io::Error) -> SupervisorError = SupervisorError::Wait;
    let _ = AttemptOutcome::Restart(RestartReason::Unreported);
    let _ = SupervisorState::Idle;
    assert_eq!(
        RunOutcome::Exhausted { attempts: 1 }.exit_code(),
        EXHAUSTED_EXIT_CODE
    );
    assert_eq!(
        RunOutcome::Interrupted { attempts: 1 }.exit_code(),
        RESTARTING_EXIT_CODE
    );
}
