use crate::harness::Scenario;
use evmatch_core::{Phase, Status};

#[test]
fn test_no_leak_passes_both_phases() {
    Scenario::new("no_leak")
        .with_resources("asterisk-1", &["5", "6"])
        .with_snapshot_pair("fds")
        .evaluates_pre_checks()
        .assert_phase_status(Phase::Pre, Status::Passed)
        .evaluates_post_checks()
        .assert_phase_status(Phase::Post, Status::Passed)
        .assert_phase_counts(Phase::Post, 1, 0)
        .assert_stop_requests(0)
        .assert_not_stopped()
        .run()
        .unwrap();
}

#[test]
fn test_leaked_resource_fails_and_stops() {
    Scenario::new("leaked_resource")
        .with_resources("asterisk-1", &["5", "6"])
        .with_snapshot_pair("fds")
        .evaluates_pre_checks()
        .resources_become("asterisk-1", &["5", "6", "7"])
        .evaluates_post_checks()
        .assert_phase_status(Phase::Post, Status::Failed)
        .assert_failed()
        .assert_reason_contains("failed to find [7] on instance [asterisk-1] in pre-test check")
        .assert_reason_count(1)
        .assert_stop_requests(1)
        .assert_stopped()
        .run()
        .unwrap();
}

#[test]
fn test_released_resource_is_reported() {
    Scenario::new("released_resource")
        .with_resources("asterisk-1", &["5", "6"])
        .with_snapshot_pair("fds")
        .evaluates_pre_checks()
        .resources_become("asterisk-1", &["5"])
        .evaluates_post_checks()
        .assert_failed()
        .assert_reason_contains("failed to find [6] on instance [asterisk-1] in post-test check")
        .run()
        .unwrap();
}

#[test]
fn test_instance_changes_are_reported() {
    Scenario::new("instance_changes")
        .with_resources("asterisk-1", &["5"])
        .with_snapshot_pair("fds")
        .evaluates_pre_checks()
        .instance_goes_away("asterisk-1")
        .resources_become("asterisk-2", &["5"])
        .evaluates_post_checks()
        .assert_failed()
        .assert_reason_contains("instance [asterisk-1] in pre-test check not found in post-test check")
        .assert_reason_contains("instance [asterisk-2] in post-test check not found in pre-test check")
        .assert_reason_count(2)
        .run()
        .unwrap();
}

#[test]
fn test_gated_pair_skipped_without_capability() {
    Scenario::new("gated_pair_skipped")
        .with_resources("asterisk-1", &["5"])
        .with_gated_snapshot_pair("fds", "DEBUG_FD_LEAKS")
        .evaluates_pre_checks()
        .assert_phase_counts(Phase::Pre, 0, 1)
        .resources_become("asterisk-1", &["5", "9"])
        .evaluates_post_checks()
        .assert_phase_counts(Phase::Post, 0, 1)
        .assert_phase_status(Phase::Post, Status::Inconclusive)
        .assert_inconclusive()
        .assert_stop_requests(0)
        .run()
        .unwrap();
}

#[test]
fn test_gated_pair_runs_with_capability() {
    Scenario::new("gated_pair_runs")
        .with_resources("asterisk-1", &["5"])
        .with_gated_snapshot_pair("fds", "DEBUG_FD_LEAKS")
        .with_capability("DEBUG_FD_LEAKS")
        .evaluates_pre_checks()
        .assert_phase_counts(Phase::Pre, 1, 0)
        .resources_become("asterisk-1", &["5", "9"])
        .evaluates_post_checks()
        .assert_phase_counts(Phase::Post, 1, 0)
        .assert_failed()
        .run()
        .unwrap();
}

#[test]
fn test_capability_from_config() {
    Scenario::new("capability_from_config")
        .with_toml(
            r#"
[capabilities]
DEBUG_FD_LEAKS = "1"
"#,
        )
        .with_resources("asterisk-1", &["5"])
        .with_gated_snapshot_pair("fds", "DEBUG_FD_LEAKS")
        .evaluates_pre_checks()
        .evaluates_post_checks()
        .assert_phase_counts(Phase::Post, 1, 0)
        .assert_phase_status(Phase::Post, Status::Passed)
        .run()
        .unwrap();
}

#[test]
fn test_unpaired_post_condition_fails() {
    Scenario::new("unpaired_post")
        .with_resources("asterisk-1", &["5"])
        .with_unpaired_post("fds")
        .evaluates_pre_checks()
        .assert_phase_counts(Phase::Pre, 0, 0)
        .evaluates_post_checks()
        .assert_failed()
        .assert_reason_contains("no pre-test snapshot provided")
        .assert_stopped()
        .run()
        .unwrap();
}

#[test]
fn test_post_checks_follow_streaming_verdict() {
    Scenario::new("streaming_then_post")
        .with_toml(
            r#"
[conditions]
conditions = ["hello"]
"#,
        )
        .with_resources("asterisk-1", &["5"])
        .with_snapshot_pair("fds")
        .evaluates_pre_checks()
        .sends_text("hello")
        .stream_ends()
        .assert_passed()
        .resources_become("asterisk-1", &["5", "8"])
        .evaluates_post_checks()
        .assert_failed()
        .assert_reason_count(1)
        .run()
        .unwrap();
}
