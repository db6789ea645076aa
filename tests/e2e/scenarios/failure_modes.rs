use crate::harness::Scenario;

const HELLO_ONCE: &str = r#"
[conditions]
conditions = ["hello"]
"#;

#[test]
fn test_under_match_fails_at_stream_end() {
    Scenario::new("under_match")
        .with_toml(HELLO_ONCE)
        .sends_text("goodbye")
        .assert_inconclusive()
        .stream_ends()
        .assert_failed()
        .assert_reason_contains("under-match")
        .assert_reason_contains("expected between 1 and 1 matches but received 0")
        .assert_not_stopped()
        .run()
        .unwrap();
}

#[test]
fn test_over_match_fails_and_stops_immediately() {
    Scenario::new("over_match")
        .with_toml(HELLO_ONCE)
        .sends_text("hello")
        .assert_not_stopped()
        .sends_text("hello")
        .assert_failed()
        .assert_stopped()
        .assert_reason_contains("over-match")
        .assert_reason_contains("received 2")
        .stream_ends()
        // Final reconciliation is skipped once the test has failed
        .assert_reason_count(1)
        .run()
        .unwrap();
}

#[test]
fn test_fifth_match_on_bounded_range() {
    Scenario::new("fifth_match_on_range")
        .with_toml(
            r#"
[conditions]
conditions = [{ match = "hello", count = "2-4" }]
"#,
        )
        .sends_text_times("hello", 4)
        .assert_not_stopped()
        .assert_inconclusive()
        .sends_text("hello")
        .assert_stopped()
        .assert_failed()
        .assert_reason_contains("expected between 2 and 4 matches but received 5")
        .run()
        .unwrap();
}

#[test]
fn test_every_unmet_condition_is_reported() {
    Scenario::new("every_unmet_condition")
        .with_toml(
            r#"
[conditions]
conditions = ["alpha", { match = "beta", count = ">1" }, "gamma"]
"#,
        )
        .sends_text("alpha")
        .sends_text("beta")
        .stream_ends()
        .assert_failed()
        .assert_reason_contains("expected at least 2 matches but received 1")
        .assert_reason_contains("received 0")
        .run()
        .unwrap();
}

#[test]
fn test_reactor_timeout_fails_and_stops() {
    Scenario::new("reactor_timeout")
        .with_toml(HELLO_ONCE)
        .sends_text("hello")
        .wait_secs(29)
        .assert_not_stopped()
        .wait_secs(1)
        .assert_failed()
        .assert_stopped()
        .assert_stream_ended()
        .assert_reason_contains("reactor timed out after 30s")
        .run()
        .unwrap();
}

#[test]
fn test_configured_timeout() {
    Scenario::new("configured_timeout")
        .with_json(r#"{"timing": {"reactor-timeout-secs": 5}}"#)
        .wait_secs(5)
        .assert_failed()
        .assert_reason_contains("reactor timed out after 5s")
        .sends_after_end(&[("Event", "Hangup")])
        .assert_delivered(0)
        .run()
        .unwrap();
}

#[test]
fn test_event_after_stream_end_is_rejected() {
    Scenario::new("event_after_stream_end")
        .with_toml(HELLO_ONCE)
        .sends_text("hello")
        .stream_ends()
        .assert_passed()
        .sends_after_end(&[("value", "hello")])
        .assert_delivered(1)
        .assert_passed()
        .run()
        .unwrap();
}

#[test]
fn test_invalid_count_aborts_setup() {
    Scenario::new("invalid_count")
        .with_toml(
            r#"
[conditions]
conditions = [{ match = "hello", count = "<0" }]
"#,
        )
        .sends_text("hello")
        .run()
        .expect_error("minimum 0 can't be greater than maximum -1");
}

#[test]
fn test_reversed_range_aborts_setup() {
    Scenario::new("reversed_range")
        .with_toml(
            r#"
[conditions]
conditions = [{ match = "hello", count = "5-2" }]
"#,
        )
        .run()
        .expect_error("Failed to create runner");
}

#[test]
fn test_invalid_regex_aborts_setup() {
    Scenario::new("invalid_regex")
        .with_toml(
            r#"
[conditions]
conditions = ["hello("]
"#,
        )
        .run()
        .expect_error("invalid regex");
}

#[test]
fn test_optional_with_count_aborts_setup() {
    Scenario::new("optional_with_count")
        .with_json(
            r#"{"conditions": {"conditions": [{"match": "x", "count": 2, "optional": true}]}}"#,
        )
        .run()
        .expect_error("mutually exclusive");
}

#[test]
fn test_malformed_toml_aborts_setup() {
    Scenario::new("malformed_toml")
        .with_toml("[conditions\nconditions = 3")
        .run()
        .expect_error("failed to parse config");
}
