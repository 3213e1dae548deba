//! Integration tests for `deckhand exec`.


use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use assert_cmd::cargo::cargo_bin_cmd;
use fixtures::{
    can_bind_localhost, event_types, json_response, parse_events, text_body, tool_use_body,
};
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request};

fn load_session(home: &TempDir, id: &str) -> Value {
    let raw = std::fs::read_to_string(home.path().join("sessions").join(format!("{id}.json")))
        .expect("session file");
    serde_json::from_str(&raw).unwrap()
}

#[test]
fn test_exec_without_api_key_streams_error() {
    let home = TempDir::new().unwrap();

    let output = cargo_bin_cmd!("deckhand")
        .env("DECKHAND_HOME", home.path())
        .env_remove("ANTHROPIC_API_KEY")
        .args(["exec", "-p", "Make a deck", "--session", "no-key"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let events = parse_events(&output.stdout);
    assert_eq!(event_types(&events), ["init", "status", "error"]);
    assert_eq!(events[0]["session_id"], "no-key");
    assert!(
        events[2]["error"]
            .as_str()
            .unwrap()
            .starts_with("Agent error: Reasoning runtime not available")
    );
    assert!(String::from_utf8_lossy(&output.stderr).contains("ANTHROPIC_API_KEY"));
}

#[test]
fn test_exec_missing_context_file_fails_before_turn() {
    let home = TempDir::new().unwrap();

    cargo_bin_cmd!("deckhand")
        .env("DECKHAND_HOME", home.path())
        .args(["exec", "-p", "x", "--context", "does-not-exist.md"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("read context file"));
}

#[tokio::test]
async fn test_exec_runs_tool_loop_and_saves_deck() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = TempDir::new().unwrap();
    let brief = home.path().join("brief.md");
    std::fs::write(&brief, "Audience: new hires").unwrap();
    let mock_server = MockServer::start().await;

    let call_count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&call_count);
    let bodies = Arc::new(std::sync::Mutex::new(Vec::<Value>::new()));
    let recorded = Arc::clone(&bodies);

    let first = tool_use_body(&[
        ("toolu_1", "create_document", json!({"title": "Onboarding"})),
        ("toolu_2", "add_slide", json!({"content": "<h1>Hello</h1>", "layout": "title"})),
        ("toolu_3", "commit_edits", json!({})),
    ]);
    let second = tool_use_body(&[
        ("toolu_4", "add_slide", json!({"content": "<h1>World</h1>"})),
        ("toolu_5", "commit_edits", json!({})),
    ]);
    let third = text_body("Your deck has two slides.");

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-api-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(move |req: &Request| {
            recorded
                .lock()
                .unwrap()
                .push(serde_json::from_slice(&req.body).unwrap());
            match counter.fetch_add(1, Ordering::SeqCst) {
                0 => json_response(&first),
                1 => json_response(&second),
                _ => json_response(&third),
            }
        })
        .expect(3)
        .mount(&mock_server)
        .await;

    let output = cargo_bin_cmd!("deckhand")
        .env("DECKHAND_HOME", home.path())
        .env("ANTHROPIC_API_KEY", "test-api-key")
        .env("ANTHROPIC_BASE_URL", mock_server.uri())
        .args([
            "exec",
            "-p",
            "Build an onboarding deck",
            "--session",
            "onboarding",
            "--context",
            brief.to_str().unwrap(),
        ])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let events = parse_events(&output.stdout);
    assert_eq!(
        event_types(&events),
        [
            "init",
            "status",
            "status",
            "tool_use",
            "tool_use",
            "assistant",
            "complete"
        ]
    );
    assert_eq!(
        events[3]["friendly"],
        json!([
            "Creating presentation: Onboarding",
            "Adding a new slide...",
            "Saving changes..."
        ])
    );

    let complete = events.last().unwrap();
    assert_eq!(complete["success"], true);
    assert_eq!(complete["result"], "Your deck has two slides.");
    assert_eq!(complete["user_session_id"], "onboarding");
    assert_eq!(complete["slide_count"], 2);
    assert_eq!(complete["applied_edit_count"], 2);
    assert!(complete["session_id"].as_str().is_some());

    let bodies = bodies.lock().unwrap();
    assert!(
        bodies[0]["system"]
            .as_str()
            .unwrap()
            .contains("=== brief.md ===\nAudience: new hires")
    );
    let tool_results = &bodies[1]["messages"][2]["content"];
    assert_eq!(tool_results[0]["type"], "tool_result");
    assert_eq!(tool_results[0]["tool_use_id"], "toolu_1");
    assert_eq!(tool_results[2]["is_error"], false);

    let session = load_session(&home, "onboarding");
    assert_eq!(session["document"]["title"], "Onboarding");
    assert_eq!(session["document"]["slides"][0]["content"], "<h1>Hello</h1>");
    assert_eq!(session["document"]["slides"][0]["layout"], "title");
    assert_eq!(session["document"]["slides"][1]["content"], "<h1>World</h1>");
    assert_eq!(session["document"]["slides"][1]["index"], 1);
    assert_eq!(session["continuation_token"], complete["session_id"]);
}

#[tokio::test]
async fn test_exec_continue_resumes_previous_conversation() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;

    let bodies = Arc::new(std::sync::Mutex::new(Vec::<Value>::new()));
    let recorded = Arc::clone(&bodies);
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(move |req: &Request| {
            recorded
                .lock()
                .unwrap()
                .push(serde_json::from_slice(&req.body).unwrap());
            json_response(&text_body("Nothing to change."))
        })
        .expect(3)
        .mount(&mock_server)
        .await;

    let run = |extra: &[&str]| {
        let mut args = vec!["exec", "-p", "Tweak it", "--session", "deck"];
        args.extend_from_slice(extra);
        let output = cargo_bin_cmd!("deckhand")
            .env("DECKHAND_HOME", home.path())
            .env("ANTHROPIC_API_KEY", "test-api-key")
            .env("ANTHROPIC_BASE_URL", mock_server.uri())
            .args(&args)
            .output()
            .unwrap();
        assert!(output.status.success());
        parse_events(&output.stdout)
    };

    let first = run(&[]);
    let token = first.last().unwrap()["session_id"].clone();
    assert!(token.is_string());

    let second = run(&["--continue"]);
    assert_eq!(second.last().unwrap()["session_id"], token);
    assert_eq!(load_session(&home, "deck")["is_continuation"], true);

    let third = run(&["--resume", token.as_str().unwrap()]);
    assert_eq!(third.last().unwrap()["session_id"], token);

    // Each process replays the conversation saved by the one before it.
    let bodies = bodies.lock().unwrap();
    let roles = |body: &Value| -> Vec<String> {
        body["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["role"].as_str().unwrap().to_string())
            .collect()
    };
    assert_eq!(roles(&bodies[0]), ["user"]);
    assert_eq!(roles(&bodies[1]), ["user", "assistant", "user"]);
    assert_eq!(
        roles(&bodies[2]),
        ["user", "assistant", "user", "assistant", "user"]
    );
    assert_eq!(
        bodies[1]["messages"][1]["content"][0]["text"],
        "Nothing to change."
    );
}

#[tokio::test]
async fn test_exec_accepts_opaque_session_ids() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;

    let call_count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&call_count);
    let first = tool_use_body(&[
        ("toolu_1", "create_document", json!({"title": "Q3 Review"})),
        ("toolu_2", "add_slide", json!({"content": "Revenue"})),
        ("toolu_3", "commit_edits", json!({})),
    ]);
    let second = text_body("Done.");
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(move |_req: &Request| match counter.fetch_add(1, Ordering::SeqCst) {
            0 => json_response(&first),
            _ => json_response(&second),
        })
        .mount(&mock_server)
        .await;

    let output = cargo_bin_cmd!("deckhand")
        .env("DECKHAND_HOME", home.path())
        .env("ANTHROPIC_API_KEY", "test-api-key")
        .env("ANTHROPIC_BASE_URL", mock_server.uri())
        .args(["exec", "-p", "Make the Q3 deck", "--session", "Q3 deck"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let events = parse_events(&output.stdout);
    assert_eq!(events[0]["session_id"], "Q3 deck");
    let complete = events.last().unwrap();
    assert_eq!(complete["type"], "complete");
    assert_eq!(complete["user_session_id"], "Q3 deck");
    assert_eq!(complete["slide_count"], 1);

    cargo_bin_cmd!("deckhand")
        .env("DECKHAND_HOME", home.path())
        .args(["sessions", "show", "Q3 deck"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"title\": \"Q3 Review\""))
        .stdout(predicate::str::contains("\"session_id\": \"Q3 deck\""));
}

#[tokio::test]
async fn test_exec_http_error_is_terminal_error_event() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(wiremock::ResponseTemplate::new(529).set_body_json(json!({
            "type": "error",
            "error": {"type": "overloaded_error", "message": "Overloaded"}
        })))
        .mount(&mock_server)
        .await;

    let output = cargo_bin_cmd!("deckhand")
        .env("DECKHAND_HOME", home.path())
        .env("ANTHROPIC_API_KEY", "test-api-key")
        .env("ANTHROPIC_BASE_URL", mock_server.uri())
        .args(["exec", "-p", "Anything", "--session", "overloaded"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let events = parse_events(&output.stdout);
    assert_eq!(event_types(&events), ["init", "status", "status", "error"]);
    assert_eq!(events[3]["error"], "Agent error: HTTP 529: Overloaded");
    assert!(!home.path().join("sessions/overloaded.json").exists());
}
