// CLI contract tests
//
// Each test runs the real binary against its own temp state directory.
// HOME and XDG_CONFIG_HOME point into the temp dir so no user config leaks in.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn chitter(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_chitter"));
    cmd.env("CHITTER_HOME", home.join("state"))
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env_remove("CHITTER_MODE")
        .env_remove("CHITTER_MAX_CONCURRENT")
        .env_remove("CHITTER_RETENTION_HOURS")
        .env_remove("CHITTER_MAX_DECISIONS");
    cmd
}

fn hook_payload(session: &str, role: &str, description: &str, prompt: &str) -> String {
    serde_json::json!({
        "session_id": session,
        "tool_name": "Task",
        "tool_use_id": format!("toolu_{role}"),
        "tool_input": {
            "description": description,
            "prompt": prompt,
            "subagent_type": role,
        },
    })
    .to_string()
}

fn post_payload(session: &str, role: &str, description: &str, response: &str) -> String {
    serde_json::json!({
        "session_id": session,
        "tool_name": "Task",
        "tool_input": {
            "description": description,
            "prompt": "",
            "subagent_type": role,
        },
        "tool_response": { "content": [{ "type": "text", "text": response }] },
    })
    .to_string()
}

fn start_workflow(home: &Path, description: &str) -> Result<String, Box<dyn std::error::Error>> {
    let output = chitter(home)
        .args(["workflow", "start", description, "--agents", "api,ui", "--json"])
        .output()?;
    assert!(output.status.success());
    let workflow: Value = serde_json::from_slice(&output.stdout)?;
    workflow["workflow_id"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| "workflow_id missing".into())
}

#[test]
fn workflow_lifecycle_through_operations() -> TestResult {
    let home = tempfile::tempdir()?;
    let id = start_workflow(home.path(), "Build auth")?;

    chitter(home.path())
        .args(["agent", "start", &id, "api", "Build login endpoint", "--areas", "auth-api"])
        .assert()
        .success()
        .stdout(predicate::str::contains("registered"));

    chitter(home.path())
        .args(["agent", "decision", &id, "api", "POST /login returns a JWT", "--type", "api"])
        .assert()
        .success();

    chitter(home.path())
        .args(["agent", "complete", &id, "api", "--summary", "Login done", "--files", "src/login.rs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1/2 agents complete"));

    chitter(home.path())
        .args(["workflow", "review", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("[api] POST /login returns a JWT"))
        .stdout(predicate::str::contains("src/login.rs"));

    chitter(home.path())
        .args(["workflow", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Build auth"));

    chitter(home.path())
        .args(["workflow", "close", &id, "--notes", "shipped"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Decisions logged: 1"))
        .stdout(predicate::str::contains("Resolution: shipped"));

    chitter(home.path())
        .args(["workflow", "review", &id])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Not found"));
    Ok(())
}

#[test]
fn second_workflow_in_same_session_is_refused() -> TestResult {
    let home = tempfile::tempdir()?;
    let first = start_workflow(home.path(), "Build auth")?;

    chitter(home.path())
        .args(["workflow", "start", "Build billing"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(format!("already has active workflow {first}")));

    chitter(home.path())
        .args(["workflow", "start", "Build billing", "--session", "billing"])
        .assert()
        .success();
    Ok(())
}

#[test]
fn decision_before_registration_is_rejected() -> TestResult {
    let home = tempfile::tempdir()?;
    let id = start_workflow(home.path(), "Build auth")?;

    chitter(home.path())
        .args(["agent", "decision", &id, "ghost", "Use Redis"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("not registered"));
    Ok(())
}

#[test]
fn invalid_identifier_is_a_validation_error() -> TestResult {
    let home = tempfile::tempdir()?;
    chitter(home.path())
        .args(["workflow", "review", "../etc"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid workflow id"));
    Ok(())
}

#[test]
fn unknown_decision_type_is_rejected() -> TestResult {
    let home = tempfile::tempdir()?;
    let id = start_workflow(home.path(), "Build auth")?;
    chitter(home.path())
        .args(["agent", "start", &id, "api", "Build login endpoint"])
        .assert()
        .success();
    chitter(home.path())
        .args(["agent", "decision", &id, "api", "Use Redis", "--type", "vibes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid decision type"));
    Ok(())
}

#[test]
fn queue_show_for_unknown_session_is_not_found() -> TestResult {
    let home = tempfile::tempdir()?;
    chitter(home.path())
        .args(["queue", "show", "nope"])
        .assert()
        .code(3);
    Ok(())
}

#[test]
fn turns_mode_denies_out_of_turn_agent_until_predecessor_completes() -> TestResult {
    let home = tempfile::tempdir()?;

    chitter(home.path())
        .args(["--mode", "turns", "hook", "pre"])
        .write_stdin(hook_payload("s1", "backend", "Build the API", "go"))
        .assert()
        .success();

    chitter(home.path())
        .args(["--mode", "turns", "hook", "pre"])
        .write_stdin(hook_payload("s1", "frontend", "Build the UI", "go"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("position 1 with 1 agent(s) ahead"));

    chitter(home.path())
        .args(["queue", "show", "s1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("running"))
        .stdout(predicate::str::contains("blocked"));

    chitter(home.path())
        .args(["--mode", "turns", "hook", "post"])
        .write_stdin(post_payload("s1", "backend", "Build the API", "done"))
        .assert()
        .success();

    chitter(home.path())
        .args(["--mode", "turns", "hook", "pre"])
        .write_stdin(hook_payload("s1", "frontend", "Build the UI", "go"))
        .assert()
        .success();
    Ok(())
}

#[test]
fn gate_mode_requires_acknowledgement_for_parallel_agents() -> TestResult {
    let home = tempfile::tempdir()?;

    chitter(home.path())
        .args(["--mode", "gate", "hook", "pre"])
        .write_stdin(hook_payload("s1", "backend", "Build the API", "go"))
        .assert()
        .success();

    chitter(home.path())
        .args(["--mode", "gate", "hook", "pre"])
        .write_stdin(hook_payload("s1", "frontend", "Build the UI", "go"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("BLOCKED"))
        .stderr(predicate::str::contains("CHITTER_COORDINATION"));

    chitter(home.path())
        .args(["--mode", "gate", "hook", "pre"])
        .write_stdin(hook_payload(
            "s1",
            "frontend",
            "Build the UI",
            "CHITTER_COORDINATION: read the file first",
        ))
        .assert()
        .success()
        .stdout(predicate::str::contains("coordination verified"));
    Ok(())
}

#[test]
fn hook_with_garbage_payload_fails_open() -> TestResult {
    let home = tempfile::tempdir()?;
    chitter(home.path())
        .args(["hook", "pre"])
        .write_stdin("this is not json")
        .assert()
        .success();
    Ok(())
}

#[test]
fn hook_with_unusable_state_directory_does_not_block_nudge() -> TestResult {
    let home = tempfile::tempdir()?;
    let blocker = home.path().join("not-a-dir");
    std::fs::write(&blocker, "plain file")?;

    chitter(home.path())
        .env("CHITTER_HOME", blocker.join("state"))
        .args(["--mode", "nudge", "hook", "pre"])
        .write_stdin(hook_payload("s1", "backend", "Build the API", "go"))
        .assert()
        .success()
        .stdout(predicate::str::contains("coordination state unavailable"));

    chitter(home.path())
        .env("CHITTER_HOME", blocker.join("state"))
        .args(["--mode", "nudge", "hook", "post"])
        .write_stdin(post_payload("s1", "backend", "Build the API", "done"))
        .assert()
        .success();
    Ok(())
}

#[test]
fn hook_with_unusable_state_directory_denies_in_turns_mode() -> TestResult {
    let home = tempfile::tempdir()?;
    let blocker = home.path().join("not-a-dir");
    std::fs::write(&blocker, "plain file")?;

    chitter(home.path())
        .env("CHITTER_HOME", blocker.join("state"))
        .args(["--mode", "turns", "hook", "pre"])
        .write_stdin(hook_payload("s1", "backend", "Build the API", "go"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("turn cannot be confirmed"));
    Ok(())
}

#[test]
fn rerun_of_completed_task_waits_its_turn_again() -> TestResult {
    let home = tempfile::tempdir()?;
    let pre = |call: &str, role: &str, task: &str| {
        serde_json::json!({
            "session_id": "s1",
            "tool_use_id": call,
            "tool_input": { "description": task, "prompt": "go", "subagent_type": role },
        })
        .to_string()
    };

    chitter(home.path())
        .args(["--mode", "turns", "hook", "pre"])
        .write_stdin(pre("toolu_1", "backend", "Build the API"))
        .assert()
        .success();
    chitter(home.path())
        .args(["--mode", "turns", "hook", "post"])
        .write_stdin(post_payload("s1", "backend", "Build the API", "done"))
        .assert()
        .success();

    chitter(home.path())
        .args(["--mode", "turns", "hook", "pre"])
        .write_stdin(pre("toolu_2", "backend", "Build the API"))
        .assert()
        .success();
    chitter(home.path())
        .args(["--mode", "turns", "hook", "pre"])
        .write_stdin(pre("toolu_3", "frontend", "Build the UI"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("position 2 with 1 agent(s) ahead"));
    Ok(())
}

#[test]
fn hook_writes_coordination_artifact() -> TestResult {
    let home = tempfile::tempdir()?;
    chitter(home.path())
        .args(["hook", "pre"])
        .write_stdin(hook_payload("s1", "backend", "Build the API", "go"))
        .assert()
        .success();

    let artifact = std::fs::read_to_string(home.path().join("state").join("active").join("s1.md"))?;
    assert!(artifact.starts_with("# CHITTER_COORDINATION - Session s1"));
    assert!(artifact.contains("You are: **backend**"));
    Ok(())
}

#[test]
fn last_post_hook_prints_completion_notice() -> TestResult {
    let home = tempfile::tempdir()?;
    let agents = [
        ("backend", "Build the API", "We decided to use PostgreSQL for every stored record."),
        ("frontend", "Build the UI", "Implemented the login form with server side validation."),
    ];

    for (role, task, _) in agents {
        chitter(home.path())
            .args(["--mode", "track", "hook", "pre"])
            .write_stdin(hook_payload("s1", role, task, "go"))
            .assert()
            .success();
    }

    let (role, task, response) = agents[0];
    chitter(home.path())
        .args(["--mode", "track", "hook", "post"])
        .write_stdin(post_payload("s1", role, task, response))
        .assert()
        .success()
        .stdout(predicate::str::contains("parallel work complete").not());

    let (role, task, response) = agents[1];
    chitter(home.path())
        .args(["--mode", "track", "hook", "post"])
        .write_stdin(post_payload("s1", role, task, response))
        .assert()
        .success()
        .stdout(predicate::str::contains("parallel work complete"))
        .stdout(predicate::str::contains("PostgreSQL"));
    Ok(())
}

#[test]
fn log_goes_to_state_directory() -> TestResult {
    let home = tempfile::tempdir()?;
    start_workflow(home.path(), "Logged")?;
    let log = std::fs::read_to_string(home.path().join("state").join("chitter.log"))?;
    assert!(log.contains("workflow started"));
    Ok(())
}
