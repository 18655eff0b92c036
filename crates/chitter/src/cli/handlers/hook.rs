//! Hook handlers: the host pipes one JSON payload per call on stdin
//!
//! A hook never fails the host. Unreadable payloads, configuration and
//! state problems are logged; the exit code is non-zero only for a deny
//! verdict.

use std::io::Read;

use clap::ArgMatches;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use chitter_core::{
    config::default_state_dir, unavailable_verdict, AfterWork, AgentOutput, BeforeWork, Config, Coordinator,
    SessionId, Store,
};

use super::lenient_config;

/// Exit code a hook host treats as "block this call"
const DENY_EXIT_CODE: i32 = 2;
const TASK_FROM_PROMPT_CHARS: usize = 500;
const UNKNOWN: &str = "unknown";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HookPayload {
    session_id: String,
    tool_use_id: Option<String>,
    tool_input: ToolInput,
    tool_response: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ToolInput {
    description: String,
    prompt: String,
    subagent_type: String,
}

impl HookPayload {
    fn parse(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "unreadable hook payload");
            Self::default()
        })
    }

    fn session(&self) -> SessionId {
        SessionId::from_host(&self.session_id)
    }

    fn role(&self) -> String {
        non_empty(&self.tool_input.subagent_type).unwrap_or(UNKNOWN).to_string()
    }

    /// The description, else the head of the prompt
    fn task(&self) -> String {
        non_empty(&self.tool_input.description).map_or_else(
            || self.tool_input.prompt.chars().take(TASK_FROM_PROMPT_CHARS).collect(),
            str::to_string,
        )
    }

    fn call_id(&self) -> Option<String> {
        self.tool_use_id.as_deref().and_then(non_empty).map(str::to_string)
    }
}

fn non_empty(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn read_stdin() -> String {
    let mut raw = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut raw) {
        tracing::warn!(error = %e, "failed to read hook payload");
    }
    raw
}

/// Run a hook and return its exit code
pub fn handle(matches: &ArgMatches, hook: &ArgMatches) -> i32 {
    let payload = HookPayload::parse(&read_stdin());
    let config = lenient_config(matches);
    let json = matches.get_flag("json");
    let store = default_state_dir().and_then(Store::open);

    match (hook.subcommand_name(), store) {
        (Some("pre"), store) => handle_pre(store, &config, &payload, json),
        (Some("post"), Ok(store)) => handle_post(&store, &config, payload, json),
        (Some("post"), Err(e)) => {
            tracing::warn!(session = %payload.session(), error = %e, "state directory unavailable, output not recorded");
            0
        }
        (other, _) => {
            tracing::warn!(hook = ?other, "unknown hook");
            0
        }
    }
}

fn handle_pre(store: chitter_core::Result<Store>, config: &Config, payload: &HookPayload, json: bool) -> i32 {
    let request = BeforeWork {
        session: payload.session(),
        role: payload.role(),
        task: payload.task(),
        instructions: payload.tool_input.prompt.clone(),
        call_id: payload.call_id(),
    };
    let verdict = match store {
        Ok(store) => Coordinator::new(&store, config).before_work(&request),
        Err(e) => {
            let verdict = unavailable_verdict(config, &request, &e);
            tracing::warn!(
                session = %request.session,
                mode = %config.mode,
                verdict = %verdict.kind,
                error = %e,
                "state directory unavailable"
            );
            verdict
        }
    };

    if json {
        print_json(&verdict);
    }
    if verdict.is_denied() {
        if let Some(guidance) = &verdict.guidance {
            #[allow(clippy::print_stderr)]
            {
                eprintln!("{guidance}");
            }
        }
        return DENY_EXIT_CODE;
    }
    if let (false, Some(guidance)) = (json, &verdict.guidance) {
        println!("{guidance}");
    }
    0
}

fn handle_post(store: &Store, config: &Config, payload: HookPayload, json: bool) -> i32 {
    let request = AfterWork {
        session: payload.session(),
        role: payload.role(),
        task: payload.task(),
        call_id: payload.call_id(),
        output: AgentOutput::from_value(payload.tool_response),
    };
    let outcome = Coordinator::new(store, config).after_work(&request);

    if json {
        print_json(&outcome);
    } else if let Some(notice) = &outcome.notice {
        println!("{notice}");
    }
    0
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::warn!(error = %e, "failed to serialise hook result"),
    }
}
