//! Agent command handlers

use std::str::FromStr;

use anyhow::Result;
use clap::ArgMatches;

use chitter_core::{AgentId, AgentRegistration, Completion, DecisionType, Error, WorkflowId};

use super::{list, required, Context};

pub fn handle(ctx: &Context, matches: &ArgMatches) -> Result<i32> {
    match matches.subcommand() {
        Some(("start", sub_m)) => handle_start(ctx, sub_m),
        Some(("decision", sub_m)) => handle_decision(ctx, sub_m),
        Some(("complete", sub_m)) => handle_complete(ctx, sub_m),
        _ => anyhow::bail!("Unknown agent subcommand. Run 'chitter agent --help' for usage."),
    }
}

fn ids(matches: &ArgMatches) -> Result<(WorkflowId, AgentId)> {
    Ok((
        WorkflowId::new(required(matches, "workflow")?)?,
        AgentId::new(required(matches, "agent")?)?,
    ))
}

fn handle_start(ctx: &Context, matches: &ArgMatches) -> Result<i32> {
    let (workflow_id, agent_id) = ids(matches)?;
    let task = required(matches, "task")?;
    let role = matches
        .get_one::<String>("role")
        .map_or_else(|| agent_id.to_string(), String::clone);
    let areas = list(matches, "areas");

    let workflow = ctx.registry().register_agent(
        &workflow_id,
        &agent_id,
        AgentRegistration::working(role, task, areas),
    )?;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&workflow.agent(&agent_id))?);
    } else {
        println!("Agent {agent_id} registered in workflow {workflow_id}");
        println!("Task: {task}");
        let others: Vec<String> = workflow
            .active_agents()
            .filter(|(id, _)| **id != agent_id)
            .map(|(id, a)| format!("  - {id}: {}", a.task))
            .collect();
        if !others.is_empty() {
            println!();
            println!("Other agents working:");
            println!("{}", others.join("\n"));
        }
    }
    Ok(0)
}

fn handle_decision(ctx: &Context, matches: &ArgMatches) -> Result<i32> {
    let (workflow_id, agent_id) = ids(matches)?;
    let text = required(matches, "decision")?;
    let kind_arg = required(matches, "type")?;
    let kind = DecisionType::from_str(kind_arg)
        .map_err(|e| Error::Parse(format!("Invalid decision type '{kind_arg}': {e}")))?;
    let rationale = matches.get_one::<String>("rationale").map_or("", String::as_str);

    let decision = ctx
        .registry()
        .log_decision(&workflow_id, &agent_id, kind, text, rationale)?;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
    } else {
        println!("Decision logged for {agent_id}: [{}] {}", decision.kind, decision.text);
    }
    Ok(0)
}

fn handle_complete(ctx: &Context, matches: &ArgMatches) -> Result<i32> {
    let (workflow_id, agent_id) = ids(matches)?;
    let completion = Completion {
        summary: matches.get_one::<String>("summary").cloned(),
        files_modified: list(matches, "files"),
        ..Completion::default()
    };

    let progress = ctx.registry().complete(&workflow_id, &agent_id, completion)?;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&progress)?);
    } else {
        println!("Agent {agent_id} complete. Progress: {progress}");
        if progress.completed >= progress.planned.max(progress.registered) {
            println!("All agents done. Review with `chitter workflow review {workflow_id}`.");
        }
    }
    Ok(0)
}
