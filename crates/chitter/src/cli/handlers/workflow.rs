//! Workflow command handlers

use anyhow::Result;
use clap::ArgMatches;

use chitter_core::{Origin, SessionId, WorkflowId};

use super::{list, required, Context};

pub fn handle(ctx: &Context, matches: &ArgMatches) -> Result<i32> {
    match matches.subcommand() {
        Some(("start", sub_m)) => handle_start(ctx, sub_m),
        Some(("review", sub_m)) => handle_review(ctx, sub_m),
        Some(("close", sub_m)) => handle_close(ctx, sub_m),
        Some(("status", _)) => handle_status(ctx),
        Some(("sweep", _)) => handle_sweep(ctx),
        _ => anyhow::bail!("Unknown workflow subcommand. Run 'chitter workflow --help' for usage."),
    }
}

fn handle_start(ctx: &Context, matches: &ArgMatches) -> Result<i32> {
    let session = SessionId::new(required(matches, "session")?)?;
    let description = required(matches, "description")?;
    let workflow = ctx.registry().start(
        &session,
        description,
        list(matches, "agents"),
        Origin::Operation,
    )?;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&workflow)?);
    } else {
        println!("Workflow started: {}", workflow.id);
        println!("Session: {session}");
        println!("Goal: {description}");
        if !workflow.agents_planned.is_empty() {
            println!("Planned agents: {}", workflow.agents_planned.join(", "));
        }
        println!();
        println!("Register agents with `chitter agent start {} <agent> <task>`.", workflow.id);
    }
    Ok(0)
}

fn handle_review(ctx: &Context, matches: &ArgMatches) -> Result<i32> {
    let id = WorkflowId::new(required(matches, "workflow")?)?;
    ctx.emit(&ctx.registry().review(&id)?)?;
    Ok(0)
}

fn handle_close(ctx: &Context, matches: &ArgMatches) -> Result<i32> {
    let id = WorkflowId::new(required(matches, "workflow")?)?;
    let notes = matches.get_one::<String>("notes").map_or("", String::as_str);
    ctx.emit(&ctx.registry().close(&id, notes)?)?;
    Ok(0)
}

fn handle_status(ctx: &Context) -> Result<i32> {
    ctx.emit(&ctx.registry().status()?)?;
    Ok(0)
}

fn handle_sweep(ctx: &Context) -> Result<i32> {
    let report = ctx.registry().sweep(ctx.config.retention())?;
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Removed {} expired workflow(s) and {} idle queue(s) older than {}h.",
            report.workflows_removed, report.queues_removed, ctx.config.retention_hours
        );
    }
    Ok(0)
}
