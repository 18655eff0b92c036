//! Queue inspection handler

use anyhow::Result;
use clap::ArgMatches;

use chitter_core::{Error, QueueEngine, SessionId};

use super::{required, Context};

pub fn handle(ctx: &Context, matches: &ArgMatches) -> Result<i32> {
    match matches.subcommand() {
        Some(("show", sub_m)) => handle_show(ctx, sub_m),
        _ => anyhow::bail!("Unknown queue subcommand. Run 'chitter queue --help' for usage."),
    }
}

fn handle_show(ctx: &Context, matches: &ArgMatches) -> Result<i32> {
    let session = SessionId::new(required(matches, "session")?)?;
    let queue = QueueEngine::new(&ctx.store)
        .snapshot(&session)?
        .ok_or_else(|| Error::NotFound(format!("queue for session {session}")))?;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&queue)?);
        return Ok(0);
    }

    println!("Queue for session {session} ({} entries)", queue.len());
    println!();
    println!("{:>4}  {:<10}  {:<24}  TASK", "POS", "STATUS", "AGENT");
    let mut entries: Vec<_> = queue.entries.iter().collect();
    entries.sort_by_key(|e| e.position);
    for entry in entries {
        println!(
            "{:>4}  {:<10}  {:<24}  {}",
            entry.position,
            entry.status.to_string(),
            entry.agent_id.as_str(),
            entry.task
        );
    }
    Ok(0)
}
