//! Command handlers
//!
//! Every handler returns the process exit code on success; errors are
//! turned into exit codes by `main`. Hooks are the exception: they resolve
//! every failure to an exit code themselves.

mod agent;
mod hook;
mod queue;
mod workflow;

use std::{fmt::Display, str::FromStr};

use anyhow::Result;
use clap::ArgMatches;
use serde::Serialize;

use chitter_core::{
    config::{default_state_dir, ConfigFile},
    load_config, Config, CoordinationMode, Error, Store, WorkflowRegistry,
};

/// Resolved state shared by all handlers
pub struct Context {
    pub store: Store,
    pub config: Config,
    pub json: bool,
}

impl Context {
    /// Open the store and load configuration, failing on any problem
    fn strict(matches: &ArgMatches) -> Result<Self> {
        let store = Store::open(default_state_dir()?)?;
        let config = load_config(store.root())?;
        let config = apply_flags(config, matches)?;
        Ok(Self {
            store,
            config,
            json: matches.get_flag("json"),
        })
    }

    pub fn registry(&self) -> WorkflowRegistry<'_> {
        WorkflowRegistry::new(&self.store)
    }

    /// Retention sweep run ahead of every operation
    fn sweep(&self) {
        if let Err(e) = self.registry().sweep(self.config.retention()) {
            tracing::warn!(error = %e, "retention sweep failed");
        }
    }

    /// Print a result either as JSON or through its `Display`
    pub fn emit<T: Serialize + Display>(&self, value: &T) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{value}");
        }
        Ok(())
    }
}

/// Overlay `--mode` / `--max-concurrent` onto the loaded configuration
fn apply_flags(config: Config, matches: &ArgMatches) -> chitter_core::Result<Config> {
    let mode = matches
        .get_one::<String>("mode")
        .map(|m| {
            CoordinationMode::from_str(m)
                .map_err(|e| Error::InvalidConfig(format!("Invalid mode '{m}': {e}")))
        })
        .transpose()?;
    let config = config.merge(ConfigFile {
        mode,
        max_concurrent: matches.get_one::<u32>("max-concurrent").copied(),
        ..ConfigFile::default()
    });
    config.validate()?;
    Ok(config)
}

/// Configuration for hooks: a broken file or flag falls back to defaults
/// so that a hook never fails on it
fn lenient_config(matches: &ArgMatches) -> Config {
    default_state_dir()
        .and_then(|dir| load_config(&dir))
        .and_then(|config| apply_flags(config, matches))
        .or_else(|e| {
            tracing::warn!(error = %e, "configuration rejected, using defaults");
            apply_flags(Config::default(), matches)
        })
        .unwrap_or_default()
}

/// Route to the handler for the selected subcommand
pub fn dispatch(matches: &ArgMatches) -> Result<i32> {
    match matches.subcommand() {
        Some(("hook", sub_m)) => Ok(hook::handle(matches, sub_m)),
        Some((name, sub_m)) => {
            let ctx = Context::strict(matches)?;
            let is_sweep = sub_m.subcommand_name() == Some("sweep");
            if !is_sweep {
                ctx.sweep();
            }
            match name {
                "workflow" => workflow::handle(&ctx, sub_m),
                "agent" => agent::handle(&ctx, sub_m),
                "queue" => queue::handle(&ctx, sub_m),
                _ => anyhow::bail!("Unknown command. Run 'chitter --help' for usage."),
            }
        }
        None => anyhow::bail!("Unknown command. Run 'chitter --help' for usage."),
    }
}

/// Required string argument; clap enforces presence, this keeps the
/// handlers free of unwraps
fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("missing required argument <{name}>"))
}

/// Comma separated list argument
fn list(matches: &ArgMatches, name: &str) -> Vec<String> {
    matches
        .get_many::<String>(name)
        .map(|values| {
            values
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::build_cli;

    #[test]
    fn test_flags_override_mode() -> Result<()> {
        let matches = build_cli().try_get_matches_from([
            "chitter", "--mode", "gate", "--max-concurrent", "3", "workflow", "status",
        ])?;
        let config = apply_flags(Config::default(), &matches)?;
        assert_eq!(config.mode, CoordinationMode::Gate);
        assert_eq!(config.max_concurrent, 3);
        Ok(())
    }

    #[test]
    fn test_zero_concurrency_rejected() -> Result<()> {
        let matches = build_cli().try_get_matches_from([
            "chitter", "--max-concurrent", "0", "workflow", "status",
        ])?;
        assert!(matches!(
            apply_flags(Config::default(), &matches),
            Err(Error::InvalidConfig(_))
        ));
        Ok(())
    }

    #[test]
    fn test_list_trims_and_drops_empty() -> Result<()> {
        let matches = build_cli().try_get_matches_from([
            "chitter", "agent", "complete", "wf", "a", "--files", "a.rs, ,b.rs",
        ])?;
        let complete = matches
            .subcommand_matches("agent")
            .and_then(|m| m.subcommand_matches("complete"))
            .ok_or_else(|| anyhow::anyhow!("complete not matched"))?;
        assert_eq!(list(complete, "files"), vec!["a.rs".to_string(), "b.rs".to_string()]);
        Ok(())
    }
}
