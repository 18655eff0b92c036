//! chitter CLI - coordination hooks and workflow commands for parallel agents
//!
//! Binary name: `chitter`

use std::{fs::OpenOptions, path::Path, process, sync::Mutex};

use chitter_core::{config::default_state_dir, Store};
use tracing_subscriber::EnvFilter;

mod cli;

/// Environment variable selecting the log filter
const LOG_ENV: &str = "CHITTER_LOG";

fn main() {
    let matches = cli::build_cli().get_matches();

    let log_path = default_state_dir()
        .and_then(Store::open)
        .map(|store| store.log_path())
        .ok();
    init_tracing(log_path.as_deref());

    match cli::handlers::dispatch(&matches) {
        Ok(0) => {}
        Ok(code) => {
            #[allow(clippy::exit)]
            process::exit(code);
        }
        Err(err) => {
            let core = err.downcast_ref::<chitter_core::Error>();

            #[allow(clippy::print_stderr)]
            {
                if core.is_some_and(chitter_core::Error::is_advisory) {
                    eprintln!("{err}");
                } else {
                    eprintln!("Error: {err}");
                }
            }

            let code = core.map_or(1, chitter_core::Error::exit_code);

            #[allow(clippy::exit)]
            process::exit(code);
        }
    }
}

/// Log to the append-only `chitter.log` in the state directory, or to
/// stderr when it cannot be opened. Stdout stays reserved for the host.
fn init_tracing(log_path: Option<&Path>) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    let file = log_path.and_then(|path| OpenOptions::new().create(true).append(true).open(path).ok());

    match file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}
