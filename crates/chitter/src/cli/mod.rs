pub mod handlers;

use clap::{value_parser, Arg, ArgAction, Command};

pub fn build_cli() -> Command {
    Command::new("chitter")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Coordination hooks and workflow commands for parallel agents")
        .subcommand_required(true)
        .arg(
            Arg::new("mode")
                .long("mode")
                .global(true)
                .value_parser(["track", "nudge", "gate", "turns"])
                .help("Override the coordination mode"),
        )
        .arg(
            Arg::new("max-concurrent")
                .long("max-concurrent")
                .global(true)
                .value_parser(value_parser!(u32))
                .help("Override how many agents may run at once in turns mode"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Print results as JSON"),
        )
        .subcommand(cmd_hook())
        .subcommand(cmd_workflow())
        .subcommand(cmd_agent())
        .subcommand(cmd_queue())
}

fn cmd_hook() -> Command {
    Command::new("hook")
        .about("Host hook entry points (payload as JSON on stdin)")
        .subcommand_required(true)
        .subcommand(Command::new("pre").about("Before an agent starts: admit, warn or deny"))
        .subcommand(Command::new("post").about("After an agent finished: record its output"))
}

fn session_arg() -> Arg {
    Arg::new("session")
        .long("session")
        .default_value("default")
        .help("Session the workflow belongs to")
}

fn workflow_arg() -> Arg {
    Arg::new("workflow").required(true).help("Workflow id")
}

fn agent_arg() -> Arg {
    Arg::new("agent").required(true).help("Agent id")
}

fn cmd_workflow() -> Command {
    Command::new("workflow")
        .about("Manage coordinated workflows")
        .subcommand_required(true)
        .subcommand(
            Command::new("start")
                .about("Start a workflow")
                .arg(Arg::new("description").required(true).help("What the agents work towards"))
                .arg(
                    Arg::new("agents")
                        .long("agents")
                        .value_delimiter(',')
                        .help("Planned agent ids, comma separated"),
                )
                .arg(session_arg()),
        )
        .subcommand(
            Command::new("review")
                .about("Show decisions, files and conflicts")
                .arg(workflow_arg()),
        )
        .subcommand(
            Command::new("close")
                .about("Close a workflow and delete its state")
                .arg(workflow_arg())
                .arg(Arg::new("notes").long("notes").default_value("").help("Resolution notes")),
        )
        .subcommand(Command::new("status").about("List active workflows"))
        .subcommand(Command::new("sweep").about("Delete workflows past the retention window"))
}

fn cmd_agent() -> Command {
    Command::new("agent")
        .about("Record agent activity in a workflow")
        .subcommand_required(true)
        .subcommand(
            Command::new("start")
                .about("Register an agent")
                .arg(workflow_arg())
                .arg(agent_arg())
                .arg(Arg::new("task").required(true).help("What the agent works on"))
                .arg(Arg::new("role").long("role").help("Agent role, defaults to the agent id"))
                .arg(
                    Arg::new("areas")
                        .long("areas")
                        .value_delimiter(',')
                        .help("Areas the agent touches, comma separated"),
                ),
        )
        .subcommand(
            Command::new("decision")
                .about("Log a decision")
                .arg(workflow_arg())
                .arg(agent_arg())
                .arg(Arg::new("decision").required(true).help("The decision text"))
                .arg(
                    Arg::new("type")
                        .long("type")
                        .default_value("approach")
                        .help("architecture, approach, api, data_model, interface, dependency, other"),
                )
                .arg(Arg::new("rationale").long("rationale").default_value("")),
        )
        .subcommand(
            Command::new("complete")
                .about("Mark an agent complete")
                .arg(workflow_arg())
                .arg(agent_arg())
                .arg(Arg::new("summary").long("summary").help("What the agent did"))
                .arg(
                    Arg::new("files")
                        .long("files")
                        .value_delimiter(',')
                        .help("Files modified, comma separated"),
                ),
        )
}

fn cmd_queue() -> Command {
    Command::new("queue")
        .about("Inspect session queues")
        .subcommand_required(true)
        .subcommand(
            Command::new("show")
                .about("Show a session queue")
                .arg(Arg::new("session").required(true).help("Session id")),
        )
}
