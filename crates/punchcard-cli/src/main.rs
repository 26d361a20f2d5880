#![forbid(unsafe_code)]

mod cmd;
mod output;
mod view;

use clap::{CommandFactory, Parser, Subcommand};
use cmd::{Reported, Session, ShiftArgs};
use output::{CliError, OutputMode, render_error};
use punchcard_core::ErrorCode;
use std::env;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "punch: shift clock with self-correcting status",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Evaluate as of this local time ("YYYY-MM-DD HH:MM") instead of the
    /// system clock.
    #[arg(long, global = true, value_name = "DATETIME")]
    now: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize a punchcard project",
        long_about = "Create .punchcard/ with a default config and an empty shift database.",
        after_help = "EXAMPLES:\n    # Initialize a project in the current directory\n    punch init\n\n    # Reset the config to defaults\n    punch init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        name = "in",
        next_help_heading = "Clock",
        about = "Clock an employee in",
        long_about = "Open a new segment on the employee's shift, creating the shift on first use, then reconcile its status.",
        after_help = "EXAMPLES:\n    # Clock in now\n    punch in alice\n\n    # Clock in at a given time\n    punch in alice --at 09:30\n\n    # Emit machine-readable output\n    punch in alice --json"
    )]
    In(cmd::clock::ClockArgs),

    #[command(
        name = "out",
        next_help_heading = "Clock",
        about = "Clock an employee out",
        long_about = "Close the open segment, record its duration, then reconcile the shift's status.",
        after_help = "EXAMPLES:\n    # Clock out now\n    punch out alice\n\n    # Close a segment on an earlier shift\n    punch out alice --date 2024-03-17 --at 23:10"
    )]
    Out(cmd::clock::ClockArgs),

    #[command(
        next_help_heading = "Clock",
        about = "Put an active shift on break",
        after_help = "EXAMPLES:\n    # Start a break\n    punch break alice"
    )]
    Break(ShiftArgs),

    #[command(
        next_help_heading = "Clock",
        about = "End a break",
        after_help = "EXAMPLES:\n    # Resume work\n    punch resume alice"
    )]
    Resume(ShiftArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show a shift's stored and computed status",
        long_about = "Classify a shift without writing anything.",
        after_help = "EXAMPLES:\n    # Today's shift\n    punch status alice\n\n    # As of a fixed time\n    punch status alice --now \"2024-03-18 21:48\" --json"
    )]
    Status(ShiftArgs),

    #[command(
        next_help_heading = "Reconcile",
        about = "Correct one shift's stored status",
        after_help = "EXAMPLES:\n    # Reconcile today's shift\n    punch reconcile alice\n\n    # Reconcile an older shift\n    punch reconcile alice --date 2024-03-17"
    )]
    Reconcile(ShiftArgs),

    #[command(
        next_help_heading = "Reconcile",
        about = "Reconcile every matching shift",
        after_help = "EXAMPLES:\n    # All shifts\n    punch list\n\n    # One employee over a week\n    punch list --employee alice --from 2024-03-11 --to 2024-03-17\n\n    # Emit machine-readable output\n    punch list --json"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    punch completions bash\n\n    # Generate zsh completions\n    punch completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("PUNCHCARD_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "punch=debug,punchcard=debug,info"
        } else {
            "punchcard=info,warn"
        })
    });

    let format = env::var("PUNCHCARD_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: Cli, output: OutputMode) -> anyhow::Result<()> {
    let project_root = env::current_dir()?;

    let now = match cli.now.as_deref() {
        Some(raw) => cmd::parse_now(raw).map_err(|err| cmd::fail(output, err.code(), err.to_string()))?,
        None => chrono::Local::now().naive_local(),
    };
    debug!(%now, "evaluating");

    match cli.command {
        Commands::Init(args) => cmd::init::run_init(&args, &project_root, output),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
        command => {
            let session = Session::open(&project_root, now, output)?;
            match command {
                Commands::In(args) => cmd::clock::run_clock_in(&args, &session),
                Commands::Out(args) => cmd::clock::run_clock_out(&args, &session),
                Commands::Break(args) => cmd::breaks::run_break(&args, &session),
                Commands::Resume(args) => cmd::breaks::run_resume(&args, &session),
                Commands::Status(args) => cmd::status::run_status(&args, &session),
                Commands::Reconcile(args) => cmd::reconcile::run_reconcile(&args, &session),
                Commands::List(args) => cmd::list::run_list(&args, &session),
                Commands::Init(_) | Commands::Completions(_) => Ok(()),
            }
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let output = output::resolve_output_mode(cli.json);
    match run(cli, output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if err.downcast_ref::<Reported>().is_none() {
                let error = CliError::from_code(ErrorCode::InternalUnexpected, format!("{err:#}"));
                render_error(output, &error).ok();
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_parses_after_subcommand() {
        let cli = Cli::parse_from(["punch", "status", "alice", "--json"]);
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Status(_)));
    }

    #[test]
    fn now_flag_is_global() {
        let cli = Cli::parse_from(["punch", "reconcile", "alice", "--now", "2024-03-18 21:48"]);
        assert_eq!(cli.now.as_deref(), Some("2024-03-18 21:48"));
    }

    #[test]
    fn clock_in_takes_date_and_time() {
        let cli = Cli::parse_from(["punch", "in", "alice", "--date", "2024-03-18", "--at", "09:30"]);
        match cli.command {
            Commands::In(args) => {
                assert_eq!(args.employee, "alice");
                assert_eq!(args.date.as_deref(), Some("2024-03-18"));
                assert_eq!(args.at.as_deref(), Some("09:30"));
            }
            other => panic!("expected in, got {other:?}"),
        }
    }

    #[test]
    fn list_filters_are_optional() {
        let cli = Cli::parse_from(["punch", "list", "--employee", "bob"]);
        match cli.command {
            Commands::List(args) => {
                assert_eq!(args.employee.as_deref(), Some("bob"));
                assert!(args.from.is_none());
                assert!(args.to.is_none());
            }
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn completions_subcommand_parses() {
        let cli = Cli::parse_from(["punch", "completions", "bash"]);
        assert!(matches!(
            cli.command,
            Commands::Completions(cmd::completions::CompletionsArgs {
                shell: clap_complete::Shell::Bash,
            })
        ));
    }

    #[test]
    fn all_subcommands_listed() {
        let subcommands = [
            vec!["punch", "init"],
            vec!["punch", "in", "a"],
            vec!["punch", "out", "a"],
            vec!["punch", "break", "a"],
            vec!["punch", "resume", "a"],
            vec!["punch", "status", "a"],
            vec!["punch", "reconcile", "a"],
            vec!["punch", "list"],
            vec!["punch", "completions", "zsh"],
        ];
        for args in &subcommands {
            let result = Cli::try_parse_from(args.iter());
            assert!(result.is_ok(), "failed to parse {args:?}: {:?}", result.err());
        }
    }

    #[test]
    fn employee_is_required() {
        assert!(Cli::try_parse_from(["punch", "status"]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
