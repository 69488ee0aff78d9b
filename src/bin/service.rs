// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Command-line front end.
//
// Usage:
//   service -d                      run the supervisor in the foreground
//   service start|stop|restart <name>
//   service status|show <name>
//   service list [-v]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use svcd::client::{self, Client};
use svcd::service::LOG_ENV;
use svcd::{Command, Paths, Supervisor};

#[derive(Parser)]
#[command(name = "service", version)]
#[command(about = "Start, stop and supervise long-running services", long_about = None)]
struct Cli {
    /// Run the supervisor in the foreground.
    #[arg(short = 'd', long = "daemon")]
    daemon: bool,

    /// Directory holding <name>.conf service definitions.
    #[arg(long, global = true, value_name = "DIR")]
    service_dir: Option<PathBuf>,

    /// Directory for pid files, generated scripts and the service list.
    #[arg(long, global = true, value_name = "DIR")]
    run_dir: Option<PathBuf>,

    /// Abstract socket name of the supervisor.
    #[arg(long, global = true, value_name = "NAME")]
    address: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Start a service")]
    Start { name: String },
    #[command(about = "Stop a service")]
    Stop { name: String },
    #[command(about = "Stop a service if it is running, then start it")]
    Restart { name: String },
    #[command(about = "Tell whether a service is running")]
    Status { name: String },
    #[command(about = "Print the definition and state of a service")]
    Show { name: String },
    #[command(about = "List every known service")]
    List {
        /// Print the full definition of each service.
        #[arg(short, long)]
        verbose: bool,
    },
}

impl Commands {
    fn split(&self) -> (Command, Option<&str>, bool) {
        match self {
            Commands::Start { name } => (Command::Start, Some(name.as_str()), false),
            Commands::Stop { name } => (Command::Stop, Some(name.as_str()), false),
            Commands::Restart { name } => (Command::Restart, Some(name.as_str()), false),
            Commands::Status { name } => (Command::Status, Some(name.as_str()), false),
            Commands::Show { name } => (Command::Show, Some(name.as_str()), false),
            Commands::List { verbose } => (Command::List, None, *verbose),
        }
    }
}

impl Cli {
    fn paths(&self) -> Paths {
        let mut paths = Paths::from_env();
        if let Some(dir) = &self.service_dir {
            paths.service_dir = dir.clone();
        }
        if let Some(dir) = &self.run_dir {
            paths.run_dir = dir.clone();
        }
        if let Some(addr) = &self.address {
            paths.address = addr.clone();
        }
        paths
    }
}

fn init_logging(default: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_client(paths: &Paths, command: &Commands) -> Result<String, svcd::ClientError> {
    let (command, name, verbose) = command.split();
    let mut client = Client::connect(&paths.address)?;
    let mut payload = client.call(command, name)?;
    client::render(command, name.unwrap_or_default(), verbose, &mut payload)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let paths = cli.paths();

    if cli.daemon && cli.command.is_some() {
        Cli::command()
            .error(ErrorKind::ArgumentConflict, "-d cannot be combined with a command")
            .exit();
    }

    if cli.daemon {
        init_logging("info");
        return match Supervisor::new(paths) {
            Ok(mut supervisor) => {
                supervisor.run();
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("ERROR: could not open supervisor socket: {e}");
                ExitCode::FAILURE
            }
        };
    }

    let Some(command) = &cli.command else {
        eprintln!("{}", Cli::command().render_help());
        return ExitCode::FAILURE;
    };

    init_logging("warn");
    match run_client(&paths, command) {
        Ok(out) => {
            print!("{out}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("ERROR: {e}");
            ExitCode::FAILURE
        }
    }
}
