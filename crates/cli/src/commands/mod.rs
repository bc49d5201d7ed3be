pub mod browse;
pub mod client;
pub mod control;

use std::io::{Stderr, Stdout};
use std::path::PathBuf;
use std::process::ExitCode;

use backdex_runtime::default_socket_path;
use clap::{Args, Subcommand};

use crate::printer::{ColorChoice, HumanPrinter, JsonPrinter, OutputFormat, Printer, PrinterConfig};
pub use browse::{PageArgs, PathArgs, SearchArgs};
use client::DaemonClient;

/// Common error type for command handlers
pub type CommandResult<T> = anyhow::Result<T>;

/// Options shared by every subcommand.
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Daemon socket to talk to (defaults to the cache dir socket)
    #[arg(long, global = true, value_name = "PATH")]
    pub socket: Option<PathBuf>,

    /// Print responses as JSON, one document per line
    #[arg(long, global = true)]
    pub json: bool,

    /// When to use colors
    #[arg(long, global = true, value_enum, value_name = "WHEN", default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,
}

impl GlobalArgs {
    pub fn socket_path(&self) -> PathBuf {
        self.socket.clone().unwrap_or_else(default_socket_path)
    }

    /// Create a printer based on the output options.
    pub fn make_printer(&self) -> Box<dyn Printer> {
        let format = if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        };
        let cfg = PrinterConfig {
            format,
            color: self.color,
        };

        match cfg.format {
            OutputFormat::Human => Box::new(HumanPrinter::<Stdout, Stderr>::stdout(cfg)),
            OutputFormat::Json => Box::new(JsonPrinter::<Stdout, Stderr>::stdout(cfg)),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List indexed entries a page at a time.
    ///
    /// Example:
    ///   backdex files
    ///   backdex files -p 3
    Files(PageArgs),

    /// Search names, paths and permission strings.
    ///
    /// Example:
    ///   backdex search holiday jpg
    ///   backdex --json search -p 2 report
    Search(SearchArgs),

    /// Show the indexed record for one path.
    Stat(PathArgs),

    /// List the indexed children of a directory.
    Ls(PathArgs),

    /// Ask the daemon to start a backup.
    Backup,

    /// Refresh one directory and its direct children now.
    ///
    /// Example:
    ///   backdex rescan ~/Documents
    Rescan(PathArgs),

    /// Show what the daemon is indexing and whether it is busy.
    Status,
}

pub fn run(global: &GlobalArgs, command: Command) -> ExitCode {
    let client = DaemonClient::new(global.socket_path());
    let mut printer = global.make_printer();

    let result = match command {
        Command::Files(args) => browse::files(&client, printer.as_mut(), &args),
        Command::Search(args) => browse::search(&client, printer.as_mut(), &args),
        Command::Stat(args) => browse::stat(&client, printer.as_mut(), &args),
        Command::Ls(args) => browse::ls(&client, printer.as_mut(), &args),
        Command::Backup => control::backup(&client, printer.as_mut()),
        Command::Rescan(args) => control::rescan(&client, printer.as_mut(), &args),
        Command::Status => control::status(&client, printer.as_mut()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[error] {e:#}");
            ExitCode::from(2)
        }
    }
}
