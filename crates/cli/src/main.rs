use std::process::ExitCode;

use clap::Parser;

mod commands;
mod printer;

use backdex_runtime::logging;
use commands::{Command, GlobalArgs};

#[derive(Debug, Parser)]
#[command(
    name = "backdex",
    version,
    about = "Browse and refresh the backdex file index",
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

fn main() -> ExitCode {
    logging::init().ok();

    let cli = Cli::parse();
    commands::run(&cli.global, cli.command)
}
