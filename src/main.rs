use std::process::ExitCode;

use clap::Parser;

use channelfe::cli::{CliArgs, run};

fn main() -> ExitCode {
    run(CliArgs::parse())
}
