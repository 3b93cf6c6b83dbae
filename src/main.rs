use clap::Parser;
use candletrader::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
