mod cli;
mod commands;

use std::io::Write;

use cli::{Cli, Commands};
use commands::{default_config, inspect, run};

/// Install env_logger: RUST_LOG when set, else a level from the -v count.
fn init_logger(verbose: u8) {
    let mut builder = env_logger::Builder::new();
    builder.format(|buf, record| {
        writeln!(buf, "{} {:5} {}", buf.timestamp_seconds(), record.level(), record.args())
    });

    match std::env::var("RUST_LOG") {
        Ok(filters) if verbose == 0 => { builder.parse_filters(&filters); }
        _ => {
            let level = match verbose {
                0 => log::LevelFilter::Warn,
                1 => log::LevelFilter::Info,
                2 => log::LevelFilter::Debug,
                _ => log::LevelFilter::Trace,
            };
            builder.filter_level(level);
        }
    }
    builder.init();
}

pub fn run() -> anyhow::Result<()> {
    use clap::Parser;

    let cli = Cli::parse();
    init_logger(cli.verbose);
    match &cli.command {
        Commands::Run(args) => run::run(&cli, args),
        Commands::Inspect(args) => inspect::run(&cli, args),
        Commands::DefaultConfig => default_config::run(&cli),
    }
}

fn main() -> anyhow::Result<()> { run() }
