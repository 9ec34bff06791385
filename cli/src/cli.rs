use std::path::PathBuf;

/// Marine tagging analysis: map, spatial join and tallies
#[derive(clap::Parser, Debug)]
#[command(name = "mpatrack", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG wins when set
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Run the full pipeline: load, normalize, map, join, tabulate, chart
    Run(RunArgs),

    /// Print a summary of one or more shapefiles
    Inspect(InspectArgs),

    /// Print the default configuration as TOML
    DefaultConfig,
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Directory dataset paths are relative to (overrides the configuration)
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub data_dir: Option<PathBuf>,

    /// Directory outputs are written to (overrides the configuration)
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output_dir: Option<PathBuf>,

    /// Also write the run report as JSON
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub report: Option<PathBuf>,

    /// Skip the map
    #[arg(long)]
    pub no_map: bool,

    /// Skip the bar chart
    #[arg(long)]
    pub no_chart: bool,
}

#[derive(clap::Args, Debug)]
pub struct InspectArgs {
    /// Shapefiles (.shp) to summarize
    #[arg(required = true, value_hint = clap::ValueHint::FilePath)]
    pub paths: Vec<PathBuf>,

    /// Reproject to this EPSG code before summarizing bounds
    #[arg(long)]
    pub to_crs: Option<u32>,
}
