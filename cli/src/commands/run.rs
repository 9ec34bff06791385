use std::fs;

use anyhow::{Context, Result};
use mpatrack::{Pipeline, PipelineCfg};

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::RunArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => PipelineCfg::from_path(path)?,
        None => PipelineCfg::default(),
    };
    if let Some(dir) = &args.data_dir { config.data_dir = dir.clone() }
    if let Some(dir) = &args.output_dir { config.output_dir = dir.clone() }
    if args.no_map { config.map.enabled = false }
    if args.no_chart { config.chart.enabled = false }

    fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("[run] cannot create {}", config.output_dir.display()))?;

    let report = Pipeline::new(config)?.run()?;
    print!("{report}");

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json).with_context(|| format!("[run] cannot write report {}", path.display()))?;
        println!("wrote {}", path.display());
    }

    Ok(())
}
