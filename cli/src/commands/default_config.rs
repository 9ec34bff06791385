use anyhow::Result;
use mpatrack::PipelineCfg;

pub fn run(_cli: &crate::cli::Cli) -> Result<()> {
    print!("{}", PipelineCfg::default_toml()?);
    Ok(())
}
