use anyhow::{Context, Result};
use mpatrack::{Crs, FeatureCollection};

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::InspectArgs) -> Result<()> {
    for path in &args.paths {
        let name = path.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let mut collection = FeatureCollection::from_shapefile(&name, path)?;
        if let Some(code) = args.to_crs {
            collection = collection.to_crs(&Crs::Epsg(code))
                .with_context(|| format!("[inspect] cannot reproject {} to EPSG:{code}", path.display()))?;
        }

        println!("{}", collection.summary());
        if let Some(bounds) = collection.bounds() {
            println!(
                "Bounds: ({:.3}, {:.3}) - ({:.3}, {:.3})",
                bounds.min().x, bounds.min().y, bounds.max().x, bounds.max().y,
            );
        }
        println!();
    }
    Ok(())
}
