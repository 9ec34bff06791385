use geo::{Geometry, MapCoords};
use log::debug;

use crate::{collection::FeatureCollection, crs::{Crs, CrsError, Transformer, crs_label}, error::{Error, Result}};

impl FeatureCollection {
    /// Reproject every geometry into `target`, returning a new collection tagged with it.
    ///
    /// When the source already is `target` the coordinates are left untouched,
    /// but the target must still be a supported CRS.
    pub fn to_crs(&self, target: &Crs) -> Result<FeatureCollection> {
        let fail = |reason: String| Error::Projection { dataset: self.name().to_string(), reason };

        let source = self.crs()
            .ok_or_else(|| fail(format!("source CRS is undefined; cannot reproject to {target}")))?;

        let transformer = Transformer::new(source, target).map_err(|e| fail(e.to_string()))?;
        if transformer.is_identity() {
            debug!("[project] {}: already in {target}", self.name());
            return Ok(self.clone());
        }

        let geometries = self.geometries().iter()
            .map(|geometry| reproject(geometry, &transformer))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| fail(e.to_string()))?;

        debug!("[project] {}: {} geometries {source} -> {target}", self.name(), geometries.len());
        Ok(self.with_geometries(geometries, *target))
    }
}

/// Reproject a single geometry with a prepared transformer.
pub(crate) fn reproject(geometry: &Geometry<f64>, transformer: &Transformer) -> Result<Geometry<f64>, CrsError> {
    geometry.try_map_coords(|coord| transformer.transform(coord))
}

/// True when both collections carry the same, known CRS.
pub fn same_crs(a: &FeatureCollection, b: &FeatureCollection) -> bool {
    let equal = matches!((a.crs(), b.crs()), (Some(x), Some(y)) if x == y);
    debug!(
        "[project] CRS check {} ({}) vs {} ({}): {equal}",
        a.name(), crs_label(a.crs()), b.name(), crs_label(b.crs()),
    );
    equal
}
