use std::collections::HashSet;

use geo::{BoundingRect, Intersects};
use log::debug;
use polars::prelude::{DataFrame, IdxCa, IdxSize};
use rstar::RTree;
use serde::{Deserialize, Serialize};

use crate::{collection::FeatureCollection, crs::crs_label, error::{Error, Result}};
use super::{bbox::{envelope, FeatureEnvelope}, table::{JoinRecord, JoinedTable}};

/// Geometric relation a pair must satisfy to be joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    #[default]
    Intersects,
}

/// Which unmatched features survive the join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinHow {
    #[default]
    Inner,
}

/// Options for [`sjoin`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinOptions {
    pub predicate: Predicate,
    pub how: JoinHow,
    /// Suffix for left columns whose name also exists on the right.
    pub left_suffix: String,
    /// Suffix for right columns whose name also exists on the left.
    pub right_suffix: String,
}

impl Default for JoinOptions {
    fn default() -> Self {
        Self {
            predicate: Predicate::Intersects,
            how: JoinHow::Inner,
            left_suffix: "left".into(),
            right_suffix: "right".into(),
        }
    }
}

/// Spatially join `left` with `right`.
///
/// Emits one record per intersecting pair, ordered by left index then right index.
/// A right feature intersecting several left features appears once per match.
/// Both collections must carry the same, known CRS.
pub fn sjoin(left: &FeatureCollection, right: &FeatureCollection, options: &JoinOptions) -> Result<JoinedTable> {
    let crs = match (left.crs(), right.crs()) {
        (Some(a), Some(b)) if a == b => *a,
        (a, b) => return Err(Error::Join {
            left: left.name().to_string(),
            left_crs: crs_label(a),
            right: right.name().to_string(),
            right_crs: crs_label(b),
        }),
    };

    let records = match options.predicate {
        Predicate::Intersects => intersecting_pairs(left, right),
    };

    let geometries = records.iter()
        .map(|record| left.geometries()[record.left].clone())
        .collect();
    let data = merge_attributes(left, right, &records, options).map_err(Error::data("join"))?;

    let name = format!("{} x {}", left.name(), right.name());
    debug!("[join] {name}: {} records", records.len());

    Ok(JoinedTable::new(name, crs, records, geometries, data))
}

/// All (left, right) index pairs whose geometries intersect, in left-then-right order.
fn intersecting_pairs(left: &FeatureCollection, right: &FeatureCollection) -> Vec<JoinRecord> {
    let tree = RTree::bulk_load(
        right.geometries().iter().enumerate()
            .filter_map(|(j, geometry)| Some(FeatureEnvelope::new(j, geometry.bounding_rect()?)))
            .collect(),
    );

    let mut records = Vec::new();
    for (i, geometry) in left.geometries().iter().enumerate() {
        let Some(rect) = geometry.bounding_rect() else { continue };

        let mut candidates = tree.locate_in_envelope_intersecting(&envelope(rect))
            .map(FeatureEnvelope::feature)
            .collect::<Vec<_>>();
        candidates.sort_unstable();

        records.extend(candidates.into_iter()
            .filter(|&j| geometry.intersects(&right.geometries()[j]))
            .map(|j| JoinRecord { left: i, right: j }));
    }
    records
}

/// Gather the attribute rows of both sides and place them side by side.
fn merge_attributes(
    left: &FeatureCollection,
    right: &FeatureCollection,
    records: &[JoinRecord],
    options: &JoinOptions,
) -> polars::error::PolarsResult<DataFrame> {
    let take = |data: &DataFrame, indices: Vec<IdxSize>| data.take(&IdxCa::from_vec("".into(), indices));

    let mut left_rows = take(left.data(), records.iter().map(|r| r.left as IdxSize).collect())?;
    let mut right_rows = take(right.data(), records.iter().map(|r| r.right as IdxSize).collect())?;

    let left_names = left.columns().into_iter().collect::<HashSet<_>>();
    for name in right.columns() {
        if left_names.contains(&name) {
            left_rows.rename(&name, format!("{name}_{}", options.left_suffix).into())?;
            right_rows.rename(&name, format!("{name}_{}", options.right_suffix).into())?;
        }
    }

    left_rows.hstack(right_rows.get_columns())
}

#[cfg(test)]
mod tests {
    use geo::{Geometry, point, polygon};
    use polars::df;

    use super::*;
    use crate::crs::Crs;

    const UTM: Crs = Crs::Epsg(32629);

    fn square(x0: f64, y0: f64, size: f64) -> Geometry<f64> {
        polygon![
            (x: x0, y: y0), (x: x0 + size, y: y0), (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size), (x: x0, y: y0),
        ].into()
    }

    fn areas() -> FeatureCollection {
        FeatureCollection::new(
            "areas",
            Some(UTM),
            vec![square(0.0, 0.0, 10.0), square(5.0, 0.0, 10.0)],
            df!["fid" => [0u32, 1], "Name" => ["west", "east"]].unwrap(),
        ).unwrap()
    }

    fn tags() -> FeatureCollection {
        FeatureCollection::new(
            "tags",
            Some(UTM),
            vec![
                point!(x: 7.0, y: 5.0).into(),  // in both squares
                point!(x: 2.0, y: 5.0).into(),  // west only
                point!(x: 50.0, y: 50.0).into(), // outside
                point!(x: 12.0, y: 1.0).into(), // east only
            ],
            df!["fid" => [0u32, 1, 2, 3], "Sex" => ["F", "M", "F", "F"]].unwrap(),
        ).unwrap()
    }

    #[test]
    fn records_are_ordered_by_left_then_right() {
        let joined = sjoin(&areas(), &tags(), &JoinOptions::default()).unwrap();
        let pairs = joined.records().iter().map(|r| (r.left, r.right)).collect::<Vec<_>>();
        assert_eq!(pairs, vec![(0, 0), (0, 1), (1, 0), (1, 3)]);
    }

    #[test]
    fn point_in_two_polygons_is_not_deduplicated() {
        let joined = sjoin(&areas(), &tags(), &JoinOptions::default()).unwrap();
        assert_eq!(joined.records().iter().filter(|r| r.right == 0).count(), 2);
    }

    #[test]
    fn colliding_columns_get_suffixes() {
        let joined = sjoin(&areas(), &tags(), &JoinOptions::default()).unwrap();
        assert_eq!(joined.columns(), vec!["fid_left", "Name", "fid_right", "Sex"]);
        assert_eq!(joined.data().height(), joined.len());
    }

    #[test]
    fn joined_table_prints_as_frame() {
        let joined = sjoin(&areas(), &tags(), &JoinOptions::default()).unwrap();
        let printed = joined.data().to_string();
        assert!(printed.contains("shape: (4, 4)"));
        assert!(printed.contains("fid_right") && printed.contains("west"));
    }

    #[test]
    fn membership_is_symmetric() {
        let forward = sjoin(&areas(), &tags(), &JoinOptions::default()).unwrap();
        let backward = sjoin(&tags(), &areas(), &JoinOptions::default()).unwrap();

        let mut a = forward.records().iter().map(|r| (r.left, r.right)).collect::<Vec<_>>();
        let mut b = backward.records().iter().map(|r| (r.right, r.left)).collect::<Vec<_>>();
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }

    #[test]
    fn every_joined_point_intersects_its_polygon() {
        let (areas, tags) = (areas(), tags());
        let joined = sjoin(&areas, &tags, &JoinOptions::default()).unwrap();
        for record in joined.records() {
            assert!(areas.geometries()[record.left].intersects(&tags.geometries()[record.right]));
        }
        // the outside point never appears
        assert!(joined.records().iter().all(|r| r.right != 2));
    }

    #[test]
    fn crs_mismatch_is_a_join_error() {
        let other = tags().with_crs(Crs::Epsg(4326));
        assert!(matches!(sjoin(&areas(), &other, &JoinOptions::default()), Err(Error::Join { .. })));

        let unknown = FeatureCollection::new("unknown", None, vec![], df!["fid" => Vec::<u32>::new()].unwrap()).unwrap();
        assert!(matches!(sjoin(&unknown, &unknown, &JoinOptions::default()), Err(Error::Join { .. })));
    }

    #[test]
    fn rename_keeps_record_count() {
        let mut joined = sjoin(&areas(), &tags(), &JoinOptions::default()).unwrap();
        let before = joined.data().height();
        joined.rename_columns(&[("Sex", "Male_Female")]).unwrap();
        assert_eq!(joined.data().height(), before);
        assert!(joined.columns().contains(&"Male_Female".to_string()));
        assert!(matches!(joined.rename_columns(&[("Sex", "Other")]), Err(Error::AttributeMissing { .. })));
    }

    #[test]
    fn empty_join_keeps_schema() {
        let far = FeatureCollection::new(
            "far",
            Some(UTM),
            vec![point!(x: 1000.0, y: 1000.0).into()],
            df!["fid" => [0u32], "Sex" => ["M"]].unwrap(),
        ).unwrap();
        let joined = sjoin(&areas(), &far, &JoinOptions::default()).unwrap();
        assert!(joined.is_empty());
        assert_eq!(joined.columns().len(), 4);
    }
}
