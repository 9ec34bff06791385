//! Grouped counts and sums over joined records.
//!
//! Missing columns are errors. A filter value that never occurs counts as zero.

use std::{collections::BTreeMap, path::Path};

use polars::{frame::DataFrame, io::SerWriter, prelude::{Column, CsvWriter, DataType}};
use serde::Serialize;

use crate::{error::{Error, Result}, join::JoinedTable, render::write_atomic};

/// One group: the category value, its record count and per-column sums.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub key: String,
    pub count: usize,
    pub sums: BTreeMap<String, f64>,
}

/// String rendering of a column, one entry per record (None for nulls).
///
/// Float columns render integral values without a fractional part, so a dBASE
/// numeric code of `1.0` matches `"1"`.
fn keys(table: &JoinedTable, name: &str) -> Result<Vec<Option<String>>> {
    let column = table.column(name)?;
    if column.dtype().is_float() {
        return Ok(numbers(table, name)?.into_iter()
            .map(|value| value.map(number_key))
            .collect());
    }

    let column = column.cast(&DataType::String).map_err(Error::data("aggregate"))?;
    let values = column.str().map_err(Error::data("aggregate"))?;
    Ok(values.into_iter().map(|value| value.map(str::to_string)).collect())
}

fn number_key(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Numeric values of a column; non-numeric entries become None.
fn numbers(table: &JoinedTable, column: &str) -> Result<Vec<Option<f64>>> {
    let column = table.column(column)?
        .cast(&DataType::Float64)
        .map_err(Error::data("aggregate"))?;
    let values = column.f64().map_err(Error::data("aggregate"))?;
    Ok(values.into_iter().collect())
}

/// Group records by `key`, counting them and summing each of `sum_columns`.
///
/// Rows come back sorted by key. Records whose key is null are skipped.
pub fn group_by(table: &JoinedTable, key: &str, sum_columns: &[&str]) -> Result<Vec<AggregateRow>> {
    let keys = keys(table, key)?;
    let sums = sum_columns.iter()
        .map(|&name| Ok((name, numbers(table, name)?)))
        .collect::<Result<Vec<_>>>()?;

    let mut groups: BTreeMap<String, AggregateRow> = BTreeMap::new();
    for (i, key) in keys.into_iter().enumerate() {
        let Some(key) = key else { continue };
        let row = groups.entry(key.clone()).or_insert_with(|| AggregateRow {
            key,
            count: 0,
            sums: sum_columns.iter().map(|name| (name.to_string(), 0.0)).collect(),
        });
        row.count += 1;
        for (name, values) in &sums {
            if let Some(value) = values[i] {
                *row.sums.entry(name.to_string()).or_default() += value;
            }
        }
    }

    Ok(groups.into_values().collect())
}

/// Number of records whose `column` equals `value` exactly.
pub fn value_count(table: &JoinedTable, column: &str, value: &str) -> Result<usize> {
    Ok(keys(table, column)?.iter()
        .filter(|key| key.as_deref() == Some(value))
        .count())
}

/// Count of every distinct value in `column`, most frequent first (ties by value).
pub fn value_counts(table: &JoinedTable, column: &str) -> Result<Vec<(String, usize)>> {
    let mut counts = group_by(table, column, &[])?
        .into_iter()
        .map(|row| (row.key, row.count))
        .collect::<Vec<_>>();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok(counts)
}

/// Named set of aggregate rows, ready to print or export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tabulation {
    pub name: String,
    pub key: String,
    pub rows: Vec<AggregateRow>,
}

impl Tabulation {
    /// One row per group: key, count, then one column per summed field.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let sum_names = self.rows.first()
            .map(|row| row.sums.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();

        let mut columns = vec![
            Column::new("join".into(), vec![self.name.as_str(); self.rows.len()]),
            Column::new(self.key.as_str().into(), self.rows.iter().map(|row| row.key.as_str()).collect::<Vec<_>>()),
            Column::new("count".into(), self.rows.iter().map(|row| row.count as u64).collect::<Vec<_>>()),
        ];
        for name in &sum_names {
            columns.push(Column::new(
                format!("sum_{name}").into(),
                self.rows.iter().map(|row| row.sums.get(name).copied().unwrap_or(0.0)).collect::<Vec<_>>(),
            ));
        }

        DataFrame::new(columns).map_err(Error::data("aggregate"))
    }

    /// Write the tabulation as CSV.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        Self::write_dataframe(&mut self.to_dataframe()?, path)
    }

    /// Write tabulation rows (possibly several tabulations stacked) as CSV.
    pub(crate) fn write_dataframe(df: &mut DataFrame, path: &Path) -> Result<()> {
        let mut bytes = Vec::new();
        CsvWriter::new(&mut bytes)
            .finish(df)
            .map_err(|e| Error::Render { path: path.to_path_buf(), reason: e.to_string() })?;
        write_atomic(&bytes, path)
    }
}

#[cfg(test)]
mod tests {
    use geo::{point, polygon, Geometry};
    use polars::df;

    use super::*;
    use crate::{collection::FeatureCollection, crs::Crs, join::{sjoin, JoinOptions}};

    fn joined() -> JoinedTable {
        let area: Geometry<f64> = polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)].into();
        let areas = FeatureCollection::new("mpa", Some(Crs::Epsg(32629)), vec![area], df!["fid" => [0u32]].unwrap()).unwrap();
        let tags = FeatureCollection::new(
            "tags",
            Some(Crs::Epsg(32629)),
            vec![
                point!(x: 1.0, y: 1.0).into(),
                point!(x: 2.0, y: 2.0).into(),
                point!(x: 3.0, y: 3.0).into(),
                point!(x: 4.0, y: 4.0).into(),
            ],
            df![
                "fid" => [0u32, 1, 2, 3],
                "Species" => [Some("Spurdog"), Some("Spurdog"), Some("Skate"), None],
                "Sex" => ["F", "M", "F", "F"],
                "Length" => [80.0, 95.5, 120.0, 60.0],
            ].unwrap(),
        ).unwrap();

        let mut joined = sjoin(&areas, &tags, &JoinOptions::default()).unwrap();
        joined.with_constant("const", 1).unwrap();
        joined
    }

    #[test]
    fn group_by_counts_and_sums() {
        let rows = group_by(&joined(), "Species", &["const", "Length"]).unwrap();
        assert_eq!(rows.len(), 2); // null key skipped
        assert_eq!(rows[0].key, "Skate");
        assert_eq!(rows[1].key, "Spurdog");
        assert_eq!(rows[1].count, 2);
        assert_eq!(rows[1].sums["const"], 2.0);
        assert_eq!(rows[1].sums["Length"], 175.5);
    }

    #[test]
    fn value_count_matches_exactly() {
        let table = joined();
        assert_eq!(value_count(&table, "Sex", "F").unwrap(), 3);
        assert_eq!(value_count(&table, "Sex", "f").unwrap(), 0);
    }

    #[test]
    fn absent_value_counts_zero() {
        assert_eq!(value_count(&joined(), "Sex", "U").unwrap(), 0);
    }

    #[test]
    fn missing_column_is_an_error() {
        let table = joined();
        assert!(matches!(value_count(&table, "Male_Female", "F"), Err(Error::AttributeMissing { .. })));
        assert!(matches!(group_by(&table, "Species", &["Weight"]), Err(Error::AttributeMissing { .. })));
    }

    #[test]
    fn numeric_codes_match_without_fraction() {
        let area: Geometry<f64> = polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)].into();
        let areas = FeatureCollection::new("mpa", Some(Crs::Epsg(32629)), vec![area], df!["fid" => [0u32]].unwrap()).unwrap();
        let tags = FeatureCollection::new(
            "tags",
            Some(Crs::Epsg(32629)),
            vec![point!(x: 1.0, y: 1.0).into(), point!(x: 2.0, y: 2.0).into(), point!(x: 3.0, y: 3.0).into()],
            df!["fid" => [0u32, 1, 2], "Sex" => [1.0, 2.0, 1.5]].unwrap(),
        ).unwrap();
        let table = sjoin(&areas, &tags, &JoinOptions::default()).unwrap();

        assert_eq!(value_count(&table, "Sex", "1").unwrap(), 1);
        assert_eq!(value_count(&table, "Sex", "1.5").unwrap(), 1);
        let keys = group_by(&table, "Sex", &[]).unwrap().into_iter().map(|row| row.key).collect::<Vec<_>>();
        assert_eq!(keys, ["1", "1.5", "2"]);
    }

    #[test]
    fn value_counts_most_frequent_first() {
        assert_eq!(value_counts(&joined(), "Sex").unwrap(), vec![("F".to_string(), 3), ("M".to_string(), 1)]);
    }

    #[test]
    fn tabulation_to_dataframe() {
        let tabulation = Tabulation {
            name: "mpa x tags".into(),
            key: "Species".into(),
            rows: group_by(&joined(), "Species", &["const"]).unwrap(),
        };
        let df = tabulation.to_dataframe().unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.get_column_names().len(), 4);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("groups.csv");
        tabulation.write_csv(&path).unwrap();
        let csv = std::fs::read_to_string(path).unwrap();
        assert!(csv.starts_with("join,Species,count,sum_const"));
        assert!(csv.contains("mpa x tags,Spurdog,2,2"));
    }
}
