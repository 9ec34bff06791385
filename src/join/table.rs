use geo::Geometry;
use polars::prelude::{AnyValue, Column, DataFrame};

use crate::{crs::Crs, error::{Error, Result}};

/// One intersecting pair: feature `left` of the left collection and feature `right` of the right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JoinRecord {
    pub left: usize,
    pub right: usize,
}

/// Result of a spatial join: one row per [`JoinRecord`], with left geometries and merged attributes.
#[derive(Debug, Clone)]
pub struct JoinedTable {
    name: String,
    crs: Crs,
    records: Vec<JoinRecord>,
    geometries: Vec<Geometry<f64>>,
    data: DataFrame,
}

impl JoinedTable {
    pub(super) fn new(name: String, crs: Crs, records: Vec<JoinRecord>, geometries: Vec<Geometry<f64>>, data: DataFrame) -> Self {
        debug_assert_eq!(records.len(), geometries.len());
        Self { name, crs, records, geometries, data }
    }

    #[inline] pub fn name(&self) -> &str { &self.name }

    #[inline] pub fn crs(&self) -> &Crs { &self.crs }

    #[inline] pub fn len(&self) -> usize { self.records.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.records.is_empty() }

    #[inline] pub fn records(&self) -> &[JoinRecord] { &self.records }

    /// Left-side geometry of each record.
    #[inline] pub fn geometries(&self) -> &[Geometry<f64>] { &self.geometries }

    #[inline] pub fn data(&self) -> &DataFrame { &self.data }

    /// Column names, in table order.
    pub fn columns(&self) -> Vec<String> {
        self.data.get_column_names().into_iter().map(|name| name.to_string()).collect()
    }

    /// Look up a column, reporting the available names when it is missing.
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.data.column(name).map_err(|_| Error::AttributeMissing {
            table: self.name.clone(),
            column: name.to_string(),
            available: self.columns().join(", "),
        })
    }

    /// Value of `column` on record `row`.
    pub fn value(&self, row: usize, column: &str) -> Result<AnyValue<'_>> {
        self.column(column)?.get(row).map_err(Error::data("join"))
    }

    /// Rename columns in place. Only names change; the record count never does.
    pub fn rename_columns<S: AsRef<str>>(&mut self, renames: &[(S, S)]) -> Result<()> {
        for (from, to) in renames {
            let (from, to) = (from.as_ref(), to.as_ref());
            self.column(from)?;
            self.data.rename(from, to.into()).map_err(Error::data("join"))?;
        }
        Ok(())
    }

    /// Add (or replace) a column holding `value` on every record.
    pub fn with_constant(&mut self, name: &str, value: i64) -> Result<()> {
        let column = Column::new(name.into(), vec![value; self.len()]);
        self.data.with_column(column).map_err(Error::data("join"))?;
        Ok(())
    }
}
