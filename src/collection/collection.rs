use std::{collections::BTreeMap, fmt};

use geo::{BoundingRect, Coord, Geometry, Point, Rect};
use polars::prelude::{AnyValue, DataFrame};

use crate::{crs::{Crs, crs_label}, error::{Error, Result}};

/// An ordered set of features: one geometry plus one attribute row each.
///
/// Attributes live in a polars `DataFrame` whose row `i` belongs to geometry `i`.
#[derive(Debug, Clone)]
pub struct FeatureCollection {
    name: String,
    crs: Option<Crs>,
    geometries: Vec<Geometry<f64>>,
    data: DataFrame,
}

/// Borrowed view of a single feature.
#[derive(Debug, Clone, Copy)]
pub struct Feature<'a> {
    index: usize,
    geometry: &'a Geometry<f64>,
    data: &'a DataFrame,
}

impl<'a> Feature<'a> {
    #[inline] pub fn index(&self) -> usize { self.index }

    #[inline] pub fn geometry(&self) -> &'a Geometry<f64> { self.geometry }

    /// Scalar value of the named attribute for this feature.
    pub fn attribute(&self, name: &str) -> Option<AnyValue<'a>> {
        self.data.column(name).ok()?.get(self.index).ok()
    }

    /// All attributes of this feature, keyed by column name.
    pub fn attributes(&self) -> BTreeMap<String, AnyValue<'a>> {
        self.data.get_columns().iter()
            .filter_map(|column| Some((column.name().to_string(), column.get(self.index).ok()?)))
            .collect()
    }
}

impl FeatureCollection {
    /// Construct a collection, checking that every geometry has an attribute row.
    pub fn new(name: impl Into<String>, crs: Option<Crs>, geometries: Vec<Geometry<f64>>, data: DataFrame) -> Result<Self> {
        let name = name.into();
        if data.width() > 0 && data.height() != geometries.len() {
            return Err(Error::Config(format!(
                "collection '{name}' has {} geometries but {} attribute rows",
                geometries.len(), data.height(),
            )));
        }
        Ok(Self { name, crs, geometries, data })
    }

    #[inline] pub fn name(&self) -> &str { &self.name }

    #[inline] pub fn crs(&self) -> Option<&Crs> { self.crs.as_ref() }

    #[inline] pub fn len(&self) -> usize { self.geometries.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.geometries.is_empty() }

    #[inline] pub fn geometries(&self) -> &[Geometry<f64>] { &self.geometries }

    #[inline] pub fn data(&self) -> &DataFrame { &self.data }

    /// Tag the collection with a CRS without touching coordinates.
    /// Used for datasets whose `.prj` sidecar is missing or unrecognised.
    pub fn with_crs(mut self, crs: Crs) -> Self {
        self.crs = Some(crs);
        self
    }

    /// Replace geometries, keeping attributes. Caller guarantees same length.
    pub(crate) fn with_geometries(&self, geometries: Vec<Geometry<f64>>, crs: Crs) -> Self {
        debug_assert_eq!(geometries.len(), self.geometries.len());
        Self { name: self.name.clone(), crs: Some(crs), geometries, data: self.data.clone() }
    }

    /// Feature at position `index`.
    pub fn feature(&self, index: usize) -> Option<Feature<'_>> {
        Some(Feature { index, geometry: self.geometries.get(index)?, data: &self.data })
    }

    pub fn iter(&self) -> impl Iterator<Item = Feature<'_>> {
        self.geometries.iter().enumerate()
            .map(|(index, geometry)| Feature { index, geometry, data: &self.data })
    }

    /// Attribute column names, in table order.
    pub fn columns(&self) -> Vec<String> {
        self.data.get_column_names().into_iter().map(|name| name.to_string()).collect()
    }

    /// Total bounds of all geometries.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.geometries.iter()
            .filter_map(|geometry| geometry.bounding_rect())
            .reduce(|a, b| Rect::new(
                Coord { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                Coord { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
            ))
    }

    /// Every point position in the collection (points and multipoints only).
    pub fn points(&self) -> Vec<Point<f64>> {
        self.geometries.iter()
            .flat_map(|geometry| match geometry {
                Geometry::Point(point) => vec![*point],
                Geometry::MultiPoint(points) => points.0.clone(),
                _ => Vec::new(),
            })
            .collect()
    }

    /// Record count, geometry mix, attribute columns and CRS.
    pub fn summary(&self) -> Summary {
        let mut geometry_mix: BTreeMap<&'static str, usize> = BTreeMap::new();
        for geometry in &self.geometries {
            *geometry_mix.entry(geometry_kind(geometry)).or_default() += 1;
        }

        Summary {
            name: self.name.clone(),
            records: self.len(),
            geometry_mix,
            columns: self.data.get_columns().iter()
                .map(|column| (column.name().to_string(), column.dtype().to_string()))
                .collect(),
            crs: self.crs,
        }
    }
}

/// Short name for the geometry variant.
pub(crate) fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::Line(_) | Geometry::LineString(_) => "LineString",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => "Polygon",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
    }
}

/// Debug overview of a loaded collection.
#[derive(Debug, Clone)]
pub struct Summary {
    pub name: String,
    pub records: usize,
    pub geometry_mix: BTreeMap<&'static str, usize>,
    pub columns: Vec<(String, String)>,
    pub crs: Option<Crs>,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dataset: {}", self.name)?;
        writeln!(f, "Number of records: {}", self.records)?;
        writeln!(f, "CRS: {}", crs_label(self.crs.as_ref()))?;
        writeln!(f, "Geometry mix:")?;
        for (kind, count) in &self.geometry_mix {
            writeln!(f, "  - {kind}: {count}")?;
        }
        writeln!(f, "Attribute columns:")?;
        for (column, dtype) in &self.columns {
            writeln!(f, "  - {column} ({dtype})")?;
        }
        Ok(())
    }
}
