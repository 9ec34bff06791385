use std::path::Path;

use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use log::{debug, warn};
use polars::prelude::{Column, DataFrame};
use shapefile::{self as shp, dbase::{self, FieldType, FieldValue, Record}, Shape};

use crate::{collection::FeatureCollection, crs::Crs, error::{Error, Result}};

/// Name of the row-index column added to every loaded collection.
pub const FID_COLUMN: &str = "fid";

impl FeatureCollection {
    /// Load every shape and dBASE record of a `.shp` file.
    ///
    /// The CRS comes from the `.prj` sidecar; a missing or unrecognised sidecar
    /// leaves the CRS unknown, which only fails later if a transform is needed.
    pub fn from_shapefile(name: &str, path: &Path) -> Result<Self> {
        let fail = |reason: String| Error::Load { dataset: name.to_string(), path: path.to_path_buf(), reason };

        if !path.is_file() {
            return Err(fail("file does not exist".into()));
        }

        let fields = read_field_schema(&path.with_extension("dbf"))
            .map_err(|e| fail(format!("unreadable attribute table: {e}")))?;

        let (shapes, records) = {
            let mut reader = shp::Reader::from_path(path)
                .map_err(|e| fail(format!("unreadable shapefile: {e}")))?;

            let mut shapes = Vec::new();
            let mut records = Vec::new();
            for (i, item) in reader.iter_shapes_and_records().enumerate() {
                let (shape, record) = item.map_err(|e| fail(format!("error reading record {i}: {e}")))?;
                shapes.push(shape);
                records.push(record);
            }
            (shapes, records)
        };

        let geometries = shapes.into_iter().enumerate()
            .map(|(i, shape)| shape_to_geometry(shape).map_err(|reason| fail(format!("record {i}: {reason}"))))
            .collect::<Result<Vec<_>>>()?;

        let data = records_to_dataframe(&fields, &records)
            .map_err(|e| fail(format!("failed to build attribute table: {e}")))?;

        let crs = read_prj(path);
        match &crs {
            Some(crs) => debug!("[load] {name}: {} records in {crs}", geometries.len()),
            None => warn!("[load] {name}: no recognised CRS in {}", path.with_extension("prj").display()),
        }

        FeatureCollection::new(name, crs, geometries, data)
    }
}

/// Parse the `.prj` sidecar next to `path`, if any.
fn read_prj(path: &Path) -> Option<Crs> {
    let wkt = std::fs::read_to_string(path.with_extension("prj")).ok()?;
    Crs::from_prj(&wkt)
}

/// Field names and types of a `.dbf` table, in file order.
fn read_field_schema(path: &Path) -> std::result::Result<Vec<(String, FieldType)>, dbase::Error> {
    let reader = dbase::Reader::from_path(path)?;
    Ok(reader.fields().iter()
        .filter(|field| field.name() != "DeletionFlag")
        .map(|field| (field.name().to_string(), field.field_type()))
        .collect())
}

/// Convert dBASE records to a DataFrame, one column per field plus the `fid` row index.
fn records_to_dataframe(fields: &[(String, FieldType)], records: &[Record]) -> polars::error::PolarsResult<DataFrame> {
    /// Text value of a field, formatting dates as YYYY-MM-DD.
    fn text(value: Option<&FieldValue>) -> Option<String> {
        match value? {
            FieldValue::Character(s) => s.as_ref().map(|s| s.trim().to_string()),
            FieldValue::Memo(s) => Some(s.trim().to_string()),
            FieldValue::Date(date) => date.as_ref()
                .map(|d| format!("{:04}-{:02}-{:02}", d.year(), d.month(), d.day())),
            FieldValue::DateTime(datetime) => Some(format!("{datetime:?}")),
            _ => None,
        }
    }

    /// Numeric value of a field; empty numerics are null.
    fn number(value: Option<&FieldValue>) -> Option<f64> {
        match value? {
            FieldValue::Numeric(n) => *n,
            FieldValue::Float(n) => n.map(f64::from),
            FieldValue::Double(n) | FieldValue::Currency(n) => Some(*n),
            FieldValue::Integer(n) => Some(f64::from(*n)),
            _ => None,
        }
    }

    let mut columns = Vec::with_capacity(fields.len() + 1);
    columns.push(Column::new(FID_COLUMN.into(), (0..records.len() as u32).collect::<Vec<_>>()));

    for (field, ty) in fields {
        let values = records.iter().map(|record| record.get(field));
        let column = match ty {
            FieldType::Numeric | FieldType::Float | FieldType::Double | FieldType::Currency =>
                Column::new(field.as_str().into(), values.map(number).collect::<Vec<_>>()),
            FieldType::Integer =>
                Column::new(field.as_str().into(), values
                    .map(|value| match value {
                        Some(FieldValue::Integer(n)) => Some(i64::from(*n)),
                        _ => None,
                    })
                    .collect::<Vec<_>>()),
            FieldType::Logical =>
                Column::new(field.as_str().into(), values
                    .map(|value| match value {
                        Some(FieldValue::Logical(b)) => *b,
                        _ => None,
                    })
                    .collect::<Vec<_>>()),
            _ => Column::new(field.as_str().into(), values.map(text).collect::<Vec<_>>()),
        };
        columns.push(column);
    }

    DataFrame::new(columns)
}

/// Convert a shapefile shape to a `geo` geometry. Z and M values are dropped.
fn shape_to_geometry(shape: Shape) -> std::result::Result<Geometry<f64>, String> {
    Ok(match shape {
        Shape::Point(p) => Point::new(p.x, p.y).into(),
        Shape::PointM(p) => Point::new(p.x, p.y).into(),
        Shape::PointZ(p) => Point::new(p.x, p.y).into(),
        Shape::Multipoint(mp) => MultiPoint::from(mp.points().iter().map(|p| (p.x, p.y)).collect::<Vec<_>>()).into(),
        Shape::MultipointM(mp) => MultiPoint::from(mp.points().iter().map(|p| (p.x, p.y)).collect::<Vec<_>>()).into(),
        Shape::MultipointZ(mp) => MultiPoint::from(mp.points().iter().map(|p| (p.x, p.y)).collect::<Vec<_>>()).into(),
        Shape::Polyline(line) => parts_to_lines(line.parts(), |p| Coord { x: p.x, y: p.y }),
        Shape::PolylineM(line) => parts_to_lines(line.parts(), |p| Coord { x: p.x, y: p.y }),
        Shape::PolylineZ(line) => parts_to_lines(line.parts(), |p| Coord { x: p.x, y: p.y }),
        Shape::Polygon(polygon) => rings_to_multipolygon(polygon.rings(), |p| Coord { x: p.x, y: p.y }).into(),
        Shape::PolygonM(polygon) => rings_to_multipolygon(polygon.rings(), |p| Coord { x: p.x, y: p.y }).into(),
        Shape::PolygonZ(polygon) => rings_to_multipolygon(polygon.rings(), |p| Coord { x: p.x, y: p.y }).into(),
        Shape::NullShape => return Err("null shape".into()),
        other => return Err(format!("unsupported shape type {:?}", other.shapetype())),
    })
}

/// Polyline parts become a LineString, or a MultiLineString when there are several.
fn parts_to_lines<P>(parts: &[Vec<P>], xy: impl Fn(&P) -> Coord<f64>) -> Geometry<f64> {
    let mut lines = parts.iter()
        .map(|part| LineString::new(part.iter().map(&xy).collect()))
        .collect::<Vec<_>>();
    if lines.len() == 1 {
        lines.remove(0).into()
    } else {
        MultiLineString::new(lines).into()
    }
}

/// Group shapefile rings into polygons: each outer ring owns the inner rings that follow it.
fn rings_to_multipolygon<P>(rings: &[shp::PolygonRing<P>], xy: impl Fn(&P) -> Coord<f64>) -> MultiPolygon<f64> {
    /// Ensure first and last are the same for geo::LineString coords
    fn closed(mut coords: Vec<Coord<f64>>) -> LineString<f64> {
        if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
            if first != last { coords.push(first) }
        }
        LineString::new(coords)
    }

    let mut polygons: Vec<Polygon<f64>> = Vec::new();
    let mut exterior: Option<LineString<f64>> = None;
    let mut holes: Vec<LineString<f64>> = Vec::new();

    for ring in rings {
        let coords = closed(ring.points().iter().map(&xy).collect());
        match ring {
            shp::PolygonRing::Outer(_) => {
                if let Some(ext) = exterior.replace(coords) {
                    polygons.push(Polygon::new(ext, std::mem::take(&mut holes)));
                }
            }
            shp::PolygonRing::Inner(_) => holes.push(coords),
        }
    }
    if let Some(ext) = exterior {
        polygons.push(Polygon::new(ext, holes));
    }

    MultiPolygon::new(polygons)
}
